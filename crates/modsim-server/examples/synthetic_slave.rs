use modsim_server::{ModbusTcpServer, PlainTcp, ServerConfig, SyntheticModbusService};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::default().with_rng_seed(Some(1));
    let server =
        ModbusTcpServer::bind("127.0.0.1:0", PlainTcp, SyntheticModbusService, config).await?;
    let addr = server.local_addr()?;
    let server_task = tokio::spawn(server.run());

    let mut client = TcpStream::connect(addr).await?;
    client
        .write_all(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x04])
        .await?;
    let mut response = [0u8; 17];
    client.read_exact(&mut response).await?;

    println!("response frame: {:02X?}", response);

    server_task.abort();
    let _ = server_task.await;
    Ok(())
}
