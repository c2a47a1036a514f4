use modsim_server::{ModbusTcpServer, PlainTcp, ServerConfig, SyntheticModbusService};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

async fn start_server(config: ServerConfig) -> (SocketAddr, JoinHandle<Result<(), modsim_server::ServerError>>) {
    let server = ModbusTcpServer::bind("127.0.0.1:0", PlainTcp, SyntheticModbusService, config)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    (addr, tokio::spawn(server.run()))
}

async fn exchange(stream: &mut TcpStream, request: &[u8]) -> Vec<u8> {
    stream.write_all(request).await.unwrap();
    let mut header = [0u8; 7];
    stream.read_exact(&mut header).await.unwrap();
    let length = usize::from(u16::from_be_bytes([header[4], header[5]]));
    let mut rest = vec![0u8; length - 1];
    stream.read_exact(&mut rest).await.unwrap();
    let mut frame = header.to_vec();
    frame.extend_from_slice(&rest);
    frame
}

#[tokio::test]
async fn serves_several_transactions_on_one_connection() {
    let (addr, task) = start_server(ServerConfig::default().with_rng_seed(Some(7))).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    // Read coils: 10 bits -> 2 data bytes.
    let frame = exchange(
        &mut stream,
        &[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x01, 0x00, 0x00, 0x00, 0x0A],
    )
    .await;
    assert_eq!(&frame[..9], &[0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x01, 0x02]);
    assert_eq!(frame.len(), 11);
    assert_eq!(frame[10] & 0xFC, 0);

    // Read holding registers: 3 registers -> 6 data bytes.
    let frame = exchange(
        &mut stream,
        &[0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x10, 0x00, 0x03],
    )
    .await;
    assert_eq!(&frame[..9], &[0x00, 0x02, 0x00, 0x00, 0x00, 0x09, 0x01, 0x03, 0x06]);
    assert_eq!(frame.len(), 15);

    // Write single coil is echoed.
    let request = [0x00, 0x03, 0x00, 0x00, 0x00, 0x06, 0x01, 0x05, 0x00, 0x10, 0xFF, 0x00];
    assert_eq!(exchange(&mut stream, &request).await, request);

    // Bad coil value is an exception, the connection stays open.
    let frame = exchange(
        &mut stream,
        &[0x00, 0x04, 0x00, 0x00, 0x00, 0x06, 0x01, 0x05, 0x00, 0x10, 0x12, 0x34],
    )
    .await;
    assert_eq!(frame, [0x00, 0x04, 0x00, 0x00, 0x00, 0x03, 0x01, 0x85, 0x03]);

    // Unknown function code.
    let frame = exchange(
        &mut stream,
        &[0x00, 0x05, 0x00, 0x00, 0x00, 0x04, 0x01, 0x2B, 0x0E, 0x01],
    )
    .await;
    assert_eq!(frame, [0x00, 0x05, 0x00, 0x00, 0x00, 0x03, 0x01, 0xAB, 0x01]);

    // Write multiple coils: 10 coils in 2 bytes.
    let frame = exchange(
        &mut stream,
        &[
            0x00, 0x06, 0x00, 0x00, 0x00, 0x09, 0x01, 0x0F, 0x00, 0x13, 0x00, 0x0A, 0x02, 0xCD,
            0x01,
        ],
    )
    .await;
    assert_eq!(
        frame,
        [0x00, 0x06, 0x00, 0x00, 0x00, 0x06, 0x01, 0x0F, 0x00, 0x13, 0x00, 0x0A]
    );

    // Byte count disagreeing with the values sent.
    let frame = exchange(
        &mut stream,
        &[
            0x00, 0x07, 0x00, 0x00, 0x00, 0x09, 0x01, 0x0F, 0x00, 0x13, 0x00, 0x0A, 0x03, 0xCD,
            0x01,
        ],
    )
    .await;
    assert_eq!(frame, [0x00, 0x07, 0x00, 0x00, 0x00, 0x03, 0x01, 0x8F, 0x03]);

    task.abort();
    let _ = task.await;
}

#[tokio::test]
async fn broadcast_unit_is_answered() {
    let (addr, task) = start_server(ServerConfig::default().with_unit_id(0x11)).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let request = [0x12, 0x34, 0x00, 0x00, 0x00, 0x06, 0x00, 0x06, 0x00, 0x01, 0xAB, 0xCD];
    assert_eq!(exchange(&mut stream, &request).await, request);

    let request = [0x12, 0x35, 0x00, 0x00, 0x00, 0x06, 0x11, 0x06, 0x00, 0x01, 0xAB, 0xCD];
    assert_eq!(exchange(&mut stream, &request).await, request);

    task.abort();
    let _ = task.await;
}

#[tokio::test]
async fn header_mismatches_close_without_reply() {
    let (addr, task) = start_server(ServerConfig::default()).await;

    let bad_frames: [&[u8]; 3] = [
        // protocol id 1
        &[0x00, 0x01, 0x00, 0x01, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x01],
        // length field disagrees with the bytes sent
        &[0x00, 0x01, 0x00, 0x00, 0x00, 0x09, 0x01, 0x03, 0x00, 0x00, 0x00, 0x01],
        // shorter than a minimal MBAP frame
        &[0x00, 0x01, 0x00, 0x00, 0x00],
    ];

    for frame in bad_frames {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(frame).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        assert!(response.is_empty(), "unexpected reply to {frame:02X?}");
    }

    task.abort();
    let _ = task.await;
}

#[tokio::test]
async fn sessions_are_independent() {
    let (addr, task) = start_server(ServerConfig::default()).await;

    let mut healthy = TcpStream::connect(addr).await.unwrap();
    let mut doomed = TcpStream::connect(addr).await.unwrap();

    doomed
        .write_all(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x09, 0x03, 0x00, 0x00, 0x00, 0x01])
        .await
        .unwrap();
    let mut response = Vec::new();
    doomed.read_to_end(&mut response).await.unwrap();
    assert!(response.is_empty());

    let request = [0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x06, 0x00, 0x00, 0x00, 0x2A];
    assert_eq!(exchange(&mut healthy, &request).await, request);

    task.abort();
    let _ = task.await;
}
