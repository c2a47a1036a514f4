use clap::{Parser, Subcommand};
use modsim_server::{
    ModbusServer, ModbusService, ModbusTcpServer, ModbusTlsServer, PlainTcp, ServerConfig,
    SyntheticModbusService, TlsTransport, Transport,
};
use modsim_tools::common::{init_tracing, listen_addr, SessionArgs};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(
    name = "modsim",
    about = "MODBUS slave simulator answering with synthetic data"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve MBAP frames over plain TCP.
    Tcp {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 5020)]
        port: u16,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Serve headerless frames over TLS.
    Tls {
        #[arg(long, default_value = "localhost")]
        host: String,
        #[arg(long, default_value_t = 8020)]
        port: u16,
        /// PEM certificate chain.
        #[arg(long)]
        cert: PathBuf,
        /// PEM private key.
        #[arg(long)]
        key: PathBuf,
        #[command(flatten)]
        session: SessionArgs,
    },
}

async fn serve<T: Transport, S: ModbusService>(server: ModbusServer<T, S>) -> Result<(), modsim_server::ServerError> {
    info!(addr = %server.local_addr()?, "press ctrl-c to stop");
    server
        .run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(error = %err, "failed to listen for ctrl-c");
            }
        })
        .await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Tcp {
            host,
            port,
            session,
        } => {
            let config: ServerConfig = session.server_config();
            let server = ModbusTcpServer::bind(
                listen_addr(&host, port),
                PlainTcp,
                SyntheticModbusService,
                config,
            )
            .await?;
            serve(server).await?;
        }
        Command::Tls {
            host,
            port,
            cert,
            key,
            session,
        } => {
            let transport = TlsTransport::from_pem_files(&cert, &key)?;
            let server = ModbusTlsServer::bind(
                listen_addr(&host, port),
                transport,
                SyntheticModbusService,
                session.server_config(),
            )
            .await?;
            serve(server).await?;
        }
    }
    Ok(())
}
