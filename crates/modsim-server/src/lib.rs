//! Async MODBUS slave simulator.
//!
//! A [`ModbusServer`] accepts connections, wraps each one in a [`Session`]
//! and answers every well-formed request with synthetic data from the
//! [`SyntheticModbusService`]. Plain TCP connections use MBAP framing; TLS
//! connections use headerless framing. The variation lives behind the
//! [`Transport`] trait.

#![forbid(unsafe_code)]

use modsim_core::{EncodeError, FrameError};
use thiserror::Error;

pub mod config;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod server;
pub mod session;
pub mod sim;
pub mod transport;

pub use config::ServerConfig;
#[cfg(feature = "metrics")]
pub use metrics::{ServerMetrics, ServerMetricsSnapshot};
pub use server::{ModbusServer, ModbusService, ModbusTcpServer, ModbusTlsServer, ServiceError};
pub use session::{transact, IdleTimer, Session, SessionEnd, Transaction};
pub use sim::{FunctionSpec, SyntheticModbusService};
pub use transport::{load_tls_config, tls_config_from_der, PlainTcp, TlsTransport, Transport};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("tls error: {0}")]
    Tls(#[from] rustls::Error),
    #[error("certificate error: {0}")]
    Certificate(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("invalid response: {0}")]
    InvalidResponse(&'static str),
}
