//! MODBUS framing and PDU handling for the `modsim` slave simulator.
//!
//! `modsim-core` decodes MBAP (TCP) and headerless (TLS) request frames,
//! validates the protocol data unit, models MODBUS exceptions and encodes
//! response frames. It performs no I/O; the async server lives in
//! `modsim-server`.

#![forbid(unsafe_code)]

pub mod encoding;
pub mod error;
pub mod frame;
pub mod pdu;

pub use error::{DecodeError, EncodeError, FrameError, HeaderMismatch};
