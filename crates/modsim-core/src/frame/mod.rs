//! Transport framing for MODBUS requests and responses.
//!
//! Both variants implement [`FrameCodec`]; the server picks one when it is
//! constructed and never mixes them on a connection.

pub mod tcp;
pub mod tls;

use crate::encoding::Writer;
use crate::pdu::{Request, Response};
use crate::{EncodeError, FrameError};

pub use tcp::{MbapCodec, MbapHeader};
pub use tls::HeaderlessCodec;

/// Largest frame read in one pass: a 253-byte PDU plus the 7-byte MBAP header.
pub const MAX_FRAME_LEN: usize = 260;

pub trait FrameCodec: Send + Sync + 'static {
    /// Shortest buffer `decode` accepts.
    const MIN_FRAME_LEN: usize;

    /// Parse one frame from a single read.
    fn decode<'a>(&self, buf: &'a [u8]) -> Result<Request<'a>, FrameError>;

    /// Header acceptance policy, run after `decode`. A failure closes the
    /// connection without a reply.
    fn accept_header(&self, _request: &Request<'_>) -> Result<(), FrameError> {
        Ok(())
    }

    fn encode(&self, response: &Response<'_>, w: &mut Writer<'_>) -> Result<(), EncodeError>;
}

fn check_min_len(buf: &[u8], min: usize) -> Result<(), FrameError> {
    if buf.len() < min {
        return Err(FrameError::Incomplete {
            len: buf.len(),
            min,
        });
    }
    Ok(())
}
