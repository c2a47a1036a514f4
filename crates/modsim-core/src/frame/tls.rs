use crate::encoding::Writer;
use crate::frame::{check_min_len, FrameCodec};
use crate::pdu::{Request, Response};
use crate::{EncodeError, FrameError};

/// Headerless framing used on TLS connections: function code, then payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderlessCodec;

impl FrameCodec for HeaderlessCodec {
    const MIN_FRAME_LEN: usize = 2;

    fn decode<'a>(&self, buf: &'a [u8]) -> Result<Request<'a>, FrameError> {
        check_min_len(buf, Self::MIN_FRAME_LEN)?;
        Ok(Request::headerless(buf[0], &buf[1..]))
    }

    fn encode(&self, response: &Response<'_>, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(response.function_code())?;
        w.write_all(response.data())?;
        Ok(())
    }
}
