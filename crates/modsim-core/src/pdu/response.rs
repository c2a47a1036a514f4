use crate::frame::tcp::MbapHeader;
use crate::pdu::ExceptionResponse;
use crate::pdu::Request;
use crate::EncodeError;

/// A response frame ready for encoding.
///
/// The MBAP header is copied from the request with `length` recomputed as
/// `2 + data.len()`; it cannot be set independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response<'a> {
    header: Option<MbapHeader>,
    function_code: u8,
    data: &'a [u8],
}

impl<'a> Response<'a> {
    pub fn new(request: &Request<'_>, function_code: u8, data: &'a [u8]) -> Result<Self, EncodeError> {
        let header = match request.header {
            Some(header) => Some(MbapHeader {
                length: MbapHeader::length_for(data.len())?,
                ..header
            }),
            None => None,
        };
        Ok(Self {
            header,
            function_code,
            data,
        })
    }

    /// Build an exception reply. `data` receives the exception code byte.
    pub fn exception(
        request: &Request<'_>,
        exception: ExceptionResponse,
        data: &'a mut [u8; 1],
    ) -> Result<Self, EncodeError> {
        *data = exception.data();
        Self::new(request, exception.response_function_code(), data)
    }

    pub const fn header(&self) -> Option<MbapHeader> {
        self.header
    }

    pub const fn function_code(&self) -> u8 {
        self.function_code
    }

    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn is_exception(&self) -> bool {
        crate::pdu::FunctionCode::is_exception(self.function_code)
    }
}
