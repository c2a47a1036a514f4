use crate::frame::tcp::MbapHeader;

/// A decoded request frame.
///
/// `header` is only present for MBAP frames; headerless (TLS) frames carry
/// the function code and payload alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request<'a> {
    pub header: Option<MbapHeader>,
    pub function_code: u8,
    pub payload: &'a [u8],
}

impl<'a> Request<'a> {
    pub const fn headerless(function_code: u8, payload: &'a [u8]) -> Self {
        Self {
            header: None,
            function_code,
            payload,
        }
    }

    pub fn transaction_id(&self) -> Option<u16> {
        self.header.map(|header| header.transaction_id)
    }

    pub fn unit_id(&self) -> Option<u8> {
        self.header.map(|header| header.unit_id)
    }
}
