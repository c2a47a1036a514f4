use std::fmt;

/// Errors that can occur while encoding MODBUS data into an output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EncodeError {
    BufferTooSmall,
    ValueOutOfRange,
    /// An MBAP frame was requested for a response that carries no MBAP header.
    MissingHeader,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall => f.write_str("buffer too small"),
            Self::ValueOutOfRange => f.write_str("value out of range"),
            Self::MissingHeader => f.write_str("response has no mbap header"),
        }
    }
}

impl std::error::Error for EncodeError {}

/// Errors raised by the byte cursor when the input runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DecodeError {
    UnexpectedEof,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => f.write_str("unexpected end of input"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// The reason an MBAP header was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HeaderMismatch {
    /// The request was not decoded by an MBAP codec.
    Missing,
    ProtocolId(u16),
    /// `declared` is the MBAP length field, `actual` is `2 + payload length`.
    Length { declared: u16, actual: usize },
    UnitId(u8),
}

impl fmt::Display for HeaderMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("missing mbap header"),
            Self::ProtocolId(id) => write!(f, "protocol id 0x{id:04x} is not 0"),
            Self::Length { declared, actual } => {
                write!(f, "length field {declared} does not match frame length {actual}")
            }
            Self::UnitId(unit) => write!(f, "unit id 0x{unit:02x} is not served here"),
        }
    }
}

/// Errors that end a connection without a response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrameError {
    /// Fewer bytes than the codec's minimum frame length were received.
    Incomplete { len: usize, min: usize },
    HeaderMismatch(HeaderMismatch),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incomplete { len, min } => {
                write!(f, "incomplete frame: {len} bytes, need at least {min}")
            }
            Self::HeaderMismatch(reason) => write!(f, "header mismatch: {reason}"),
        }
    }
}

impl std::error::Error for FrameError {}

impl From<HeaderMismatch> for FrameError {
    fn from(reason: HeaderMismatch) -> Self {
        Self::HeaderMismatch(reason)
    }
}
