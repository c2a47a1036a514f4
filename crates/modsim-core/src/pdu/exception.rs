use crate::encoding::Writer;
use crate::EncodeError;

/// Exception codes the simulator reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
}

impl ExceptionCode {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::IllegalFunction),
            0x02 => Some(Self::IllegalDataAddress),
            0x03 => Some(Self::IllegalDataValue),
            _ => None,
        }
    }

    pub const fn as_u8(self) -> u8 {
        match self {
            Self::IllegalFunction => 0x01,
            Self::IllegalDataAddress => 0x02,
            Self::IllegalDataValue => 0x03,
        }
    }
}

/// The `(function code, data)` pair of an exception reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExceptionResponse {
    /// Function code of the request, as received.
    pub function_code: u8,
    pub exception_code: ExceptionCode,
}

impl ExceptionResponse {
    pub const fn new(function_code: u8, exception_code: ExceptionCode) -> Self {
        Self {
            function_code,
            exception_code,
        }
    }

    /// Request code with the exception bit set.
    ///
    /// Codes that already carry bit 7 come back unchanged, so the reply byte
    /// never wraps into the range of a normal function code.
    pub const fn response_function_code(&self) -> u8 {
        self.function_code | 0x80
    }

    /// The single data byte of the reply.
    pub const fn data(&self) -> [u8; 1] {
        [self.exception_code.as_u8()]
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(self.response_function_code())?;
        w.write_u8(self.exception_code.as_u8())?;
        Ok(())
    }

    /// Parse a reply PDU split into function byte and data.
    ///
    /// Returns `None` unless the exception bit is set and `data` is exactly
    /// one known exception code.
    pub fn decode(function_byte: u8, data: &[u8]) -> Option<Self> {
        if (function_byte & 0x80) == 0 {
            return None;
        }
        let [code] = data else {
            return None;
        };
        Some(Self {
            function_code: function_byte & 0x7F,
            exception_code: ExceptionCode::from_u8(*code)?,
        })
    }
}
