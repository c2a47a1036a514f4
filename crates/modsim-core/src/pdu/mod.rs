pub mod exception;
pub mod function_code;
pub mod request;
pub mod response;
pub mod validate;

pub use exception::{ExceptionCode, ExceptionResponse};
pub use function_code::FunctionCode;
pub use request::Request;
pub use response::Response;
pub use validate::validate_pdu;

/// Largest MODBUS PDU (function code + data) a frame can carry.
pub const MAX_PDU_LEN: usize = 253;
