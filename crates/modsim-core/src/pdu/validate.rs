use crate::pdu::{ExceptionCode, FunctionCode};

/// Structural gate run before a request reaches its handler.
///
/// Only the function code and the payload length are inspected. Address,
/// quantity and byte-count rules belong to the individual handlers.
pub fn validate_pdu(function_code: u8, payload: &[u8]) -> Result<FunctionCode, ExceptionCode> {
    let function = FunctionCode::from_u8(function_code).ok_or(ExceptionCode::IllegalFunction)?;

    if payload.len() < 2 {
        return Err(ExceptionCode::IllegalDataAddress);
    }

    let well_formed = match function {
        FunctionCode::ReadCoils
        | FunctionCode::ReadDiscreteInputs
        | FunctionCode::ReadHoldingRegisters
        | FunctionCode::ReadInputRegisters
        | FunctionCode::WriteSingleCoil
        | FunctionCode::WriteSingleRegister => payload.len() == 4,
        FunctionCode::WriteMultipleCoils => payload.len() > 6,
        FunctionCode::WriteMultipleRegisters => payload.len() > 7,
    };

    if well_formed {
        Ok(function)
    } else {
        Err(ExceptionCode::IllegalDataValue)
    }
}

#[cfg(test)]
mod tests {
    use super::validate_pdu;
    use crate::pdu::{ExceptionCode, FunctionCode};

    #[test]
    fn unknown_function_is_illegal_function() {
        assert_eq!(validate_pdu(0x99, &[0; 4]), Err(ExceptionCode::IllegalFunction));
        assert_eq!(validate_pdu(0x00, &[]), Err(ExceptionCode::IllegalFunction));
    }

    #[test]
    fn function_code_is_checked_before_length() {
        assert_eq!(validate_pdu(0x2B, &[0x0E]), Err(ExceptionCode::IllegalFunction));
    }

    #[test]
    fn short_payload_is_illegal_address() {
        assert_eq!(validate_pdu(0x03, &[]), Err(ExceptionCode::IllegalDataAddress));
        assert_eq!(validate_pdu(0x10, &[0x00]), Err(ExceptionCode::IllegalDataAddress));
    }

    #[test]
    fn fixed_size_functions_need_four_bytes() {
        for code in 0x01..=0x06u8 {
            assert!(validate_pdu(code, &[0; 4]).is_ok(), "code 0x{code:02x}");
            assert_eq!(
                validate_pdu(code, &[0; 3]),
                Err(ExceptionCode::IllegalDataValue),
                "code 0x{code:02x}"
            );
            assert_eq!(
                validate_pdu(code, &[0; 5]),
                Err(ExceptionCode::IllegalDataValue),
                "code 0x{code:02x}"
            );
        }
        assert_eq!(validate_pdu(0x06, &[0; 4]), Ok(FunctionCode::WriteSingleRegister));
    }

    #[test]
    fn multiple_writes_need_a_value_section() {
        assert_eq!(validate_pdu(0x0F, &[0; 6]), Err(ExceptionCode::IllegalDataValue));
        assert_eq!(validate_pdu(0x0F, &[0; 7]), Ok(FunctionCode::WriteMultipleCoils));
        assert_eq!(validate_pdu(0x10, &[0; 7]), Err(ExceptionCode::IllegalDataValue));
        assert_eq!(validate_pdu(0x10, &[0; 8]), Ok(FunctionCode::WriteMultipleRegisters));
    }

    #[test]
    fn multiple_write_lengths_do_not_apply_to_single_writes() {
        assert_eq!(validate_pdu(0x0F, &[0; 4]), Err(ExceptionCode::IllegalDataValue));
    }
}
