//! Synthetic function handlers.
//!
//! Nothing is stored between requests: reads return fresh random data of the
//! right shape and writes are validated, then acknowledged.

use crate::{ModbusService, ServiceError};
use modsim_core::encoding::{Reader, Writer};
use modsim_core::pdu::{ExceptionCode, FunctionCode};
use modsim_core::{DecodeError, EncodeError};
use rand::RngCore;

const MAX_READ_BITS: u16 = 0x07D0;
const MAX_READ_REGISTERS: u16 = 0x007D;
const MAX_WRITE_COILS: u16 = 0x07B0;
const MAX_WRITE_REGISTERS: u16 = 0x007B;

/// One past the highest addressable point.
const ADDRESS_SPACE: u32 = 0x1_0000;

type Handler = fn(&[u8], &mut dyn RngCore, &mut Writer<'_>) -> Result<(), ServiceError>;

/// Table entry binding a function code to its handler.
///
/// Handlers write the response data that follows the function code.
pub struct FunctionSpec {
    function: FunctionCode,
    handler: Handler,
}

impl FunctionSpec {
    pub const fn function(&self) -> FunctionCode {
        self.function
    }

    pub fn run(
        &self,
        payload: &[u8],
        rng: &mut dyn RngCore,
        w: &mut Writer<'_>,
    ) -> Result<(), ServiceError> {
        (self.handler)(payload, rng, w)
    }

    /// Entry for a supported function. Discrete inputs and input registers
    /// share the coil and holding-register handlers.
    pub fn lookup(function: FunctionCode) -> &'static FunctionSpec {
        match function {
            FunctionCode::ReadCoils => &FUNCTION_TABLE[0],
            FunctionCode::ReadDiscreteInputs => &FUNCTION_TABLE[1],
            FunctionCode::ReadHoldingRegisters => &FUNCTION_TABLE[2],
            FunctionCode::ReadInputRegisters => &FUNCTION_TABLE[3],
            FunctionCode::WriteSingleCoil => &FUNCTION_TABLE[4],
            FunctionCode::WriteSingleRegister => &FUNCTION_TABLE[5],
            FunctionCode::WriteMultipleCoils => &FUNCTION_TABLE[6],
            FunctionCode::WriteMultipleRegisters => &FUNCTION_TABLE[7],
        }
    }
}

impl std::fmt::Debug for FunctionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionSpec")
            .field("function", &self.function)
            .finish_non_exhaustive()
    }
}

static FUNCTION_TABLE: [FunctionSpec; 8] = [
    FunctionSpec {
        function: FunctionCode::ReadCoils,
        handler: read_bits,
    },
    FunctionSpec {
        function: FunctionCode::ReadDiscreteInputs,
        handler: read_bits,
    },
    FunctionSpec {
        function: FunctionCode::ReadHoldingRegisters,
        handler: read_registers,
    },
    FunctionSpec {
        function: FunctionCode::ReadInputRegisters,
        handler: read_registers,
    },
    FunctionSpec {
        function: FunctionCode::WriteSingleCoil,
        handler: write_single_coil,
    },
    FunctionSpec {
        function: FunctionCode::WriteSingleRegister,
        handler: write_single_register,
    },
    FunctionSpec {
        function: FunctionCode::WriteMultipleCoils,
        handler: write_multiple_coils,
    },
    FunctionSpec {
        function: FunctionCode::WriteMultipleRegisters,
        handler: write_multiple_registers,
    },
];

/// The simulator's [`ModbusService`]: dispatches through the function table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticModbusService;

impl ModbusService for SyntheticModbusService {
    fn handle(
        &self,
        function: FunctionCode,
        payload: &[u8],
        rng: &mut dyn RngCore,
        response_pdu: &mut [u8],
    ) -> Result<usize, ServiceError> {
        let mut w = Writer::new(response_pdu);
        w.write_u8(function.as_u8())?;
        FunctionSpec::lookup(function).run(payload, rng, &mut w)?;
        Ok(w.position())
    }
}

fn illegal_value() -> ServiceError {
    ServiceError::Exception(ExceptionCode::IllegalDataValue)
}

fn truncated(_: DecodeError) -> ServiceError {
    illegal_value()
}

fn check_quantity(quantity: u16, max: u16) -> Result<(), ServiceError> {
    if quantity > max {
        return Err(illegal_value());
    }
    Ok(())
}

fn check_address_span(address: u16, quantity: u16) -> Result<(), ServiceError> {
    if u32::from(address) + u32::from(quantity) > ADDRESS_SPACE {
        return Err(ServiceError::Exception(ExceptionCode::IllegalDataAddress));
    }
    Ok(())
}

fn read_address_pair(r: &mut Reader<'_>) -> Result<(u16, u16), ServiceError> {
    let first = r.read_be_u16().map_err(truncated)?;
    let second = r.read_be_u16().map_err(truncated)?;
    Ok((first, second))
}

fn byte_count(len: usize) -> Result<u8, EncodeError> {
    u8::try_from(len).map_err(|_| EncodeError::ValueOutOfRange)
}

fn read_bits(payload: &[u8], rng: &mut dyn RngCore, w: &mut Writer<'_>) -> Result<(), ServiceError> {
    let (address, quantity) = read_address_pair(&mut Reader::new(payload))?;
    check_quantity(quantity, MAX_READ_BITS)?;
    check_address_span(address, quantity)?;

    let len = usize::from(quantity).div_ceil(8);
    w.write_u8(byte_count(len)?)?;
    let bits = w.advance(len)?;
    rng.fill_bytes(bits);

    // Bits past `quantity` in the last byte stay zero.
    let spare = quantity % 8;
    if spare != 0 {
        if let Some(last) = bits.last_mut() {
            *last &= (1u8 << spare) - 1;
        }
    }
    Ok(())
}

fn read_registers(
    payload: &[u8],
    rng: &mut dyn RngCore,
    w: &mut Writer<'_>,
) -> Result<(), ServiceError> {
    let (address, quantity) = read_address_pair(&mut Reader::new(payload))?;
    check_quantity(quantity, MAX_READ_REGISTERS)?;
    check_address_span(address, quantity)?;

    w.write_u8(byte_count(usize::from(quantity) * 2)?)?;
    for _ in 0..quantity {
        w.write_be_u16((rng.next_u32() & 0xFFFF) as u16)?;
    }
    Ok(())
}

fn write_single_coil(
    payload: &[u8],
    _rng: &mut dyn RngCore,
    w: &mut Writer<'_>,
) -> Result<(), ServiceError> {
    let (_address, value) = read_address_pair(&mut Reader::new(payload))?;
    if value != 0x0000 && value != 0xFF00 {
        return Err(illegal_value());
    }
    w.write_all(payload)?;
    Ok(())
}

fn write_single_register(
    payload: &[u8],
    _rng: &mut dyn RngCore,
    w: &mut Writer<'_>,
) -> Result<(), ServiceError> {
    read_address_pair(&mut Reader::new(payload))?;
    w.write_all(payload)?;
    Ok(())
}

/// Parses `address, quantity, byte count, values` and checks the byte count
/// against both the quantity and the bytes actually sent.
fn read_multiple_write<'a>(
    payload: &'a [u8],
    max_quantity: u16,
    expected_bytes: fn(u16) -> usize,
) -> Result<(u16, u16), ServiceError> {
    let mut r = Reader::new(payload);
    let (address, quantity) = read_address_pair(&mut r)?;
    let declared = usize::from(r.read_u8().map_err(truncated)?);
    let values: &'a [u8] = r.read_rest();

    check_quantity(quantity, max_quantity)?;
    if declared != expected_bytes(quantity) || declared != values.len() {
        return Err(illegal_value());
    }
    check_address_span(address, quantity)?;
    Ok((address, quantity))
}

fn write_multiple_coils(
    payload: &[u8],
    _rng: &mut dyn RngCore,
    w: &mut Writer<'_>,
) -> Result<(), ServiceError> {
    let (address, quantity) =
        read_multiple_write(payload, MAX_WRITE_COILS, |q| usize::from(q).div_ceil(8))?;
    w.write_be_u16(address)?;
    w.write_be_u16(quantity)?;
    Ok(())
}

fn write_multiple_registers(
    payload: &[u8],
    _rng: &mut dyn RngCore,
    w: &mut Writer<'_>,
) -> Result<(), ServiceError> {
    let (address, quantity) =
        read_multiple_write(payload, MAX_WRITE_REGISTERS, |q| usize::from(q) * 2)?;
    w.write_be_u16(address)?;
    w.write_be_u16(quantity)?;
    Ok(())
}
