//! Modbus protocol definitions
//!
//! Function codes, typed requests, typed responses and the exception table.
//! Nothing in here touches bytes; see [`crate::codec`] for the wire format.

use std::fmt;

use crate::constants::*;
use crate::error::{ModbusError, ModbusResult};

/// Modbus slave/unit identifier (1-247, 255 for TCP-only devices)
pub type SlaveId = u8;

/// Modbus function codes supported by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ModbusFunction {
    /// Read Coils (0x01)
    ReadCoils = FC_READ_COILS,
    /// Read Discrete Inputs (0x02)
    ReadDiscreteInputs = FC_READ_DISCRETE_INPUTS,
    /// Read Holding Registers (0x03)
    ReadHoldingRegisters = FC_READ_HOLDING_REGISTERS,
    /// Read Input Registers (0x04)
    ReadInputRegisters = FC_READ_INPUT_REGISTERS,
    /// Write Single Coil (0x05)
    WriteSingleCoil = FC_WRITE_SINGLE_COIL,
    /// Write Single Register (0x06)
    WriteSingleRegister = FC_WRITE_SINGLE_REGISTER,
    /// Write Multiple Coils (0x0F)
    WriteMultipleCoils = FC_WRITE_MULTIPLE_COILS,
    /// Write Multiple Registers (0x10)
    WriteMultipleRegisters = FC_WRITE_MULTIPLE_REGISTERS,
}

impl ModbusFunction {
    /// Convert from u8 to ModbusFunction
    pub fn from_u8(value: u8) -> ModbusResult<Self> {
        match value {
            FC_READ_COILS => Ok(Self::ReadCoils),
            FC_READ_DISCRETE_INPUTS => Ok(Self::ReadDiscreteInputs),
            FC_READ_HOLDING_REGISTERS => Ok(Self::ReadHoldingRegisters),
            FC_READ_INPUT_REGISTERS => Ok(Self::ReadInputRegisters),
            FC_WRITE_SINGLE_COIL => Ok(Self::WriteSingleCoil),
            FC_WRITE_SINGLE_REGISTER => Ok(Self::WriteSingleRegister),
            FC_WRITE_MULTIPLE_COILS => Ok(Self::WriteMultipleCoils),
            FC_WRITE_MULTIPLE_REGISTERS => Ok(Self::WriteMultipleRegisters),
            _ => Err(ModbusError::invalid_function(value)),
        }
    }

    /// Convert to u8
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Function code a server uses to report an exception for this function
    #[inline]
    pub fn exception_code(self) -> u8 {
        self.to_u8() | EXCEPTION_FLAG
    }

    /// Whether responses carry bit-packed values (FC01/FC02)
    pub fn is_bit_read(self) -> bool {
        matches!(self, Self::ReadCoils | Self::ReadDiscreteInputs)
    }

    /// Whether responses carry register values (FC03/FC04)
    pub fn is_register_read(self) -> bool {
        matches!(self, Self::ReadHoldingRegisters | Self::ReadInputRegisters)
    }

    /// Check if this is a read function
    pub fn is_read_function(self) -> bool {
        self.is_bit_read() || self.is_register_read()
    }

    /// Check if this is a write function
    pub fn is_write_function(self) -> bool {
        !self.is_read_function()
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::ReadCoils => "Read Coils",
            Self::ReadDiscreteInputs => "Read Discrete Inputs",
            Self::ReadHoldingRegisters => "Read Holding Registers",
            Self::ReadInputRegisters => "Read Input Registers",
            Self::WriteSingleCoil => "Write Single Coil",
            Self::WriteSingleRegister => "Write Single Register",
            Self::WriteMultipleCoils => "Write Multiple Coils",
            Self::WriteMultipleRegisters => "Write Multiple Registers",
        }
    }
}

impl fmt::Display for ModbusFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.to_u8())
    }
}

// ============================================================================
// Exceptions
// ============================================================================

/// Message used for exception codes missing from [`EXCEPTION_MESSAGES`]
pub const UNKNOWN_EXCEPTION_MESSAGE: &str = "UNKNOWN EXCEPTION";

/// Exception code → message
pub const EXCEPTION_MESSAGES: [(u8, &str); 9] = [
    (EXCEPTION_ILLEGAL_FUNCTION, "ILLEGAL FUNCTION"),
    (EXCEPTION_ILLEGAL_DATA_ADDRESS, "ILLEGAL DATA ADDRESS"),
    (EXCEPTION_ILLEGAL_DATA_VALUE, "ILLEGAL DATA VALUE"),
    (EXCEPTION_SLAVE_DEVICE_FAILURE, "SLAVE DEVICE FAILURE"),
    (EXCEPTION_ACKNOWLEDGE, "ACKNOWLEDGE"),
    (EXCEPTION_SLAVE_DEVICE_BUSY, "SLAVE DEVICE BUSY"),
    (EXCEPTION_MEMORY_PARITY_ERROR, "MEMORY PARITY ERROR"),
    (EXCEPTION_GATEWAY_PATH_UNAVAILABLE, "GATEWAY PATH UNAVAILABLE"),
    (
        EXCEPTION_GATEWAY_TARGET_FAILED,
        "GATEWAY TARGET DEVICE FAILED TO RESPOND",
    ),
];

/// Look up the message for an exception code
pub fn exception_message(exception_code: u8) -> &'static str {
    EXCEPTION_MESSAGES
        .iter()
        .find(|(code, _)| *code == exception_code)
        .map(|(_, message)| *message)
        .unwrap_or(UNKNOWN_EXCEPTION_MESSAGE)
}

/// Exception reported by the server instead of a normal response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionResponse {
    /// Function code as received: the request function code OR 0x80
    pub error_code: u8,
    /// Exception code byte following the error code
    pub exception_code: u8,
    /// Message from the exception table
    pub message: &'static str,
}

impl ExceptionResponse {
    pub fn new(error_code: u8, exception_code: u8) -> Self {
        Self {
            error_code,
            exception_code,
            message: exception_message(exception_code),
        }
    }

    /// Function code of the request that failed
    pub fn function_code(&self) -> u8 {
        self.error_code & !EXCEPTION_FLAG
    }
}

impl fmt::Display for ExceptionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (fc=0x{:02X}, code=0x{:02X})",
            self.message, self.error_code, self.exception_code
        )
    }
}

// ============================================================================
// Requests
// ============================================================================

/// A typed Modbus request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModbusRequest {
    ReadCoils { address: u16, quantity: u16 },
    ReadDiscreteInputs { address: u16, quantity: u16 },
    ReadHoldingRegisters { address: u16, quantity: u16 },
    ReadInputRegisters { address: u16, quantity: u16 },
    WriteSingleCoil { address: u16, value: bool },
    WriteSingleRegister { address: u16, value: u16 },
    WriteMultipleCoils { address: u16, values: Vec<bool> },
    WriteMultipleRegisters { address: u16, values: Vec<u16> },
}

impl ModbusRequest {
    /// Function code of this request
    pub fn function(&self) -> ModbusFunction {
        match self {
            Self::ReadCoils { .. } => ModbusFunction::ReadCoils,
            Self::ReadDiscreteInputs { .. } => ModbusFunction::ReadDiscreteInputs,
            Self::ReadHoldingRegisters { .. } => ModbusFunction::ReadHoldingRegisters,
            Self::ReadInputRegisters { .. } => ModbusFunction::ReadInputRegisters,
            Self::WriteSingleCoil { .. } => ModbusFunction::WriteSingleCoil,
            Self::WriteSingleRegister { .. } => ModbusFunction::WriteSingleRegister,
            Self::WriteMultipleCoils { .. } => ModbusFunction::WriteMultipleCoils,
            Self::WriteMultipleRegisters { .. } => ModbusFunction::WriteMultipleRegisters,
        }
    }

    /// Starting address of this request
    pub fn address(&self) -> u16 {
        match *self {
            Self::ReadCoils { address, .. }
            | Self::ReadDiscreteInputs { address, .. }
            | Self::ReadHoldingRegisters { address, .. }
            | Self::ReadInputRegisters { address, .. }
            | Self::WriteSingleCoil { address, .. }
            | Self::WriteSingleRegister { address, .. }
            | Self::WriteMultipleCoils { address, .. }
            | Self::WriteMultipleRegisters { address, .. } => address,
        }
    }

    /// Number of coils or registers addressed by this request
    ///
    /// Multi-write lengths above `u16::MAX` saturate; validation rejects them anyway.
    pub fn quantity(&self) -> u16 {
        match self {
            Self::ReadCoils { quantity, .. }
            | Self::ReadDiscreteInputs { quantity, .. }
            | Self::ReadHoldingRegisters { quantity, .. }
            | Self::ReadInputRegisters { quantity, .. } => *quantity,
            Self::WriteSingleCoil { .. } | Self::WriteSingleRegister { .. } => 1,
            Self::WriteMultipleCoils { values, .. } => saturating_len(values.len()),
            Self::WriteMultipleRegisters { values, .. } => saturating_len(values.len()),
        }
    }
}

fn saturating_len(len: usize) -> u16 {
    u16::try_from(len).unwrap_or(u16::MAX)
}

// ============================================================================
// Responses
// ============================================================================

/// Result of FC01/FC02
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBitsResponse {
    pub function: ModbusFunction,
    pub byte_count: u8,
    /// One entry per requested bit, starting at the request address
    pub coils: Vec<bool>,
}

/// Result of FC03/FC04
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRegistersResponse {
    pub function: ModbusFunction,
    pub byte_count: u8,
    pub registers: Vec<u16>,
}

/// Result of FC05
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSingleCoilResponse {
    pub function: ModbusFunction,
    pub byte_count: u8,
    pub output_address: u16,
    pub output_value: bool,
}

/// Result of FC06
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSingleRegisterResponse {
    pub function: ModbusFunction,
    pub byte_count: u8,
    pub register_address: u16,
    pub register_value: u16,
}

/// Result of FC0F/FC10
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteMultipleResponse {
    pub function: ModbusFunction,
    pub start_address: u16,
    pub quantity: u16,
}

/// A decoded, successful Modbus response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModbusResponse {
    ReadBits(ReadBitsResponse),
    ReadRegisters(ReadRegistersResponse),
    WriteSingleCoil(WriteSingleCoilResponse),
    WriteSingleRegister(WriteSingleRegisterResponse),
    WriteMultiple(WriteMultipleResponse),
}

impl ModbusResponse {
    /// Function code of the response
    pub fn function(&self) -> ModbusFunction {
        match self {
            Self::ReadBits(r) => r.function,
            Self::ReadRegisters(r) => r.function,
            Self::WriteSingleCoil(r) => r.function,
            Self::WriteSingleRegister(r) => r.function,
            Self::WriteMultiple(r) => r.function,
        }
    }
}

/// Conversion from the response enum into the shape a caller asked for
pub trait FromResponse: Sized {
    fn from_response(response: ModbusResponse) -> ModbusResult<Self>;
}

impl FromResponse for ModbusResponse {
    fn from_response(response: ModbusResponse) -> ModbusResult<Self> {
        Ok(response)
    }
}

macro_rules! impl_from_response {
    ($variant:ident, $ty:ty) => {
        impl FromResponse for $ty {
            fn from_response(response: ModbusResponse) -> ModbusResult<Self> {
                match response {
                    ModbusResponse::$variant(inner) => Ok(inner),
                    other => Err(ModbusError::protocol(format!(
                        "expected {} response, got {}",
                        stringify!($variant),
                        other.function()
                    ))),
                }
            }
        }
    };
}

impl_from_response!(ReadBits, ReadBitsResponse);
impl_from_response!(ReadRegisters, ReadRegistersResponse);
impl_from_response!(WriteSingleCoil, WriteSingleCoilResponse);
impl_from_response!(WriteSingleRegister, WriteSingleRegisterResponse);
impl_from_response!(WriteMultiple, WriteMultipleResponse);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_conversion() {
        for code in [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x0F, 0x10] {
            assert_eq!(ModbusFunction::from_u8(code).unwrap().to_u8(), code);
        }
        assert!(matches!(
            ModbusFunction::from_u8(0x2B),
            Err(ModbusError::InvalidFunction { code: 0x2B })
        ));
        assert_eq!(ModbusFunction::ReadInputRegisters.exception_code(), 0x84);
        assert_eq!(ModbusFunction::ReadCoils.exception_code(), 0x81);
    }

    #[test]
    fn test_function_classes() {
        assert!(ModbusFunction::ReadDiscreteInputs.is_bit_read());
        assert!(ModbusFunction::ReadHoldingRegisters.is_register_read());
        assert!(ModbusFunction::WriteMultipleCoils.is_write_function());
        assert!(!ModbusFunction::ReadCoils.is_write_function());
    }

    #[test]
    fn test_exception_table() {
        assert_eq!(exception_message(1), "ILLEGAL FUNCTION");
        assert_eq!(exception_message(2), "ILLEGAL DATA ADDRESS");
        assert_eq!(exception_message(3), "ILLEGAL DATA VALUE");
        assert_eq!(exception_message(4), "SLAVE DEVICE FAILURE");
        assert_eq!(exception_message(0x0B), "GATEWAY TARGET DEVICE FAILED TO RESPOND");
        assert_eq!(exception_message(0x07), UNKNOWN_EXCEPTION_MESSAGE);
        assert_eq!(exception_message(0xFF), UNKNOWN_EXCEPTION_MESSAGE);
    }

    #[test]
    fn test_exception_response() {
        let exception = ExceptionResponse::new(0x84, 0x01);
        assert_eq!(
            exception,
            ExceptionResponse {
                error_code: 0x84,
                exception_code: 1,
                message: "ILLEGAL FUNCTION",
            }
        );
        assert_eq!(exception.function_code(), 0x04);
    }

    #[test]
    fn test_request_accessors() {
        let request = ModbusRequest::WriteMultipleRegisters {
            address: 40,
            values: vec![1, 2, 3],
        };
        assert_eq!(request.function(), ModbusFunction::WriteMultipleRegisters);
        assert_eq!(request.address(), 40);
        assert_eq!(request.quantity(), 3);

        let request = ModbusRequest::WriteSingleCoil {
            address: 13,
            value: false,
        };
        assert_eq!(request.quantity(), 1);
    }

    #[test]
    fn test_from_response_mismatch() {
        let response = ModbusResponse::ReadRegisters(ReadRegistersResponse {
            function: ModbusFunction::ReadInputRegisters,
            byte_count: 2,
            registers: vec![42],
        });

        assert!(ReadRegistersResponse::from_response(response.clone()).is_ok());
        assert!(matches!(
            ReadBitsResponse::from_response(response),
            Err(ModbusError::Protocol { .. })
        ));
    }
}
