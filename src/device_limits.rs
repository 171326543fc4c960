//! # Device Limits Configuration
//!
//! Per-device caps on how many coils/registers a single request may address.
//! Requests are checked against these limits at the call site, before a
//! transaction id is allocated or anything is written.
//!
//! ## Modbus Specification Limits
//!
//! - **Read Holding/Input Registers (FC03/04)**: Max 125 registers per request
//! - **Read Coils/Discrete Inputs (FC01/02)**: Max 2000 bits per request
//! - **Write Multiple Registers (FC16)**: Max 123 registers per request
//! - **Write Multiple Coils (FC15)**: Max 1968 coils per request
//!
//! Limits above the specification values are clamped down to them.

use crate::constants::{MAX_READ_COILS, MAX_READ_REGISTERS, MAX_WRITE_COILS, MAX_WRITE_REGISTERS};
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::ModbusFunction;

/// Device-specific Modbus protocol limits.
///
/// # Example
///
/// ```rust
/// use modbus_mux::DeviceLimits;
///
/// // A device that only answers up to 50 registers per read
/// let limits = DeviceLimits::new().with_max_read_registers(50);
///
/// assert_eq!(limits.max_read_registers, 50);
/// assert!(limits.check_quantity(modbus_mux::ModbusFunction::ReadInputRegisters, 51).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Maximum registers per read request.
    pub max_read_registers: u16,
    /// Maximum registers per write request.
    pub max_write_registers: u16,
    /// Maximum coils per read request.
    pub max_read_coils: u16,
    /// Maximum coils per write request.
    pub max_write_coils: u16,
}

impl DeviceLimits {
    /// Limits from the Modbus specification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lower limits for older or less capable devices:
    /// 50 registers and 500 coils per request.
    pub fn conservative() -> Self {
        Self {
            max_read_registers: 50,
            max_write_registers: 50,
            max_read_coils: 500,
            max_write_coils: 500,
        }
    }

    pub fn with_max_read_registers(mut self, count: u16) -> Self {
        self.max_read_registers = count.min(MAX_READ_REGISTERS as u16);
        self
    }

    pub fn with_max_write_registers(mut self, count: u16) -> Self {
        self.max_write_registers = count.min(MAX_WRITE_REGISTERS as u16);
        self
    }

    pub fn with_max_read_coils(mut self, count: u16) -> Self {
        self.max_read_coils = count.min(MAX_READ_COILS as u16);
        self
    }

    pub fn with_max_write_coils(mut self, count: u16) -> Self {
        self.max_write_coils = count.min(MAX_WRITE_COILS as u16);
        self
    }

    /// Largest quantity a single request of `function` may carry.
    pub fn max_quantity(&self, function: ModbusFunction) -> u16 {
        match function {
            ModbusFunction::ReadCoils | ModbusFunction::ReadDiscreteInputs => self.max_read_coils,
            ModbusFunction::ReadHoldingRegisters | ModbusFunction::ReadInputRegisters => {
                self.max_read_registers
            }
            ModbusFunction::WriteSingleCoil | ModbusFunction::WriteSingleRegister => 1,
            ModbusFunction::WriteMultipleCoils => self.max_write_coils,
            ModbusFunction::WriteMultipleRegisters => self.max_write_registers,
        }
    }

    /// Check a request quantity against these limits.
    pub fn check_quantity(&self, function: ModbusFunction, quantity: usize) -> ModbusResult<()> {
        let max = self.max_quantity(function);
        if quantity == 0 || quantity > max as usize {
            return Err(ModbusError::invalid_data(format!(
                "{} quantity {} out of range 1..={}",
                function.name(),
                quantity,
                max
            )));
        }
        Ok(())
    }

    /// Reject limits that would refuse every request.
    pub fn validate(&self) -> ModbusResult<()> {
        if self.max_read_registers == 0
            || self.max_write_registers == 0
            || self.max_read_coils == 0
            || self.max_write_coils == 0
        {
            return Err(ModbusError::configuration(
                "device limits must allow at least one coil/register per request",
            ));
        }
        Ok(())
    }
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_read_registers: MAX_READ_REGISTERS as u16,
            max_write_registers: MAX_WRITE_REGISTERS as u16,
            max_read_coils: MAX_READ_COILS as u16,
            max_write_coils: MAX_WRITE_COILS as u16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = DeviceLimits::default();
        assert_eq!(limits.max_read_registers, 125);
        assert_eq!(limits.max_write_registers, 123);
        assert_eq!(limits.max_read_coils, 2000);
        assert_eq!(limits.max_write_coils, 1968);
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn test_builders_clamp_to_specification() {
        let limits = DeviceLimits::new()
            .with_max_read_registers(500)
            .with_max_read_coils(10);
        assert_eq!(limits.max_read_registers, 125);
        assert_eq!(limits.max_read_coils, 10);
    }

    #[test]
    fn test_check_quantity() {
        let limits = DeviceLimits::conservative();
        assert!(limits
            .check_quantity(ModbusFunction::ReadHoldingRegisters, 50)
            .is_ok());
        assert!(limits
            .check_quantity(ModbusFunction::ReadHoldingRegisters, 51)
            .is_err());
        assert!(limits.check_quantity(ModbusFunction::ReadCoils, 0).is_err());
        assert!(limits
            .check_quantity(ModbusFunction::WriteSingleCoil, 1)
            .is_ok());
    }

    #[test]
    fn test_zero_limit_is_a_configuration_error() {
        let limits = DeviceLimits::new().with_max_write_coils(0);
        assert!(matches!(
            limits.validate(),
            Err(ModbusError::Configuration { .. })
        ));
    }
}
