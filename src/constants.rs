//! Modbus TCP protocol constants
//!
//! Frame layout and protocol limits from the Modbus Application Protocol
//! specification and the Modbus messaging-over-TCP/IP guide:
//! - MBAP header: 7 bytes, of which the first 6 are needed to know the frame size
//! - Maximum PDU size: 253 bytes (inherited from the RS485 ADU limit of 256 bytes)
//! - Register/coil limits are calculated to fit within the PDU size constraint

// ============================================================================
// Frame Size Constants
// ============================================================================

/// Full MBAP header length on the wire
/// Format: Transaction ID(2) + Protocol ID(2) + Length(2) + Unit ID(1) = 7 bytes
pub const MBAP_HEADER_LEN: usize = 7;

/// Bytes that must be buffered before the frame size is known
/// Transaction ID(2) + Protocol ID(2) + Length(2); the unit id is counted by the length field
pub const MBAP_PREFIX_LEN: usize = 6;

/// Byte offset of the length field inside the MBAP header
pub const MBAP_LENGTH_OFFSET: usize = 4;

/// Protocol identifier for Modbus; every other value is a framing error
pub const MODBUS_PROTOCOL_ID: u16 = 0x0000;

/// Maximum PDU (Protocol Data Unit) size per Modbus specification
/// RS485 ADU (256 bytes) - Slave Address (1 byte) - CRC (2 bytes) = 253 bytes
pub const MAX_PDU_SIZE: usize = 253;

/// Smallest valid MBAP length field value: Unit ID + Function Code
pub const MIN_MBAP_LENGTH: usize = 2;

/// Maximum MBAP length field value (Unit ID + PDU)
/// = 1 (Unit ID) + 253 (Max PDU) = 254 bytes
pub const MAX_MBAP_LENGTH: usize = 1 + MAX_PDU_SIZE;

/// Largest complete Modbus TCP frame: 6 + 254 = 260 bytes
pub const MAX_TCP_FRAME_SIZE: usize = MBAP_PREFIX_LEN + MAX_MBAP_LENGTH;

/// Socket read buffer size for receiving Modbus frames
///
/// Twice the theoretical max frame (260 bytes) rounded up, so a single read
/// usually carries at least one complete frame.
pub const MODBUS_RESPONSE_BUFFER_SIZE: usize = 512;

/// Number of distinct transaction identifiers on one connection
pub const TRANSACTION_ID_SPACE: usize = 1 << 16;

/// Number of addressable coils or registers in each data table
pub const ADDRESS_SPACE: usize = 1 << 16;

// ============================================================================
// Register Operation Limits
// ============================================================================

/// Maximum number of registers for FC03/FC04 (Read Holding/Input Registers)
///
/// Response PDU: 1 (FC) + 1 (byte count) + N × 2 ≤ 253 → N ≤ 125
pub const MAX_READ_REGISTERS: usize = 125;

/// Maximum number of registers for FC16 (Write Multiple Registers)
///
/// Request PDU: 1 (FC) + 2 (address) + 2 (quantity) + 1 (byte count) + N × 2 ≤ 253 → N ≤ 123
pub const MAX_WRITE_REGISTERS: usize = 123;

// ============================================================================
// Coil Operation Limits
// ============================================================================

/// Maximum number of coils for FC01/FC02 (Read Coils/Discrete Inputs)
///
/// Response PDU: 1 (FC) + 1 (byte count) + ceil(N / 8) ≤ 253 → N ≤ 2008,
/// the specification rounds this down to 2000.
pub const MAX_READ_COILS: usize = 2000;

/// Maximum number of coils for FC15 (Write Multiple Coils)
///
/// Request PDU: 1 + 2 + 2 + 1 + ceil(N / 8) ≤ 253 → N ≤ 1976,
/// the specification uses 1968 (0x7B0).
pub const MAX_WRITE_COILS: usize = 1968;

// ============================================================================
// Modbus Function Codes
// ============================================================================

/// Read Coils (FC01)
pub const FC_READ_COILS: u8 = 0x01;

/// Read Discrete Inputs (FC02)
pub const FC_READ_DISCRETE_INPUTS: u8 = 0x02;

/// Read Holding Registers (FC03)
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Read Input Registers (FC04)
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;

/// Write Single Coil (FC05)
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;

/// Write Single Register (FC06)
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// Write Multiple Coils (FC15)
pub const FC_WRITE_MULTIPLE_COILS: u8 = 0x0F;

/// Write Multiple Registers (FC16)
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// Bit set in a response function code to signal an exception
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Coil ON value for FC05
pub const COIL_ON: u16 = 0xFF00;

/// Coil OFF value for FC05
pub const COIL_OFF: u16 = 0x0000;

// ============================================================================
// Modbus Exception Codes
// ============================================================================

/// Illegal Function
pub const EXCEPTION_ILLEGAL_FUNCTION: u8 = 0x01;

/// Illegal Data Address
pub const EXCEPTION_ILLEGAL_DATA_ADDRESS: u8 = 0x02;

/// Illegal Data Value
pub const EXCEPTION_ILLEGAL_DATA_VALUE: u8 = 0x03;

/// Slave Device Failure
pub const EXCEPTION_SLAVE_DEVICE_FAILURE: u8 = 0x04;

/// Acknowledge
pub const EXCEPTION_ACKNOWLEDGE: u8 = 0x05;

/// Slave Device Busy
pub const EXCEPTION_SLAVE_DEVICE_BUSY: u8 = 0x06;

/// Memory Parity Error
pub const EXCEPTION_MEMORY_PARITY_ERROR: u8 = 0x08;

/// Gateway Path Unavailable
pub const EXCEPTION_GATEWAY_PATH_UNAVAILABLE: u8 = 0x0A;

/// Gateway Target Device Failed to Respond
pub const EXCEPTION_GATEWAY_TARGET_FAILED: u8 = 0x0B;
