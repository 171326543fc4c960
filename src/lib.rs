//! # Modbus Mux - Pipelined Modbus TCP Client
//!
//! A Modbus TCP client that keeps many requests in flight on a single
//! connection and matches responses back to their requests by transaction id,
//! regardless of the order the server answers in.
//!
//! ## Features
//!
//! - **Pipelining**: requests are written immediately, without waiting for
//!   earlier responses
//! - **Out-of-order correlation**: every response reaches exactly the caller
//!   that issued the matching request
//! - **Stream reassembly**: frames split across reads or packed into one read
//!   are cut apart using the MBAP length field
//! - **Sans-I/O core**: [`ModbusSession`] holds all protocol state and can be
//!   driven by any transport
//! - **Validate before send**: a request that breaks a protocol or device
//!   limit fails at the call site and never consumes a transaction id
//! - **Built-in Monitoring**: per-connection statistics and pluggable event
//!   observers
//!
//! ## Supported Function Codes
//!
//! | Code | Function | Client |
//! |------|----------|--------|
//! | 0x01 | Read Coils | ✅ |
//! | 0x02 | Read Discrete Inputs | ✅ |
//! | 0x03 | Read Holding Registers | ✅ |
//! | 0x04 | Read Input Registers | ✅ |
//! | 0x05 | Write Single Coil | ✅ |
//! | 0x06 | Write Single Register | ✅ |
//! | 0x0F | Write Multiple Coils | ✅ |
//! | 0x10 | Write Multiple Registers | ✅ |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use modbus_mux::{ClientConfig, ModbusResult, ModbusTcpClient};
//!
//! #[tokio::main]
//! async fn main() -> ModbusResult<()> {
//!     let client = ModbusTcpClient::connect("127.0.0.1:502", ClientConfig::default()).await?;
//!
//!     let registers = client.read_holding_registers(0, 10)?.await?;
//!     println!("Read registers: {:?}", registers.registers);
//!
//!     client.write_single_register(100, 0x1234)?.await?;
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

// ============================================================================
// Core modules
// ============================================================================

/// Core error types and result handling
pub mod error;

/// Modbus protocol constants based on official specification
pub mod constants;

/// Stack-allocated PDU and request builder
pub mod pdu;

/// Modbus protocol definitions: functions, requests, responses, exceptions
pub mod protocol;

/// MBAP framing, request encoding and response decoding
pub mod codec;

/// Reassembly of frames from a byte stream
pub mod reassembler;

/// Transaction id allocation and pending request tracking
pub mod transaction;

/// Sans-I/O connection state machine
pub mod session;

/// Pipelined tokio client
pub mod client;

/// Connection statistics
pub mod stats;

/// Logging and connection event observers
pub mod logging;

/// Device-specific protocol limits configuration
pub mod device_limits;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Async runtime (users can use modbus_mux::tokio) ===
pub use tokio;

// === Core client API ===
pub use client::{ClientConfig, ModbusClient, ModbusTcpClient, PendingResponse};
pub use session::{ConnectionState, ModbusSession};

// === Error handling ===
pub use error::{ModbusError, ModbusResult};

// === Core types ===
pub use protocol::{
    ExceptionResponse, FromResponse, ModbusFunction, ModbusRequest, ModbusResponse,
    ReadBitsResponse, ReadRegistersResponse, SlaveId, WriteMultipleResponse,
    WriteSingleCoilResponse, WriteSingleRegisterResponse,
};
pub use transaction::{Responder, TransactionId};

// === Codec (advanced usage) ===
pub use codec::{
    decode_response, encode_frame, encode_request, prepare_request, MbapFrame, MbapHeader,
    PreparedRequest,
};
pub use reassembler::FrameReassembler;

// === Configuration ===
pub use device_limits::DeviceLimits;

// === Monitoring ===
pub use stats::TransportStats;

// === Protocol limits (commonly needed constants) ===
pub use constants::{
    MAX_PDU_SIZE, MAX_READ_COILS, MAX_READ_REGISTERS, MAX_WRITE_COILS, MAX_WRITE_REGISTERS,
};

// === Logging ===
pub use logging::{
    CallbackLogger, ClientObserver, LogCallback, LogLevel, PacketDirection, TracingObserver,
};

// === PDU (advanced usage) ===
pub use pdu::{ModbusPdu, PduBuilder};

/// Modbus TCP default port
pub const DEFAULT_TCP_PORT: u16 = 502;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!("Modbus Mux v{} - pipelined Modbus TCP client", VERSION)
}
