//! Error types for the Modbus TCP client
//!
//! Every fallible operation in this crate returns [`ModbusResult`]. Errors fall
//! into three groups:
//!
//! - **Per-request**: delivered to exactly one caller and leave the connection
//!   usable (`Exception`, `Protocol`, `InvalidData`, `Timeout`, ...)
//! - **Call-site**: returned synchronously before anything is written
//!   (`InvalidData`, `InvalidFunction`, `Configuration`)
//! - **Terminal**: end the connection (`Frame`, `Io`, `Connection`, `ConnectionClosed`)

use thiserror::Error;

use crate::protocol::ExceptionResponse;
use crate::transaction::TransactionId;

/// Result type used throughout the crate
pub type ModbusResult<T> = Result<T, ModbusError>;

/// Errors raised by the codec, the correlation engine and the client
#[derive(Debug, Error)]
pub enum ModbusError {
    /// The server answered with an exception PDU
    #[error("Modbus exception: {0}")]
    Exception(ExceptionResponse),

    /// Response payload does not match what the request asked for
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// The byte stream could not be split into MBAP frames
    #[error("Frame error: {message}")]
    Frame { message: String },

    /// Function code not supported by this client
    #[error("Invalid function code: 0x{code:02X}")]
    InvalidFunction { code: u8 },

    /// Value outside its protocol domain
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// A transaction id was registered twice while still pending
    #[error("Transaction {transaction_id} is already pending")]
    TransactionCollision { transaction_id: TransactionId },

    /// Every transaction id on the connection is in use
    #[error("All {pending} transaction ids are pending")]
    TransactionsExhausted { pending: usize },

    /// Request expired before a response arrived
    #[error("Timeout: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Connection could not be established or was refused
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// The connection task has ended; the request will never be answered
    #[error("Connection closed")]
    ConnectionClosed,

    /// Invalid client configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Underlying transport I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModbusError {
    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a framing error
    pub fn frame(message: impl Into<String>) -> Self {
        Self::Frame {
            message: message.into(),
        }
    }

    /// Create an invalid data error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create an invalid function error
    pub fn invalid_function(code: u8) -> Self {
        Self::InvalidFunction { code }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Whether this is a server exception response
    pub fn is_exception(&self) -> bool {
        matches!(self, Self::Exception(_))
    }

    /// The exception payload, if this is a server exception response
    pub fn exception(&self) -> Option<&ExceptionResponse> {
        match self {
            Self::Exception(exception) => Some(exception),
            _ => None,
        }
    }

    /// Whether the connection stays usable after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::Frame { .. } | Self::Connection { .. } | Self::ConnectionClosed | Self::Io(_)
        )
    }
}
