//! Logging and connection event observers
//!
//! The connection engine reports noteworthy events (packets on the wire,
//! responses nobody asked for, framing errors, expired requests) to a
//! [`ClientObserver`]. Two observers ship with the crate:
//!
//! - [`TracingObserver`]: the default, emits `tracing` events
//! - [`CallbackLogger`]: formats events and hands them to a user callback,
//!   for applications that route logs through their own sink
//!
//! Packet dumps use the `[MODBUS-TCP] send/receive` prefix and are only
//! emitted when packet logging is enabled.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

use crate::codec::MbapHeader;
use crate::error::ModbusError;
use crate::protocol::{ModbusFunction, SlaveId};
use crate::transaction::TransactionId;

/// Severity of a log message, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        };
        f.write_str(name)
    }
}

/// Direction of a packet relative to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketDirection {
    Send,
    Receive,
}

impl fmt::Display for PacketDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send => f.write_str("send"),
            Self::Receive => f.write_str("receive"),
        }
    }
}

/// Format bytes as space separated upper-case hex
pub fn format_hex_packet(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Receives connection events from the engine
///
/// All methods default to doing nothing, so implementors only override what
/// they care about. Methods are called from the connection task and must not
/// block.
pub trait ClientObserver: Send + Sync {
    /// A request was assigned a transaction id
    fn on_request(
        &self,
        _transaction_id: TransactionId,
        _unit_id: SlaveId,
        _function: ModbusFunction,
        _quantity: u16,
    ) {
    }

    /// A complete frame was written or received
    fn on_packet(&self, _direction: PacketDirection, _frame: &[u8]) {}

    /// A response arrived for a transaction id nobody is waiting on
    fn on_unmatched_response(&self, _header: &MbapHeader) {}

    /// The inbound stream could not be split into frames; the connection ends
    fn on_framing_error(&self, _error: &ModbusError) {}

    /// A request was rejected by the request timeout sweep
    fn on_expired(&self, _transaction_id: TransactionId, _function: ModbusFunction, _age: Duration) {
    }

    /// The transport failed or could not be opened
    fn on_transport_error(&self, _error: &ModbusError) {}
}

/// Observer that emits `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver {
    packet_logging: bool,
}

impl TracingObserver {
    pub fn new(packet_logging: bool) -> Self {
        Self { packet_logging }
    }
}

impl ClientObserver for TracingObserver {
    fn on_request(
        &self,
        transaction_id: TransactionId,
        unit_id: SlaveId,
        function: ModbusFunction,
        quantity: u16,
    ) {
        debug!(
            "Request issued: tid={} unit={} {} quantity={}",
            transaction_id, unit_id, function, quantity
        );
    }

    fn on_packet(&self, direction: PacketDirection, frame: &[u8]) {
        if self.packet_logging {
            info!("[MODBUS-TCP] {} {}", direction, format_hex_packet(frame));
        } else {
            trace!("[MODBUS-TCP] {} {} bytes", direction, frame.len());
        }
    }

    fn on_unmatched_response(&self, header: &MbapHeader) {
        warn!(
            "Dropping response with unknown transaction id {} (unit {})",
            header.transaction_id, header.unit_id
        );
    }

    fn on_framing_error(&self, error: &ModbusError) {
        error!("Framing error, closing connection: {}", error);
    }

    fn on_expired(&self, transaction_id: TransactionId, function: ModbusFunction, age: Duration) {
        warn!(
            "Request {} ({}) expired after {}ms",
            transaction_id,
            function.name(),
            age.as_millis()
        );
    }

    fn on_transport_error(&self, error: &ModbusError) {
        error!("Transport error: {}", error);
    }
}

/// Callback receiving formatted log lines
pub type LogCallback = Arc<dyn Fn(LogLevel, &str) + Send + Sync>;

/// Observer that routes formatted messages to a [`LogCallback`]
///
/// Without a callback, messages fall back to `tracing` at the matching level.
#[derive(Clone)]
pub struct CallbackLogger {
    callback: Option<LogCallback>,
    min_level: LogLevel,
    packet_logging: bool,
}

impl CallbackLogger {
    pub fn new(callback: Option<LogCallback>, min_level: LogLevel) -> Self {
        Self {
            callback,
            min_level,
            packet_logging: false,
        }
    }

    /// Logger that prints every message to stdout
    pub fn console() -> Self {
        Self::new(
            Some(Arc::new(|level: LogLevel, message: &str| {
                println!("[{}] {}", level, message)
            })),
            LogLevel::Info,
        )
    }

    pub fn with_packet_logging(mut self, enabled: bool) -> Self {
        self.packet_logging = enabled;
        self
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    /// Emit `message` if `level` passes the threshold
    pub fn log(&self, level: LogLevel, message: &str) {
        if level > self.min_level {
            return;
        }
        match &self.callback {
            Some(callback) => callback(level, message),
            None => match level {
                LogLevel::Error => error!("{}", message),
                LogLevel::Warn => warn!("{}", message),
                LogLevel::Info => info!("{}", message),
                LogLevel::Debug => debug!("{}", message),
                LogLevel::Trace => trace!("{}", message),
            },
        }
    }

    /// Log an outgoing request at debug level
    pub fn log_request(
        &self,
        transaction_id: TransactionId,
        unit_id: SlaveId,
        function: ModbusFunction,
        quantity: u16,
    ) {
        self.log(
            LogLevel::Debug,
            &format!(
                "Request issued: tid={} unit={} {} quantity={}",
                transaction_id, unit_id, function, quantity
            ),
        );
    }
}

impl Default for CallbackLogger {
    fn default() -> Self {
        Self::new(None, LogLevel::Info)
    }
}

impl fmt::Debug for CallbackLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackLogger")
            .field("has_callback", &self.callback.is_some())
            .field("min_level", &self.min_level)
            .field("packet_logging", &self.packet_logging)
            .finish()
    }
}

impl ClientObserver for CallbackLogger {
    fn on_request(
        &self,
        transaction_id: TransactionId,
        unit_id: SlaveId,
        function: ModbusFunction,
        quantity: u16,
    ) {
        self.log_request(transaction_id, unit_id, function, quantity);
    }

    fn on_packet(&self, direction: PacketDirection, frame: &[u8]) {
        if self.packet_logging {
            self.log(
                LogLevel::Info,
                &format!("[MODBUS-TCP] {} {}", direction, format_hex_packet(frame)),
            );
        }
    }

    fn on_unmatched_response(&self, header: &MbapHeader) {
        self.log(
            LogLevel::Warn,
            &format!(
                "Dropping response with unknown transaction id {} (unit {})",
                header.transaction_id, header.unit_id
            ),
        );
    }

    fn on_framing_error(&self, error: &ModbusError) {
        self.log(
            LogLevel::Error,
            &format!("Framing error, closing connection: {}", error),
        );
    }

    fn on_expired(&self, transaction_id: TransactionId, function: ModbusFunction, age: Duration) {
        self.log(
            LogLevel::Warn,
            &format!(
                "Request {} ({}) expired after {}ms",
                transaction_id,
                function.name(),
                age.as_millis()
            ),
        );
    }

    fn on_transport_error(&self, error: &ModbusError) {
        self.log(LogLevel::Error, &format!("Transport error: {}", error));
    }
}
