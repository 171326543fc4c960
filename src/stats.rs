//! Connection statistics
//!
//! The connection task bumps shared atomic counters; client handles read a
//! [`TransportStats`] snapshot without synchronizing with the task.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of connection counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Request frames handed to the transport
    pub requests_sent: u64,
    /// Response frames matched to a pending request
    pub responses_received: u64,
    /// Matched responses carrying a server exception
    pub exceptions: u64,
    /// Decode failures, framing errors and transport errors
    pub errors: u64,
    /// Requests expired by the request timeout sweep
    pub timeouts: u64,
    /// Response frames whose transaction id matched nothing
    pub unmatched_responses: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Live counters shared between the connection task and client handles
#[derive(Debug, Default)]
pub struct StatsCounters {
    requests_sent: AtomicU64,
    responses_received: AtomicU64,
    exceptions: AtomicU64,
    errors: AtomicU64,
    timeouts: AtomicU64,
    unmatched_responses: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

impl StatsCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self, bytes: usize) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_received_bytes(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_response(&self) {
        self.responses_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_exception(&self) {
        self.responses_received.fetch_add(1, Ordering::Relaxed);
        self.exceptions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unmatched(&self) {
        self.unmatched_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TransportStats {
        TransportStats {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            responses_received: self.responses_received.load(Ordering::Relaxed),
            exceptions: self.exceptions.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            unmatched_responses: self.unmatched_responses.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let counters = StatsCounters::new();
        counters.record_sent(12);
        counters.record_sent(12);
        counters.record_received_bytes(11);
        counters.record_response();
        counters.record_exception();
        counters.record_unmatched();

        let stats = counters.snapshot();
        assert_eq!(stats.requests_sent, 2);
        assert_eq!(stats.bytes_sent, 24);
        assert_eq!(stats.bytes_received, 11);
        assert_eq!(stats.responses_received, 2);
        assert_eq!(stats.exceptions, 1);
        assert_eq!(stats.unmatched_responses, 1);
        assert_eq!(stats.errors, 0);
    }
}
