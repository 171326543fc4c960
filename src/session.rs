//! Sans-I/O Modbus TCP client session
//!
//! [`ModbusSession`] holds everything a connection needs except the socket:
//! the connection state, the transaction table, the frame reassembler and the
//! queue of frames waiting to be written. The driver (see
//! [`crate::client`]) feeds it events and moves bytes:
//!
//! ```text
//!   issue()/issue_prepared() ──▶ outbound queue ──▶ poll_transmit() ──▶ socket
//!   socket ──▶ on_data() ──▶ reassembler ──▶ transaction table ──▶ responder
//! ```
//!
//! Requests issued before the session is connected get their transaction id
//! right away and are held in the queue until [`ModbusSession::on_connected`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;
use tracing::debug;

use crate::codec::{decode_response, encode_frame, prepare_request, MbapFrame, PreparedRequest};
use crate::device_limits::DeviceLimits;
use crate::error::{ModbusError, ModbusResult};
use crate::logging::{ClientObserver, PacketDirection, TracingObserver};
use crate::protocol::{ModbusRequest, SlaveId};
use crate::reassembler::FrameReassembler;
use crate::stats::{StatsCounters, TransportStats};
use crate::transaction::{PendingRequest, Responder, TransactionId, TransactionTable};

/// Lifecycle of a client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
        }
    }
}

/// Request/response correlation for one Modbus TCP connection
pub struct ModbusSession {
    state: ConnectionState,
    table: TransactionTable,
    reassembler: FrameReassembler,
    outbound: VecDeque<(TransactionId, Bytes)>,
    limits: DeviceLimits,
    observer: Arc<dyn ClientObserver>,
    stats: Arc<StatsCounters>,
}

impl ModbusSession {
    pub fn new(limits: DeviceLimits) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            table: TransactionTable::new(),
            reassembler: FrameReassembler::new(),
            outbound: VecDeque::new(),
            limits,
            observer: Arc::new(TracingObserver::default()),
            stats: Arc::new(StatsCounters::new()),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ClientObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Share counters with whoever reports statistics
    pub fn with_stats(mut self, stats: Arc<StatsCounters>) -> Self {
        self.stats = stats;
        self
    }

    /// Start probing transaction ids at `first` instead of 0
    pub fn with_first_transaction_id(mut self, first: TransactionId) -> Self {
        self.table = TransactionTable::starting_at(first);
        self
    }

    // ------------------------------------------------------------------
    // State transitions
    // ------------------------------------------------------------------

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// A connection attempt has started
    pub fn begin_connect(&mut self) {
        if self.state == ConnectionState::Disconnected {
            debug!("Session state: {} -> {}", self.state, ConnectionState::Connecting);
            self.state = ConnectionState::Connecting;
        }
    }

    /// The transport is connected; queued frames become transmittable
    pub fn on_connected(&mut self) {
        debug!(
            "Session state: {} -> {} ({} queued)",
            self.state,
            ConnectionState::Connected,
            self.outbound.len()
        );
        self.state = ConnectionState::Connected;
    }

    /// The transport is gone
    ///
    /// Pending requests are dropped without completion: channel responders
    /// see their sender dropped, callbacks are never invoked.
    pub fn on_closed(&mut self) {
        debug!(
            "Session closed with {} pending, {} queued",
            self.table.len(),
            self.outbound.len()
        );
        self.state = ConnectionState::Disconnected;
        self.table.clear();
        self.outbound.clear();
        self.reassembler.clear();
    }

    // ------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------

    /// Validate, register and queue a request
    ///
    /// Validation failures are returned without touching the responder and
    /// without consuming a transaction id.
    pub fn issue(
        &mut self,
        unit_id: SlaveId,
        request: &ModbusRequest,
        responder: Responder,
    ) -> ModbusResult<TransactionId> {
        let prepared = prepare_request(request, &self.limits)?;
        self.issue_prepared(unit_id, prepared, responder)
    }

    /// Register and queue a request validated by [`prepare_request`]
    ///
    /// If no transaction id is available the responder receives
    /// [`ModbusError::TransactionsExhausted`] and the same error is returned.
    pub fn issue_prepared(
        &mut self,
        unit_id: SlaveId,
        prepared: PreparedRequest,
        responder: Responder,
    ) -> ModbusResult<TransactionId> {
        let transaction_id = match self.table.allocate() {
            Ok(id) => id,
            Err(e) => {
                let pending = self.table.len();
                responder.deliver(Err(e));
                return Err(ModbusError::TransactionsExhausted { pending });
            }
        };

        self.table.register(PendingRequest::new(
            transaction_id,
            unit_id,
            prepared.function,
            prepared.quantity,
            responder,
        ))?;

        let frame = encode_frame(transaction_id, unit_id, prepared.pdu.as_slice());
        self.observer
            .on_request(transaction_id, unit_id, prepared.function, prepared.quantity);
        self.outbound.push_back((transaction_id, frame));
        Ok(transaction_id)
    }

    /// Next frame to write, in issue order; nothing until connected
    pub fn poll_transmit(&mut self) -> Option<Bytes> {
        if !self.is_connected() {
            return None;
        }
        let (_, frame) = self.outbound.pop_front()?;
        self.observer.on_packet(PacketDirection::Send, &frame);
        self.stats.record_sent(frame.len());
        Some(frame)
    }

    // ------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------

    /// Feed bytes read from the transport
    ///
    /// Returns how many pending requests were completed. A framing error is
    /// fatal for the connection: it is reported to the observer and returned,
    /// and the driver is expected to close the transport.
    pub fn on_data(&mut self, chunk: &[u8]) -> ModbusResult<usize> {
        if !self.is_connected() {
            debug!("Ignoring {} bytes received while {}", chunk.len(), self.state);
            return Ok(0);
        }

        self.stats.record_received_bytes(chunk.len());
        self.reassembler.push(chunk);

        let mut delivered = 0;
        loop {
            match self.reassembler.next_frame() {
                Ok(Some(frame)) => {
                    if self.dispatch(frame) {
                        delivered += 1;
                    }
                }
                Ok(None) => return Ok(delivered),
                Err(e) => {
                    self.observer.on_framing_error(&e);
                    self.stats.record_error();
                    return Err(e);
                }
            }
        }
    }

    /// Match a frame to its request and deliver the decoded outcome
    fn dispatch(&mut self, frame: MbapFrame) -> bool {
        self.observer
            .on_packet(PacketDirection::Receive, frame.as_bytes());

        let Some(pending) = self.table.resolve(frame.transaction_id()) else {
            self.observer.on_unmatched_response(&frame.header);
            self.stats.record_unmatched();
            return false;
        };

        let outcome = decode_response(pending.function, frame.pdu(), pending.quantity);
        match &outcome {
            Ok(_) => self.stats.record_response(),
            Err(e) if e.is_exception() => self.stats.record_exception(),
            Err(e) => {
                debug!(
                    "Response to tid={} failed to decode: {}",
                    pending.transaction_id, e
                );
                self.stats.record_error();
            }
        }
        pending.complete(outcome);
        true
    }

    // ------------------------------------------------------------------
    // Timeouts
    // ------------------------------------------------------------------

    /// Reject every request issued at least `timeout` before `now`
    ///
    /// Expired requests still waiting in the outbound queue are never sent.
    pub fn expire(&mut self, now: Instant, timeout: Duration) -> usize {
        let expired = self.table.expire(now, timeout);
        let count = expired.len();
        for pending in expired {
            let age = now.saturating_duration_since(pending.issued_at);
            self.observer
                .on_expired(pending.transaction_id, pending.function, age);
            self.stats.record_timeout();
            self.outbound
                .retain(|(transaction_id, _)| *transaction_id != pending.transaction_id);
            let error = ModbusError::timeout(pending.function.name(), timeout.as_millis() as u64);
            pending.complete(Err(error));
        }
        count
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Requests waiting for a response
    pub fn pending_count(&self) -> usize {
        self.table.len()
    }

    /// Frames waiting to be written
    pub fn queued_count(&self) -> usize {
        self.outbound.len()
    }

    /// Bytes buffered towards an incomplete frame
    pub fn buffered_len(&self) -> usize {
        self.reassembler.buffered_len()
    }

    pub fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    pub fn stats(&self) -> TransportStats {
        self.stats.snapshot()
    }
}

impl fmt::Debug for ModbusSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModbusSession")
            .field("state", &self.state)
            .field("pending", &self.table.len())
            .field("queued", &self.outbound.len())
            .field("buffered", &self.reassembler.buffered_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ModbusResponse, ReadRegistersResponse};
    use std::sync::Mutex;

    type Outcomes = Arc<Mutex<Vec<ModbusResult<ModbusResponse>>>>;

    fn recorder() -> (Outcomes, impl Fn() -> Responder) {
        let outcomes: Outcomes = Arc::new(Mutex::new(Vec::new()));
        let sink = outcomes.clone();
        let make = move || {
            let sink = sink.clone();
            Responder::callback(move |outcome| sink.lock().unwrap().push(outcome))
        };
        (outcomes, make)
    }

    fn read_input(address: u16) -> ModbusRequest {
        ModbusRequest::ReadInputRegisters {
            address,
            quantity: 1,
        }
    }

    fn connected() -> ModbusSession {
        let mut session = ModbusSession::new(DeviceLimits::default());
        session.begin_connect();
        session.on_connected();
        session
    }

    #[test]
    fn test_state_transitions() {
        let mut session = ModbusSession::new(DeviceLimits::default());
        assert_eq!(session.state(), ConnectionState::Disconnected);
        session.begin_connect();
        assert_eq!(session.state(), ConnectionState::Connecting);
        session.on_connected();
        assert!(session.is_connected());
        session.on_closed();
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_requests_queue_until_connected() {
        let (_, responder) = recorder();
        let mut session = ModbusSession::new(DeviceLimits::default());
        session.begin_connect();

        assert_eq!(session.issue(1, &read_input(0), responder()).unwrap(), 0);
        assert_eq!(session.issue(1, &read_input(1), responder()).unwrap(), 1);
        assert!(session.poll_transmit().is_none());
        assert_eq!(session.pending_count(), 2);

        session.on_connected();
        let first = session.poll_transmit().unwrap();
        let second = session.poll_transmit().unwrap();
        assert_eq!(&first[..2], &[0x00, 0x00]);
        assert_eq!(&second[..2], &[0x00, 0x01]);
        assert!(session.poll_transmit().is_none());
        assert_eq!(session.stats().requests_sent, 2);
    }

    #[test]
    fn test_validation_error_consumes_nothing() {
        let (outcomes, responder) = recorder();
        let mut session = connected();
        let bad = ModbusRequest::ReadHoldingRegisters {
            address: 0,
            quantity: 200,
        };
        assert!(session.issue(1, &bad, responder()).is_err());
        assert_eq!(session.pending_count(), 0);
        assert!(outcomes.lock().unwrap().is_empty());
        assert_eq!(session.issue(1, &read_input(0), responder()).unwrap(), 0);
    }

    #[test]
    fn test_response_delivered_and_removed() {
        let (outcomes, responder) = recorder();
        let mut session = connected();
        session.issue(1, &read_input(0), responder()).unwrap();

        let delivered = session
            .on_data(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x05, 0x01, 0x04, 0x02, 0x00, 0x2A])
            .unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(session.pending_count(), 0);

        let outcomes = outcomes.lock().unwrap();
        assert_eq!(
            outcomes[0].as_ref().unwrap(),
            &ModbusResponse::ReadRegisters(ReadRegistersResponse {
                function: crate::protocol::ModbusFunction::ReadInputRegisters,
                byte_count: 2,
                registers: vec![42],
            })
        );
    }

    #[test]
    fn test_unmatched_response_dropped() {
        let (outcomes, responder) = recorder();
        let mut session = connected();
        session.issue(1, &read_input(0), responder()).unwrap();

        let delivered = session
            .on_data(&[0x00, 0x09, 0x00, 0x00, 0x00, 0x05, 0x01, 0x04, 0x02, 0x00, 0x2A])
            .unwrap();
        assert_eq!(delivered, 0);
        assert_eq!(session.pending_count(), 1);
        assert!(outcomes.lock().unwrap().is_empty());
        assert_eq!(session.stats().unmatched_responses, 1);
    }

    #[test]
    fn test_framing_error_is_fatal() {
        let mut session = connected();
        let err = session
            .on_data(&[0x00, 0x00, 0x12, 0x34, 0x00, 0x03, 0x01, 0x04, 0x00])
            .unwrap_err();
        assert!(matches!(err, ModbusError::Frame { .. }));
        assert_eq!(session.stats().errors, 1);
    }

    #[test]
    fn test_data_before_connected_is_ignored() {
        let mut session = ModbusSession::new(DeviceLimits::default());
        session.begin_connect();
        assert_eq!(session.on_data(&[0x00, 0x00, 0x00]).unwrap(), 0);
        assert_eq!(session.buffered_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_drops_queued_frame() {
        let (outcomes, responder) = recorder();
        let mut session = ModbusSession::new(DeviceLimits::default());
        session.begin_connect();
        session.issue(1, &read_input(0), responder()).unwrap();

        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(session.expire(Instant::now(), Duration::from_millis(200)), 1);
        assert_eq!(session.queued_count(), 0);

        session.on_connected();
        assert!(session.poll_transmit().is_none());

        let outcomes = outcomes.lock().unwrap();
        assert!(matches!(
            outcomes[0],
            Err(ModbusError::Timeout { timeout_ms: 200, .. })
        ));
        assert_eq!(session.stats().timeouts, 1);
    }

    #[test]
    fn test_close_drops_pending_without_callbacks() {
        let (outcomes, responder) = recorder();
        let mut session = connected();
        session.issue(1, &read_input(0), responder()).unwrap();
        let (channel, mut rx) = Responder::channel();
        session.issue(1, &read_input(1), channel).unwrap();

        session.on_closed();
        assert_eq!(session.pending_count(), 0);
        assert!(outcomes.lock().unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }
}
