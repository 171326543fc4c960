//! Transaction table
//!
//! Maps transaction ids to the requests waiting for them. Responses on one
//! connection may arrive in any order; the MBAP transaction id is the only
//! thing tying a response back to its request, so ids are never reused while
//! a request holding them is still pending.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::constants::TRANSACTION_ID_SPACE;
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::{ModbusFunction, ModbusResponse, SlaveId};

/// MBAP transaction identifier
pub type TransactionId = u16;

/// Outcome delivered to whoever issued a request
pub type Outcome = ModbusResult<ModbusResponse>;

/// Boxed one-shot completion callback
pub type ResponseCallback = Box<dyn FnOnce(Outcome) + Send + 'static>;

/// Where the outcome of a request goes
pub enum Responder {
    /// Invoked exactly once with the outcome
    Callback(ResponseCallback),
    /// Backs a [`crate::client::PendingResponse`] future
    Channel(oneshot::Sender<Outcome>),
}

impl Responder {
    pub fn callback<F>(callback: F) -> Self
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        Self::Callback(Box::new(callback))
    }

    /// Responder paired with the receiver its outcome will arrive on
    pub fn channel() -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        (Self::Channel(tx), rx)
    }

    /// Hand over the outcome, consuming the responder
    pub fn deliver(self, outcome: Outcome) {
        match self {
            Self::Callback(callback) => callback(outcome),
            Self::Channel(tx) => {
                // Receiver gone means the caller stopped waiting
                let _ = tx.send(outcome);
            }
        }
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callback(_) => f.write_str("Responder::Callback"),
            Self::Channel(tx) => f
                .debug_struct("Responder::Channel")
                .field("closed", &tx.is_closed())
                .finish(),
        }
    }
}

/// A request waiting for its response
#[derive(Debug)]
pub struct PendingRequest {
    pub transaction_id: TransactionId,
    pub unit_id: SlaveId,
    pub function: ModbusFunction,
    /// Quantity the response is decoded against
    pub quantity: u16,
    pub issued_at: Instant,
    pub responder: Responder,
}

impl PendingRequest {
    pub fn new(
        transaction_id: TransactionId,
        unit_id: SlaveId,
        function: ModbusFunction,
        quantity: u16,
        responder: Responder,
    ) -> Self {
        Self {
            transaction_id,
            unit_id,
            function,
            quantity,
            issued_at: Instant::now(),
            responder,
        }
    }

    /// Deliver the outcome to the responder
    pub fn complete(self, outcome: Outcome) {
        self.responder.deliver(outcome);
    }
}

/// Pending requests of one connection, keyed by transaction id
#[derive(Debug, Default)]
pub struct TransactionTable {
    pending: HashMap<TransactionId, PendingRequest>,
    next_id: TransactionId,
}

impl TransactionTable {
    /// Empty table; the first id allocated is 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty table whose first allocation starts probing at `first`
    pub fn starting_at(first: TransactionId) -> Self {
        Self {
            pending: HashMap::new(),
            next_id: first,
        }
    }

    /// Next free transaction id
    ///
    /// Ids are handed out in increasing order, wrapping at 65535, skipping
    /// any id that is still pending.
    pub fn allocate(&mut self) -> ModbusResult<TransactionId> {
        if self.pending.len() >= TRANSACTION_ID_SPACE {
            return Err(ModbusError::TransactionsExhausted {
                pending: self.pending.len(),
            });
        }
        loop {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            if !self.pending.contains_key(&id) {
                return Ok(id);
            }
        }
    }

    /// Track a request until its response arrives
    ///
    /// If the id is already pending the new request is rejected: its
    /// responder receives [`ModbusError::TransactionCollision`] and the same
    /// error is returned. The request already holding the id is untouched.
    pub fn register(&mut self, request: PendingRequest) -> ModbusResult<()> {
        let transaction_id = request.transaction_id;
        if self.pending.contains_key(&transaction_id) {
            request.complete(Err(ModbusError::TransactionCollision { transaction_id }));
            return Err(ModbusError::TransactionCollision { transaction_id });
        }
        self.pending.insert(transaction_id, request);
        Ok(())
    }

    /// Remove and return the request waiting on `transaction_id`
    pub fn resolve(&mut self, transaction_id: TransactionId) -> Option<PendingRequest> {
        self.pending.remove(&transaction_id)
    }

    /// Remove every request issued at least `max_age` before `now`
    ///
    /// Expired requests are returned oldest first.
    pub fn expire(&mut self, now: Instant, max_age: Duration) -> Vec<PendingRequest> {
        let expired_ids: Vec<TransactionId> = self
            .pending
            .iter()
            .filter(|(_, request)| now.saturating_duration_since(request.issued_at) >= max_age)
            .map(|(&id, _)| id)
            .collect();

        let mut expired: Vec<PendingRequest> = expired_ids
            .into_iter()
            .filter_map(|id| self.pending.remove(&id))
            .collect();
        expired.sort_by_key(|request| request.issued_at);
        expired
    }

    pub fn contains(&self, transaction_id: TransactionId) -> bool {
        self.pending.contains_key(&transaction_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every pending request without completing it
    ///
    /// Channel responders observe the dropped sender; callbacks are never invoked.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn pending(id: TransactionId) -> PendingRequest {
        PendingRequest::new(
            id,
            1,
            ModbusFunction::ReadInputRegisters,
            1,
            Responder::callback(|_| {}),
        )
    }

    #[test]
    fn test_allocation_starts_at_zero() {
        let mut table = TransactionTable::new();
        assert_eq!(table.allocate().unwrap(), 0);
        assert_eq!(table.allocate().unwrap(), 1);
        assert_eq!(table.allocate().unwrap(), 2);
    }

    #[test]
    fn test_allocation_wraps_and_skips_pending() {
        let mut table = TransactionTable::starting_at(u16::MAX);
        table.register(pending(0)).unwrap();
        table.register(pending(1)).unwrap();

        assert_eq!(table.allocate().unwrap(), u16::MAX);
        assert_eq!(table.allocate().unwrap(), 2);
    }

    #[test]
    fn test_exhaustion() {
        let mut table = TransactionTable::new();
        for _ in 0..TRANSACTION_ID_SPACE {
            let id = table.allocate().unwrap();
            table.register(pending(id)).unwrap();
        }
        assert!(matches!(
            table.allocate(),
            Err(ModbusError::TransactionsExhausted { pending: 65536 })
        ));

        table.resolve(40_000).unwrap();
        assert_eq!(table.allocate().unwrap(), 40_000);
    }

    #[test]
    fn test_collision_rejects_newcomer() {
        let outcome = Arc::new(Mutex::new(None));
        let seen = outcome.clone();

        let mut table = TransactionTable::new();
        table.register(pending(7)).unwrap();
        let duplicate = PendingRequest::new(
            7,
            1,
            ModbusFunction::ReadCoils,
            8,
            Responder::callback(move |result| {
                *seen.lock().unwrap() = Some(result.is_err());
            }),
        );

        assert!(matches!(
            table.register(duplicate),
            Err(ModbusError::TransactionCollision { transaction_id: 7 })
        ));
        assert_eq!(*outcome.lock().unwrap(), Some(true));
        assert_eq!(
            table.resolve(7).unwrap().function,
            ModbusFunction::ReadInputRegisters
        );
    }

    #[test]
    fn test_resolve_removes() {
        let mut table = TransactionTable::new();
        table.register(pending(3)).unwrap();
        assert!(table.contains(3));
        assert!(table.resolve(3).is_some());
        assert!(table.resolve(3).is_none());
        assert!(table.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_oldest_first() {
        let mut table = TransactionTable::new();
        table.register(pending(5)).unwrap();
        tokio::time::advance(Duration::from_millis(50)).await;
        table.register(pending(2)).unwrap();
        tokio::time::advance(Duration::from_millis(50)).await;
        table.register(pending(9)).unwrap();

        let expired = table.expire(Instant::now(), Duration::from_millis(50));
        let ids: Vec<_> = expired.iter().map(|r| r.transaction_id).collect();
        assert_eq!(ids, vec![5, 2]);
        assert_eq!(table.len(), 1);
        assert!(table.contains(9));
    }

    #[tokio::test]
    async fn test_channel_responder() {
        let (responder, rx) = Responder::channel();
        responder.deliver(Err(ModbusError::protocol("short payload")));
        assert!(matches!(rx.await, Ok(Err(ModbusError::Protocol { .. }))));

        let (responder, rx) = Responder::channel();
        drop(responder);
        assert!(rx.await.is_err());
    }
}
