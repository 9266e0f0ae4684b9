//! Maps an outstanding request's `ActionID` to a one-shot slot for its reply.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::client::error::ClientError;
use crate::message::Message;

/// What a pending slot is ultimately fulfilled with.
#[derive(Debug)]
pub enum PendingOutcome {
    Reply(Message),
    Cancelled,
    Terminal(Arc<ClientError>),
}

/// The pending-request table.
///
/// The mutex here is a plain `std::sync::Mutex`, not an async one: every
/// critical section below is a single map mutation with no `.await` inside
/// it, so there's nothing to gain from an async mutex and a little
/// scheduling overhead to lose. Fulfilling a slot (sending on its oneshot)
/// always happens after the guard is dropped.
pub struct PendingTable {
    entries: Mutex<HashMap<String, oneshot::Sender<PendingOutcome>>>,
}

impl PendingTable {
    pub fn new() -> Self {
        PendingTable {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a fresh slot for `id`. Fails with `DuplicateActionId` if one
    /// is already outstanding.
    pub fn register(&self, id: String) -> Result<oneshot::Receiver<PendingOutcome>, ClientError> {
        let (tx, rx) = oneshot::channel();
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(&id) {
            return Err(ClientError::DuplicateActionId(id));
        }
        entries.insert(id, tx);
        Ok(rx)
    }

    /// If `id` has a pending slot, removes it and fulfills it with `msg`,
    /// returning `None` (the dispatcher's job is done). Otherwise returns
    /// `Some(msg)` unchanged, telling the dispatcher to publish it as an
    /// event instead.
    pub fn complete(&self, id: &str, msg: Message) -> Option<Message> {
        let tx = self.entries.lock().unwrap().remove(id);
        match tx {
            Some(tx) => {
                let _ = tx.send(PendingOutcome::Reply(msg));
                None
            }
            None => Some(msg),
        }
    }

    /// Removes `id`'s slot, if any, and fulfills it with `Cancelled`. A no-op
    /// if the slot was already removed (by a reply or a terminal
    /// transition), which keeps cancellation idempotent.
    pub fn cancel(&self, id: &str) {
        if let Some(tx) = self.entries.lock().unwrap().remove(id) {
            let _ = tx.send(PendingOutcome::Cancelled);
        }
    }

    /// Removes every entry and fulfills each with `cause`. Called exactly
    /// once, from the terminal transition.
    pub fn fail_all(&self, cause: Arc<ClientError>) {
        let drained: Vec<_> = self.entries.lock().unwrap().drain().collect();
        for (_, tx) in drained {
            let _ = tx.send(PendingOutcome::Terminal(cause.clone()));
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

impl Default for PendingTable {
    fn default() -> Self {
        PendingTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_twice_is_duplicate() {
        let table = PendingTable::new();
        let _rx = table.register("A".into()).unwrap();
        assert!(matches!(
            table.register("A".into()),
            Err(ClientError::DuplicateActionId(_))
        ));
    }

    #[tokio::test]
    async fn complete_fulfills_a_registered_slot() {
        let table = PendingTable::new();
        let rx = table.register("A".into()).unwrap();
        let leftover = table.complete("A", Message::new().with("Response", "Pong"));
        assert!(leftover.is_none());
        match rx.await.unwrap() {
            PendingOutcome::Reply(msg) => assert_eq!(msg.get("Response"), Some("Pong")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn complete_on_unknown_id_returns_the_message() {
        let table = PendingTable::new();
        let msg = Message::new().with("Event", "FullyBooted");
        let leftover = table.complete("nope", msg.clone());
        assert_eq!(leftover, Some(msg));
    }

    #[tokio::test]
    async fn cancel_fulfills_with_cancelled_and_is_idempotent() {
        let table = PendingTable::new();
        let rx = table.register("A".into()).unwrap();
        table.cancel("A");
        assert!(matches!(rx.await.unwrap(), PendingOutcome::Cancelled));
        table.cancel("A"); // no panic, no-op
        assert_eq!(table.len(), 0);
    }

    #[tokio::test]
    async fn fail_all_drains_every_entry_with_the_same_cause() {
        let table = PendingTable::new();
        let rx_a = table.register("A".into()).unwrap();
        let rx_b = table.register("B".into()).unwrap();
        let cause = Arc::new(ClientError::Eof);
        table.fail_all(cause.clone());
        assert_eq!(table.len(), 0);
        for rx in [rx_a, rx_b] {
            match rx.await.unwrap() {
                PendingOutcome::Terminal(c) => assert!(Arc::ptr_eq(&c, &cause)),
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
    }
}
