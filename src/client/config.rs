//! Programmatic configuration surface. There is no CLI, no environment
//! variable, and no persisted state — every knob is a field on
//! [`ClientConfig`] supplied at construction.

use uuid::Uuid;

use crate::connection::DataHook;

/// How the subscription hub behaves when a subscriber falls behind.
///
/// This is the back-pressure contract described for the subscription hub:
/// a slow subscriber must never be allowed to stall the shared reader for
/// everyone else unless the caller has explicitly opted into that trade-off.
#[derive(Debug, Clone, Copy)]
pub enum BackpressurePolicy {
    /// Default. Each subscriber has a bounded queue of `capacity` events; a
    /// subscriber that falls behind silently misses the oldest events it
    /// hasn't read yet rather than blocking the reader. Order among the
    /// events a subscriber does receive is preserved.
    DropOldest { capacity: usize },

    /// Each subscriber has a bounded queue of `capacity` events; if it's
    /// full, publishing an event blocks the reader task until there's room.
    /// One slow subscriber therefore stalls delivery to every subscriber,
    /// and stalls the reader itself, which also delays reply dispatch. Only
    /// choose this if that's genuinely what's wanted.
    Block { capacity: usize },
}

impl Default for BackpressurePolicy {
    fn default() -> Self {
        BackpressurePolicy::DropOldest { capacity: 1024 }
    }
}

/// Generates `ActionID` values for outbound messages that don't already have
/// one. Overridable so tests can get deterministic IDs.
pub trait ActionIdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// The default generator: a fresh UUID v4 per call, in 8-4-4-4-12 hex form.
#[derive(Debug, Default)]
pub struct UuidActionIdGenerator;

impl ActionIdGenerator for UuidActionIdGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Construction-time configuration for a [`crate::Client`].
pub struct ClientConfig {
    pub backpressure: BackpressurePolicy,
    pub action_id: Box<dyn ActionIdGenerator>,
    /// Cap on a single inbound frame's size before it's treated as malformed.
    pub max_frame_len: usize,
    /// Debug-only hook fired with the exact bytes written to the wire. See
    /// the core design's raw-bytes observer hook (§6): best-effort, for
    /// logging/tracing raw traffic, never load-bearing.
    pub on_data_sent: Option<DataHook>,
    /// Debug-only hook fired with the exact bytes read off the wire,
    /// including the discarded banner line, if any.
    pub on_data_received: Option<DataHook>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            backpressure: BackpressurePolicy::default(),
            action_id: Box::new(UuidActionIdGenerator),
            max_frame_len: crate::framer::DEFAULT_MAX_FRAME_LEN,
            on_data_sent: None,
            on_data_received: None,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backpressure(mut self, policy: BackpressurePolicy) -> Self {
        self.backpressure = policy;
        self
    }

    pub fn with_action_id_generator(mut self, generator: Box<dyn ActionIdGenerator>) -> Self {
        self.action_id = generator;
        self
    }

    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Installs the `data-sent` observer hook (see [`crate::connection::DataHook`]).
    pub fn with_data_sent_hook(mut self, hook: DataHook) -> Self {
        self.on_data_sent = Some(hook);
        self
    }

    /// Installs the `data-received` observer hook.
    pub fn with_data_received_hook(mut self, hook: DataHook) -> Self {
        self.on_data_received = Some(hook);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn uuid_generator_produces_unique_ids() {
        let gen = UuidActionIdGenerator;
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(gen.next_id()));
        }
    }

    #[test]
    fn uuid_generator_ids_are_nonempty() {
        assert!(!UuidActionIdGenerator.next_id().is_empty());
    }
}
