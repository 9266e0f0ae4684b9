//! The subscription hub: fans out events to a dynamic set of subscribers
//! without ever blocking the reader task, unless the caller has explicitly
//! opted into [`BackpressurePolicy::Block`].

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex as AsyncMutex};
use tracing::warn;

use crate::client::config::BackpressurePolicy;
use crate::client::error::ClientError;
use crate::message::Message;

/// What a subscriber ultimately sees: an event, or the one terminal cause
/// that ends the stream for everyone.
pub type HubItem = Result<Message, Arc<ClientError>>;

enum HubInner {
    /// `tokio::sync::broadcast` already implements the drop-oldest policy
    /// natively: a lagging receiver's next `recv()` returns
    /// `Lagged(n)` instead of the messages it missed, and the reader never
    /// waits on a slow subscriber — publishing to a broadcast channel never
    /// blocks on the receivers' side.
    DropOldest(broadcast::Sender<Arc<HubItem>>),
    /// One bounded `mpsc` channel per subscriber. Publishing awaits every
    /// channel's `send`, in turn, so a full channel stalls the reader —
    /// that's the point of this policy.
    Block {
        capacity: usize,
        subscribers: AsyncMutex<Vec<mpsc::Sender<Arc<HubItem>>>>,
    },
}

pub struct SubscriptionHub {
    inner: HubInner,
}

impl SubscriptionHub {
    pub fn new(policy: BackpressurePolicy) -> Self {
        let inner = match policy {
            BackpressurePolicy::DropOldest { capacity } => {
                let (tx, _rx) = broadcast::channel(capacity.max(1));
                HubInner::DropOldest(tx)
            }
            BackpressurePolicy::Block { capacity } => HubInner::Block {
                capacity: capacity.max(1),
                subscribers: AsyncMutex::new(Vec::new()),
            },
        };
        SubscriptionHub { inner }
    }

    /// Registers a new subscriber and returns its handle. Each call creates
    /// an independent handle — there is no "same observer" identity to
    /// de-duplicate against in this handle-based model (see DESIGN.md).
    pub async fn subscribe(&self) -> Subscription {
        match &self.inner {
            HubInner::DropOldest(tx) => Subscription::Broadcast(tx.subscribe()),
            HubInner::Block { capacity, subscribers } => {
                let (tx, rx) = mpsc::channel(*capacity);
                subscribers.lock().await.push(tx);
                Subscription::Mpsc(rx)
            }
        }
    }

    /// Delivers `msg` to every current subscriber.
    pub async fn publish(&self, msg: Message) {
        let item = Arc::new(Ok(msg));
        match &self.inner {
            HubInner::DropOldest(tx) => {
                // Err(SendError) only happens with zero receivers, which is
                // a normal, unremarkable state for an event hub.
                let _ = tx.send(item);
            }
            HubInner::Block { subscribers, .. } => {
                let senders: Vec<_> = subscribers.lock().await.clone();
                for sender in senders {
                    let _ = sender.send(item.clone()).await;
                }
            }
        }
    }

    /// Terminal fan-out: every current and future subscriber observes
    /// `cause` exactly once, then the set is emptied.
    pub async fn complete(&self, cause: Arc<ClientError>) {
        let item = Arc::new(Err(cause));
        match &self.inner {
            HubInner::DropOldest(tx) => {
                let _ = tx.send(item);
            }
            HubInner::Block { subscribers, .. } => {
                let mut guard = subscribers.lock().await;
                for sender in guard.drain(..) {
                    let _ = sender.send(item.clone()).await;
                }
            }
        }
    }
}

/// A live handle to the event stream. Drop it (or call nothing further) to
/// unsubscribe — there's no separate disposal step to remember.
pub enum Subscription {
    Broadcast(broadcast::Receiver<Arc<HubItem>>),
    Mpsc(mpsc::Receiver<Arc<HubItem>>),
}

impl Subscription {
    /// The next event, or `None` once the stream is exhausted (only possible
    /// for the `Block` policy, where the sender side is dropped on
    /// completion; the broadcast policy instead yields one final `Err` and
    /// then closes on the next call).
    pub async fn recv(&mut self) -> Option<HubItem> {
        match self {
            Subscription::Broadcast(rx) => loop {
                match rx.recv().await {
                    Ok(item) => return Some(clone_item(&item)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "subscriber fell behind; oldest events dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            },
            Subscription::Mpsc(rx) => rx.recv().await.map(|item| clone_item(&item)),
        }
    }
}

fn clone_item(item: &HubItem) -> HubItem {
    match item {
        Ok(msg) => Ok(msg.clone()),
        Err(cause) => Err(cause.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drop_oldest_delivers_to_every_subscriber() {
        let hub = SubscriptionHub::new(BackpressurePolicy::DropOldest { capacity: 8 });
        let mut a = hub.subscribe().await;
        let mut b = hub.subscribe().await;
        hub.publish(Message::new().with("Event", "FullyBooted")).await;

        for sub in [&mut a, &mut b] {
            let item = sub.recv().await.unwrap().unwrap();
            assert_eq!(item.get("Event"), Some("FullyBooted"));
        }
    }

    #[tokio::test]
    async fn drop_oldest_lagged_subscriber_skips_but_keeps_order() {
        let hub = SubscriptionHub::new(BackpressurePolicy::DropOldest { capacity: 2 });
        let mut sub = hub.subscribe().await;
        for i in 0..5 {
            hub.publish(Message::new().with("N", i.to_string())).await;
        }
        // capacity 2: the receiver missed some, but whatever it does get is
        // strictly increasing (no reordering), and it never blocked.
        let mut last = None;
        while let Some(Ok(msg)) = sub.recv().await {
            let n: i32 = msg.get("N").unwrap().parse().unwrap();
            if let Some(prev) = last {
                assert!(n > prev);
            }
            last = Some(n);
        }
    }

    #[tokio::test]
    async fn terminal_completes_every_subscriber_with_the_same_cause() {
        let hub = SubscriptionHub::new(BackpressurePolicy::DropOldest { capacity: 8 });
        let mut a = hub.subscribe().await;
        let mut b = hub.subscribe().await;
        let cause = Arc::new(ClientError::Eof);
        hub.complete(cause.clone()).await;

        for sub in [&mut a, &mut b] {
            match sub.recv().await {
                Some(Err(c)) => assert!(Arc::ptr_eq(&c, &cause)),
                other => panic!("expected terminal cause, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn block_policy_delivers_in_order_without_dropping() {
        let hub = SubscriptionHub::new(BackpressurePolicy::Block { capacity: 4 });
        let mut sub = hub.subscribe().await;
        for i in 0..4 {
            hub.publish(Message::new().with("N", i.to_string())).await;
        }
        for i in 0..4 {
            let msg = sub.recv().await.unwrap().unwrap();
            assert_eq!(msg.get("N"), Some(i.to_string().as_str()));
        }
    }

    #[tokio::test]
    async fn block_policy_completion_closes_the_channel() {
        let hub = SubscriptionHub::new(BackpressurePolicy::Block { capacity: 4 });
        let mut sub = hub.subscribe().await;
        let cause = Arc::new(ClientError::Eof);
        hub.complete(cause).await;
        assert!(sub.recv().await.unwrap().is_err());
        assert!(sub.recv().await.is_none());
    }
}
