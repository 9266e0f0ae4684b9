//! The `Client` type: owns the stream (split into reader/writer halves), the
//! writer mutex, the pending-request table, the subscription hub, and the
//! reader task. See §4.G / the client lifecycle design for the exact rules
//! this implements.

use std::sync::{Arc, Mutex as StdMutex};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::config::ClientConfig;
use crate::client::error::ClientError;
use crate::client::hub::{Subscription, SubscriptionHub};
use crate::client::login;
use crate::client::pending::{PendingOutcome, PendingTable};
use crate::connection::{FrameReader, FrameWriter};
use crate::message::Message;

use super::error::Result;

/// A boxed, type-erased half of the underlying stream. `Client::new` accepts
/// any `AsyncRead + AsyncWrite` stream and immediately erases its concrete
/// type this way, so `Client` itself stays a plain, non-generic type
/// regardless of whether it's backed by a `TcpStream` or, in tests, an
/// in-memory `tokio::io::duplex` half.
type BoxedWrite = Box<dyn AsyncWrite + Unpin + Send>;

/// Shared state behind every clone of a [`Client`]. `Client` itself is just
/// a cheap `Arc` handle so it can be cloned freely across tasks — every
/// clone talks to the same stream, the same reader, the same tables.
struct Core {
    writer: AsyncMutex<FrameWriter<BoxedWrite>>,
    pending: Arc<PendingTable>,
    hub: Arc<SubscriptionHub>,
    terminal: OnceCell<Arc<ClientError>>,
    action_id: Box<dyn super::config::ActionIdGenerator>,
    reader_handle: StdMutex<Option<JoinHandle<()>>>,
}

/// A handle to a running AMI client. Cheap to clone; every clone shares the
/// same underlying connection.
#[derive(Clone)]
pub struct Client {
    core: Arc<Core>,
}

impl Client {
    /// Takes ownership of an already-connected bidirectional stream (a TCP
    /// socket, an in-memory duplex pair for tests, anything that implements
    /// both halves of `AsyncRead`/`AsyncWrite`) and starts the client:
    /// splits the stream, spawns the single reader task, and returns a
    /// ready-to-use handle.
    pub fn new<S>(stream: S, config: ClientConfig) -> Client
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader = FrameReader::with_max_frame_len(read_half, config.max_frame_len);
        if let Some(hook) = config.on_data_received {
            reader = reader.with_data_hook(hook);
        }
        let boxed_write: BoxedWrite = Box::new(write_half);
        let mut writer = FrameWriter::new(boxed_write);
        if let Some(hook) = config.on_data_sent {
            writer = writer.with_data_hook(hook);
        }

        let pending = Arc::new(PendingTable::new());
        let hub = Arc::new(SubscriptionHub::new(config.backpressure));

        let core = Arc::new(Core {
            writer: AsyncMutex::new(writer),
            pending: pending.clone(),
            hub: hub.clone(),
            terminal: OnceCell::new(),
            action_id: config.action_id,
            reader_handle: StdMutex::new(None),
        });

        let reader_core = core.clone();
        let handle = tokio::spawn(run_reader(reader_core, reader));
        *core.reader_handle.lock().unwrap() = Some(handle);

        Client { core }
    }

    /// Builds a fresh outbound message with `Action` set to `name` and,
    /// unless the caller adds one afterwards, an auto-assigned `ActionID`
    /// from this client's configured generator. Per the core design, the ID
    /// is assigned now, at construction, not later when the message is
    /// published.
    pub fn action(&self, name: impl Into<String>) -> Message {
        Message::new()
            .with("Action", name.into())
            .with("ActionID", self.core.action_id.next_id())
    }

    /// Sends `action` and awaits its reply.
    ///
    /// 1. Fails with `InvalidArgument` if `action` has no `ActionID` (every
    ///    message built via [`Client::action`] has one; this only guards
    ///    hand-built messages).
    /// 2. Registers a pending slot for that ID.
    /// 3. Writes the message; a write failure cancels the slot, transitions
    ///    the client to terminal, and is returned to the caller.
    /// 4. Awaits the slot. Dropping this future before it resolves cancels
    ///    the request: the pending entry is removed and any reply that
    ///    arrives later is delivered as an event instead (see the
    ///    dispatcher's open question).
    pub async fn publish(&self, action: Message) -> Result<Message> {
        if let Some(cause) = self.core.terminal.get() {
            return Err(ClientError::ClientClosed(cause.clone()));
        }

        let id = action
            .action_id()
            .ok_or_else(|| ClientError::InvalidArgument("message has no ActionID".into()))?
            .to_string();

        let rx = self.core.pending.register(id.clone())?;
        let _guard = CancelOnDrop::new(self.core.pending.clone(), id.clone());

        if let Err(err) = self.write(&action).await {
            self.core.pending.cancel(&id);
            let cause = self.transition_terminal(err).await;
            return Err(ClientError::ClientClosed(cause));
        }

        match rx.await {
            Ok(PendingOutcome::Reply(msg)) => {
                _guard.disarm();
                Ok(msg)
            }
            Ok(PendingOutcome::Cancelled) => {
                _guard.disarm();
                Err(ClientError::Cancelled)
            }
            Ok(PendingOutcome::Terminal(cause)) => {
                _guard.disarm();
                Err(ClientError::ClientClosed(cause))
            }
            // The sender side was dropped without sending, which only
            // happens if the slot was cancelled out from under us by a
            // concurrent `dispose` racing the registration; treat it the
            // same as an explicit cancellation.
            Err(_recv_error) => Err(ClientError::Cancelled),
        }
    }

    async fn write(&self, message: &Message) -> Result<()> {
        self.core.writer.lock().await.write_message(message).await
    }

    /// Logs in. See the module-level docs on [`login`](crate::client::login)
    /// for the MD5 challenge-response sequence.
    pub async fn login(&self, username: &str, secret: &str, use_md5: bool) -> Result<bool> {
        login::login(self, username, secret, use_md5).await
    }

    /// Logs off. Returns `true` iff the server's reply is `Response: Goodbye`.
    pub async fn logoff(&self) -> Result<bool> {
        login::logoff(self).await
    }

    /// Subscribes to the event stream. See [`crate::client::BackpressurePolicy`]
    /// for what happens if this subscriber can't keep up.
    pub async fn subscribe(&self) -> Subscription {
        self.core.hub.subscribe().await
    }

    /// True once this client has transitioned to terminal.
    pub fn is_terminal(&self) -> bool {
        self.core.terminal.initialized()
    }

    /// The terminal cause, if this client has transitioned.
    pub fn terminal_cause(&self) -> Option<Arc<ClientError>> {
        self.core.terminal.get().cloned()
    }

    /// Explicitly disposes of the client: transitions to terminal with
    /// `ClientError::Eof` as the cause (there's no more specific "user asked
    /// for this" variant — disposal is simply one of the documented terminal
    /// triggers), closes the stream, and stops the reader. Idempotent.
    pub async fn dispose(&self) {
        let cause = self.transition_terminal(ClientError::Eof).await;
        debug!(?cause, "client disposed");
    }

    /// Runs the one-time transition to terminal, or returns the cause of
    /// whichever transition already happened. Fails every pending request
    /// and completes every subscriber with the same cause, closes the write
    /// half, and stops the reader task — exactly once, no matter how many
    /// callers or error paths race to call it.
    async fn transition_terminal(&self, cause: ClientError) -> Arc<ClientError> {
        let cause = Arc::new(cause);
        if self.core.terminal.set(cause.clone()).is_ok() {
            warn!(cause = %cause, "AMI client transitioning to terminal state");
            self.core.pending.fail_all(cause.clone());
            self.core.hub.complete(cause.clone()).await;
            let _ = self.core.writer.lock().await.shutdown().await;
            if let Some(handle) = self.core.reader_handle.lock().unwrap().take() {
                handle.abort();
            }
        }
        self.core.terminal.get().expect("just set or already set").clone()
    }
}

/// Drives the reader task from construction until terminal. There is
/// exactly one of these per client, for its entire lifetime.
async fn run_reader<R>(core: Arc<Core>, mut reader: FrameReader<R>)
where
    R: AsyncRead + Unpin + Send,
{
    loop {
        if core.terminal.initialized() {
            return;
        }
        match reader.read_message().await {
            Ok(Some(msg)) => dispatch(&core, msg).await,
            Ok(None) => {
                terminal_transition(&core, ClientError::Eof).await;
                return;
            }
            Err(err) => {
                terminal_transition(&core, err).await;
                return;
            }
        }
    }
}

async fn dispatch(core: &Arc<Core>, msg: Message) {
    let id = msg.action_id().unwrap_or("").to_string();
    if id.is_empty() {
        core.hub.publish(msg).await;
        return;
    }
    if let Some(event) = core.pending.complete(&id, msg) {
        core.hub.publish(event).await;
    }
}

/// The reader's own path to a terminal transition. `Client::dispose` and a
/// failed write go through `Client::transition_terminal`, which is the same
/// logic but reachable with a `&Client` rather than an `&Arc<Core>`; both
/// converge on `Core::terminal` so only the first caller does any work.
async fn terminal_transition(core: &Arc<Core>, cause: ClientError) {
    let cause = Arc::new(cause);
    if core.terminal.set(cause.clone()).is_ok() {
        warn!(cause = %cause, "AMI client transitioning to terminal state");
        core.pending.fail_all(cause.clone());
        core.hub.complete(cause.clone()).await;
        let _ = core.writer.lock().await.shutdown().await;
    }
}

/// Ensures a registered pending slot is cancelled if its `publish` future is
/// dropped before a reply, a cancellation, or a terminal cause arrives —
/// this is how the caller-cancellation guarantee in the concurrency model is
/// implemented: dropping the await is the cancellation.
struct CancelOnDrop {
    pending: Arc<PendingTable>,
    id: String,
    armed: bool,
}

impl CancelOnDrop {
    fn new(pending: Arc<PendingTable>, id: String) -> Self {
        CancelOnDrop { pending, id, armed: true }
    }

    /// Call once the slot has already been fulfilled through normal means,
    /// so `Drop` doesn't issue a redundant (harmless, but pointless) cancel.
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.pending.cancel(&self.id);
        }
    }
}
