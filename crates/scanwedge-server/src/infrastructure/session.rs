//! Subscriber session: one WebSocket connection, two loops.
//!
//! Each accepted connection runs two concurrent tasks that share the write
//! half of the socket:
//!
//! - **Outbound**: drains the subscriber queue into text frames, pings every
//!   `ping_period`, and sends a Close frame once the hub closes the queue.
//!   Every write is bounded by `write_wait`.
//! - **Inbound**: reads only to observe liveness.  Each Pong pushes the read
//!   deadline out by `pong_wait`; anything else a subscriber sends is
//!   ignored.  When the connection dies it asks the hub to unregister.
//!
//! Either loop ending raises the session's [`CloseSignal`], which stops the
//! other; the hub raises the same signal when it drops the subscriber.  The
//! transport is closed at most once through [`SharedSink::close`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use crate::domain::SessionSettings;
use crate::infrastructure::hub::{HubError, HubHandle, SubscriberId, SubscriberQueue};

/// Why a session loop ended abnormally.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("websocket transport error: {0}")]
    Transport(#[from] WsError),
    #[error("write did not complete within {0:?}")]
    WriteTimeout(Duration),
    #[error("no pong received within {0:?}")]
    PongTimeout(Duration),
    #[error("session was force-closed")]
    ForceClosed,
    #[error("transport already closed")]
    SinkClosed,
}

// ── CloseSignal ───────────────────────────────────────────────────────────────

/// Idempotent force-close flag with async waiters.
///
/// `trigger` is synchronous so the hub's control loop can raise it while
/// holding its membership lock.
#[derive(Debug, Clone, Default)]
pub struct CloseSignal {
    inner: Arc<CloseInner>,
}

#[derive(Debug, Default)]
struct CloseInner {
    triggered: AtomicBool,
    notify: Notify,
}

impl CloseSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal.  Only the first call wakes waiters.
    pub fn trigger(&self) {
        if !self.inner.triggered.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::Acquire)
    }

    /// Completes once the signal has been raised.
    pub async fn wait(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a trigger in between is not lost.
        notified.as_mut().enable();
        if self.is_triggered() {
            return;
        }
        notified.await;
    }
}

// ── SharedSink ────────────────────────────────────────────────────────────────

/// Write half of a WebSocket shared by the outbound and inbound loops.
pub struct SharedSink<S> {
    inner: Arc<SinkInner<S>>,
}

struct SinkInner<S> {
    sink: Mutex<S>,
    closed: AtomicBool,
}

impl<S> Clone for SharedSink<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> SharedSink<S>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    pub fn new(sink: S) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                sink: Mutex::new(sink),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Writes and flushes one message.
    ///
    /// # Errors
    ///
    /// [`SessionError::SinkClosed`] after [`SharedSink::close`], otherwise
    /// the transport error.
    pub async fn send(&self, message: Message) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::SinkClosed);
        }
        let mut sink = self.inner.sink.lock().await;
        sink.send(message).await?;
        Ok(())
    }

    /// Closes the transport.  Returns `true` for the call that actually
    /// closed it; every later call is a no-op returning `false`.
    pub async fn close(&self) -> bool {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let mut sink = self.inner.sink.lock().await;
        if let Err(e) = sink.close().await {
            debug!("error while closing websocket: {e}");
        }
        true
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

// ── Loops ─────────────────────────────────────────────────────────────────────

async fn write_bounded<S>(
    sink: &SharedSink<S>,
    message: Message,
    write_wait: Duration,
) -> Result<(), SessionError>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    timeout(write_wait, sink.send(message))
        .await
        .unwrap_or(Err(SessionError::WriteTimeout(write_wait)))
}

/// Drains `queue` into the socket until the queue closes, a write fails or
/// the session is force-closed.  Always closes the transport and raises
/// `close` on exit.
///
/// A force-close discards any frames still waiting in `queue`; only a queue
/// closed by the hub is drained before the Close frame.
pub async fn outbound_loop<S>(
    sink: SharedSink<S>,
    mut queue: SubscriberQueue,
    close: CloseSignal,
    settings: SessionSettings,
) -> Result<(), SessionError>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    let mut ticker = interval_at(Instant::now() + settings.ping_period, settings.ping_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let result = loop {
        tokio::select! {
            biased;
            _ = close.wait() => break Err(SessionError::ForceClosed),
            frame = queue.recv() => match frame {
                Some(frame) => {
                    let message = Message::Text(frame.to_string());
                    if let Err(e) = write_bounded(&sink, message, settings.write_wait).await {
                        break Err(e);
                    }
                }
                None => {
                    // The hub closed the queue.
                    let _ = write_bounded(&sink, Message::Close(None), settings.write_wait).await;
                    break Ok(());
                }
            },
            _ = ticker.tick() => {
                if let Err(e) = write_bounded(&sink, Message::Ping(Vec::new()), settings.write_wait).await {
                    break Err(e);
                }
            }
        }
    };

    sink.close().await;
    close.trigger();
    result
}

/// Watches the read half for liveness until the peer goes away, the pong
/// deadline passes or the session is force-closed.  Always unregisters `id`
/// from the hub, raises `close` and closes the transport on exit.
pub async fn inbound_loop<R, S>(
    mut stream: R,
    sink: SharedSink<S>,
    hub: HubHandle,
    id: SubscriberId,
    close: CloseSignal,
    pong_wait: Duration,
) -> Result<(), SessionError>
where
    R: Stream<Item = Result<Message, WsError>> + Unpin,
    S: Sink<Message, Error = WsError> + Unpin,
{
    let mut deadline = Instant::now() + pong_wait;

    let result = loop {
        tokio::select! {
            biased;
            _ = close.wait() => break Err(SessionError::ForceClosed),
            _ = sleep_until(deadline) => break Err(SessionError::PongTimeout(pong_wait)),
            message = stream.next() => match message {
                Some(Ok(Message::Pong(_))) => deadline = Instant::now() + pong_wait,
                Some(Ok(Message::Close(_))) | None => break Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => break Err(SessionError::Transport(e)),
            },
        }
    };

    hub.unregister(id).await;
    close.trigger();
    sink.close().await;
    result
}

// ── Session ───────────────────────────────────────────────────────────────────

/// The two running loops of one subscriber.
pub struct SessionTasks {
    pub id: SubscriberId,
    pub outbound: JoinHandle<Result<(), SessionError>>,
    pub inbound: JoinHandle<Result<(), SessionError>>,
}

impl SessionTasks {
    /// Waits for both loops and logs how each ended.
    pub async fn join(self) {
        let id = self.id;
        for (side, task) in [("outbound", self.outbound), ("inbound", self.inbound)] {
            match task.await {
                Ok(Ok(())) => debug!(%id, side, "session loop finished"),
                Ok(Err(SessionError::ForceClosed)) => debug!(%id, side, "session loop force-closed"),
                Ok(Err(e)) => warn!(%id, side, "session loop ended: {e}"),
                Err(e) => warn!(%id, side, "session task panicked or was cancelled: {e}"),
            }
        }
        info!(%id, "session closed");
    }
}

/// Registers a subscriber for `ws` with the hub and starts its loops.
///
/// # Errors
///
/// Returns [`HubError::Closed`] if the hub has stopped; the socket is then
/// simply dropped.
pub async fn start_session<T>(
    ws: WebSocketStream<T>,
    hub: &HubHandle,
    settings: SessionSettings,
) -> Result<SessionTasks, HubError>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (subscriber, queue) = hub.subscriber_channel();
    let id = subscriber.id();
    let close = subscriber.close_signal();
    hub.register(subscriber).await?;

    let (write, read) = ws.split();
    let sink = SharedSink::new(write);

    let outbound = tokio::spawn(outbound_loop(sink.clone(), queue, close.clone(), settings));
    let inbound = tokio::spawn(inbound_loop(
        read,
        sink,
        hub.clone(),
        id,
        close,
        settings.pong_wait,
    ));

    Ok(SessionTasks {
        id,
        outbound,
        inbound,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
