//! Broadcast hub: subscriber membership and fan-out.
//!
//! One control task owns the subscriber set and consumes a single bounded
//! command channel.  Because register, unregister and broadcast travel
//! through the same channel, they take effect strictly in submission order:
//! a subscriber registered after broadcast M was submitted never sees M.
//!
//! ```text
//!  pipeline ──broadcast──┐
//!  ws_server ─register───┼──► [commands: bounded mpsc] ──► control loop
//!  session ──unregister──┘                                    │ try_send
//!                                         ┌───────────────────┼───────────┐
//!                                         ▼                   ▼           ▼
//!                                    queue (256)         queue (256)    ...
//! ```
//!
//! # Backpressure
//!
//! Nothing the hub does ever waits on a subscriber:
//!
//! - A broadcast submitted while the command channel is full is dropped and
//!   reported as [`HubError::Saturated`].
//! - A subscriber whose queue is full when a frame is fanned out is dropped
//!   on the spot.  Its queue is closed (the hub holds the only sender) and
//!   its [`CloseSignal`] is raised so the session tears the socket down.
//!
//! # Membership reads
//!
//! The subscriber map sits behind an `RwLock` that only the control loop
//! writes to, so [`HubHandle::subscriber_count`] can answer without a round
//! trip through the command channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use scanwedge_core::{Envelope, Frame, Payload};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::pipeline::{PayloadSink, PublishError};
use crate::domain::HubSettings;
use crate::infrastructure::session::CloseSignal;

/// Identifies one subscriber for the lifetime of its connection.
pub type SubscriberId = Uuid;

/// Session-side end of a subscriber queue.  The session's outbound loop is
/// its only reader.
pub type SubscriberQueue = mpsc::Receiver<Frame>;

/// Error type for hub operations.
#[derive(Debug, Error)]
pub enum HubError {
    /// The command channel is full; the broadcast was dropped.
    #[error("broadcast channel is full; message dropped")]
    Saturated,
    /// The control loop has stopped.
    #[error("hub is not running")]
    Closed,
    /// [`HubHandle::shutdown`] was already called.
    #[error("hub has already been shut down")]
    AlreadyShutDown,
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Hub-side end of a subscriber: its id, the queue sender and the
/// force-close signal shared with the session.
#[derive(Debug)]
pub struct SubscriberHandle {
    id: SubscriberId,
    queue: mpsc::Sender<Frame>,
    close: CloseSignal,
}

impl SubscriberHandle {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// A clone of the signal the hub raises when it drops this subscriber.
    pub fn close_signal(&self) -> CloseSignal {
        self.close.clone()
    }
}

/// Creates the two halves of a subscriber queue holding up to `capacity`
/// frames.
///
/// # Panics
///
/// Panics if `capacity` is zero (validated configuration never is).
pub fn subscriber_channel(capacity: usize) -> (SubscriberHandle, SubscriberQueue) {
    let (tx, rx) = mpsc::channel(capacity);
    let handle = SubscriberHandle {
        id: Uuid::new_v4(),
        queue: tx,
        close: CloseSignal::new(),
    };
    (handle, rx)
}

enum HubCommand {
    Register(SubscriberHandle),
    Unregister(SubscriberId),
    Broadcast(Frame),
    Shutdown(oneshot::Sender<usize>),
}

type SubscriberMap = Arc<RwLock<HashMap<SubscriberId, SubscriberHandle>>>;

/// The control loop.  Constructed and started by [`Hub::spawn`].
pub struct Hub {
    commands: mpsc::Receiver<HubCommand>,
    subscribers: SubscriberMap,
}

impl Hub {
    /// Starts the control loop on the current tokio runtime.
    pub fn spawn(settings: HubSettings) -> HubHandle {
        let (tx, rx) = mpsc::channel(settings.inbound_capacity);
        let subscribers: SubscriberMap = Arc::new(RwLock::new(HashMap::new()));

        let hub = Hub {
            commands: rx,
            subscribers: Arc::clone(&subscribers),
        };
        tokio::spawn(hub.run());

        HubHandle {
            commands: tx,
            subscribers,
            shut_down: Arc::new(AtomicBool::new(false)),
            queue_capacity: settings.queue_capacity,
        }
    }

    async fn run(mut self) {
        info!("broadcast hub started");
        while let Some(command) = self.commands.recv().await {
            match command {
                HubCommand::Register(subscriber) => self.register(subscriber),
                HubCommand::Unregister(id) => self.unregister(id),
                HubCommand::Broadcast(frame) => self.broadcast(&frame),
                HubCommand::Shutdown(ack) => {
                    let closed = self.close_all();
                    let _ = ack.send(closed);
                    info!(closed, "broadcast hub shut down");
                    return;
                }
            }
        }
        // Every handle was dropped without an explicit shutdown.
        let closed = self.close_all();
        info!(closed, "broadcast hub stopped");
    }

    fn register(&mut self, subscriber: SubscriberHandle) {
        match Envelope::welcome().to_frame() {
            Ok(welcome) => match subscriber.queue.try_send(welcome) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                    warn!(id = %subscriber.id, "could not queue welcome; dropping subscriber");
                    subscriber.close.trigger();
                    return;
                }
            },
            Err(e) => error!("failed to encode welcome envelope: {e}"),
        }

        let mut subscribers = self.write_subscribers();
        let id = subscriber.id;
        if let Some(previous) = subscribers.insert(id, subscriber) {
            warn!(%id, "subscriber registered twice; replacing previous queue");
            previous.close.trigger();
        }
        info!(%id, subscribers = subscribers.len(), "subscriber registered");
    }

    fn unregister(&mut self, id: SubscriberId) {
        let mut subscribers = self.write_subscribers();
        // Dropping the handle drops the only sender, which closes the queue.
        if subscribers.remove(&id).is_some() {
            info!(%id, subscribers = subscribers.len(), "subscriber unregistered");
        } else {
            debug!(%id, "unregister for unknown subscriber ignored");
        }
    }

    fn broadcast(&mut self, frame: &Frame) {
        let mut subscribers = self.write_subscribers();
        let before = subscribers.len();
        subscribers.retain(|id, subscriber| {
            match subscriber.queue.try_send(Arc::clone(frame)) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(%id, "subscriber queue full; dropping slow subscriber");
                    subscriber.close.trigger();
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(%id, "subscriber queue already closed; removing");
                    subscriber.close.trigger();
                    false
                }
            }
        });
        debug!(
            delivered = subscribers.len(),
            dropped = before - subscribers.len(),
            "broadcast fanned out"
        );
    }

    fn close_all(&mut self) -> usize {
        let mut subscribers = self.write_subscribers();
        let closed = subscribers.len();
        for (_, subscriber) in subscribers.drain() {
            subscriber.close.trigger();
        }
        closed
    }

    fn write_subscribers(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<SubscriberId, SubscriberHandle>> {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable handle for talking to a running hub.
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<HubCommand>,
    subscribers: SubscriberMap,
    shut_down: Arc<AtomicBool>,
    queue_capacity: usize,
}

impl HubHandle {
    /// A new subscriber channel sized from the hub settings.
    pub fn subscriber_channel(&self) -> (SubscriberHandle, SubscriberQueue) {
        subscriber_channel(self.queue_capacity)
    }

    /// Adds a subscriber and queues its welcome envelope.
    ///
    /// Waits for room in the command channel so that registrations are never
    /// lost under broadcast load.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn register(&self, subscriber: SubscriberHandle) -> Result<(), HubError> {
        self.commands
            .send(HubCommand::Register(subscriber))
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Removes a subscriber and closes its queue.  Unknown ids, repeated
    /// calls and calls after shutdown are no-ops.
    pub async fn unregister(&self, id: SubscriberId) {
        if self.commands.send(HubCommand::Unregister(id)).await.is_err() {
            debug!(%id, "unregister after hub stopped ignored");
        }
    }

    /// Submits an encoded frame for fan-out without waiting.
    ///
    /// # Errors
    ///
    /// - [`HubError::Saturated`] if the command channel is full; the frame
    ///   is dropped.
    /// - [`HubError::Closed`] if the hub has stopped.
    pub fn broadcast(&self, frame: Frame) -> Result<(), HubError> {
        match self.commands.try_send(HubCommand::Broadcast(frame)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!("hub command channel full; dropping broadcast");
                Err(HubError::Saturated)
            }
            Err(TrySendError::Closed(_)) => Err(HubError::Closed),
        }
    }

    /// Wraps `payload` in a barcode envelope, encodes it once and broadcasts it.
    ///
    /// # Errors
    ///
    /// As [`HubHandle::broadcast`], plus [`HubError::Encode`].
    pub fn broadcast_payload(&self, payload: &Payload) -> Result<(), HubError> {
        let frame = Envelope::barcode(payload.clone()).to_frame()?;
        self.broadcast(frame)
    }

    /// Number of registered subscribers at this instant.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Closes every subscriber and stops the control loop.
    ///
    /// Returns the number of subscribers that were closed.
    ///
    /// # Errors
    ///
    /// - [`HubError::AlreadyShutDown`] on every call after the first.
    /// - [`HubError::Closed`] if the control loop had already stopped.
    pub async fn shutdown(&self) -> Result<usize, HubError> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Err(HubError::AlreadyShutDown);
        }
        let (ack_tx, ack_rx) = oneshot::channel();
        self.commands
            .send(HubCommand::Shutdown(ack_tx))
            .await
            .map_err(|_| HubError::Closed)?;
        ack_rx.await.map_err(|_| HubError::Closed)
    }
}

impl PayloadSink for HubHandle {
    fn publish(&self, payload: &Payload) -> Result<(), PublishError> {
        self.broadcast_payload(payload).map_err(|e| match e {
            HubError::Saturated => PublishError::Saturated,
            HubError::Encode(e) => PublishError::Encode(e.to_string()),
            HubError::Closed | HubError::AlreadyShutDown => PublishError::Closed,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    fn hub() -> HubHandle {
        Hub::spawn(HubSettings::default())
    }

    async fn next_json(queue: &mut SubscriberQueue) -> Value {
        let frame = timeout(WAIT, queue.recv())
            .await
            .expect("frame within timeout")
            .expect("queue open");
        serde_json::from_str(&frame).expect("valid json")
    }

    /// Waits until the hub has processed everything submitted so far by
    /// registering a probe subscriber and waiting for its welcome.
    async fn settle(hub: &HubHandle) {
        let (probe, mut queue) = hub.subscriber_channel();
        let id = probe.id();
        hub.register(probe).await.expect("register probe");
        next_json(&mut queue).await;
        hub.unregister(id).await;
        assert!(timeout(WAIT, queue.recv()).await.expect("closed").is_none());
    }

    #[tokio::test]
    async fn test_register_sends_welcome_first() {
        // Arrange
        let hub = hub();
        let (sub, mut queue) = hub.subscriber_channel();

        // Act
        hub.register(sub).await.expect("register");

        // Assert
        let json = next_json(&mut queue).await;
        assert_eq!(json["type"], "welcome");
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber_in_order() {
        // Arrange
        let hub = hub();
        let mut queues = Vec::new();
        for _ in 0..3 {
            let (sub, queue) = hub.subscriber_channel();
            hub.register(sub).await.expect("register");
            queues.push(queue);
        }

        // Act
        for content in ["PRD1", "PRD2", "PRD3"] {
            hub.broadcast_payload(&Payload::completed(content.to_string()))
                .expect("broadcast");
        }

        // Assert
        for queue in &mut queues {
            assert_eq!(next_json(queue).await["type"], "welcome");
            for content in ["PRD1", "PRD2", "PRD3"] {
                assert_eq!(next_json(queue).await["data"]["content"], content);
            }
        }
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_broadcast() {
        let hub = hub();
        let (early, mut early_queue) = hub.subscriber_channel();
        hub.register(early).await.expect("register");

        hub.broadcast_payload(&Payload::completed("LOT1".to_string()))
            .expect("broadcast");
        let (late, mut late_queue) = hub.subscriber_channel();
        hub.register(late).await.expect("register");
        hub.broadcast_payload(&Payload::completed("LOT2".to_string()))
            .expect("broadcast");

        assert_eq!(next_json(&mut early_queue).await["type"], "welcome");
        assert_eq!(next_json(&mut early_queue).await["data"]["content"], "LOT1");
        assert_eq!(next_json(&mut early_queue).await["data"]["content"], "LOT2");

        assert_eq!(next_json(&mut late_queue).await["type"], "welcome");
        assert_eq!(next_json(&mut late_queue).await["data"]["content"], "LOT2");
    }

    #[tokio::test]
    async fn test_full_queue_drops_only_that_subscriber() {
        // Arrange: one healthy subscriber and one whose queue holds a single
        // frame (already taken by the welcome).
        let hub = hub();
        let (healthy, mut healthy_queue) = hub.subscriber_channel();
        let (slow, mut slow_queue) = subscriber_channel(1);
        let slow_close = slow.close_signal();
        hub.register(healthy).await.expect("register");
        hub.register(slow).await.expect("register");

        // Act
        hub.broadcast_payload(&Payload::completed("SN1".to_string()))
            .expect("broadcast");

        // Assert: slow gets its welcome, then its queue is closed.
        assert_eq!(next_json(&mut slow_queue).await["type"], "welcome");
        assert!(timeout(WAIT, slow_queue.recv()).await.expect("closed").is_none());
        assert!(slow_close.is_triggered());

        assert_eq!(next_json(&mut healthy_queue).await["type"], "welcome");
        assert_eq!(next_json(&mut healthy_queue).await["data"]["content"], "SN1");
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_register_with_full_queue_drops_subscriber() {
        // Arrange: the only slot is taken before the welcome can be queued.
        let hub = hub();
        let (sub, mut queue) = subscriber_channel(1);
        let close = sub.close_signal();
        sub.queue
            .try_send(Frame::from("{\"type\":\"stale\"}"))
            .expect("prefill");

        // Act
        hub.register(sub).await.expect("register");
        settle(&hub).await;

        // Assert: never joins, closed, and only the stale frame remains.
        assert_eq!(hub.subscriber_count(), 0);
        assert!(close.is_triggered());
        assert_eq!(next_json(&mut queue).await["type"], "stale");
        assert!(timeout(WAIT, queue.recv()).await.expect("closed").is_none());
    }

    #[tokio::test]
    async fn test_register_with_dropped_receiver_drops_subscriber() {
        let hub = hub();
        let (sub, queue) = hub.subscriber_channel();
        let close = sub.close_signal();
        drop(queue);

        hub.register(sub).await.expect("register");
        settle(&hub).await;

        assert_eq!(hub.subscriber_count(), 0);
        assert!(close.is_triggered());
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let hub = hub();
        let (sub, mut queue) = hub.subscriber_channel();
        let id = sub.id();
        hub.register(sub).await.expect("register");

        hub.unregister(id).await;
        hub.unregister(id).await;
        hub.unregister(Uuid::new_v4()).await;
        settle(&hub).await;

        assert_eq!(next_json(&mut queue).await["type"], "welcome");
        assert!(timeout(WAIT, queue.recv()).await.expect("closed").is_none());
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything_once() {
        let hub = hub();
        let (sub, mut queue) = hub.subscriber_channel();
        let close = sub.close_signal();
        hub.register(sub).await.expect("register");

        let closed = hub.shutdown().await.expect("first shutdown");
        let second = hub.shutdown().await;

        assert_eq!(closed, 1);
        assert!(matches!(second, Err(HubError::AlreadyShutDown)));
        assert!(close.is_triggered());
        assert_eq!(next_json(&mut queue).await["type"], "welcome");
        assert!(timeout(WAIT, queue.recv()).await.expect("closed").is_none());
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_operations_after_shutdown_report_closed() {
        let hub = hub();
        hub.shutdown().await.expect("shutdown");
        // Let the control loop exit and drop its receiver.
        tokio::task::yield_now().await;

        let (sub, _queue) = hub.subscriber_channel();
        assert!(matches!(hub.register(sub).await, Err(HubError::Closed)));
        assert!(matches!(
            hub.broadcast(Frame::from("{}")),
            Err(HubError::Closed)
        ));
        hub.unregister(Uuid::new_v4()).await;
    }

    #[tokio::test]
    async fn test_saturated_command_channel_drops_newest_broadcast() {
        // Arrange: a hub whose command channel holds one command, with the
        // control loop kept busy by the current-thread runtime.
        let hub = Hub::spawn(HubSettings {
            queue_capacity: 8,
            inbound_capacity: 1,
        });

        // Act: no await between the two calls, so the loop cannot drain.
        let first = hub.broadcast(Frame::from("{\"n\":1}"));
        let second = hub.broadcast(Frame::from("{\"n\":2}"));

        // Assert
        assert!(first.is_ok());
        assert!(matches!(second, Err(HubError::Saturated)));
    }

    #[tokio::test]
    async fn test_hub_handle_publishes_as_payload_sink() {
        let hub = hub();
        let (sub, mut queue) = hub.subscriber_channel();
        hub.register(sub).await.expect("register");
        let sink: &dyn PayloadSink = &hub;

        sink.publish(&Payload::completed("1234567890123".to_string()))
            .expect("publish");

        next_json(&mut queue).await;
        let json = next_json(&mut queue).await;
        assert_eq!(json["type"], "barcode");
        assert_eq!(json["data"]["type"], "EAN-13");
    }
}
