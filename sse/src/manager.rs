use crate::connection::{ConnectionId, ConnectionInfo, ConnectionRegistry, SubscriberId};
use crate::delivery::{send_with_patience, Delivery, DEFAULT_PATIENCE};
use crate::error::Error;
use crate::message::{MessageScope, Notification};
use bytes::Bytes;
use futures::future::join_all;
use log::*;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Tuning knobs for the hub and its subscriber channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// How long fan-out waits for a slow subscriber before dropping the message for it
    pub patience: Duration,
    /// Outbound queue depth per subscriber
    pub subscriber_buffer: usize,
    /// Inbound notification queue depth; publishes beyond it are dropped
    pub publish_queue: usize,
    /// Registration queue depth
    pub control_queue: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            patience: DEFAULT_PATIENCE,
            subscriber_buffer: 8,
            publish_queue: 64,
            control_queue: 64,
        }
    }
}

enum Command {
    Register {
        identity: SubscriberId,
        info: ConnectionInfo,
    },
    Inspect(oneshot::Sender<RegistrySnapshot>),
    Shutdown,
}

struct Closing {
    identity: SubscriberId,
    connection_id: ConnectionId,
}

/// One registry entry as seen from outside the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberEntry {
    pub identity: SubscriberId,
    pub group: Option<String>,
    pub connection_id: ConnectionId,
}

/// Point-in-time copy of the registry, ordered by identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub entries: Vec<SubscriberEntry>,
}

impl RegistrySnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, identity: &SubscriberId) -> Option<&SubscriberEntry> {
        self.entries.iter().find(|entry| entry.identity == *identity)
    }

    pub fn contains(&self, identity: &SubscriberId) -> bool {
        self.get(identity).is_some()
    }
}

/// Cloneable handle to the broadcast hub.
///
/// Every registration, de-registration and publish goes through a channel to
/// the single hub loop, which is the only code that touches the registry.
#[derive(Clone)]
pub struct Manager {
    commands: mpsc::Sender<Command>,
    closing: mpsc::UnboundedSender<Closing>,
    notifications: mpsc::Sender<Notification>,
    subscriber_buffer: usize,
}

impl Manager {
    /// Create a handle and the hub loop it talks to. The hub does nothing until
    /// [`Hub::run`] is polled; most callers want [`Manager::start`].
    pub fn new(config: HubConfig) -> (Self, Hub) {
        let (commands_tx, commands_rx) = mpsc::channel(config.control_queue.max(1));
        let (closing_tx, closing_rx) = mpsc::unbounded_channel();
        let (notifications_tx, notifications_rx) = mpsc::channel(config.publish_queue.max(1));

        let manager = Self {
            commands: commands_tx,
            closing: closing_tx,
            notifications: notifications_tx,
            subscriber_buffer: config.subscriber_buffer.max(1),
        };
        let hub = Hub {
            registry: ConnectionRegistry::new(),
            commands: commands_rx,
            closing: closing_rx,
            notifications: notifications_rx,
            patience: config.patience,
        };

        (manager, hub)
    }

    /// Create a handle and spawn the hub loop on the current runtime.
    pub fn start(config: HubConfig) -> (Self, JoinHandle<()>) {
        let (manager, hub) = Self::new(config);
        let handle = tokio::spawn(hub.run());
        (manager, handle)
    }

    /// Register a subscriber under `identity`, replacing any existing entry for it.
    ///
    /// Returns as soon as the registration is queued; it only waits when the
    /// registration queue is full.
    pub async fn subscribe(
        &self,
        identity: SubscriberId,
        group: Option<String>,
    ) -> Result<Subscription, Error> {
        self.register(identity, ConnectionId::new(), group).await
    }

    /// Register an anonymous subscriber in `group`. Its identity is its own
    /// connection id, so it never replaces another subscriber.
    pub async fn subscribe_connection(&self, group: String) -> Result<Subscription, Error> {
        let connection_id = ConnectionId::new();
        let identity = SubscriberId::new(connection_id.as_str());
        self.register(identity, connection_id, Some(group)).await
    }

    async fn register(
        &self,
        identity: SubscriberId,
        connection_id: ConnectionId,
        group: Option<String>,
    ) -> Result<Subscription, Error> {
        let (sender, receiver) = mpsc::channel(self.subscriber_buffer);

        self.commands
            .send(Command::Register {
                identity: identity.clone(),
                info: ConnectionInfo {
                    connection_id: connection_id.clone(),
                    group,
                    sender,
                },
            })
            .await
            .map_err(|_| Error::hub_unavailable())?;

        Ok(Subscription {
            receiver,
            guard: SubscriptionGuard {
                identity,
                connection_id,
                closing: self.closing.clone(),
            },
        })
    }

    /// Queue a notification for fan-out without waiting.
    ///
    /// When the queue is full the notification is dropped (and logged) rather
    /// than stalling the publisher.
    pub fn publish(&self, notification: Notification) -> Result<(), Error> {
        match self.notifications.try_send(notification) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(notification)) => {
                warn!(
                    "SSE notification queue is full, dropping notification for {:?}",
                    notification.scope
                );
                Err(Error::queue_full())
            }
            Err(TrySendError::Closed(notification)) => {
                warn!(
                    "SSE hub is not running, dropping notification for {:?}",
                    notification.scope
                );
                Err(Error::hub_unavailable())
            }
        }
    }

    /// Snapshot of the registry, taken in hub-loop order.
    pub async fn inspect(&self) -> Result<RegistrySnapshot, Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Inspect(reply_tx))
            .await
            .map_err(|_| Error::hub_unavailable())?;
        reply_rx.await.map_err(|_| Error::hub_unavailable())
    }

    /// Stop the hub loop. Every open subscription then ends.
    pub async fn shutdown(&self) {
        if self.commands.send(Command::Shutdown).await.is_err() {
            debug!("SSE hub already stopped");
        }
    }
}

/// Receive end of one registered subscriber.
///
/// Dropping it (or calling [`Subscription::unsubscribe`]) queues the
/// de-registration; the queue is unbounded so this never blocks or fails
/// while the hub is alive.
#[derive(Debug)]
pub struct Subscription {
    // Declared before the guard so the channel is closed by the time the hub
    // sees the de-registration.
    receiver: mpsc::Receiver<Bytes>,
    guard: SubscriptionGuard,
}

impl Subscription {
    /// Next payload, or `None` once the hub has dropped this subscriber
    /// (superseded by a newer connection, pruned, or hub shut down).
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.receiver.recv().await
    }

    pub fn identity(&self) -> &SubscriberId {
        &self.guard.identity
    }

    pub fn connection_id(&self) -> &ConnectionId {
        &self.guard.connection_id
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

#[derive(Debug)]
struct SubscriptionGuard {
    identity: SubscriberId,
    connection_id: ConnectionId,
    closing: mpsc::UnboundedSender<Closing>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let closing = Closing {
            identity: self.identity.clone(),
            connection_id: self.connection_id.clone(),
        };
        if self.closing.send(closing).is_err() {
            debug!("SSE hub gone before {} unsubscribed", self.identity);
        }
    }
}

/// The coordinating loop. Owns the registry and processes one input at a time.
pub struct Hub {
    registry: ConnectionRegistry,
    commands: mpsc::Receiver<Command>,
    closing: mpsc::UnboundedReceiver<Closing>,
    notifications: mpsc::Receiver<Notification>,
    patience: Duration,
}

impl Hub {
    /// Run until [`Manager::shutdown`] is called or every `Manager` is dropped.
    pub async fn run(mut self) {
        info!("SSE hub started");

        loop {
            // De-registrations first so a publish never targets a connection
            // whose cleanup is already queued, then registrations ahead of
            // publishes so a fresh subscriber sees the next notification.
            tokio::select! {
                biased;
                Some(closing) = self.closing.recv() => self.unregister(closing),
                command = self.commands.recv() => match command {
                    Some(Command::Register { identity, info }) => self.register(identity, info),
                    Some(Command::Inspect(reply)) => {
                        let _ = reply.send(self.snapshot());
                    }
                    Some(Command::Shutdown) | None => break,
                },
                Some(notification) = self.notifications.recv() => self.fan_out(notification).await,
            }
        }

        info!(
            "SSE hub stopped, releasing {} subscriber(s)",
            self.registry.len()
        );
    }

    fn register(&mut self, identity: SubscriberId, info: ConnectionInfo) {
        // The connection may have gone away while its registration was queued.
        if info.sender.is_closed() {
            debug!("Skipping registration of already closed subscriber {identity}");
            return;
        }

        let superseded = self.registry.register(identity.clone(), info);
        if let Some(old) = superseded {
            info!(
                "Subscriber {identity} re-registered, superseding connection {}",
                old.connection_id
            );
        }
        info!(
            "Client added. {} registered subscriber(s)",
            self.registry.len()
        );
    }

    fn unregister(&mut self, closing: Closing) {
        if self
            .registry
            .unregister(&closing.identity, &closing.connection_id)
            .is_some()
        {
            info!(
                "Removed client {}. {} registered subscriber(s)",
                closing.identity,
                self.registry.len()
            );
        }
    }

    fn snapshot(&self) -> RegistrySnapshot {
        let mut entries: Vec<SubscriberEntry> = self
            .registry
            .all()
            .map(|(identity, info)| SubscriberEntry {
                identity: identity.clone(),
                group: info.group.clone(),
                connection_id: info.connection_id.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.identity.cmp(&b.identity));
        RegistrySnapshot { entries }
    }

    fn targets(&self, scope: &MessageScope) -> Vec<(SubscriberId, ConnectionInfo)> {
        match scope {
            MessageScope::Broadcast => self
                .registry
                .all()
                .map(|(identity, info)| (identity.clone(), info.clone()))
                .collect(),
            MessageScope::Group { group_key } => self
                .registry
                .in_group(group_key)
                .map(|(identity, info)| (identity.clone(), info.clone()))
                .collect(),
            MessageScope::Identity { identity } => self
                .registry
                .lookup(identity)
                .map(|info| (identity.clone(), info.clone()))
                .into_iter()
                .collect(),
        }
    }

    /// Deliver one notification to every matching subscriber. All attempts run
    /// concurrently, so the whole fan-out takes at most one patience window.
    async fn fan_out(&mut self, notification: Notification) {
        let Notification { scope, payload } = notification;
        let targets = self.targets(&scope);

        if targets.is_empty() {
            debug!("No subscribers registered for {scope:?}");
            return;
        }

        let patience = self.patience;
        let outcomes = join_all(
            targets
                .iter()
                .map(|(_, info)| send_with_patience(&info.sender, payload.clone(), patience)),
        )
        .await;

        let total = targets.len();
        let mut delivered = 0;
        for ((identity, info), outcome) in targets.into_iter().zip(outcomes) {
            match outcome {
                Delivery::Delivered => delivered += 1,
                Delivery::TimedOut => {
                    debug!("Subscriber {identity} did not accept a message within {patience:?}, skipping");
                }
                Delivery::Closed => {
                    if self
                        .registry
                        .unregister(&identity, &info.connection_id)
                        .is_some()
                    {
                        warn!(
                            "Subscriber {identity} channel closed, pruned. {} registered subscriber(s)",
                            self.registry.len()
                        );
                    }
                }
            }
        }

        debug!("Delivered {scope:?} notification to {delivered}/{total} subscriber(s)");
    }
}
