//! Connection registry and fan-out.
//!
//! One lock guards all three indexes (connections, per-user, per-hotel) so they
//! never disagree. Sends copy the targets out, release the lock, deliver, and
//! only then take the write lock to prune the connections that failed.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinHandle;

use innkeep_auth::Role;
use innkeep_core::{ConnectionId, HotelId, NotificationId, UserId};

use crate::auth::{SessionIdentity, close_codes};
use crate::connection::Connection;
use crate::event::{Channel, NotificationEvent};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::read_state::ReadStateStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub handshake_timeout: Duration,
    pub heartbeat_interval: Duration,
    /// A connection silent for longer than this is pruned by the sweep.
    pub heartbeat_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(90),
        }
    }
}

/// Channels an operator session receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscriptions {
    All,
    Only(BTreeSet<Channel>),
}

impl Subscriptions {
    pub fn includes(&self, channel: Channel) -> bool {
        match self {
            Subscriptions::All => true,
            Subscriptions::Only(set) => set.contains(&channel),
        }
    }
}

/// Outcome of one fan-out call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub pruned: usize,
}

struct Registration {
    connection: Arc<dyn Connection>,
    identity: SessionIdentity,
    subscriptions: Subscriptions,
    last_seen: Instant,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Registration>,
    by_user: HashMap<UserId, HashSet<ConnectionId>>,
    by_hotel: HashMap<HotelId, HashSet<ConnectionId>>,
}

impl Registry {
    fn insert(&mut self, registration: Registration) {
        let id = registration.connection.id();
        self.by_user
            .entry(registration.identity.user_id)
            .or_default()
            .insert(id);
        if let Some(hotel_id) = registration.identity.operator_hotel() {
            self.by_hotel.entry(hotel_id).or_default().insert(id);
        }
        self.connections.insert(id, registration);
    }

    fn remove(&mut self, id: ConnectionId) -> Option<Registration> {
        let registration = self.connections.remove(&id)?;
        let user_id = registration.identity.user_id;
        if let Some(set) = self.by_user.get_mut(&user_id) {
            set.remove(&id);
            if set.is_empty() {
                self.by_user.remove(&user_id);
            }
        }
        if let Some(hotel_id) = registration.identity.operator_hotel() {
            if let Some(set) = self.by_hotel.get_mut(&hotel_id) {
                set.remove(&id);
                if set.is_empty() {
                    self.by_hotel.remove(&hotel_id);
                }
            }
        }
        Some(registration)
    }

    fn targets<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a ConnectionId>,
        filter: impl Fn(&Registration) -> bool,
    ) -> Vec<Arc<dyn Connection>> {
        ids.into_iter()
            .filter_map(|id| self.connections.get(id))
            .filter(|r| filter(*r))
            .map(|r| Arc::clone(&r.connection))
            .collect()
    }
}

/// Explicitly constructed fan-out hub. Share it behind an `Arc`.
pub struct NotificationHub {
    config: HubConfig,
    registry: RwLock<Registry>,
    read_state: Arc<dyn ReadStateStore>,
    sweep: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationHub {
    pub fn new(config: HubConfig, read_state: Arc<dyn ReadStateStore>) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry: RwLock::new(Registry::default()),
            read_state,
            sweep: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(|poisoned| {
            tracing::warn!("notification registry lock poisoned; recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(|poisoned| {
            tracing::warn!("notification registry lock poisoned; recovering");
            poisoned.into_inner()
        })
    }

    /// Spawn the hygiene sweep. Must be called within a tokio runtime.
    pub fn start(self: &Arc<Self>) {
        let mut slot = self.sweep.lock().unwrap_or_else(|p| p.into_inner());
        if slot.is_some() {
            return;
        }
        let hub = Arc::downgrade(self);
        let interval = self.config.heartbeat_interval;
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(hub) = hub.upgrade() else { break };
                hub.sweep();
            }
        }));
        tracing::info!(interval_secs = interval.as_secs(), "notification hub started");
    }

    /// Cancel the sweep and close every connection with 1001.
    pub fn stop(&self) {
        if let Some(handle) = self.sweep.lock().unwrap_or_else(|p| p.into_inner()).take() {
            handle.abort();
        }
        let drained: Vec<Registration> = {
            let mut registry = self.write();
            registry.by_user.clear();
            registry.by_hotel.clear();
            registry.connections.drain().map(|(_, r)| r).collect()
        };
        for registration in &drained {
            registration
                .connection
                .close(close_codes::GOING_AWAY, "server shutting down");
        }
        tracing::info!(closed = drained.len(), "notification hub stopped");
    }

    pub fn is_running(&self) -> bool {
        self.sweep
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Ping live connections and prune the ones that stopped answering.
    pub fn sweep(&self) -> DeliveryReport {
        let cutoff = self.config.heartbeat_timeout;
        let (stale, live): (Vec<_>, Vec<_>) = {
            let registry = self.read();
            registry
                .connections
                .values()
                .map(|r| (r.last_seen.elapsed() > cutoff, Arc::clone(&r.connection)))
                .partition(|(stale, _)| *stale)
        };

        for (_, conn) in &stale {
            tracing::warn!(connection_id = %conn.id(), "heartbeat timeout; closing connection");
            self.remove_connection(conn.id());
            conn.close(close_codes::HEARTBEAT_TIMEOUT, "heartbeat timeout");
        }

        let ping = ServerMessage::Ping {
            timestamp: Utc::now(),
        };
        let targets: Vec<_> = live.into_iter().map(|(_, c)| c).collect();
        let mut report = self.deliver(targets, &ping);
        report.pruned += stale.len();
        report
    }

    /// Register an authenticated connection. Re-registering the same id is a no-op.
    pub fn register_connection(&self, connection: Arc<dyn Connection>, identity: SessionIdentity) {
        let id = connection.id();
        let role = identity.role.clone();
        let user_id = identity.user_id;
        {
            let mut registry = self.write();
            if registry.connections.contains_key(&id) {
                return;
            }
            registry.insert(Registration {
                connection: Arc::clone(&connection),
                identity,
                subscriptions: Subscriptions::All,
                last_seen: Instant::now(),
            });
        }
        tracing::info!(connection_id = %id, user_id = %user_id, role = %role, "connection registered");

        let hello = ServerMessage::Connected {
            user_id,
            role: role.to_string(),
        };
        if let Err(e) = connection.send(&hello) {
            tracing::warn!(connection_id = %id, error = %e, "failed to greet connection");
            self.remove_connection(id);
        }
    }

    /// Safe to call repeatedly; returns whether the connection was registered.
    pub fn remove_connection(&self, id: ConnectionId) -> bool {
        let removed = self.write().remove(id).is_some();
        if removed {
            tracing::debug!(connection_id = %id, "connection removed");
        }
        removed
    }

    pub fn connection_count(&self) -> usize {
        self.read().connections.len()
    }

    pub fn user_connection_count(&self, user_id: UserId) -> usize {
        self.read().by_user.get(&user_id).map_or(0, HashSet::len)
    }

    pub fn hotel_connection_count(&self, hotel_id: HotelId) -> usize {
        self.read().by_hotel.get(&hotel_id).map_or(0, HashSet::len)
    }

    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.read().connections.contains_key(&id)
    }

    pub fn send_to_user(&self, user_id: UserId, event: &NotificationEvent) -> DeliveryReport {
        let targets = {
            let registry = self.read();
            match registry.by_user.get(&user_id) {
                Some(ids) => registry.targets(ids, |_| true),
                None => Vec::new(),
            }
        };
        self.deliver(
            targets,
            &ServerMessage::Notification {
                notification: event.clone(),
            },
        )
    }

    pub fn send_to_hotel_admins(&self, hotel_id: HotelId, event: &NotificationEvent) -> DeliveryReport {
        let targets = {
            let registry = self.read();
            match registry.by_hotel.get(&hotel_id) {
                Some(ids) => registry.targets(ids, |r| r.subscriptions.includes(event.channel)),
                None => Vec::new(),
            }
        };
        self.deliver(
            targets,
            &ServerMessage::AdminNotification {
                notification: event.clone(),
            },
        )
    }

    /// Best effort; failed connections are dropped, never retried.
    pub fn broadcast_all(&self, event: &NotificationEvent) -> DeliveryReport {
        let targets = {
            let registry = self.read();
            registry.targets(registry.connections.keys(), |_| true)
        };
        self.deliver(
            targets,
            &ServerMessage::SystemNotification {
                notification: event.clone(),
            },
        )
    }

    fn deliver(&self, targets: Vec<Arc<dyn Connection>>, message: &ServerMessage) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut failed = Vec::new();
        for conn in targets {
            match conn.send(message) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        connection_id = %conn.id(),
                        message_type = message.type_name(),
                        error = %e,
                        "delivery failed; pruning connection"
                    );
                    failed.push(conn.id());
                }
            }
        }
        if !failed.is_empty() {
            let mut registry = self.write();
            for id in failed {
                if registry.remove(id).is_some() {
                    report.pruned += 1;
                }
            }
        }
        report
    }

    /// Handle one inbound text frame from a registered connection.
    pub fn handle_text(&self, id: ConnectionId, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle_message(id, message),
            Err(e) => {
                tracing::debug!(connection_id = %id, error = %e, "unparseable client frame");
                self.reply(id, ServerMessage::error("invalid_message", e.to_string()));
            }
        }
    }

    pub fn handle_message(&self, id: ConnectionId, message: ClientMessage) {
        let Some(user_id) = self.touch(id) else {
            tracing::debug!(connection_id = %id, "message from unregistered connection ignored");
            return;
        };
        tracing::debug!(connection_id = %id, ?message, "client message");

        match message {
            ClientMessage::Ping => self.reply(
                id,
                ServerMessage::Pong {
                    timestamp: Utc::now(),
                },
            ),
            ClientMessage::Pong => {}
            ClientMessage::Auth { .. } => self.reply(
                id,
                ServerMessage::error("already_authenticated", "connection is already authenticated"),
            ),
            ClientMessage::Subscribe { channels } => self.subscribe(id, channels),
            ClientMessage::MarkRead { ids } => self.mark_read(id, user_id, ids),
        }
    }

    fn subscribe(&self, id: ConnectionId, channels: Vec<Channel>) {
        if channels.is_empty() {
            self.reply(
                id,
                ServerMessage::error("invalid_subscription", "subscribe requires at least one channel"),
            );
            return;
        }
        let set: BTreeSet<Channel> = channels.into_iter().collect();
        let updated = {
            let mut registry = self.write();
            match registry.connections.get_mut(&id) {
                Some(r) => {
                    r.subscriptions = Subscriptions::Only(set.clone());
                    true
                }
                None => false,
            }
        };
        if updated {
            self.reply(
                id,
                ServerMessage::Subscribed {
                    channels: set.into_iter().collect(),
                },
            );
        }
    }

    fn mark_read(&self, id: ConnectionId, user_id: UserId, ids: Vec<NotificationId>) {
        if let Err(e) = self.read_state.mark_read(user_id, &ids) {
            tracing::warn!(connection_id = %id, error = %e, "failed to persist read state");
            self.reply(id, ServerMessage::error("read_state_unavailable", e.to_string()));
            return;
        }
        let others = {
            let registry = self.read();
            match registry.by_user.get(&user_id) {
                Some(set) => registry.targets(set.iter().filter(|c| **c != id), |_| true),
                None => Vec::new(),
            }
        };
        self.deliver(others, &ServerMessage::MarkRead { ids });
    }

    /// Record activity; returns the owning user when registered.
    fn touch(&self, id: ConnectionId) -> Option<UserId> {
        let mut registry = self.write();
        let r = registry.connections.get_mut(&id)?;
        r.last_seen = Instant::now();
        Some(r.identity.user_id)
    }

    fn reply(&self, id: ConnectionId, message: ServerMessage) {
        let target = {
            let registry = self.read();
            registry.connections.get(&id).map(|r| Arc::clone(&r.connection))
        };
        if let Some(conn) = target {
            self.deliver(vec![conn], &message);
        }
    }

    pub fn subscriptions(&self, id: ConnectionId) -> Option<Subscriptions> {
        self.read().connections.get(&id).map(|r| r.subscriptions.clone())
    }

    /// Role of a registered connection.
    pub fn role(&self, id: ConnectionId) -> Option<Role> {
        self.read()
            .connections
            .get(&id)
            .map(|r| r.identity.role.clone())
    }
}

impl Drop for NotificationHub {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.sweep.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::DeliveryError;
    use crate::event::Target;
    use crate::read_state::InMemoryReadStateStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Records everything it is sent; can be switched to fail.
    struct MockConnection {
        id: ConnectionId,
        sent: Mutex<Vec<ServerMessage>>,
        closed: Mutex<Option<u16>>,
        broken: AtomicBool,
    }

    impl MockConnection {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: ConnectionId::new(),
                sent: Mutex::new(Vec::new()),
                closed: Mutex::new(None),
                broken: AtomicBool::new(false),
            })
        }

        fn types(&self) -> Vec<&'static str> {
            self.sent.lock().unwrap().iter().map(|m| m.type_name()).collect()
        }

        fn break_it(&self) {
            self.broken.store(true, Ordering::SeqCst);
        }
    }

    impl Connection for MockConnection {
        fn id(&self) -> ConnectionId {
            self.id
        }

        fn send(&self, message: &ServerMessage) -> Result<(), DeliveryError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(DeliveryError::Closed);
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }

        fn close(&self, code: u16, _reason: &str) {
            *self.closed.lock().unwrap() = Some(code);
        }
    }

    fn hub() -> Arc<NotificationHub> {
        NotificationHub::new(HubConfig::default(), Arc::new(InMemoryReadStateStore::new()))
    }

    fn identity(role: Role, hotel_id: HotelId) -> SessionIdentity {
        SessionIdentity {
            user_id: UserId::new(),
            role,
            hotel_id: Some(hotel_id),
        }
    }

    fn event(kind: &str, channel: Channel, target: Target) -> NotificationEvent {
        NotificationEvent::new(kind, channel, target, serde_json::json!({}), Utc::now())
    }

    #[test]
    fn registration_is_idempotent_and_greets_once() {
        let hub = hub();
        let conn = MockConnection::new();
        let who = identity(Role::ADMIN, HotelId::new());
        hub.register_connection(conn.clone(), who.clone());
        hub.register_connection(conn.clone(), who.clone());

        assert_eq!(hub.connection_count(), 1);
        assert_eq!(conn.types(), vec!["connected"]);
        assert!(hub.remove_connection(conn.id()));
        assert!(!hub.remove_connection(conn.id()));
        assert_eq!(hub.user_connection_count(who.user_id), 0);
    }

    #[test]
    fn admin_fan_out_respects_channel_subscriptions() {
        let hub = hub();
        let hotel = HotelId::new();
        let inventory_admin = MockConnection::new();
        let billing_admin = MockConnection::new();
        hub.register_connection(inventory_admin.clone(), identity(Role::ADMIN, hotel));
        hub.register_connection(billing_admin.clone(), identity(Role::ADMIN, hotel));
        hub.handle_text(inventory_admin.id(), r#"{"type":"subscribe","channels":["inventory"]}"#);
        hub.handle_text(billing_admin.id(), r#"{"type":"subscribe","channels":["billing"]}"#);

        let damage = event("damage", Channel::Inventory, Target::HotelAdmins { hotel_id: hotel });
        let report = hub.send_to_hotel_admins(hotel, &damage);

        assert_eq!(report.delivered, 1);
        assert_eq!(
            inventory_admin.types(),
            vec!["connected", "subscribed", "admin_notification"]
        );
        assert_eq!(billing_admin.types(), vec!["connected", "subscribed"]);
    }

    #[test]
    fn guests_are_not_in_the_operator_group() {
        let hub = hub();
        let hotel = HotelId::new();
        let guest = MockConnection::new();
        hub.register_connection(guest.clone(), identity(Role::GUEST, hotel));
        assert_eq!(hub.hotel_connection_count(hotel), 0);

        let e = event("damage", Channel::Inventory, Target::HotelAdmins { hotel_id: hotel });
        assert_eq!(hub.send_to_hotel_admins(hotel, &e).delivered, 0);
    }

    #[test]
    fn failed_send_prunes_connection_from_every_index() {
        let hub = hub();
        let hotel = HotelId::new();
        let who = identity(Role::STAFF, hotel);
        let healthy = MockConnection::new();
        let dead = MockConnection::new();
        hub.register_connection(healthy.clone(), who.clone());
        hub.register_connection(dead.clone(), who.clone());
        dead.break_it();

        let e = event("replacement", Channel::Inventory, Target::User { user_id: who.user_id });
        let report = hub.send_to_user(who.user_id, &e);
        assert_eq!(report, DeliveryReport { delivered: 1, pruned: 1 });

        assert!(!hub.is_registered(dead.id()));
        assert_eq!(hub.user_connection_count(who.user_id), 1);
        assert_eq!(hub.hotel_connection_count(hotel), 1);

        let report = hub.broadcast_all(&event("maintenance", Channel::System, Target::Broadcast));
        assert_eq!(report, DeliveryReport { delivered: 1, pruned: 0 });
    }

    #[test]
    fn mark_read_persists_and_echoes_to_other_sessions() {
        let store = Arc::new(InMemoryReadStateStore::new());
        let hub = NotificationHub::new(HubConfig::default(), store.clone());
        let who = identity(Role::GUEST, HotelId::new());
        let phone = MockConnection::new();
        let laptop = MockConnection::new();
        hub.register_connection(phone.clone(), who.clone());
        hub.register_connection(laptop.clone(), who.clone());

        let id = NotificationId::new();
        hub.handle_message(phone.id(), ClientMessage::MarkRead { ids: vec![id] });

        assert!(store.is_read(who.user_id, id).unwrap());
        assert_eq!(phone.types(), vec!["connected"]);
        assert_eq!(laptop.types(), vec!["connected", "mark_read"]);
    }

    #[test]
    fn ping_gets_pong_and_garbage_gets_error() {
        let hub = hub();
        let conn = MockConnection::new();
        hub.register_connection(conn.clone(), identity(Role::STAFF, HotelId::new()));
        hub.handle_text(conn.id(), r#"{"type":"ping"}"#);
        hub.handle_text(conn.id(), "not json");
        assert_eq!(conn.types(), vec!["connected", "pong", "error"]);
    }

    #[test]
    fn sweep_prunes_silent_connections() {
        let config = HubConfig {
            heartbeat_timeout: Duration::ZERO,
            ..HubConfig::default()
        };
        let hub = NotificationHub::new(config, Arc::new(InMemoryReadStateStore::new()));
        let conn = MockConnection::new();
        hub.register_connection(conn.clone(), identity(Role::STAFF, HotelId::new()));
        std::thread::sleep(Duration::from_millis(5));

        let report = hub.sweep();
        assert_eq!(report.pruned, 1);
        assert_eq!(hub.connection_count(), 0);
        assert_eq!(*conn.closed.lock().unwrap(), Some(close_codes::HEARTBEAT_TIMEOUT));
    }

    #[tokio::test]
    async fn stop_cancels_sweep_and_closes_everything() {
        let hub = hub();
        hub.start();
        assert!(hub.is_running());

        let a = MockConnection::new();
        let b = MockConnection::new();
        hub.register_connection(a.clone(), identity(Role::ADMIN, HotelId::new()));
        hub.register_connection(b.clone(), identity(Role::GUEST, HotelId::new()));

        hub.stop();
        assert!(!hub.is_running());
        assert_eq!(hub.connection_count(), 0);
        assert_eq!(*a.closed.lock().unwrap(), Some(close_codes::GOING_AWAY));
        assert_eq!(*b.closed.lock().unwrap(), Some(close_codes::GOING_AWAY));
    }
}
