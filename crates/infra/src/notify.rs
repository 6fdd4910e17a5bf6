//! Routes committed domain events to the notification hub.
//!
//! ```text
//! engine commit → EventBus → NotificationPump (thread) → NotificationRouter → NotificationHub
//! ```
//!
//! Operators get `admin_notification`s filtered by channel; the booking's guest
//! gets a `notification` for anything billed to them.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use innkeep_billing::{LedgerEvent, TransactionType};
use innkeep_checkout::CheckoutEventKind;
use innkeep_core::{BookingId, HotelId};
use innkeep_events::{EventBus, Subscription};
use innkeep_inventory::{InspectionResult, InventoryEvent};
use innkeep_notifications::{Channel, DeliveryReport, NotificationEvent, NotificationHub, Target};

use crate::event::{DomainEnvelope, DomainEvent};
use crate::store::InventoryStore;

/// Admin channel of a ledger entry type.
pub fn channel_for(kind: TransactionType) -> Channel {
    match kind {
        TransactionType::CheckoutCharge => Channel::Billing,
        TransactionType::Damage | TransactionType::Replacement | TransactionType::ExtraRequest => {
            Channel::Inventory
        }
    }
}

pub struct NotificationRouter<S> {
    store: S,
}

impl<S> NotificationRouter<S>
where
    S: InventoryStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Notifications produced by one committed event.
    pub fn route(&self, envelope: &DomainEnvelope) -> Vec<NotificationEvent> {
        let hotel_id = envelope.hotel_id();
        let admins = Target::HotelAdmins { hotel_id };
        let mut out = Vec::new();

        match envelope.payload() {
            DomainEvent::Inventory(event) => match event {
                InventoryEvent::InspectionRecorded { result, .. } => {
                    let kind = match result {
                        InspectionResult::Passed => "inspection.passed",
                        InspectionResult::Failed => "inspection.failed",
                    };
                    push(&mut out, kind, Channel::Inventory, admins, event);
                }
                InventoryEvent::SnapshotReset { .. } => {
                    push(&mut out, "room.reset", Channel::Inventory, admins, event);
                }
                InventoryEvent::SnapshotMigrated { .. } => {
                    push(&mut out, "room.migrated", Channel::Inventory, admins, event);
                }
                InventoryEvent::SnapshotCreated { .. }
                | InventoryEvent::BookingAttached { .. }
                | InventoryEvent::LinesAdjusted { .. } => {}
            },
            DomainEvent::Ledger(event) => match event {
                LedgerEvent::TransactionPosted {
                    kind,
                    charged_to_guest,
                    booking_id,
                    ..
                } => {
                    push(&mut out, kind.as_str(), channel_for(*kind), admins, event);
                    if *charged_to_guest {
                        self.notify_guest(&mut out, *booking_id, hotel_id, kind.as_str(), event);
                    }
                }
                LedgerEvent::TransactionCompleted {
                    kind,
                    charged_to_guest,
                    booking_id,
                    ..
                } => {
                    push(&mut out, "transaction.completed", channel_for(*kind), admins, event);
                    if *charged_to_guest {
                        self.notify_guest(&mut out, *booking_id, hotel_id, "charge.completed", event);
                    }
                }
                LedgerEvent::TransactionCancelled { booking_id, .. } => {
                    push(&mut out, "transaction.cancelled", Channel::Billing, admins, event);
                    self.notify_guest(&mut out, *booking_id, hotel_id, "charge.cancelled", event);
                }
                LedgerEvent::InvoiceReconciled { booking_id, .. } => {
                    push(&mut out, "invoice.reconciled", Channel::Billing, admins, event);
                    self.notify_guest(&mut out, Some(*booking_id), hotel_id, "invoice.updated", event);
                }
            },
            DomainEvent::Checkout(event) => {
                let kind = format!("checkout.{}", status_name(event));
                push(&mut out, &kind, Channel::Checkout, admins, event);
                if matches!(
                    event.kind,
                    CheckoutEventKind::InspectionSubmitted { .. } | CheckoutEventKind::ChargesConfirmed
                ) {
                    self.notify_guest(&mut out, Some(event.booking_id), hotel_id, &kind, event);
                }
            }
        }
        out
    }

    fn notify_guest<T: Serialize>(
        &self,
        out: &mut Vec<NotificationEvent>,
        booking_id: Option<BookingId>,
        hotel_id: HotelId,
        kind: &str,
        payload: &T,
    ) {
        let Some(booking_id) = booking_id else {
            return;
        };
        match self.store.booking(booking_id) {
            Ok(Some(booking)) if booking.hotel_id == hotel_id => {
                push(out, kind, Channel::Billing, Target::User { user_id: booking.guest_id }, payload);
            }
            Ok(_) => {
                tracing::debug!(booking_id = %booking_id, "no guest on record for booking");
            }
            Err(err) => {
                tracing::warn!(booking_id = %booking_id, error = %err, "guest lookup failed; skipping guest notification");
            }
        }
    }
}

fn status_name(event: &innkeep_checkout::CheckoutEvent) -> &'static str {
    use innkeep_checkout::CheckoutStatus;
    match event.status {
        CheckoutStatus::Requested => "requested",
        CheckoutStatus::Inspecting => "inspecting",
        CheckoutStatus::Passed => "passed",
        CheckoutStatus::PendingCharges => "pending_charges",
        CheckoutStatus::Failed => "failed",
    }
}

fn push<T: Serialize>(
    out: &mut Vec<NotificationEvent>,
    kind: &str,
    channel: Channel,
    target: Target,
    payload: &T,
) {
    match serde_json::to_value(payload) {
        Ok(value) => out.push(NotificationEvent::new(kind, channel, target, value, Utc::now())),
        Err(err) => tracing::warn!(kind, error = %err, "failed to encode notification payload"),
    }
}

/// Hand one notification to the hub according to its target.
pub fn deliver(hub: &NotificationHub, event: &NotificationEvent) -> DeliveryReport {
    match event.target {
        Target::User { user_id } => hub.send_to_user(user_id, event),
        Target::HotelAdmins { hotel_id } => hub.send_to_hotel_admins(hotel_id, event),
        Target::Broadcast => hub.broadcast_all(event),
    }
}

/// Handle to stop and join the pump thread.
#[derive(Debug)]
pub struct PumpHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl PumpHandle {
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            if j.join().is_err() {
                tracing::warn!("notification pump panicked before shutdown");
            }
        }
    }
}

pub struct NotificationPump;

impl NotificationPump {
    /// Subscribe to `bus` and forward every routed notification to `hub` on a
    /// dedicated thread.
    pub fn spawn<S, B>(
        bus: &B,
        router: NotificationRouter<S>,
        hub: Arc<NotificationHub>,
    ) -> std::io::Result<PumpHandle>
    where
        S: InventoryStore + 'static,
        B: EventBus<DomainEnvelope>,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let subscription = bus.subscribe();
        let join = thread::Builder::new()
            .name("notification-pump".to_string())
            .spawn(move || pump_loop(subscription, shutdown_rx, &router, &hub))?;
        Ok(PumpHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn pump_loop<S: InventoryStore>(
    subscription: Subscription<DomainEnvelope>,
    shutdown_rx: mpsc::Receiver<()>,
    router: &NotificationRouter<S>,
    hub: &NotificationHub,
) {
    let tick = Duration::from_millis(250);
    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }
        match subscription.recv_timeout(tick) {
            Ok(envelope) => {
                for notification in router.route(&envelope) {
                    let report = deliver(hub, &notification);
                    tracing::debug!(
                        kind = %notification.kind,
                        delivered = report.delivered,
                        pruned = report.pruned,
                        "notification fanned out"
                    );
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}
