//! Real-time fan-out of inventory, billing and checkout changes to live sessions.
//!
//! The hub is transport-agnostic: the API's WebSocket handler adapts sockets to
//! [`Connection`] and feeds inbound frames to [`NotificationHub::handle_text`].

pub mod auth;
pub mod connection;
pub mod event;
pub mod hub;
pub mod protocol;
pub mod read_state;

pub use auth::{AuthError, Authenticator, SessionIdentity, close_codes};
pub use connection::{ChannelConnection, Connection, DeliveryError, Outbound};
pub use event::{Channel, NotificationEvent, Target};
pub use hub::{DeliveryReport, HubConfig, NotificationHub, Subscriptions};
pub use protocol::{ClientMessage, ServerMessage};
pub use read_state::{InMemoryReadStateStore, ReadStateError, ReadStateStore};
