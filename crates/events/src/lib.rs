//! Domain events and the in-process bus that carries them to consumers.
//!
//! Events are published only **after** the state change that produced them has
//! been committed. They are informational: consumers (the notification pump) must
//! never be able to roll back the change that emitted them.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
