//! Messaging.
//!
//! * [`EventBus`] is the broker seam, with [`MemoryBus`] as the in-process implementation.
//! * [`BusEvent`] is the decoded form of every [`Envelope`] this service produces or consumes.
//! * [`EventPublisher`] publishes typed events and forwards terminal payments to the [`EventHooks`].
mod bus;
mod channel;
mod envelope;
mod event_types;
mod hooks;
mod publisher;

pub use bus::{BusError, EventBus, MemoryBus, PublishedEvent, Subscription};
pub use channel::{EventHandler, EventProducer, Handler};
pub use envelope::*;
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
pub use publisher::EventPublisher;
