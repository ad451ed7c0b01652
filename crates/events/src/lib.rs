//! `siteops-events` — event contracts and pub/sub plumbing.
//!
//! Domain crates emit typed events; this crate defines the `Event` trait they
//! implement, the envelope they travel in, and the bus contract the
//! infrastructure layer builds on. Read-model projections live in the infra
//! crate and consume published envelopes.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
