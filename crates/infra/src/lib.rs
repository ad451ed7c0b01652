//! Infrastructure layer: event store, dispatch pipeline, read models,
//! projections, and cross-domain handlers.

pub mod command_dispatcher;
pub mod event_bus;
pub mod event_store;
pub mod handlers;
pub mod projections;
pub mod read_model;

#[cfg(test)]
mod integration_tests;
