//! Read model storage abstractions.

pub mod price_book;
pub mod store;

pub use price_book::InMemoryPriceBook;
pub use store::{InMemoryReadStore, ReadStore};
