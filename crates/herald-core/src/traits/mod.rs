//! Trait seams implemented by the storage and channel crates.

pub mod store;
pub mod transport;

pub use store::Store;
pub use transport::{Deliverer, HttpExchange, Mailer, OutgoingMail, OutgoingRequest};
