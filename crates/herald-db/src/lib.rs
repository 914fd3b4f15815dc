//! # Herald DB
//! `Store` implementations: in-memory and SQLite.

pub mod memory;
pub mod sqlite;

#[cfg(test)]
mod conformance;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
