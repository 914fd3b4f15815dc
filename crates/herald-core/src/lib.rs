//! # Herald Core
//!
//! Shared records, error taxonomy, configuration and the trait seams
//! (store, mail relay, HTTP exchange, delivery strategy) that the rest of
//! the workspace plugs into.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::HeraldConfig;
pub use error::{HeraldError, Result};
