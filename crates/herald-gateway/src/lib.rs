//! # Herald Gateway
//! REST API over the distribution engine.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
