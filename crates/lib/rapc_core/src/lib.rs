//! # rapc_core
//!
//! Core authentication and session logic for Rap-C.

pub mod auth;
pub mod migrate;
pub mod models;
pub mod session;
pub mod validation;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
