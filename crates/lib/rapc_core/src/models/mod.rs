//! Domain models and request payloads.

pub mod auth;
pub mod payload;
