//! Request guards and response layers.

pub mod auth;
pub mod debug;
pub mod password;
