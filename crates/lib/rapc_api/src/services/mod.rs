//! Supporting services used by handlers and middleware.

pub mod cookies;
pub mod notifier;
pub mod session;
