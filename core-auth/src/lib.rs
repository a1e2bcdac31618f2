//! # Session Handling
//!
//! Wraps remote calls so an expired session is renewed once and the call
//! retried once. See [`SessionGuard`].

pub mod error;
pub mod session;

pub use error::{AuthError, Result};
pub use session::SessionGuard;
