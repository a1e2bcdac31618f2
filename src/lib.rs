//! Workspace entry crate.
//!
//! Re-exports the service façade so host applications can depend on
//! `ytm-mirror` alone instead of wiring each workspace crate.

pub use core_service::*;
