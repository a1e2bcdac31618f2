//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the mirror core:
//! - Logging and tracing bootstrap
//! - Configuration management (cache lifetimes, history merge and refresh
//!   settings, injected collaborators)
//!
//! ## Overview
//!
//! Every other crate depends on this one for its configuration types. Hosts
//! build a [`CoreConfig`](config::CoreConfig) once, optionally call
//! [`init_logging`](logging::init_logging), and hand the config to the
//! service façade.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    CacheLifetimes, CoreConfig, CoreConfigBuilder, HistorySettings, RefreshSettings, StoreSettings,
};
pub use error::{Error, Result};
