//! # Sync Module
//!
//! Merges remote state into the local mirror.
//!
//! ## Components
//!
//! - **Reconciler** (`reconciler`): computes and applies the difference between
//!   a remote playlist snapshot and the stored playlist, with audit entries
//! - **Duplicate Detector** (`duplicates`): flags repeated songs for display
//! - **History Merge** (`history_merge`): imports only the unseen part of the
//!   remote listening feed
//! - **Audit** (`audit`): action log and history writes that repair missing
//!   song references from remote

pub mod audit;
pub mod duplicates;
pub mod error;
pub mod history_merge;
pub mod reconciler;

pub use duplicates::flag_duplicates;
pub use error::{with_transient_retry, Result, SyncError};
pub use history_merge::{unimported_count, HistoryImporter, ImportReport};
pub use reconciler::{compute_change_set, ChangeSet, PlaylistReconciler};
