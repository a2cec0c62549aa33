//! Meta-repository issue sync engine and BML workflow validator.
//!
//! This crate provides:
//! - The BML status-label vocabulary (backlog → plan → build → measure →
//!   learn, plus blocked and archived)
//! - A pure workflow validator that annotates questionable transitions with
//!   advisory comments without ever blocking them
//! - The sync engine that mirrors source-repository issues into wrapper
//!   issues in a meta repository, keeps status labels in lock-step, and
//!   closes the source when a wrapper is archived
//! - Webhook payload parsing and signature verification
//! - An HTTP server wiring it all to GitHub webhook deliveries

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Engine methods all fail through SyncError

pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod index;
pub mod labels;
pub mod server;
pub mod webhooks;
pub mod workflow;
pub mod wrapper;

pub use config::Config;
pub use engine::{SourceIssueEvent, SyncEngine, SyncError, SyncOutcome, WrapperHandle};
pub use index::WrapperIndex;
pub use labels::Status;
pub use server::{build_router, AppState};
pub use webhooks::verify_webhook_signature;
pub use workflow::{review, Advisory, TransitionSnapshot};
pub use wrapper::{parse_wrapper_title, provenance_body, wrapper_title, SourceRef};
