#![forbid(unsafe_code)]

//! Bidirectional sync between a file-based task tracker and a remote issue tracker.
//!
//! [`SyncEngine`] drives mapped entities through normalize, classify and act,
//! recording agreed baselines in a [`tb_storage::SqliteStore`]. [`WatchLoop`]
//! repeats full syncs on a timer with exponential backoff.

mod apply;
pub mod config;
pub mod decision;
mod engine;
pub mod error;
pub mod ports;
pub mod report;
pub mod resolver;
mod support;
pub mod view;
pub mod watch;

pub use config::{SyncConfig, WatchConfig};
pub use decision::{
    AutoDecline, DecisionChoice, DecisionSource, DecisionUnavailable, FieldDecision,
    ScriptedDecisions,
};
pub use engine::{MANUAL_RESOLUTION_REQUIRED, SyncEngine};
pub use error::{CollaboratorError, CollaboratorErrorKind, SyncError};
pub use report::{
    ConflictEntity, FailedEntity, PlannedAction, SkippedEntity, SyncAction, SyncReport,
    SyncedEntity,
};
pub use resolver::Strategy;
pub use view::{LinkedTaskView, RemoteLink};
pub use watch::{
    BackoffPolicy, Clock, StopReason, SystemClock, WatchLoop, WatchOptions, WatchSummary,
};
