//! `remindd-core` — pure shared logic for the reminder engine.
//!
//! # Overview
//!
//! Contains everything that needs no I/O: configuration loading, the
//! five-field cron recurrence calculator, and delivery-target validation.
//! The store and dispatch crates build on these primitives.

pub mod config;
pub mod cron;
pub mod error;
pub mod recurrence;
pub mod target;

pub use config::{ReminddConfig, SchedulerConfig};
pub use cron::CronExpr;
pub use error::{CoreError, InvalidTargetError, RecurrenceError};
pub use recurrence::next_run;
pub use target::{is_valid_target, normalize_targets, split_targets};
