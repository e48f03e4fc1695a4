//! `remindd-store` — SQLite-backed reminder store.
//!
//! # Overview
//!
//! Owns all persisted state of the reminder engine: reminder rows, the
//! linked delivery identity, dispatch marks (the crash-safe "already sent"
//! records), and a monotonic version counter used as a cache-invalidation
//! token by the listing layer.
//!
//! All mutations are single SQLite statements; the store never holds the
//! connection open across an external call. The dispatch engine in
//! `remindd-dispatch` drives the mark protocol through the narrow ops
//! exposed here.

pub mod db;
pub mod error;
pub mod etag;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use etag::list_etag;
pub use store::ReminderStore;
pub use types::{ListPage, ListQuery, Order, Reminder, ReminderInput, SortBy};
