//! `remindd-dispatch` — due-reminder dispatch engine and scheduler driver.
//!
//! # Overview
//!
//! The [`engine::DispatchEngine`] scans the store for due reminders each
//! tick and delivers them exactly once per occurrence per target, using the
//! store's dispatch marks as the durable "already sent" record. The
//! [`driver::SchedulerDriver`] fires the engine on a fixed cadence with a
//! drop-on-overlap reentrancy guard.
//!
//! Delivery itself is injected through the [`messenger::Messenger`] trait;
//! this crate never talks to the wire.

pub mod driver;
pub mod engine;
pub mod error;
pub mod messenger;

pub use driver::SchedulerDriver;
pub use engine::DispatchEngine;
pub use error::{DeliveryError, DispatchError, Result};
pub use messenger::Messenger;
