//! ac-coordinator: Coordinator / Status Aggregator
//!
//! The process-wide authority that seeds defaults, answers status queries,
//! applies control-surface commands, records activations per origin and
//! drives the badge. [`service::spawn`] runs it as a message-driven task.

pub mod coordinator;
pub mod error;
pub mod service;
pub mod surface;

pub use coordinator::{Coordinator, DEFAULT_ACTIVATION_LABEL, IndicatorSink};
pub use error::{CoordinatorError, Result};
pub use service::{CoordinatorHandle, spawn};
pub use surface::PopupView;
