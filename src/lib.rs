//! Stockflow event dispatcher.
//!
//! Accepts health and stock alerts over HTTP and fans each one out to the
//! requested notification channels (email and Slack), reporting a per-channel
//! outcome for every attempt.
pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod formatting;
pub mod internal_metrics;
pub mod notification;
pub mod secrets;
pub mod task_manager;
pub mod template;

// Re-export core types for convenience
pub use crate::core::*;
pub use dispatch::Dispatcher;
