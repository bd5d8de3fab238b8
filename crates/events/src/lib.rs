//! Atelier co-editing broadcast bus.
//!
//! This crate provides the in-process publish/subscribe layer the
//! co-editing subsystem runs on:
//!
//! - [`Topic`] — the three per-resource topic families (`lifecycle`,
//!   `form`, `presence`).
//! - [`Envelope`] — a published message plus its source tag and
//!   timestamp.
//! - [`TopicBus`] — topic-keyed fan-out hub backed by
//!   `tokio::sync::broadcast`, shared via `Arc<TopicBus>`.

pub mod bus;
pub mod topic;

pub use bus::{Envelope, TopicBus};
pub use topic::{Topic, TopicFamily};
