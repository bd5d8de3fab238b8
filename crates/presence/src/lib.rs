//! Atelier presence registry.
//!
//! The process-wide membership table for co-edited resources:
//!
//! - [`PresenceRegistry`] — maps each [`ResourceKey`] to its live
//!   session entries; the only mutable structure shared across editing
//!   sessions. All ownership decisions read through
//!   [`PresenceRegistry::list`].
//! - [`Liveness`] — how the registry detects silently-dead sessions.
//! - [`start_sweeper`] — background task that prunes dead entries so
//!   spectators observe owner death without waiting for a read.
//!
//! [`ResourceKey`]: atelier_core::types::ResourceKey

pub mod liveness;
pub mod registry;
pub mod sweeper;

pub use liveness::{ChannelLiveness, Liveness, LivenessHandle, ManualLiveness};
pub use registry::{PresenceEntry, PresenceRegistry};
pub use sweeper::start_sweeper;
