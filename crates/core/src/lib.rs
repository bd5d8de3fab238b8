//! Atelier co-editing core: shared types, wire protocol, and pure logic.
//!
//! This crate has zero internal dependencies so that the event bus, the
//! presence registry, and the session controllers can all reference the
//! same resource keys, message protocol, and ownership rules:
//!
//! - [`ResourceKey`] — the `(resource_type, resource_id)` pair that
//!   identifies an editable resource.
//! - [`CollabMessage`] — the JSON wire protocol for realtime
//!   collaboration, routed by the frontend via its `"type"` tag.
//! - [`resolve_role`] — the deterministic ownership resolver.

pub mod collaboration;
pub mod messages;
pub mod ownership;
pub mod types;

pub use collaboration::{is_valid_resource_type, validate_resource_ref};
pub use messages::{CollabMessage, EditorPresence};
pub use ownership::{resolve_role, EditorRole};
pub use types::{DbId, ResourceKey, SessionId, Timestamp};
