//! Atelier editing sessions.
//!
//! The per-connection controller for co-editing one resource:
//!
//! - [`ResourceStore`] — the durable-storage collaborator contract.
//! - [`EditingSession`] — the `Joining -> { Owner, Spectator } ->
//!   Closed` state machine: it registers with the presence registry,
//!   subscribes to the resource's topics, and either accepts local edits
//!   (owner) or mirrors the owner's broadcasts (spectator), promoting
//!   itself when the owner goes away.
//! - [`SessionContext`] — the shared collaborators every session needs
//!   (registry, bus, store), cheaply cloneable.

pub mod session;
pub mod store;

pub use session::{EditingSession, SessionContext, SessionError, SessionEvent};
pub use store::{ResourceStore, StoreError};
