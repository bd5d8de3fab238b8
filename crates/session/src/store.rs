//! Durable-storage collaborator contract.
//!
//! The co-editing subsystem never persists anything itself: it loads a
//! resource when a session needs an authoritative view and saves when
//! the owner commits. Everything else (schema validation, versioning,
//! the actual database) lives behind this trait.

use async_trait::async_trait;
use atelier_core::types::ResourceKey;

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The patch failed field-level validation. Carried back to the
    /// editing user verbatim; spectators never see it.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The store could not be reached. Retryable.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// ResourceStore
// ---------------------------------------------------------------------------

/// What the co-editing core needs from persistent storage.
///
/// `load` is called on non-owner join and on promotion without a live
/// snapshot; `save` is called only from the Owner state. Both are
/// ordinary request/response calls the session awaits — storage is not
/// part of the coordination protocol.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch the persisted resource.
    async fn load(&self, key: &ResourceKey) -> Result<serde_json::Value, StoreError>;

    /// Persist a patch and return the resulting resource.
    async fn save(
        &self,
        key: &ResourceKey,
        patch: &serde_json::Value,
    ) -> Result<serde_json::Value, StoreError>;
}
