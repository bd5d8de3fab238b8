//! Real-time co-editing constants and validation.
//!
//! This module lives in `core` (zero internal deps) so that the presence
//! registry, the session controllers, and any future transport adapter
//! all reference the same resource types, timing constants, and
//! boundary validation.

// ---------------------------------------------------------------------------
// Presence timing constants
// ---------------------------------------------------------------------------

/// How often the stale-entry sweeper task runs (in seconds).
///
/// This bounds the staleness window during which a silently-dead owner
/// is still visible to sessions that are not actively re-reading the
/// registry.
pub const PRESENCE_SWEEP_INTERVAL_SECS: u64 = 30;

/// Default buffer capacity for per-topic broadcast channels.
pub const TOPIC_CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Resource types (the things that can be co-edited)
// ---------------------------------------------------------------------------

/// Known resource types for co-editing.
pub mod resource_types {
    /// A content-type schema definition.
    pub const SCHEMA: &str = "schema";
    /// A content record (an instance of a schema).
    pub const RECORD: &str = "record";
}

/// The set of all valid resource types for co-editing.
pub const VALID_RESOURCE_TYPES: &[&str] = &[resource_types::SCHEMA, resource_types::RECORD];

/// Returns `true` if the given resource type is valid for co-editing.
pub fn is_valid_resource_type(resource_type: &str) -> bool {
    VALID_RESOURCE_TYPES.contains(&resource_type)
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Validate that both resource_type and resource_id are acceptable.
pub fn validate_resource_ref(resource_type: &str, resource_id: crate::types::DbId) -> Result<(), String> {
    if !is_valid_resource_type(resource_type) {
        return Err(format!(
            "Invalid resource_type '{resource_type}'. Must be one of: {}",
            VALID_RESOURCE_TYPES.join(", ")
        ));
    }
    if resource_id <= 0 {
        return Err(format!("resource_id must be positive, got {resource_id}"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
