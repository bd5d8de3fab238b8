use std::fmt;

use serde::{Deserialize, Serialize};

/// All persistent resource and user ids are BIGSERIAL-style integers.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Opaque identifier for one live connection (one browser tab/window).
///
/// Stable for the life of the connection; also used as the source tag on
/// outgoing form-state broadcasts.
pub type SessionId = uuid::Uuid;

/// Identifies one editable resource: a content-type schema or a content
/// record.
///
/// Used as the key of the presence registry and embedded in every topic
/// name, so it must be cheap to clone, hash, and render.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub resource_type: String,
    pub resource_id: DbId,
}

impl ResourceKey {
    pub fn new(resource_type: impl Into<String>, resource_id: DbId) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_id,
        }
    }

    /// Key for a content-type schema.
    pub fn schema(resource_id: DbId) -> Self {
        Self::new(crate::collaboration::resource_types::SCHEMA, resource_id)
    }

    /// Key for a content record.
    pub fn record(resource_id: DbId) -> Self {
        Self::new(crate::collaboration::resource_types::RECORD, resource_id)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.resource_id)
    }
}
