//! Co-editing wire message protocol.
//!
//! Serialized as JSON with an internally-tagged `"type"` discriminator so
//! that the frontend can route messages by type string. These are the
//! payloads carried on the `lifecycle`, `form`, and `presence` topics;
//! the subsystem passes the `state`/`resource` values through unmodified
//! (schema-specific shape belongs to the storage/validation layers).

use serde::{Deserialize, Serialize};

use crate::types::{DbId, SessionId, Timestamp};

// ---------------------------------------------------------------------------
// EditorPresence
// ---------------------------------------------------------------------------

/// One live editor in a `presence.update` broadcast, and the owner
/// metadata handed to spectators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorPresence {
    pub session_id: SessionId,
    pub user_id: DbId,
    pub joined_at: Timestamp,
}

// ---------------------------------------------------------------------------
// CollabMessage
// ---------------------------------------------------------------------------

/// Messages exchanged on the co-editing topics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum CollabMessage {
    /// A session started editing/watching a resource.
    #[serde(rename = "presence.join")]
    PresenceJoin {
        resource_type: String,
        resource_id: DbId,
        session_id: SessionId,
        user_id: DbId,
    },

    /// A session stopped editing/watching a resource.
    #[serde(rename = "presence.leave")]
    PresenceLeave {
        resource_type: String,
        resource_id: DbId,
        session_id: SessionId,
    },

    /// Server broadcasts: the updated, time-ordered list of live editors.
    ///
    /// The first entry is the current owner.
    #[serde(rename = "presence.update")]
    PresenceUpdate {
        resource_type: String,
        resource_id: DbId,
        editors: Vec<EditorPresence>,
    },

    /// The owner's full current unsaved edit state, replaced wholesale on
    /// every change. Never a delta, so a newly-joining or newly-promoted
    /// session can reconstruct from a single message.
    #[serde(rename = "form.state")]
    FormState {
        resource_type: String,
        resource_id: DbId,
        state: serde_json::Value,
    },

    /// A resource was created in the durable store.
    #[serde(rename = "lifecycle.created")]
    Created {
        resource_type: String,
        resource_id: DbId,
        resource: serde_json::Value,
    },

    /// A resource was saved; `resource` is the persisted result.
    #[serde(rename = "lifecycle.updated")]
    Updated {
        resource_type: String,
        resource_id: DbId,
        resource: serde_json::Value,
    },

    /// A resource was deleted from the durable store.
    #[serde(rename = "lifecycle.deleted")]
    Deleted {
        resource_type: String,
        resource_id: DbId,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
