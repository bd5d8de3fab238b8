//! Deterministic ownership resolution.
//!
//! Ownership of a resource is never stored: it is recomputed from the
//! live presence list on every membership change. The earliest-joined
//! live session is the owner; everyone else spectates. Keeping this a
//! pure function of its inputs (no hidden state, no I/O) is what makes
//! handoff behaviour unit-testable in isolation.

use crate::messages::EditorPresence;
use crate::types::{DbId, SessionId};

// ---------------------------------------------------------------------------
// EditorRole
// ---------------------------------------------------------------------------

/// The role a session holds for one resource.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorRole {
    /// The single session currently permitted to submit edits.
    Owner,
    /// Read-only; `owner` is the session currently holding the write role.
    Spectator { owner: EditorPresence },
}

impl EditorRole {
    pub fn is_owner(&self) -> bool {
        matches!(self, EditorRole::Owner)
    }
}

// ---------------------------------------------------------------------------
// resolve_role
// ---------------------------------------------------------------------------

/// Resolve the role of `(self_session_id, self_user_id)` against the live
/// presence list for a resource.
///
/// The head is the entry with the minimum `joined_at`; when several
/// entries share a timestamp the earliest-listed wins, so callers that
/// pass the registry's insertion-ordered list get a deterministic
/// tie-break without assuming timestamp uniqueness.
///
/// Rules, in order:
/// 1. Empty list -> `Owner`. This is a defensive default for a caller
///    that is mid-join and about to appear in the registry itself; it is
///    deliberately not reachable from any public "query role" API.
/// 2. Head session is self -> `Owner`.
/// 3. Head user is self -> `Owner`. A second tab/window of the owning
///    human is also an owner; locking a user out of their own edit
///    session is worse than letting their tabs race.
/// 4. Otherwise -> `Spectator` carrying the head's metadata.
pub fn resolve_role(
    entries: &[EditorPresence],
    self_session_id: SessionId,
    self_user_id: DbId,
) -> EditorRole {
    let Some(head) = entries
        .iter()
        .reduce(|min, e| if e.joined_at < min.joined_at { e } else { min })
    else {
        return EditorRole::Owner;
    };

    if head.session_id == self_session_id || head.user_id == self_user_id {
        EditorRole::Owner
    } else {
        EditorRole::Spectator {
            owner: head.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
