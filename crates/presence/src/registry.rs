//! Process-wide presence registry.
//!
//! Maps each co-edited resource to the set of sessions currently editing
//! or watching it. The registry exclusively owns the entry set; editing
//! sessions only ever touch their own entry's form-state through
//! [`PresenceRegistry::update_form_state`].
//!
//! Membership is inherently racy (browsers disconnect mid-request), so
//! `join` and `leave` favour availability: a duplicate join replaces, a
//! leave without a join is a no-op, and neither is ever an error.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use atelier_core::messages::{CollabMessage, EditorPresence};
use atelier_core::types::{DbId, ResourceKey, SessionId, Timestamp};
use atelier_events::{Envelope, Topic, TopicBus};
use tokio::sync::RwLock;

use crate::liveness::LivenessHandle;

// ---------------------------------------------------------------------------
// PresenceEntry
// ---------------------------------------------------------------------------

/// One live session's participation in editing a resource.
#[derive(Clone)]
pub struct PresenceEntry {
    /// Stable for the life of the connection.
    pub session_id: SessionId,
    /// The human behind the session.
    pub user_id: DbId,
    /// Assigned once at registration, never mutated afterwards; relative
    /// ordering of these values is what makes ownership handoff
    /// deterministic.
    pub joined_at: Timestamp,
    /// Probe for whether the backing session still runs.
    pub liveness: LivenessHandle,
    /// Owner-only: the most recently published snapshot of unsaved
    /// edits. Replaced wholesale, never merged.
    pub form_state: Option<serde_json::Value>,
}

impl PresenceEntry {
    pub fn is_alive(&self) -> bool {
        self.liveness.is_alive()
    }

    /// The wire-facing view of this entry.
    pub fn presence(&self) -> EditorPresence {
        EditorPresence {
            session_id: self.session_id,
            user_id: self.user_id,
            joined_at: self.joined_at,
        }
    }
}

impl fmt::Debug for PresenceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresenceEntry")
            .field("session_id", &self.session_id)
            .field("user_id", &self.user_id)
            .field("joined_at", &self.joined_at)
            .field("alive", &self.is_alive())
            .field("has_form_state", &self.form_state.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// PresenceRegistry
// ---------------------------------------------------------------------------

/// Process-wide membership table for co-edited resources.
///
/// Thread-safe via an interior `RwLock`; designed to be wrapped in `Arc`
/// and shared across all editing sessions. Holding the write lock across
/// the notification publish is what gives join/leave/list a total order
/// per resource key: a `list` never observes a half-applied `join`, and
/// membership notifications go out in the order the registry processed
/// the changes.
#[derive(Debug)]
pub struct PresenceRegistry {
    bus: Arc<TopicBus>,
    entries: RwLock<HashMap<ResourceKey, Vec<PresenceEntry>>>,
}

impl PresenceRegistry {
    /// Create an empty registry publishing membership changes on `bus`.
    pub fn new(bus: Arc<TopicBus>) -> Self {
        Self {
            bus,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a session on a resource and return its `joined_at`.
    ///
    /// Idempotent on duplicate `session_id`: a re-join replaces the
    /// existing entry rather than duplicating it, and keeps the original
    /// `joined_at` while the prior entry is still live — a reconnect
    /// race must not cost the owner its place in line. A re-join over a
    /// dead entry is a fresh join.
    pub async fn join(
        &self,
        key: &ResourceKey,
        session_id: SessionId,
        user_id: DbId,
        liveness: LivenessHandle,
    ) -> Timestamp {
        let mut map = self.entries.write().await;
        let list = map.entry(key.clone()).or_default();

        let joined_at = match list.iter().position(|e| e.session_id == session_id) {
            Some(idx) => {
                let prior = &list[idx];
                let (joined_at, form_state) = if prior.is_alive() {
                    (prior.joined_at, prior.form_state.clone())
                } else {
                    (chrono::Utc::now(), None)
                };
                list[idx] = PresenceEntry {
                    session_id,
                    user_id,
                    joined_at,
                    liveness,
                    form_state,
                };
                joined_at
            }
            None => {
                let joined_at = chrono::Utc::now();
                list.push(PresenceEntry {
                    session_id,
                    user_id,
                    joined_at,
                    liveness,
                    form_state: None,
                });
                joined_at
            }
        };

        tracing::info!(
            session_id = %session_id,
            user_id,
            resource = %key,
            "Session joined"
        );
        let editors = live_presences(list);
        self.publish_presence(key, editors).await;
        joined_at
    }

    /// Remove a session's entry. A leave for an unknown session or
    /// resource is a no-op, never an error.
    pub async fn leave(&self, key: &ResourceKey, session_id: SessionId) {
        let mut map = self.entries.write().await;
        let Some(list) = map.get_mut(key) else {
            return;
        };

        let before = list.len();
        list.retain(|e| e.session_id != session_id);
        if list.len() == before {
            return;
        }

        let editors = live_presences(list);
        let now_empty = list.is_empty();
        if now_empty {
            // No entry, no owner, no lock.
            map.remove(key);
        }

        tracing::info!(session_id = %session_id, resource = %key, "Session left");
        self.publish_presence(key, editors).await;
    }

    /// The canonical read path: live entries only, ascending `joined_at`.
    ///
    /// Entries whose liveness probe reports dead are removed on the way —
    /// even if no leave ever fired — and their removal is announced like
    /// any other membership change, so a crashed owner is handed off as
    /// soon as anyone looks.
    ///
    /// The sort is stable, so entries sharing a timestamp keep their
    /// registry insertion order.
    pub async fn list(&self, key: &ResourceKey) -> Vec<PresenceEntry> {
        let mut map = self.entries.write().await;
        let Some(list) = map.get_mut(key) else {
            return Vec::new();
        };

        let before = list.len();
        list.retain(|e| e.is_alive());
        let pruned = before - list.len();

        let mut result = list.clone();
        result.sort_by_key(|e| e.joined_at);

        if pruned > 0 {
            tracing::warn!(resource = %key, pruned, "Dropped dead presence entries");
            let editors = result.iter().map(PresenceEntry::presence).collect();
            let now_empty = list.is_empty();
            if now_empty {
                map.remove(key);
            }
            self.publish_presence(key, editors).await;
        }

        result
    }

    /// Update one entry's form-state snapshot in place.
    ///
    /// No notification fires: this is the cheap, keystroke-frequency
    /// path, and the snapshot never affects ownership. Last write wins.
    pub async fn update_form_state<F>(&self, key: &ResourceKey, session_id: SessionId, f: F)
    where
        F: FnOnce(Option<serde_json::Value>) -> Option<serde_json::Value>,
    {
        let mut map = self.entries.write().await;
        let Some(entry) = map
            .get_mut(key)
            .and_then(|list| list.iter_mut().find(|e| e.session_id == session_id))
        else {
            return;
        };
        entry.form_state = f(entry.form_state.take());
    }

    /// Drop every dead entry across all resources, announcing each
    /// affected resource's new membership. Returns the number of entries
    /// pruned.
    pub async fn sweep(&self) -> usize {
        let mut map = self.entries.write().await;

        let mut pruned_total = 0;
        let mut changed: Vec<(ResourceKey, Vec<EditorPresence>)> = Vec::new();
        map.retain(|key, list| {
            let before = list.len();
            list.retain(|e| e.is_alive());
            if list.len() < before {
                pruned_total += before - list.len();
                changed.push((key.clone(), live_presences(list)));
            }
            !list.is_empty()
        });

        for (key, editors) in changed {
            tracing::warn!(resource = %key, "Swept dead presence entries");
            self.publish_presence(&key, editors).await;
        }
        pruned_total
    }

    /// Number of resources currently carrying at least one entry.
    pub async fn resource_count(&self) -> usize {
        self.entries.read().await.len()
    }

    async fn publish_presence(&self, key: &ResourceKey, editors: Vec<EditorPresence>) {
        let message = CollabMessage::PresenceUpdate {
            resource_type: key.resource_type.clone(),
            resource_id: key.resource_id,
            editors,
        };
        self.bus
            .publish(&Topic::presence(key.clone()), Envelope::new(message))
            .await;
    }
}

/// Live entries as wire-facing presences, ascending `joined_at`, stable.
fn live_presences(list: &[PresenceEntry]) -> Vec<EditorPresence> {
    let mut live: Vec<&PresenceEntry> = list.iter().filter(|e| e.is_alive()).collect();
    live.sort_by_key(|e| e.joined_at);
    live.iter().map(|e| e.presence()).collect()
}
