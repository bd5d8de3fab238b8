//! Per-connection editing-session controller.
//!
//! One [`EditingSession`] exists per connection per open resource. It is
//! an independent, message-driven actor: all cross-session interaction
//! goes through the presence registry and the broadcast bus, never
//! through shared mutable state. The embedding layer (a WebSocket
//! handler, a desktop shell) drives the machine by awaiting
//! [`EditingSession::next_event`] and forwarding local input to
//! [`EditingSession::apply_edit`] / [`EditingSession::save`].

use std::sync::Arc;

use atelier_core::collaboration::validate_resource_ref;
use atelier_core::messages::{CollabMessage, EditorPresence};
use atelier_core::ownership::{resolve_role, EditorRole};
use atelier_core::types::{DbId, ResourceKey, SessionId};
use atelier_events::{Envelope, Topic, TopicBus};
use atelier_presence::{LivenessHandle, PresenceRegistry};
use tokio::sync::broadcast;

use crate::store::{ResourceStore, StoreError};

// ---------------------------------------------------------------------------
// SessionContext
// ---------------------------------------------------------------------------

/// Shared collaborators every editing session needs.
///
/// Cheaply cloneable (everything is behind `Arc`); the embedding layer
/// builds one at startup and hands a clone to each new session.
#[derive(Clone)]
pub struct SessionContext {
    pub registry: Arc<PresenceRegistry>,
    pub bus: Arc<TopicBus>,
    pub store: Arc<dyn ResourceStore>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("registry", &self.registry)
            .field("bus", &self.bus)
            .field("store", &"<dyn ResourceStore>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Errors and events
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// The session may not write right now. Local input should be
    /// ignored and the reason surfaced to this user only.
    #[error("Session is read-only: {0}")]
    ReadOnly(&'static str),

    #[error("Session is closed")]
    Closed,

    #[error("Resource was deleted")]
    Deleted,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What changed when the pump processed a broadcast.
#[derive(Debug)]
pub enum SessionEvent {
    /// The live editor list changed; role did not.
    MembershipChanged { editors: Vec<EditorPresence> },

    /// This session became the owner and may now accept edits.
    Promoted,

    /// This session should own the resource, but rehydration failed.
    /// The session stays read-only; call
    /// [`EditingSession::retry_promotion`] once storage is back.
    PromotionFailed { error: StoreError },

    /// This session lost the owner role. Only possible when the
    /// registry pruned our entry as dead while we were still running.
    Demoted,

    /// A foreign form-state snapshot replaced the local view.
    RemoteStateApplied,

    /// The resource was saved elsewhere; the local view now shows the
    /// persisted result.
    ResourceUpdated,

    /// The resource is gone. The session is terminally read-only.
    ResourceDeleted,
}

// ---------------------------------------------------------------------------
// EditingSession
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Active,
    Deleted,
    Closed,
}

/// The per-connection co-editing state machine:
/// `Joining -> { Owner, Spectator } -> Closed`.
#[derive(Debug)]
pub struct EditingSession {
    ctx: SessionContext,
    key: ResourceKey,
    session_id: SessionId,
    user_id: DbId,

    form_topic: Topic,
    lifecycle_topic: Topic,
    form_rx: broadcast::Receiver<Envelope>,
    presence_rx: broadcast::Receiver<Envelope>,
    lifecycle_rx: broadcast::Receiver<Envelope>,

    phase: Phase,
    role: EditorRole,
    /// Promotion is owed but rehydration failed; stays read-only.
    awaiting_promotion: bool,

    /// The local view of the resource: the owner's validated edit state,
    /// or the spectator's mirror of the owner's broadcasts.
    form: serde_json::Value,
    /// Whether `form` holds a live (unsaved-edits) snapshot rather than
    /// the persisted base loaded at join. Decides whether promotion can
    /// skip the storage reload.
    has_snapshot: bool,
}

impl EditingSession {
    /// Open a session on a resource: register presence, subscribe to the
    /// resource's topics, resolve the initial role, and hydrate the
    /// local view.
    ///
    /// Hydration prefers a live form-state snapshot stamped in the
    /// registry (so a joiner sees the owner's unsaved edits
    /// immediately); without one it loads the persisted resource. A
    /// failed load aborts the join and deregisters the half-joined
    /// entry.
    pub async fn join(
        ctx: SessionContext,
        key: ResourceKey,
        session_id: SessionId,
        user_id: DbId,
        liveness: LivenessHandle,
    ) -> Result<Self, SessionError> {
        validate_resource_ref(&key.resource_type, key.resource_id)
            .map_err(SessionError::InvalidResource)?;

        // Subscribe before registering so no notification can fall into
        // the gap; our own join notification is simply the first thing
        // on the pump and resolves to a no-op.
        let form_topic = Topic::form(key.clone());
        let lifecycle_topic = Topic::lifecycle(key.clone());
        let form_rx = ctx.bus.subscribe(&form_topic).await;
        let presence_rx = ctx.bus.subscribe(&Topic::presence(key.clone())).await;
        let lifecycle_rx = ctx.bus.subscribe(&lifecycle_topic).await;

        ctx.registry.join(&key, session_id, user_id, liveness).await;

        let entries = ctx.registry.list(&key).await;
        let editors: Vec<EditorPresence> = entries.iter().map(|e| e.presence()).collect();
        let role = resolve_role(&editors, session_id, user_id);

        let snapshot = entries.iter().find_map(|e| e.form_state.clone());
        let (form, has_snapshot) = match snapshot {
            Some(state) => (state, true),
            None => match ctx.store.load(&key).await {
                Ok(resource) => (resource, false),
                Err(e) => {
                    ctx.registry.leave(&key, session_id).await;
                    return Err(e.into());
                }
            },
        };

        tracing::info!(
            session_id = %session_id,
            user_id,
            resource = %key,
            owner = role.is_owner(),
            "Editing session joined"
        );

        Ok(Self {
            ctx,
            key,
            session_id,
            user_id,
            form_topic,
            lifecycle_topic,
            form_rx,
            presence_rx,
            lifecycle_rx,
            phase: Phase::Active,
            role,
            awaiting_promotion: false,
            form,
            has_snapshot,
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn role(&self) -> &EditorRole {
        &self.role
    }

    /// Whether this session currently accepts edits.
    pub fn is_owner(&self) -> bool {
        self.phase == Phase::Active && !self.awaiting_promotion && self.role.is_owner()
    }

    /// The local view of the resource.
    pub fn form(&self) -> &serde_json::Value {
        &self.form
    }

    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }

    /// `true` while a failed promotion keeps the session read-only.
    pub fn awaiting_promotion(&self) -> bool {
        self.awaiting_promotion
    }

    // -----------------------------------------------------------------------
    // Owner operations
    // -----------------------------------------------------------------------

    /// Apply a local edit: replace the local state, stamp it into this
    /// session's presence entry, and broadcast the snapshot to
    /// spectators. The whole state travels every time — receivers
    /// replace, never merge.
    pub async fn apply_edit(&mut self, state: serde_json::Value) -> Result<(), SessionError> {
        self.ensure_writable()?;

        self.form = state.clone();
        self.has_snapshot = true;

        let stamped = state.clone();
        self.ctx
            .registry
            .update_form_state(&self.key, self.session_id, |_| Some(stamped))
            .await;

        let message = CollabMessage::FormState {
            resource_type: self.key.resource_type.clone(),
            resource_id: self.key.resource_id,
            state,
        };
        self.ctx
            .bus
            .publish(
                &self.form_topic,
                Envelope::new(message).with_source_tag(self.session_id),
            )
            .await;

        tracing::debug!(session_id = %self.session_id, resource = %self.key, "Edit applied");
        Ok(())
    }

    /// Persist the current state. On success the persisted resource
    /// becomes the local view and a `lifecycle.updated` goes out; on
    /// failure the session keeps the owner role, nothing is broadcast,
    /// and the error is for this user's eyes only.
    pub async fn save(&mut self) -> Result<serde_json::Value, SessionError> {
        self.ensure_writable()?;

        match self.ctx.store.save(&self.key, &self.form).await {
            Ok(resource) => {
                self.form = resource.clone();

                let stamped = resource.clone();
                self.ctx
                    .registry
                    .update_form_state(&self.key, self.session_id, |_| Some(stamped))
                    .await;

                let message = CollabMessage::Updated {
                    resource_type: self.key.resource_type.clone(),
                    resource_id: self.key.resource_id,
                    resource: resource.clone(),
                };
                self.ctx
                    .bus
                    .publish(
                        &self.lifecycle_topic,
                        Envelope::new(message).with_source_tag(self.session_id),
                    )
                    .await;

                tracing::info!(session_id = %self.session_id, resource = %self.key, "Resource saved");
                Ok(resource)
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    resource = %self.key,
                    error = %e,
                    "Save failed"
                );
                Err(e.into())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Event pump
    // -----------------------------------------------------------------------

    /// Await the next consequential broadcast and apply it.
    ///
    /// Echoes of this session's own broadcasts are dropped here, so a
    /// publisher never reacts to itself. Lagged receivers skip the lost
    /// backlog and keep going — every form snapshot is complete, so the
    /// next one heals the view.
    pub async fn next_event(&mut self) -> Result<SessionEvent, SessionError> {
        if self.phase == Phase::Closed {
            return Err(SessionError::Closed);
        }

        loop {
            let received = tokio::select! {
                r = self.form_rx.recv() => r,
                r = self.presence_rx.recv() => r,
                r = self.lifecycle_rx.recv() => r,
            };

            let envelope = match received {
                Ok(envelope) => envelope,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        session_id = %self.session_id,
                        resource = %self.key,
                        skipped,
                        "Session lagged behind broadcasts"
                    );
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return Err(SessionError::Closed),
            };

            if envelope.source_tag == Some(self.session_id) {
                continue;
            }

            match envelope.message {
                CollabMessage::FormState { state, .. } => {
                    // Last message wins, wholesale.
                    self.form = state;
                    self.has_snapshot = true;
                    return Ok(SessionEvent::RemoteStateApplied);
                }
                CollabMessage::PresenceUpdate { editors, .. } => {
                    return Ok(self.handle_membership(editors).await);
                }
                CollabMessage::Created { resource, .. } | CollabMessage::Updated { resource, .. } => {
                    self.form = resource;
                    self.has_snapshot = true;
                    return Ok(SessionEvent::ResourceUpdated);
                }
                CollabMessage::Deleted { .. } => {
                    tracing::info!(session_id = %self.session_id, resource = %self.key, "Resource deleted");
                    self.phase = Phase::Deleted;
                    return Ok(SessionEvent::ResourceDeleted);
                }
                CollabMessage::PresenceJoin { .. } | CollabMessage::PresenceLeave { .. } => {
                    continue;
                }
            }
        }
    }

    /// Re-attempt a promotion whose rehydration failed.
    ///
    /// Re-resolves first: if ownership moved on while we were broken
    /// (another session promoted in the meantime), the pending flag is
    /// simply cleared.
    pub async fn retry_promotion(&mut self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Closed => return Err(SessionError::Closed),
            Phase::Deleted => return Err(SessionError::Deleted),
            Phase::Active => {}
        }
        if !self.awaiting_promotion {
            return Ok(());
        }

        let entries = self.ctx.registry.list(&self.key).await;
        let editors: Vec<EditorPresence> = entries.iter().map(|e| e.presence()).collect();
        let resolved = resolve_role(&editors, self.session_id, self.user_id);
        if !resolved.is_owner() {
            self.awaiting_promotion = false;
            self.role = resolved;
            return Ok(());
        }

        self.try_promote().await.map_err(SessionError::from)
    }

    /// Leave the resource. Idempotent: only the first close deregisters.
    /// Unsaved local edits are dropped, by design.
    pub async fn close(&mut self) {
        if self.phase == Phase::Closed {
            return;
        }
        self.phase = Phase::Closed;
        self.ctx.registry.leave(&self.key, self.session_id).await;
        tracing::info!(session_id = %self.session_id, resource = %self.key, "Editing session closed");
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn ensure_writable(&self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Closed => return Err(SessionError::Closed),
            Phase::Deleted => return Err(SessionError::Deleted),
            Phase::Active => {}
        }
        if self.awaiting_promotion {
            return Err(SessionError::ReadOnly(
                "promotion pending, storage was unreachable",
            ));
        }
        if !self.role.is_owner() {
            return Err(SessionError::ReadOnly("another session owns this resource"));
        }
        Ok(())
    }

    /// React to a membership change: re-resolve and promote/demote as
    /// needed.
    async fn handle_membership(&mut self, editors: Vec<EditorPresence>) -> SessionEvent {
        if self.phase == Phase::Deleted {
            // The resource is gone; membership still moves, roles do not.
            return SessionEvent::MembershipChanged { editors };
        }
        if editors.is_empty() {
            // Even our own entry is gone — the registry considers us
            // dead. Claiming ownership of an empty room from here would
            // be phantom ownership; the empty-list owner grant is
            // reserved for sessions that are mid-join.
            tracing::warn!(
                session_id = %self.session_id,
                resource = %self.key,
                "Membership update without our own entry"
            );
            return SessionEvent::MembershipChanged { editors };
        }

        let resolved = resolve_role(&editors, self.session_id, self.user_id);
        match (self.role.is_owner(), resolved.is_owner()) {
            (false, true) => match self.try_promote().await {
                Ok(()) => {
                    tracing::info!(
                        session_id = %self.session_id,
                        resource = %self.key,
                        "Promoted to owner"
                    );
                    SessionEvent::Promoted
                }
                Err(error) => {
                    self.awaiting_promotion = true;
                    tracing::warn!(
                        session_id = %self.session_id,
                        resource = %self.key,
                        error = %error,
                        "Promotion rehydration failed, staying read-only"
                    );
                    SessionEvent::PromotionFailed { error }
                }
            },
            (true, false) => {
                // Should be impossible while our entry lives: joined_at
                // never mutates and entries are only removed.
                tracing::warn!(
                    session_id = %self.session_id,
                    resource = %self.key,
                    "Demoted; our presence entry was pruned as dead"
                );
                self.role = resolved;
                SessionEvent::Demoted
            }
            _ => {
                // Same side of the owner/spectator line; the owner meta
                // a spectator points at may still have changed.
                self.role = resolved;
                SessionEvent::MembershipChanged { editors }
            }
        }
    }

    /// Become the owner, rehydrating first.
    ///
    /// Preference order: the snapshot already mirrored locally from the
    /// departed owner's broadcasts, then a snapshot still stamped in the
    /// registry (a co-owning tab of the same user), then the persisted
    /// resource. In-flight owner edits survive whenever any live copy of
    /// them still exists.
    async fn try_promote(&mut self) -> Result<(), StoreError> {
        if !self.has_snapshot {
            let entries = self.ctx.registry.list(&self.key).await;
            if let Some(state) = entries.iter().find_map(|e| e.form_state.clone()) {
                self.form = state;
                self.has_snapshot = true;
            } else {
                self.form = self.ctx.store.load(&self.key).await?;
            }
        }

        self.role = EditorRole::Owner;
        self.awaiting_promotion = false;

        if self.has_snapshot {
            let stamped = self.form.clone();
            self.ctx
                .registry
                .update_form_state(&self.key, self.session_id, |_| Some(stamped))
                .await;
        }
        Ok(())
    }
}
