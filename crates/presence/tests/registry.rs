//! Integration tests for `PresenceRegistry`.
//!
//! These exercise the membership table directly, without any transport:
//! join/leave idempotency, liveness-filtered reads, membership-change
//! notifications, and form-state stamping.

use std::sync::Arc;

use assert_matches::assert_matches;
use atelier_core::messages::CollabMessage;
use atelier_core::types::ResourceKey;
use atelier_events::{Topic, TopicBus};
use atelier_presence::{ManualLiveness, PresenceRegistry};

fn setup() -> (Arc<TopicBus>, PresenceRegistry) {
    let bus = Arc::new(TopicBus::default());
    let registry = PresenceRegistry::new(bus.clone());
    (bus, registry)
}

// ---------------------------------------------------------------------------
// Test: join registers an entry and list returns it
// ---------------------------------------------------------------------------

#[tokio::test]
async fn join_registers_entry() {
    let (_bus, registry) = setup();
    let key = ResourceKey::record(42);
    let session = uuid::Uuid::new_v4();

    registry.join(&key, session, 7, ManualLiveness::alive()).await;

    let entries = registry.list(&key).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].session_id, session);
    assert_eq!(entries[0].user_id, 7);
    assert!(entries[0].form_state.is_none());
}

// ---------------------------------------------------------------------------
// Test: join publishes a presence.update on the resource's topic
// ---------------------------------------------------------------------------

#[tokio::test]
async fn join_publishes_presence_update() {
    let (bus, registry) = setup();
    let key = ResourceKey::schema(3);
    let mut rx = bus.subscribe(&Topic::presence(key.clone())).await;

    let session = uuid::Uuid::new_v4();
    registry.join(&key, session, 9, ManualLiveness::alive()).await;

    let env = rx.recv().await.expect("join should notify subscribers");
    assert!(env.source_tag.is_none());
    assert_matches!(
        env.message,
        CollabMessage::PresenceUpdate { resource_id: 3, ref editors, .. } if editors.len() == 1
            && editors[0].session_id == session
    );
}

// ---------------------------------------------------------------------------
// Test: duplicate join replaces the entry and keeps joined_at
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejoin_of_live_session_preserves_joined_at() {
    let (_bus, registry) = setup();
    let key = ResourceKey::record(1);
    let session = uuid::Uuid::new_v4();

    let first = registry.join(&key, session, 5, ManualLiveness::alive()).await;
    let second = registry.join(&key, session, 5, ManualLiveness::alive()).await;

    assert_eq!(first, second, "reconnect must not reset joined_at");
    let entries = registry.list(&key).await;
    assert_eq!(entries.len(), 1, "re-join must replace, not duplicate");
    assert_eq!(entries[0].joined_at, first);
}

// ---------------------------------------------------------------------------
// Test: re-join over a dead entry is a fresh join
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejoin_over_dead_entry_gets_fresh_timestamp() {
    let (_bus, registry) = setup();
    let key = ResourceKey::record(1);
    let session = uuid::Uuid::new_v4();

    let liveness = ManualLiveness::alive();
    let first = registry.join(&key, session, 5, liveness.clone()).await;
    liveness.kill();

    let second = registry.join(&key, session, 5, ManualLiveness::alive()).await;
    assert!(second > first, "a dead entry's timestamp must not be inherited");
}

// ---------------------------------------------------------------------------
// Test: leave removes the entry; the last leave drops the resource
// ---------------------------------------------------------------------------

#[tokio::test]
async fn leave_removes_entry_and_empty_resource() {
    let (_bus, registry) = setup();
    let key = ResourceKey::record(8);
    let session = uuid::Uuid::new_v4();

    registry.join(&key, session, 2, ManualLiveness::alive()).await;
    assert_eq!(registry.resource_count().await, 1);

    registry.leave(&key, session).await;
    assert!(registry.list(&key).await.is_empty());
    assert_eq!(registry.resource_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: leave without a join is a silent no-op
// ---------------------------------------------------------------------------

#[tokio::test]
async fn leave_without_join_is_noop() {
    let (bus, registry) = setup();
    let key = ResourceKey::record(8);
    let mut rx = bus.subscribe(&Topic::presence(key.clone())).await;

    registry.leave(&key, uuid::Uuid::new_v4()).await;

    assert!(rx.try_recv().is_err(), "a no-op leave must not notify");
}

// ---------------------------------------------------------------------------
// Test: list drops entries whose session silently died
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_prunes_dead_entries_without_leave() {
    let (bus, registry) = setup();
    let key = ResourceKey::schema(4);

    let dead_liveness = ManualLiveness::alive();
    let dead_session = uuid::Uuid::new_v4();
    let live_session = uuid::Uuid::new_v4();
    registry.join(&key, dead_session, 1, dead_liveness.clone()).await;
    registry.join(&key, live_session, 2, ManualLiveness::alive()).await;

    let mut rx = bus.subscribe(&Topic::presence(key.clone())).await;
    dead_liveness.kill();

    let entries = registry.list(&key).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].session_id, live_session);

    // Pruning a dead entry is a membership change like any other.
    let env = rx.recv().await.expect("prune should notify subscribers");
    assert_matches!(
        env.message,
        CollabMessage::PresenceUpdate { ref editors, .. } if editors.len() == 1
            && editors[0].session_id == live_session
    );
}

// ---------------------------------------------------------------------------
// Test: list returns entries ascending by joined_at
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_is_ordered_by_join_time() {
    let (_bus, registry) = setup();
    let key = ResourceKey::record(6);

    let first = uuid::Uuid::new_v4();
    let second = uuid::Uuid::new_v4();
    let third = uuid::Uuid::new_v4();
    registry.join(&key, first, 1, ManualLiveness::alive()).await;
    registry.join(&key, second, 2, ManualLiveness::alive()).await;
    registry.join(&key, third, 3, ManualLiveness::alive()).await;

    let order: Vec<_> = registry
        .list(&key)
        .await
        .iter()
        .map(|e| e.session_id)
        .collect();
    assert_eq!(order, vec![first, second, third]);
}

// ---------------------------------------------------------------------------
// Test: update_form_state stamps the entry without notifying
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_form_state_is_silent() {
    let (bus, registry) = setup();
    let key = ResourceKey::record(2);
    let session = uuid::Uuid::new_v4();
    registry.join(&key, session, 1, ManualLiveness::alive()).await;

    let mut rx = bus.subscribe(&Topic::presence(key.clone())).await;
    registry
        .update_form_state(&key, session, |_| Some(serde_json::json!({"title": "Hello"})))
        .await;

    let entries = registry.list(&key).await;
    assert_eq!(
        entries[0].form_state,
        Some(serde_json::json!({"title": "Hello"}))
    );
    assert!(rx.try_recv().is_err(), "form-state updates must not notify");
}

// ---------------------------------------------------------------------------
// Test: update_form_state for an unknown session is a no-op
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_form_state_unknown_session_is_noop() {
    let (_bus, registry) = setup();
    let key = ResourceKey::record(2);

    registry
        .update_form_state(&key, uuid::Uuid::new_v4(), |_| Some(serde_json::json!({})))
        .await;

    assert!(registry.list(&key).await.is_empty());
}

// ---------------------------------------------------------------------------
// Test: sweep prunes every dead entry and notifies per resource
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sweep_prunes_across_resources() {
    let (bus, registry) = setup();
    let key_a = ResourceKey::record(1);
    let key_b = ResourceKey::schema(2);

    let dying_a = ManualLiveness::alive();
    let dying_b = ManualLiveness::alive();
    let survivor = uuid::Uuid::new_v4();
    registry.join(&key_a, uuid::Uuid::new_v4(), 1, dying_a.clone()).await;
    registry.join(&key_a, survivor, 2, ManualLiveness::alive()).await;
    registry.join(&key_b, uuid::Uuid::new_v4(), 3, dying_b.clone()).await;

    let mut rx_a = bus.subscribe(&Topic::presence(key_a.clone())).await;
    let mut rx_b = bus.subscribe(&Topic::presence(key_b.clone())).await;

    dying_a.kill();
    dying_b.kill();
    let pruned = registry.sweep().await;
    assert_eq!(pruned, 2);

    // key_a keeps its survivor; key_b is gone entirely.
    assert_eq!(registry.resource_count().await, 1);

    let env = rx_a.recv().await.expect("key_a subscribers should be notified");
    assert_matches!(
        env.message,
        CollabMessage::PresenceUpdate { ref editors, .. } if editors.len() == 1
            && editors[0].session_id == survivor
    );
    let env = rx_b.recv().await.expect("key_b subscribers should be notified");
    assert_matches!(
        env.message,
        CollabMessage::PresenceUpdate { ref editors, .. } if editors.is_empty()
    );
}

// ---------------------------------------------------------------------------
// Test: the sweeper task prunes on its own schedule
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn sweeper_task_prunes_periodically() {
    let (_bus, registry) = setup();
    let registry = Arc::new(registry);
    let key = ResourceKey::record(11);

    let liveness = ManualLiveness::alive();
    registry
        .join(&key, uuid::Uuid::new_v4(), 1, liveness.clone())
        .await;

    let handle = atelier_presence::start_sweeper(registry.clone());
    liveness.kill();

    // One full sweep interval passes (virtual time).
    tokio::time::sleep(std::time::Duration::from_secs(
        atelier_core::collaboration::PRESENCE_SWEEP_INTERVAL_SECS + 1,
    ))
    .await;

    assert_eq!(registry.resource_count().await, 0);
    handle.abort();
}

// ---------------------------------------------------------------------------
// Test: resources are isolated from each other
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resources_are_isolated() {
    let (_bus, registry) = setup();
    let key_a = ResourceKey::record(1);
    let key_b = ResourceKey::record(2);
    let session = uuid::Uuid::new_v4();

    registry.join(&key_a, session, 1, ManualLiveness::alive()).await;

    assert_eq!(registry.list(&key_a).await.len(), 1);
    assert!(registry.list(&key_b).await.is_empty());

    // Leaving B must not disturb A.
    registry.leave(&key_b, session).await;
    assert_eq!(registry.list(&key_a).await.len(), 1);
}
