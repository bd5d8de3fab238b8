use std::sync::Arc;
use std::time::Duration;

use atelier_core::collaboration::PRESENCE_SWEEP_INTERVAL_SECS;

use crate::registry::PresenceRegistry;

/// Spawn a background task that periodically prunes dead presence
/// entries across all resources.
///
/// Reads already prune lazily; the sweeper exists so that a resource
/// nobody is actively reading still converges, bounding the window in
/// which a silently-dead owner stays visible. The returned `JoinHandle`
/// should be aborted on shutdown.
pub fn start_sweeper(registry: Arc<PresenceRegistry>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(PRESENCE_SWEEP_INTERVAL_SECS));

        loop {
            interval.tick().await;
            let pruned = registry.sweep().await;
            if pruned > 0 {
                tracing::debug!(pruned, "Presence sweep");
            }
        }
    })
}
