use crate::clock::SharedClock;
use crate::health::HealthTracker;
use crate::store::{EvictionStats, Store};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Une passe d'upkeep : "maintenant" est lu une seule fois, puis tout rapport
/// strictement plus vieux que `retention` est purgé.
pub fn run_upkeep(store: &Store, clock: &SharedClock, retention: Duration) -> EvictionStats {
    let now = clock.now();
    // rétention hors de la plage des dates : aucun rapport ne peut être aussi vieux
    let Some(cutoff) = time::Duration::try_from(retention)
        .ok()
        .and_then(|retention| now.checked_sub(retention))
    else {
        warn!("[upkeep] retention of {}s reaches before any date, nothing to evict", retention.as_secs());
        return EvictionStats::default();
    };
    let (machines_before, history_before) = store.sizes();

    let stats = store.evict_older_than(cutoff);

    let (machines_after, history_after) = store.sizes();
    debug!(
        "[upkeep] machines {machines_before} -> {machines_after}, history {history_before} -> {history_after}"
    );
    if stats.total() > 0 {
        info!(
            "[upkeep] evicted {} machine(s) and {} report(s) older than {}s",
            stats.latest_removed,
            stats.history_removed,
            retention.as_secs()
        );
    }
    stats
}

pub fn spawn_upkeep(
    store: Arc<Store>,
    clock: SharedClock,
    health: HealthTracker,
    retention: Duration,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    info!("[upkeep] purging every {}s (retention {}s)", period.as_secs(), retention.as_secs());

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let stats = run_upkeep(&store, &clock, retention);
                    health.record_upkeep(stats.total());
                }
                _ = cancel.cancelled() => {
                    info!("[upkeep] stopped");
                    break;
                }
            }
        }
    })
}
