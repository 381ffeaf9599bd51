/**
 * STORE - État mémoire des rapports machines
 *
 * RÔLE : Garde le dernier rapport par machine (latest) et le journal
 * chronologique de tous les rapports retenus (history).
 *
 * FONCTIONNEMENT :
 * - Un seul mutex parking_lot protège les deux structures : chaque opération
 *   est atomique vis-à-vis des autres (ingestion, upkeep, agrégation)
 * - Les lectures renvoient des copies : aucun verrou ne sort du module
 * - Pas de persistance : l'état naît vide et meurt avec le process
 */

use crate::models::Report;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;

pub type SharedStore = Arc<Store>;

#[derive(Debug, Default)]
struct Inner {
    latest: HashMap<String, Report>,
    history: Vec<Report>,
}

impl Inner {
    /// Remplace le rapport courant de la machine (ou l'insère).
    fn upsert_latest(&mut self, report: Report) {
        self.latest.insert(report.key.clone(), report);
    }

    /// Ajoute en fin de journal.
    fn append_history(&mut self, report: Report) {
        self.history.push(report);
    }
}

/// Résultat d'une passe d'éviction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionStats {
    pub latest_removed: usize,
    pub history_removed: usize,
}

impl EvictionStats {
    pub fn total(&self) -> usize {
        self.latest_removed + self.history_removed
    }
}

#[derive(Debug, Default)]
pub struct Store {
    inner: Mutex<Inner>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }

    /// upsert + append sous la même prise de verrou
    pub fn ingest(&self, report: Report) {
        let mut inner = self.inner.lock();
        inner.append_history(report.clone());
        inner.upsert_latest(report);
    }

    /// Retire tout rapport reçu strictement avant `cutoff`, dans les deux structures.
    pub fn evict_older_than(&self, cutoff: OffsetDateTime) -> EvictionStats {
        let mut inner = self.inner.lock();

        let latest_before = inner.latest.len();
        inner.latest.retain(|_, report| report.received_at >= cutoff);

        let history_before = inner.history.len();
        inner.history.retain(|report| report.received_at >= cutoff);

        EvictionStats {
            latest_removed: latest_before - inner.latest.len(),
            history_removed: history_before - inner.history.len(),
        }
    }

    /// Machines suivies, triées par clé
    pub fn snapshot_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.lock().latest.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn history_entries(&self) -> Vec<Report> {
        self.inner.lock().history.clone()
    }

    pub fn latest(&self, key: &str) -> Option<Report> {
        self.inner.lock().latest.get(key).cloned()
    }

    pub fn latest_entries(&self) -> Vec<Report> {
        self.inner.lock().latest.values().cloned().collect()
    }

    /// (machines suivies, longueur du journal)
    pub fn sizes(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        (inner.latest.len(), inner.history.len())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{CpuLoad, RamUsage};
    use time::macros::datetime;
    use time::Duration;

    pub(crate) fn report(key: &str, received_at: OffsetDateTime, cpu_sum: f64, used: f64, total: f64) -> Report {
        Report {
            key: key.to_string(),
            received_at,
            cpu: CpuLoad { user: cpu_sum, system: 0.0 },
            ram: RamUsage { total, used, cached: 0.0 },
        }
    }

    const T0: OffsetDateTime = datetime!(2024-03-01 12:00 UTC);

    #[test]
    fn test_same_key_replaces_latest_but_keeps_history() {
        let store = Store::new();
        let r1 = report("alpha", T0, 10.0, 1.0, 4.0);
        let r2 = report("alpha", T0 + Duration::seconds(5), 20.0, 2.0, 4.0);

        store.ingest(r1.clone());
        store.ingest(r2.clone());

        assert_eq!(store.latest("alpha"), Some(r2.clone()));
        assert_eq!(store.snapshot_keys(), vec!["alpha".to_string()]);
        assert_eq!(store.history_entries(), vec![r1, r2]);
    }

    #[test]
    fn test_individual_operations() {
        let store = Store::new();
        let r = report("beta", T0, 1.0, 1.0, 2.0);

        store.inner.lock().append_history(r.clone());
        assert!(store.snapshot_keys().is_empty());
        assert_eq!(store.history_entries().len(), 1);

        store.inner.lock().upsert_latest(r.clone());
        assert_eq!(store.latest_entries(), vec![r]);
        assert_eq!(store.sizes(), (1, 1));
    }

    #[test]
    fn test_eviction_boundary_is_exclusive() {
        let store = Store::new();
        let cutoff = T0;
        store.ingest(report("old", cutoff - Duration::milliseconds(1), 0.0, 1.0, 2.0));
        store.ingest(report("edge", cutoff, 0.0, 1.0, 2.0));
        store.ingest(report("new", cutoff + Duration::seconds(1), 0.0, 1.0, 2.0));

        let stats = store.evict_older_than(cutoff);

        assert_eq!(stats, EvictionStats { latest_removed: 1, history_removed: 1 });
        assert_eq!(store.snapshot_keys(), vec!["edge".to_string(), "new".to_string()]);
        assert!(store.history_entries().iter().all(|r| r.received_at >= cutoff));
        assert_eq!(store.history_entries().len(), 2);
    }

    #[test]
    fn test_history_evicted_independently_of_latest() {
        let store = Store::new();
        store.ingest(report("alpha", T0, 0.0, 1.0, 2.0));
        store.ingest(report("alpha", T0 + Duration::seconds(60), 0.0, 1.0, 2.0));

        let stats = store.evict_older_than(T0 + Duration::seconds(30));

        // latest garde le rapport récent, history perd l'ancien
        assert_eq!(stats, EvictionStats { latest_removed: 0, history_removed: 1 });
        assert_eq!(store.sizes(), (1, 1));
        assert_eq!(stats.total(), 1);
    }

    #[test]
    fn test_concurrent_ingest_and_evict() {
        let store = Store::shared();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for n in 0..250 {
                        let at = T0 + Duration::seconds(n);
                        store.ingest(report(&format!("host-{i}"), at, 0.0, 1.0, 2.0));
                        if n % 50 == 0 {
                            store.evict_older_than(T0);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.sizes(), (4, 1000));
    }
}
