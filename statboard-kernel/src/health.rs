use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use crate::store::Store;

#[derive(Debug, Serialize, Deserialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub machines_tracked: u32,
    pub machines: Vec<String>,
    pub history_len: u32,
    pub renders_ok: u64,
    pub renders_failed: u64,
    pub last_render: String,
    pub last_upkeep_removed: u64,
    pub memory_usage_mb: f32,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    renders_ok: Arc<AtomicU64>,
    renders_failed: Arc<AtomicU64>,
    last_upkeep_removed: Arc<AtomicU64>,
    last_render: Arc<parking_lot::Mutex<String>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            renders_ok: Arc::new(AtomicU64::new(0)),
            renders_failed: Arc::new(AtomicU64::new(0)),
            last_upkeep_removed: Arc::new(AtomicU64::new(0)),
            last_render: Arc::new(parking_lot::Mutex::new("pending".to_string())),
        }
    }

    pub fn record_render_ok(&self) {
        self.renders_ok.fetch_add(1, Ordering::Relaxed);
        *self.last_render.lock() = "ok".to_string();
    }

    pub fn record_render_failure(&self, reason: &str) {
        self.renders_failed.fetch_add(1, Ordering::Relaxed);
        *self.last_render.lock() = format!("failed: {reason}");
    }

    pub fn record_upkeep(&self, removed: usize) {
        self.last_upkeep_removed.store(removed as u64, Ordering::Relaxed);
    }

    pub fn renders(&self) -> (u64, u64) {
        (
            self.renders_ok.load(Ordering::Relaxed),
            self.renders_failed.load(Ordering::Relaxed),
        )
    }

    pub fn get_health(&self, store: &Store) -> KernelHealth {
        let machines = store.snapshot_keys();
        let (_, history) = store.sizes();
        let (renders_ok, renders_failed) = self.renders();

        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            machines_tracked: machines.len() as u32,
            machines,
            history_len: history as u32,
            renders_ok,
            renders_failed,
            last_render: self.last_render.lock().clone(),
            last_upkeep_removed: self.last_upkeep_removed.load(Ordering::Relaxed),
            memory_usage_mb: get_memory_usage_mb(),
        }
    }
}

fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let rss_kb = status
                .lines()
                .find(|line| line.starts_with("VmRSS:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok());
            if let Some(kb) = rss_kb {
                return (kb as f32) / 1024.0; // KB -> MB
            }
        }
    }

    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_counters() {
        let tracker = HealthTracker::new();
        tracker.record_render_failure("timed out");
        tracker.record_render_ok();
        tracker.record_upkeep(7);

        let health = tracker.get_health(&Store::new());
        assert_eq!(health.renders_ok, 1);
        assert_eq!(health.renders_failed, 1);
        assert_eq!(health.last_render, "ok");
        assert_eq!(health.last_upkeep_removed, 7);
        assert_eq!(health.machines_tracked, 0);
    }
}
