/**
 * AGGREGATOR - Moyennes CPU/RAM par machine pour l'écran e-ink
 *
 * RÔLE : À chaque cycle, lit le journal retenu, calcule par machine la moyenne
 * de (cpu.user + cpu.system) et la moyenne des ratios ram.used/ram.total,
 * formate un tableau texte et le confie au RenderDispatcher.
 *
 * FORMAT :
 *   CPU  RAM  Name
 *    50   25  Solberry
 */

use crate::models::Report;
use crate::render::{RenderDispatcher, RenderError};
use crate::store::Store;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const SUMMARY_HEADER: &str = "CPU  RAM  Name";

#[derive(Debug, Clone, PartialEq)]
pub struct MachineSummary {
    pub key: String,
    pub mean_cpu: f64,
    pub mean_ram_pct: f64,
    pub samples: usize,
}

/// Regroupe le journal par machine, trié par clé.
pub fn summarize(history: &[Report]) -> Vec<MachineSummary> {
    let mut groups: BTreeMap<&str, Vec<&Report>> = BTreeMap::new();
    for report in history {
        groups.entry(report.key.as_str()).or_default().push(report);
    }

    groups
        .into_iter()
        .filter(|(_, reports)| !reports.is_empty())
        .map(|(key, reports)| {
            let n = reports.len() as f64;
            let cpu_sum: f64 = reports.iter().map(|r| r.cpu.total()).sum();
            // moyenne des ratios, pas sum(used)/sum(total)
            let ratio_sum: f64 = reports.iter().map(|r| r.ram.used_ratio()).sum();

            MachineSummary {
                key: key.to_string(),
                mean_cpu: cpu_sum / n,
                mean_ram_pct: ratio_sum / n * 100.0,
                samples: reports.len(),
            }
        })
        .collect()
}

pub fn format_summary(summaries: &[MachineSummary]) -> String {
    let mut lines = Vec::with_capacity(summaries.len() + 1);
    lines.push(SUMMARY_HEADER.to_string());
    for s in summaries {
        lines.push(format!(
            "{:>3}  {:>3}  {}",
            percent(s.mean_cpu),
            percent(s.mean_ram_pct),
            s.key
        ));
    }
    lines.join("\n")
}

fn percent(value: f64) -> i64 {
    value.round() as i64
}

/// Un cycle : lecture (copie) du journal, puis rendu détaché hors verrou.
pub fn run_aggregation_cycle(
    store: &Store,
    dispatcher: &RenderDispatcher,
) -> (String, JoinHandle<Result<(), RenderError>>) {
    let history = store.history_entries();
    let summaries = summarize(&history);
    debug!("[aggregate] {} reports over {} machines", history.len(), summaries.len());
    for s in &summaries {
        debug!("[aggregate] {}: {} sample(s)", s.key, s.samples);
    }

    let text = format_summary(&summaries);
    let handle = dispatcher.dispatch(text.clone());
    (text, handle)
}

pub fn spawn_aggregator(
    store: Arc<Store>,
    dispatcher: Arc<RenderDispatcher>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    info!("[aggregate] rendering every {}s", period.as_secs());

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // le rendu part en tâche détachée, on n'attend pas le handle
                    let _ = run_aggregation_cycle(&store, &dispatcher);
                }
                _ = cancel.cancelled() => {
                    info!("[aggregate] stopped");
                    break;
                }
            }
        }
    })
}
