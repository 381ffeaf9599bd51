/**
 * STATBOARD KERNEL - Point d'entrée principal du serveur Statboard
 *
 * RÔLE : Orchestration de tous les modules : config, store, upkeep, agrégation,
 * rendu e-ink, HTTP. Bootstrap du système complet avec gestion d'erreurs et logging.
 *
 * ARCHITECTURE : Ingestion HTTP push → store mémoire ; deux timers indépendants
 * (upkeep = purge, agrégation = moyennes → écran).
 */

mod aggregate;
mod clock;
mod config;
mod decoder;
mod health;
mod http;
mod models;
mod render;
mod store;
mod upkeep;

use crate::clock::{SharedClock, SystemClock};
use crate::config::{load_config, KernelConfig};
use crate::health::HealthTracker;
use crate::http::AppState;
use crate::render::{CommandRenderer, LogRenderer, RenderDispatcher, Renderer};
use crate::store::Store;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn build_renderer(cfg: &KernelConfig) -> Result<Arc<dyn Renderer>> {
    match cfg.render_command() {
        Some(cmd) => {
            info!("[kernel] display command: {cmd}");
            let renderer = CommandRenderer::from_command_line(cmd)?;
            Ok(Arc::new(renderer))
        }
        None => {
            warn!("[kernel] no display command configured, summaries go to the log only");
            Ok(Arc::new(LogRenderer))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("statboard_kernel=info")),
        )
        .init();

    let cfg = load_config().await.context("failed to load kernel config")?;

    // état partagé, vide au démarrage
    let store = Store::shared();
    let clock: SharedClock = Arc::new(SystemClock);
    let health = HealthTracker::new();
    let cancel = CancellationToken::new();

    let dispatcher = Arc::new(RenderDispatcher::new(
        build_renderer(&cfg)?,
        cfg.render_timeout(),
        health.clone(),
    ));

    let upkeep = upkeep::spawn_upkeep(
        store.clone(),
        clock.clone(),
        health.clone(),
        cfg.retention(),
        cfg.upkeep_period(),
        cancel.clone(),
    );
    let aggregator = aggregate::spawn_aggregator(
        store.clone(),
        dispatcher,
        cfg.render_period(),
        cancel.clone(),
    );

    let app = http::build_router(AppState {
        store,
        clock,
        health,
        retention: cfg.retention(),
    });

    let listener = TcpListener::bind(cfg.listen)
        .await
        .with_context(|| format!("failed to bind {}", cfg.listen))?;
    info!("[kernel] listening on http://{}", cfg.listen);

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("[kernel] cannot listen for ctrl-c: {e}");
            return;
        }
        info!("[kernel] shutting down");
        shutdown.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .await
        .context("HTTP server failed")?;

    let (upkeep, aggregator) = tokio::join!(upkeep, aggregator);
    check_task_exit("upkeep", upkeep);
    check_task_exit("aggregator", aggregator);
    Ok(())
}

/// Log une tâche de fond terminée en panique ; true si elle s'est arrêtée proprement.
fn check_task_exit(name: &str, outcome: Result<(), JoinError>) -> bool {
    match outcome {
        Ok(()) => true,
        Err(e) => {
            error!("[kernel] {name} task ended abnormally: {e}");
            false
        }
    }
}
