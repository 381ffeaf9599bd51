/**
 * API HTTP STATBOARD - Ingestion des rapports + inspection
 *
 * RÔLE :
 * Point d'entrée réseau du kernel. Les agents poussent leurs mesures en
 * `GET <chemin>?json=<payload échappé>` ; tout chemin non réservé est une ingestion.
 *
 * ROUTES :
 * - GET /health           : liveness
 * - GET /system/health    : état du kernel (uptime, rendus, upkeep)
 * - GET /hosts            : dernier rapport de chaque machine
 * - GET /hosts/{key}      : dernier rapport d'une machine
 * - * (fallback)          : ingestion, GET uniquement
 *
 * RÉPONSES INGESTION :
 * - 200 "Data submitted successfully"
 * - 405 "Method Not Allowed" (aucun effet sur le store)
 * - 400 "Bad Request: ..." si le payload est invalide (aucun effet sur le store)
 */

use axum::extract::{Path, State};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use crate::clock::SharedClock;
use crate::decoder::{decode_report, DecodeError};
use crate::health::{HealthTracker, KernelHealth};
use crate::models::{CpuLoad, RamUsage, Report};
use crate::store::SharedStore;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub clock: SharedClock,
    pub health: HealthTracker,
    pub retention: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    #[error("Bad Request: {0}")]
    Decode(#[from] DecodeError),
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let code = match &self {
            IngestError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            IngestError::Decode(_) => StatusCode::BAD_REQUEST,
        };
        (code, self.to_string()).into_response()
    }
}

#[derive(serde::Serialize)]
struct HostView {
    key: String,
    last_seen: String,       // format RFC3339 pour l'API
    stale: bool,             // true si plus vieux que la rétention
    stale_for_seconds: i64,  // âge en secondes
    cpu: CpuLoad,
    ram: RamUsage,
}

fn to_view(r: &Report, app: &AppState) -> HostView {
    let age = app.clock.now() - r.received_at;
    HostView {
        key: r.key.clone(),
        last_seen: r.received_at.format(&Rfc3339).unwrap_or_default(),
        stale: age > app.retention,
        stale_for_seconds: age.whole_seconds().max(0),
        cpu: r.cpu,
        ram: r.ram,
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/hosts", get(get_hosts))
        .route("/hosts/{key}", get(get_host))
        .fallback(ingest)
        .with_state(app_state)
}

// GET <n'importe quel chemin>?json=...
async fn ingest(
    State(app): State<AppState>,
    method: Method,
    uri: Uri,
) -> Result<&'static str, IngestError> {
    if method != Method::GET {
        warn!("[http] rejected {method} {}", uri.path());
        return Err(IngestError::MethodNotAllowed);
    }

    let report = decode_report(uri.query(), app.clock.as_ref()).map_err(|e| {
        warn!("[http] invalid report on {}: {e}", uri.path());
        IngestError::from(e)
    })?;

    debug!("[http] report from {} (cpu {:.1}%)", report.key, report.cpu.total());
    app.store.ingest(report);
    Ok("Data submitted successfully")
}

// GET /hosts (liste)
async fn get_hosts(State(app): State<AppState>) -> Json<Vec<HostView>> {
    let mut list: Vec<HostView> = app.store.latest_entries().iter().map(|r| to_view(r, &app)).collect();
    list.sort_by(|a, b| a.key.cmp(&b.key));
    Json(list)
}

// GET /hosts/{key} (détail)
async fn get_host(
    State(app): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<HostView>, StatusCode> {
    let Some(r) = app.store.latest(&key) else { return Err(StatusCode::NOT_FOUND); };
    Ok(Json(to_view(&r, &app)))
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.health.get_health(&app.store))
}
