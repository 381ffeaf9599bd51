/**
 * RENDER DISPATCHER - Passage du résumé au processus d'affichage e-ink
 *
 * RÔLE : Lance le rendu externe dans une tâche détachée, bornée par un timeout,
 * sans jamais tenir le verrou du store.
 *
 * FONCTIONNEMENT :
 * - Renderer = trait du collaborateur externe (commande, ou simple log)
 * - Un échec (spawn, code retour, timeout) est loggé et compté, jamais fatal
 * - Pas de retry : le cycle d'agrégation suivant retentera naturellement
 * - Si le rendu précédent tourne encore au cycle suivant, il est annulé
 */

use crate::config::{ConfigError, SUMMARY_PLACEHOLDER};
use crate::health::HealthTracker;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn { program: String, source: std::io::Error },
    #[error("renderer exited with code {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },
    #[error("renderer timed out after {0:?}")]
    Timeout(Duration),
}

/// Collaborateur externe qui affiche physiquement le résumé.
pub trait Renderer: Send + Sync {
    fn render<'a>(&'a self, summary: &'a str) -> BoxFuture<'a, Result<(), RenderError>>;
}

/// Lance une commande (découpée façon shell, sans shell) où `{summary}` est remplacé par le texte.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    argv: Vec<String>,
}

impl CommandRenderer {
    pub fn from_command_line(command: &str) -> Result<Self, ConfigError> {
        let argv = shell_words::split(command)
            .map_err(|e| ConfigError::Invalid(format!("render.command: {e}")))?;
        if argv.is_empty() {
            return Err(ConfigError::Invalid("render.command is empty".into()));
        }
        Ok(Self { argv })
    }

    fn argv_for(&self, summary: &str) -> Vec<String> {
        self.argv
            .iter()
            .map(|arg| arg.replace(SUMMARY_PLACEHOLDER, summary))
            .collect()
    }

    async fn run(&self, summary: &str) -> Result<(), RenderError> {
        let argv = self.argv_for(summary);
        let Some((program, args)) = argv.split_first() else {
            return Err(RenderError::Spawn {
                program: String::new(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            });
        };

        debug!("[render] running {program}");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| RenderError::Spawn { program: program.clone(), source })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(RenderError::Exit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl Renderer for CommandRenderer {
    fn render<'a>(&'a self, summary: &'a str) -> BoxFuture<'a, Result<(), RenderError>> {
        self.run(summary).boxed()
    }
}

/// Pas d'écran configuré : le résumé part dans les logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRenderer;

impl Renderer for LogRenderer {
    fn render<'a>(&'a self, summary: &'a str) -> BoxFuture<'a, Result<(), RenderError>> {
        async move {
            info!("[render] display output:\n{summary}");
            Ok(())
        }
        .boxed()
    }
}

pub struct RenderDispatcher {
    renderer: Arc<dyn Renderer>,
    timeout: Duration,
    health: HealthTracker,
    in_flight: Mutex<Option<AbortHandle>>,
}

impl RenderDispatcher {
    pub fn new(renderer: Arc<dyn Renderer>, timeout: Duration, health: HealthTracker) -> Self {
        Self {
            renderer,
            timeout,
            health,
            in_flight: Mutex::new(None),
        }
    }

    /// Lance le rendu en tâche détachée. Le handle n'a pas besoin d'être attendu.
    pub fn dispatch(&self, summary: String) -> JoinHandle<Result<(), RenderError>> {
        let renderer = self.renderer.clone();
        let health = self.health.clone();
        let timeout = self.timeout;

        info!("[render] writing to display:\n{summary}");
        let handle = tokio::spawn(async move {
            let mut guard = AbortGuard { health: health.clone(), settled: false };
            let result = match tokio::time::timeout(timeout, renderer.render(&summary)).await {
                Ok(result) => result,
                Err(_) => Err(RenderError::Timeout(timeout)),
            };
            // plus aucun point d'attente : l'issue ne peut plus être annulée
            guard.settled = true;

            match &result {
                Ok(()) => {
                    health.record_render_ok();
                    debug!("[render] display updated");
                }
                Err(e) => {
                    health.record_render_failure(&e.to_string());
                    error!("[render] something went wrong writing to the display: {e}");
                }
            }
            result
        });

        let previous = self.in_flight.lock().replace(handle.abort_handle());
        if let Some(previous) = previous {
            if !previous.is_finished() {
                warn!("[render] previous render still running, aborting it");
            }
            // sans effet si le rendu vient de se terminer ; l'échec est compté par AbortGuard
            previous.abort();
        }

        handle
    }
}

/// Compte un échec si la tâche de rendu est abandonnée avant d'avoir conclu.
struct AbortGuard {
    health: HealthTracker,
    settled: bool,
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if !self.settled {
            self.health.record_render_failure("aborted by next cycle");
        }
    }
}
