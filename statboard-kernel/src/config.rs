use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

pub const CONFIG_ENV: &str = "STATBOARD_KERNEL_CONFIG";
pub const SUMMARY_PLACEHOLDER: &str = "{summary}";
/// Plafond des durées configurables (30 jours)
pub const MAX_DURATION_SECS: u64 = 30 * 24 * 3600;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("invalid YAML in {path}: {source}")]
    Parse { path: String, source: serde_yaml::Error },
    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct KernelConfig {
    pub listen: SocketAddr,
    /// Âge max d'un rapport avant purge
    pub retention_secs: u64,
    pub upkeep_period_secs: u64,
    pub render_period_secs: u64,
    pub render: RenderConf,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderConf {
    pub command: Option<String>, // ex: "python display.py -t{summary}"
    pub timeout_secs: u64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 1234)),
            retention_secs: 120,
            upkeep_period_secs: 30,
            render_period_secs: 120,
            render: RenderConf::default(),
        }
    }
}

impl Default for RenderConf {
    fn default() -> Self {
        Self {
            command: Some(format!("python display.py -t{SUMMARY_PLACEHOLDER}")),
            timeout_secs: 30,
        }
    }
}

impl KernelConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn upkeep_period(&self) -> Duration {
        Duration::from_secs(self.upkeep_period_secs)
    }

    pub fn render_period(&self) -> Duration {
        Duration::from_secs(self.render_period_secs)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render.timeout_secs)
    }

    /// Commande de rendu, None si vide ou absente (rendu dans les logs seulement)
    pub fn render_command(&self) -> Option<&str> {
        self.render
            .command
            .as_deref()
            .map(str::trim)
            .filter(|cmd| !cmd.is_empty())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("retention_secs", self.retention_secs),
            ("upkeep_period_secs", self.upkeep_period_secs),
            ("render_period_secs", self.render_period_secs),
            ("render.timeout_secs", self.render.timeout_secs),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
        }
        if let Some((name, secs)) = durations.iter().find(|(_, secs)| *secs > MAX_DURATION_SECS) {
            return Err(ConfigError::Invalid(format!(
                "{name} = {secs} exceeds the {MAX_DURATION_SECS}s limit"
            )));
        }

        if let Some(cmd) = self.render_command() {
            let argv = shell_words::split(cmd)
                .map_err(|e| ConfigError::Invalid(format!("render.command: {e}")))?;
            if argv.is_empty() {
                return Err(ConfigError::Invalid("render.command is empty".into()));
            }
        }
        Ok(())
    }
}

/// Charge la config depuis `$STATBOARD_KERNEL_CONFIG` (défaut: kernel.yaml).
pub async fn load_config() -> Result<KernelConfig, ConfigError> {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| "kernel.yaml".into());
    load_config_from(&path).await
}

pub async fn load_config_from(path: &str) -> Result<KernelConfig, ConfigError> {
    let cfg = if Path::new(path).exists() {
        let txt = fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        if txt.trim().is_empty() {
            KernelConfig::default()
        } else {
            serde_yaml::from_str(&txt).map_err(|source| ConfigError::Parse {
                path: path.to_string(),
                source,
            })?
        }
    } else {
        warn!("[kernel] no {path}, using default config");
        KernelConfig::default()
    };

    cfg.validate()?;
    info!(
        "[kernel] config: retention {}s, upkeep every {}s, render every {}s",
        cfg.retention_secs, cfg.upkeep_period_secs, cfg.render_period_secs
    );
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let cfg = load_config_from("/nonexistent/statboard/kernel.yaml").await.unwrap();
        assert_eq!(cfg, KernelConfig::default());
        assert_eq!(cfg.listen.port(), 1234);
        assert_eq!(cfg.retention(), Duration::from_secs(120));
        assert_eq!(cfg.render_command(), Some("python display.py -t{summary}"));
    }

    #[tokio::test]
    async fn test_partial_yaml_keeps_other_defaults() {
        let file = write_config("retention_secs: 300\nrender:\n  timeout_secs: 5\n");
        let cfg = load_config_from(file.path().to_str().unwrap()).await.unwrap();

        assert_eq!(cfg.retention_secs, 300);
        assert_eq!(cfg.upkeep_period_secs, 30);
        assert_eq!(cfg.render_timeout(), Duration::from_secs(5));
        assert!(cfg.render_command().is_some());
    }

    #[tokio::test]
    async fn test_empty_command_means_log_only() {
        let file = write_config("render:\n  command: \"  \"\n");
        let cfg = load_config_from(file.path().to_str().unwrap()).await.unwrap();
        assert_eq!(cfg.render_command(), None);
    }

    #[tokio::test]
    async fn test_zero_period_rejected() {
        let file = write_config("upkeep_period_secs: 0\n");
        let err = load_config_from(file.path().to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_out_of_range_retention_rejected() {
        let file = write_config("retention_secs: 1000000000000\n");
        let err = load_config_from(file.path().to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("retention_secs")));
    }

    #[test]
    fn test_duration_limit_is_inclusive() {
        let mut cfg = KernelConfig::default();
        cfg.upkeep_period_secs = MAX_DURATION_SECS;
        assert!(cfg.validate().is_ok());
        cfg.render_period_secs = MAX_DURATION_SECS + 1;
        assert!(cfg.validate().is_err());
    }

    #[tokio::test]
    async fn test_invalid_yaml_rejected() {
        let file = write_config("retention_secs: [not, a, number]\n");
        let err = load_config_from(file.path().to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_unbalanced_quotes_in_command_rejected() {
        let mut cfg = KernelConfig::default();
        cfg.render.command = Some("python \"display.py".into());
        assert!(cfg.validate().is_err());
    }
}
