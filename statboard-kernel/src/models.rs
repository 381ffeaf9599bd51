use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

/// Un rapport CPU/RAM d'une machine, horodaté par le kernel à la réception.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub key: String,
    pub received_at: OffsetDateTime,
    pub cpu: CpuLoad,
    pub ram: RamUsage,
}

/// Charge CPU en pourcentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuLoad {
    #[serde(deserialize_with = "number_or_string")]
    pub user: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub system: f64,
}

/// Mémoire en mégaoctets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RamUsage {
    #[serde(deserialize_with = "number_or_string")]
    pub total: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub used: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub cached: f64,
}

impl CpuLoad {
    pub fn total(&self) -> f64 {
        self.user + self.system
    }
}

impl RamUsage {
    /// Part utilisée, entre 0 et 1 pour un rapport cohérent.
    pub fn used_ratio(&self) -> f64 {
        self.used / self.total
    }
}

/// Payload envoyé par l'agent (pas d'horodatage côté client)
#[derive(Debug, Deserialize)]
pub struct ReportIn {
    pub key: String,
    pub cpu: CpuLoad,
    pub ram: RamUsage,
}

impl ReportIn {
    pub fn into_report(self, received_at: OffsetDateTime) -> Report {
        Report {
            key: self.key,
            received_at,
            cpu: self.cpu,
            ram: self.ram,
        }
    }
}

// L'agent envoie ses mesures formatées à décimales fixes, donc en chaînes ("12.50")
fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid number {s:?}: {e}"))),
    }
}
