/*!
Builder de payloads d'ingestion

L'agent envoie `GET <target>?json=<JSON échappé>`, avec la charge CPU à
2 décimales et la RAM (Mo) sans décimale, formatées en chaînes.
*/

use serde_json::{json, Map, Value};

pub const DEFAULT_TARGET: &str = "/report";
const DECIMALS_CPU: usize = 2;
const DECIMALS_RAM: usize = 0;

/// Construit un rapport tel que l'agent le pousserait.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    key: Option<String>,
    cpu: Option<(f64, f64)>,
    ram: Option<(f64, f64, f64)>,
    fixed_decimals: bool,
}

impl ReportBuilder {
    /// Rapport valide par défaut : CPU à 0, 1024 Mo dont 512 utilisés.
    pub fn new<S: Into<String>>(key: S) -> Self {
        Self {
            key: Some(key.into()),
            cpu: Some((0.0, 0.0)),
            ram: Some((1024.0, 512.0, 256.0)),
            fixed_decimals: false,
        }
    }

    pub fn cpu(mut self, user: f64, system: f64) -> Self {
        self.cpu = Some((user, system));
        self
    }

    pub fn ram(mut self, total: f64, used: f64, cached: f64) -> Self {
        self.ram = Some((total, used, cached));
        self
    }

    /// Mesures en chaînes à décimales fixes, comme l'agent réel
    pub fn fixed_decimals(mut self) -> Self {
        self.fixed_decimals = true;
        self
    }

    pub fn without_key(mut self) -> Self {
        self.key = None;
        self
    }

    pub fn without_cpu(mut self) -> Self {
        self.cpu = None;
        self
    }

    pub fn without_ram(mut self) -> Self {
        self.ram = None;
        self
    }

    fn number(&self, value: f64, decimals: usize) -> Value {
        if self.fixed_decimals {
            Value::String(format!("{value:.decimals$}"))
        } else {
            json!(value)
        }
    }

    /// Le payload JSON, avant échappement
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        if let Some(key) = &self.key {
            obj.insert("key".into(), json!(key));
        }
        if let Some((user, system)) = self.cpu {
            obj.insert(
                "cpu".into(),
                json!({
                    "user": self.number(user, DECIMALS_CPU),
                    "system": self.number(system, DECIMALS_CPU),
                }),
            );
        }
        if let Some((total, used, cached)) = self.ram {
            obj.insert(
                "ram".into(),
                json!({
                    "total": self.number(total, DECIMALS_RAM),
                    "used": self.number(used, DECIMALS_RAM),
                    "cached": self.number(cached, DECIMALS_RAM),
                }),
            );
        }
        Value::Object(obj)
    }

    /// `json=<payload échappé>`
    pub fn query(&self) -> String {
        format!("json={}", urlencoding::encode(&self.to_json().to_string()))
    }

    /// `/report?json=<payload échappé>`
    pub fn path(&self) -> String {
        format!("{DEFAULT_TARGET}?{}", self.query())
    }
}
