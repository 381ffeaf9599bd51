/**
 * REPORT DECODER - Query HTTP → Report validé
 *
 * RÔLE : Extrait le paramètre `json` de la query, le dé-échappe (percent-encoding),
 * parse le JSON et construit un Report horodaté par l'horloge du kernel.
 *
 * Aucune erreur ne remonte en panic : tout échec est un DecodeError que
 * l'endpoint transforme en 400.
 */

use crate::clock::Clock;
use crate::models::{Report, ReportIn};

pub const PAYLOAD_PARAM: &str = "json";

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("missing `json` query parameter")]
    MissingPayload,
    #[error("payload is not valid percent-encoded UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("malformed report: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid report: {0}")]
    Invalid(String),
}

/// Décode la query brute d'une requête d'ingestion.
pub fn decode_report(query: Option<&str>, clock: &dyn Clock) -> Result<Report, DecodeError> {
    let raw = extract_payload(query.unwrap_or_default()).ok_or(DecodeError::MissingPayload)?;
    let json = urlencoding::decode(raw)?;
    let incoming: ReportIn = serde_json::from_str(&json)?;
    validate(&incoming)?;
    Ok(incoming.into_report(clock.now()))
}

fn extract_payload(query: &str) -> Option<&str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == PAYLOAD_PARAM)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

fn validate(report: &ReportIn) -> Result<(), DecodeError> {
    if report.key.trim().is_empty() {
        return Err(DecodeError::Invalid("key must not be empty".into()));
    }

    let fields = [
        ("cpu.user", report.cpu.user),
        ("cpu.system", report.cpu.system),
        ("ram.total", report.ram.total),
        ("ram.used", report.ram.used),
        ("ram.cached", report.ram.cached),
    ];
    for (name, value) in fields {
        if !value.is_finite() || value < 0.0 {
            return Err(DecodeError::Invalid(format!("{name} must be a finite non-negative number")));
        }
    }

    // ratio used/total moyenné par l'agrégateur
    if report.ram.total <= 0.0 {
        return Err(DecodeError::Invalid("ram.total must be greater than zero".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use statboard_devkit::ReportBuilder;
    use time::macros::datetime;

    fn clock() -> ManualClock {
        ManualClock::new(datetime!(2024-03-01 12:00 UTC))
    }

    #[test]
    fn test_decode_agent_payload() {
        let query = ReportBuilder::new("Solberry")
            .cpu(12.5, 3.25)
            .ram(3906.0, 1200.0, 800.0)
            .fixed_decimals()
            .query();

        let report = decode_report(Some(&query), &clock()).unwrap();
        assert_eq!(report.key, "Solberry");
        assert_eq!(report.received_at, datetime!(2024-03-01 12:00 UTC));
        assert_eq!(report.cpu.user, 12.5);
        assert_eq!(report.cpu.system, 3.25);
        assert_eq!(report.ram.used, 1200.0);
    }

    #[test]
    fn test_payload_param_found_among_others() {
        let query = format!("v=2&{}", ReportBuilder::new("k").query());
        assert!(decode_report(Some(&query), &clock()).is_ok());
    }

    #[test]
    fn test_missing_query_or_param() {
        assert!(matches!(decode_report(None, &clock()), Err(DecodeError::MissingPayload)));
        assert!(matches!(decode_report(Some("other=1"), &clock()), Err(DecodeError::MissingPayload)));
        assert!(matches!(decode_report(Some("json="), &clock()), Err(DecodeError::MissingPayload)));
    }

    #[test]
    fn test_malformed_json() {
        let err = decode_report(Some("json=%7Bnot-json"), &clock()).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_invalid_utf8_escape() {
        let err = decode_report(Some("json=%FF%FE"), &clock()).unwrap_err();
        assert!(matches!(err, DecodeError::Encoding(_)));
    }

    #[test]
    fn test_missing_key_field() {
        let query = ReportBuilder::new("ignored").without_key().query();
        let err = decode_report(Some(&query), &clock()).unwrap_err();
        assert!(err.to_string().contains("key"));
    }

    #[test]
    fn test_missing_sub_objects() {
        let no_cpu = ReportBuilder::new("k").without_cpu().query();
        let no_ram = ReportBuilder::new("k").without_ram().query();
        assert!(matches!(decode_report(Some(&no_cpu), &clock()), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode_report(Some(&no_ram), &clock()), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_validation_rules() {
        let empty_key = ReportBuilder::new("  ").query();
        let zero_total = ReportBuilder::new("k").ram(0.0, 0.0, 0.0).query();
        let negative = ReportBuilder::new("k").cpu(-1.0, 2.0).query();

        for query in [empty_key, zero_total, negative] {
            assert!(matches!(decode_report(Some(&query), &clock()), Err(DecodeError::Invalid(_))));
        }
    }
}
