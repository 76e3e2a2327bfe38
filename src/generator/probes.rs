//! Compose health checks to liveness / readiness probes.

use super::types::{ExecAction, HttpGetAction, Probe};
use crate::analyzer::AnalyzedPort;
use crate::parser::ComposeHealthcheck;
use log::{trace, warn};
use regex::Regex;
use std::sync::LazyLock;

const DEFAULT_DURATION_SECS: u64 = 30;

static DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+(?:ms|s|m|h))+$|^\d+$").unwrap());

static DURATION_PART: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)(ms|s|m|h)?").unwrap());

/// `curl [-f|-s|-fs ...] [http://]localhost|127.0.0.1[:port][path]`
static CURL_LOCALHOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"curl\s+(?:-[fs]+\s+)*(?:http://)?(?:localhost|127\.0\.0\.1)(?::(\d+))?([^\s"']*)"#)
        .unwrap()
});

/// Liveness and readiness probes for one container.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Probes {
    pub liveness: Option<Probe>,
    pub readiness: Option<Probe>,
}

/// Parse a compose duration (`30s`, `1m30s`, `500ms`, `2h`, bare seconds)
/// to whole seconds. Sub-second totals round to at least 1; anything
/// unparseable logs a warning and is 30.
pub fn parse_duration(duration: &str) -> u64 {
    let duration = duration.trim();
    if !DURATION.is_match(duration) {
        warn!(
            "cannot parse duration \"{}\", using {}s",
            duration, DEFAULT_DURATION_SECS
        );
        return DEFAULT_DURATION_SECS;
    }

    let mut millis: u64 = 0;
    for caps in DURATION_PART.captures_iter(duration) {
        let Ok(value) = caps[1].parse::<u64>() else {
            warn!("duration \"{}\" is out of range, using {}s", duration, DEFAULT_DURATION_SECS);
            return DEFAULT_DURATION_SECS;
        };
        let unit_millis = match caps.get(2).map(|m| m.as_str()) {
            Some("ms") => 1,
            Some("m") => 60_000,
            Some("h") => 3_600_000,
            _ => 1000,
        };
        millis = millis.saturating_add(value.saturating_mul(unit_millis));
    }

    ((millis + 500) / 1000).max(1)
}

/// Translate a health check into probes. Disabled or empty checks yield none.
///
/// Both probes share the check and its timing; only liveness waits for
/// `start_period`.
pub fn healthcheck_to_probes(healthcheck: &ComposeHealthcheck, ports: &[AnalyzedPort]) -> Probes {
    if healthcheck.is_disabled() || healthcheck.test.is_empty() {
        return Probes::default();
    }

    let mut probe = build_probe(&healthcheck.test, ports);
    probe.period_seconds = healthcheck.interval.as_deref().map(parse_duration);
    probe.timeout_seconds = healthcheck.timeout.as_deref().map(parse_duration);
    probe.failure_threshold = healthcheck.retries.filter(|r| *r > 0);

    let readiness = probe.clone();
    let mut liveness = probe;
    liveness.initial_delay_seconds = healthcheck.start_period.as_deref().map(parse_duration);

    Probes {
        liveness: Some(liveness),
        readiness: Some(readiness),
    }
}

fn build_probe(test: &[String], ports: &[AnalyzedPort]) -> Probe {
    let command = match test.first().map(String::as_str) {
        Some("CMD") => test[1..].to_vec(),
        Some("CMD-SHELL") => {
            let shell = test[1..].join(" ");
            if let Some(http_get) = curl_to_http_get(&shell, ports) {
                trace!("health check `{}` mapped to httpGet {}:{}", shell, http_get.port, http_get.path);
                return Probe {
                    http_get: Some(http_get),
                    ..Default::default()
                };
            }
            vec!["sh".to_string(), "-c".to_string(), shell]
        }
        _ => test.to_vec(),
    };

    Probe {
        exec: Some(ExecAction { command }),
        ..Default::default()
    }
}

fn curl_to_http_get(shell: &str, ports: &[AnalyzedPort]) -> Option<HttpGetAction> {
    let caps = CURL_LOCALHOST.captures(shell)?;
    let port = caps
        .get(1)
        .and_then(|m| m.as_str().parse::<u16>().ok())
        .or_else(|| ports.first().map(|p| p.container_port))
        .unwrap_or(80);
    let path = caps
        .get(2)
        .map(|m| m.as_str())
        .filter(|p| !p.is_empty())
        .unwrap_or("/");

    Some(HttpGetAction {
        path: path.to_string(),
        port,
    })
}
