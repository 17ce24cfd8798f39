//! Persistent run storage: `~/.contractkit/reports/`
//!
//! Every `contractkit test` run is saved regardless of `--output` mode.
//! Directory layout: `{host_port}_{timestamp}_{mode}/`

use std::path::PathBuf;
use std::time::SystemTime;

use contractkit_core::{Config, RunReport, TestOutcome};

/// Everything needed to persist a test run.
pub struct RunRecord<'a> {
    pub config: &'a Config,
    pub report: &'a RunReport,
    pub outcomes: &'a [TestOutcome],
    pub duration_secs: f64,
}

impl RunRecord<'_> {
    fn mode(&self) -> &'static str {
        if self.config.generative {
            "generative"
        } else {
            "examples"
        }
    }
}

/// Save a run under `~/.contractkit/reports/{host_port}_{timestamp}_{mode}/`.
///
/// Returns the run directory on success.
pub fn save_run(record: &RunRecord) -> Result<PathBuf, std::io::Error> {
    let dir = report_base_dir()?.join(build_dir_name(&record.config.base_url, record.mode()));
    std::fs::create_dir_all(&dir)?;

    let config_toml = toml::to_string_pretty(record.config).map_err(|e| std::io::Error::other(e.to_string()))?;
    std::fs::write(dir.join("config.toml"), config_toml)?;

    let report = serde_json::json!({
        "meta": {
            "timestamp": timestamp_iso(),
            "mode": record.mode(),
            "duration_secs": record.duration_secs,
            "base_url": record.config.base_url,
            "spec": record.config.spec.display().to_string(),
        },
        "report": record.report,
    });
    let report = serde_json::to_string_pretty(&report).map_err(|e| std::io::Error::other(e.to_string()))?;
    std::fs::write(dir.join("report.json"), report)?;

    // failures.txt: the breadcrumb reports, for reading without tooling
    let failures: Vec<String> = record
        .outcomes
        .iter()
        .filter(|o| !o.result.is_passed())
        .filter_map(|o| o.details().map(|details| format!("{}\n\n{details}", o.description)))
        .collect();
    if !failures.is_empty() {
        std::fs::write(dir.join("failures.txt"), failures.join("\n\n\n"))?;
    }

    Ok(dir)
}

fn report_base_dir() -> Result<PathBuf, std::io::Error> {
    let home = std::env::var("HOME").map_err(|_| std::io::Error::new(std::io::ErrorKind::NotFound, "HOME not set"))?;
    Ok(PathBuf::from(home).join(".contractkit").join("reports"))
}

/// `{host_port}_{timestamp}_{mode}` e.g. `localhost_8080_20260205T193000_examples`
fn build_dir_name(base_url: &str, mode: &str) -> String {
    format!("{}_{}_{mode}", extract_host_port(base_url), timestamp_compact())
}

/// `"http://localhost:8080/path"` → `"localhost_8080"`
fn extract_host_port(url: &str) -> String {
    url.split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or("unknown")
        .replace(':', "_")
}

fn timestamp_compact() -> String {
    let (y, mo, d, h, mi, s) = utc_now();
    format!("{y:04}{mo:02}{d:02}T{h:02}{mi:02}{s:02}")
}

fn timestamp_iso() -> String {
    let (y, mo, d, h, mi, s) = utc_now();
    format!("{y:04}-{mo:02}-{d:02}T{h:02}:{mi:02}:{s:02}Z")
}

fn utc_now() -> (i32, u32, u32, u32, u32, u32) {
    let epoch_secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let days = i64::try_from(epoch_secs / 86_400).unwrap_or_default();
    let tod = u32::try_from(epoch_secs % 86_400).unwrap_or_default();
    let (y, m, d) = civil_from_days(days);
    (y, m, d, tod / 3600, (tod % 3600) / 60, tod % 60)
}

/// Howard Hinnant's `civil_from_days`: epoch days → (year, month, day).
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = (z - era * 146_097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = i64::from(yoe) + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y as i32, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_port_from_urls() {
        assert_eq!(extract_host_port("http://localhost:8080"), "localhost_8080");
        assert_eq!(extract_host_port("https://api.example.com"), "api.example.com");
        assert_eq!(extract_host_port("http://10.0.0.1:3000/v1"), "10.0.0.1_3000");
    }

    #[test]
    fn civil_dates() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
        assert_eq!(civil_from_days(20_489), (2026, 2, 5));
    }

    #[test]
    fn dir_name_carries_mode() {
        let name = build_dir_name("http://localhost:8080", "generative");
        assert!(name.starts_with("localhost_8080_"));
        assert!(name.ends_with("_generative"));
    }
}
