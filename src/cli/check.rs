//! `rentsync check`: validate configuration and print the effective settings.

use std::path::Path;

use tabled::{Table, Tabled};

use crate::cli::output;
use crate::error::Result;
use crate::infrastructure::config::Config;

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "Section")]
    section: &'static str,
    #[tabled(rename = "Setting")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn row(section: &'static str, name: &str, value: impl ToString) -> SettingRow {
    SettingRow {
        section,
        name: name.to_string(),
        value: value.to_string(),
    }
}

/// Load `path` (or the defaults) and validate it.
pub fn load(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => {
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}

pub fn execute(path: Option<&Path>) -> Result<()> {
    output::header(env!("CARGO_PKG_VERSION"));
    match path {
        Some(path) => output::section(&format!("Checking {}", path.display())),
        None => output::section("Checking built-in defaults"),
    }

    let config = match load(path) {
        Ok(config) => config,
        Err(e) => {
            output::error(&e.to_string());
            return Err(e);
        }
    };
    output::ok("Configuration is valid");

    output::section("Effective settings");
    output::table(&Table::new(settings_rows(&config)).to_string());

    if !config.circuit_breaker.endpoints.is_empty() {
        output::section("Breaker overrides");
        let overrides: Vec<_> = config
            .circuit_breaker
            .overrides()
            .map(|(endpoint, policy)| {
                row(
                    "circuit_breaker",
                    endpoint,
                    format!(
                        "threshold {} / reset {}ms / window {}ms",
                        policy.failure_threshold,
                        policy.reset_timeout.as_millis(),
                        policy.monitoring_period.as_millis()
                    ),
                )
            })
            .collect();
        output::table(&Table::new(overrides).to_string());
    }

    println!();
    println!(
        "  Run {} to exercise these settings",
        output::highlight("rentsync simulate")
    );
    Ok(())
}

fn settings_rows(config: &Config) -> Vec<SettingRow> {
    let ms = |v: u64| format!("{v}ms");
    vec![
        row("retry", "max_retries", config.retry.max_retries),
        row("retry", "initial_delay", ms(config.retry.initial_delay_ms)),
        row("retry", "max_delay", ms(config.retry.max_delay_ms)),
        row(
            "circuit_breaker",
            "failure_threshold",
            config.circuit_breaker.failure_threshold,
        ),
        row(
            "circuit_breaker",
            "reset_timeout",
            ms(config.circuit_breaker.reset_timeout_ms),
        ),
        row(
            "circuit_breaker",
            "monitoring_period",
            ms(config.circuit_breaker.monitoring_period_ms),
        ),
        row("timeouts", "read", ms(config.timeouts.read_ms)),
        row("timeouts", "write", ms(config.timeouts.write_ms)),
        row("timeouts", "report", ms(config.timeouts.report_ms)),
        row("latency", "read_warn", ms(config.latency.read_warn_ms)),
        row("latency", "write_warn", ms(config.latency.write_warn_ms)),
        row("latency", "report_warn", ms(config.latency.report_warn_ms)),
        row("latency", "window", config.latency.window),
        row("realtime", "initial_delay", ms(config.realtime.initial_delay_ms)),
        row("realtime", "max_delay", ms(config.realtime.max_delay_ms)),
        row("realtime", "multiplier", config.realtime.backoff_multiplier),
        row("realtime", "jitter", config.realtime.jitter),
        row("stores", "fetch_cache", ms(config.stores.fetch_cache_ms)),
        row("logging", "level", &config.logging.level),
        row("logging", "format", &config.logging.format),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_without_path_uses_defaults() {
        assert_eq!(load(None).unwrap(), Config::default());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[circuit_breaker]\nfailure_threshold = 0").unwrap();

        assert!(load(Some(file.path())).is_err());
    }

    #[test]
    fn test_rows_cover_every_section() {
        let rows = settings_rows(&Config::default());
        for section in ["retry", "circuit_breaker", "timeouts", "latency", "realtime", "stores", "logging"] {
            assert!(rows.iter().any(|r| r.section == section), "missing {section}");
        }
    }
}
