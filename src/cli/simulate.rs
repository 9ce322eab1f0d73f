//! `rentsync simulate`: a scripted session against the in-memory backend.
//!
//! Injects network failures on property creation, drives both stores through
//! fetch, create, realtime and delete, then reports breaker states, latency
//! statistics and recorded errors.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tabled::{Table, Tabled};
use tracing::{info, warn};

use crate::adapter::memory::Fault;
use crate::cli::output;
use crate::domain::endpoint::CREATE_PROPERTY;
use crate::domain::{ActorId, PaymentDraft, PaymentStatus, PropertyDraft, PropertyStatus, TenantDraft};
use crate::error::Result;
use crate::infrastructure::bootstrap::Runtime;
use crate::infrastructure::config::Config;
use crate::port::{ChangeFeed, ErrorRecord};
use crate::resilience::{CircuitSnapshot, LatencyStats};

/// Time given to the realtime tasks to drain their channels.
const SETTLE: Duration = Duration::from_millis(100);
const SUBSCRIBE_WAIT: Duration = Duration::from_secs(1);

/// Outcome of one attempted property creation.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct AttemptRow {
    #[tabled(rename = "#")]
    pub attempt: usize,
    #[tabled(rename = "Property")]
    pub name: String,
    #[tabled(rename = "Outcome")]
    pub outcome: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub injected_failures: usize,
    pub attempts: Vec<AttemptRow>,
    pub properties: usize,
    pub payments: usize,
    pub breakers: BTreeMap<String, CircuitSnapshot>,
    pub latency: BTreeMap<String, LatencyStats>,
    pub errors: Vec<ErrorRecord>,
}

fn property(name: &str, tenant: Option<&str>) -> PropertyDraft {
    PropertyDraft {
        name: name.to_string(),
        address: format!("{name}, rue de la Paix"),
        city: "Lyon".to_string(),
        rent: rust_decimal::Decimal::from(850),
        status: if tenant.is_some() {
            PropertyStatus::Occupied
        } else {
            PropertyStatus::Vacant
        },
        tenant: tenant.map(|name| TenantDraft {
            name: name.to_string(),
            entry_date: chrono::Utc::now().date_naive(),
            exit_date: None,
            status: Default::default(),
        }),
    }
}

/// Run the scripted session and collect the report.
pub async fn run(config: &Config, failures: usize) -> Result<SimulationReport> {
    let actor = ActorId::new(uuid::Uuid::new_v4());
    let runtime = Runtime::in_memory(config, actor);
    let feed: Arc<dyn ChangeFeed> = runtime.backend.clone();

    runtime.properties.start_realtime(Arc::clone(&feed))?;
    runtime.payments.start_realtime(feed)?;
    for table in ["properties", "payments"] {
        if !runtime.backend.wait_for_subscribers(table, 1, SUBSCRIBE_WAIT).await {
            warn!(table, "Realtime did not subscribe in time");
        }
    }
    runtime.properties.fetch(true).await?;
    runtime.payments.fetch(true).await?;

    runtime
        .backend
        .inject_times(CREATE_PROPERTY, Fault::Network, failures);
    info!(failures, "Injected network failures");

    // Each call burns up to 1 + max_retries faults; stop once one commits.
    let per_call = config.retry.max_retries as usize + 1;
    let max_attempts = failures / per_call + 2;
    let mut attempts = Vec::new();
    let mut created = None;
    for attempt in 1..=max_attempts {
        let name = format!("Unit {attempt}");
        let outcome = match runtime.properties.add(property(&name, Some("Ada"))).await {
            Ok(property) => {
                created = Some(property);
                "created".to_string()
            }
            Err(e) => {
                // The wrapper marks the client offline after exhausted
                // network retries; the session comes back online at once.
                runtime.client.connectivity().set_online(true);
                e.to_string()
            }
        };
        attempts.push(AttemptRow {
            attempt,
            name,
            outcome,
        });
        if created.is_some() {
            break;
        }
    }

    if let Some(property) = &created {
        runtime
            .payments
            .add(PaymentDraft {
                property_id: Some(property.id.clone()),
                property: Some(property.name.clone()),
                tenant: None,
                amount: property.rent,
                due_date: chrono::Utc::now().date_naive(),
                status: PaymentStatus::Pending,
            })
            .await?;
    }

    // A write from another device arrives through the change feed.
    runtime
        .backend
        .insert_external_property(actor, &property("Annex", None));
    tokio::time::sleep(SETTLE).await;

    let report = SimulationReport {
        injected_failures: failures,
        attempts,
        properties: runtime.properties.collection().len(),
        payments: runtime.payments.collection().len(),
        breakers: runtime.client.breakers().all_states(),
        latency: runtime.client.latency().all(),
        errors: runtime.diagnostics.errors(),
    };
    runtime.teardown();
    Ok(report)
}

#[derive(Tabled)]
struct BreakerRow {
    #[tabled(rename = "Endpoint")]
    endpoint: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Failures")]
    failures: u32,
    #[tabled(rename = "Successes")]
    successes: u32,
    #[tabled(rename = "Last error")]
    last_error: String,
}

#[derive(Tabled)]
struct LatencyRow {
    #[tabled(rename = "Endpoint")]
    endpoint: String,
    #[tabled(rename = "Calls")]
    count: u64,
    #[tabled(rename = "Failed")]
    failures: u64,
    #[tabled(rename = "Mean ms")]
    mean: u64,
    #[tabled(rename = "p95 ms")]
    p95: u64,
    #[tabled(rename = "Max ms")]
    max: u64,
}

pub async fn execute(config: &Config, failures: usize, json: bool) -> Result<()> {
    let report = run(config, failures).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    output::header(env!("CARGO_PKG_VERSION"));
    output::section(&format!("Create attempts ({failures} injected failures)"));
    output::table(&Table::new(report.attempts.clone()).to_string());

    output::section("Collections");
    output::key_value("Properties", report.properties);
    output::key_value("Payments", report.payments);

    output::section("Circuit breakers");
    let breakers: Vec<_> = report
        .breakers
        .iter()
        .map(|(endpoint, snapshot)| BreakerRow {
            endpoint: endpoint.clone(),
            state: snapshot.state.to_string(),
            failures: snapshot.failure_count,
            successes: snapshot.success_count,
            last_error: snapshot.last_error.clone().unwrap_or_default(),
        })
        .collect();
    output::table(&Table::new(breakers).to_string());

    output::section("Latency");
    let latency: Vec<_> = report
        .latency
        .iter()
        .map(|(endpoint, stats)| LatencyRow {
            endpoint: endpoint.clone(),
            count: stats.count,
            failures: stats.failures,
            mean: stats.mean_ms,
            p95: stats.p95_ms,
            max: stats.max_ms,
        })
        .collect();
    output::table(&Table::new(latency).to_string());

    if report.errors.is_empty() {
        output::ok("No terminal errors recorded");
    } else {
        output::warn(&format!("{} terminal errors recorded", report.errors.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::CircuitState;

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.retry.initial_delay_ms = 1;
        config.retry.max_delay_ms = 2;
        config
    }

    #[tokio::test]
    async fn test_without_failures_everything_commits() {
        let report = run(&fast_config(), 0).await.unwrap();

        assert_eq!(report.attempts.len(), 1);
        assert_eq!(report.attempts[0].outcome, "created");
        assert_eq!(report.properties, 2);
        assert_eq!(report.payments, 1);
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_recorded_then_recovered() {
        let report = run(&fast_config(), 3).await.unwrap();

        assert_eq!(report.attempts.len(), 2);
        assert_eq!(report.attempts[1].outcome, "created");
        assert_eq!(report.errors.len(), 1);
        let breaker = &report.breakers[CREATE_PROPERTY];
        assert_eq!(breaker.state, CircuitState::Closed);
        // The committed retry cleared the failure window.
        assert_eq!(breaker.failure_count, 0);
        assert_eq!(breaker.success_count, 1);
        assert_eq!(report.latency[CREATE_PROPERTY].failures, 1);
    }
}
