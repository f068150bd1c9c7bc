//! Concurrent fan-out over the configured providers.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::model::{Location, ProviderReadings};
use crate::provider::ForecastProvider;

/// Queries every provider in its own task, each bounded by `timeout`.
///
/// Failed, timed-out and empty providers are logged and left out; the rest
/// are keyed by provider name and truncated to `hours`.
pub async fn fetch_all(
    providers: &[Arc<dyn ForecastProvider>],
    location: Location,
    hours: usize,
    timeout: Duration,
) -> ProviderReadings {
    let mut tasks = JoinSet::new();
    for provider in providers {
        let provider = Arc::clone(provider);
        tasks.spawn(async move {
            let outcome =
                tokio::time::timeout(timeout, provider.hourly_forecast(&location, hours)).await;
            (provider.id(), outcome)
        });
    }

    let mut readings = ProviderReadings::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((id, Ok(Ok(mut series)))) => {
                if series.is_empty() {
                    warn!(provider = %id, "Provider returned no readings");
                    continue;
                }
                series.truncate(hours);
                info!(provider = %id, hours = series.len(), "Fetched forecast");
                readings.insert(id.as_str().to_string(), series);
            }
            Ok((id, Ok(Err(err)))) => {
                warn!(provider = %id, error = %format!("{err:#}"), "Provider fetch failed");
            }
            Ok((id, Err(_))) => {
                warn!(provider = %id, timeout_ms = timeout.as_millis() as u64, "Provider fetch timed out");
            }
            Err(err) => {
                warn!(error = %err, "Provider task did not complete");
            }
        }
    }

    readings
}
