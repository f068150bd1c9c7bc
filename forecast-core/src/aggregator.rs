//! Fusion of several providers' hourly readings into one consensus forecast.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::consistency::score_sources;
use crate::error::ConsensusError;
use crate::model::{AggregatedHour, ProviderReadings, ProviderWeights, WeatherConsensus};
use crate::provider::ProviderId;
use crate::stats::{
    DEFAULT_CONFIDENCE, DEFAULT_TRIM_FRACTION, confidence_interval, iqr_bounds, most_frequent,
    population_stdev, remove_outliers, round_to, trimmed_mean, weighted_median,
};

/// Minimum number of providers fusion is attempted with.
pub const QUORUM: usize = 2;

#[derive(Debug, Clone)]
pub struct ConsensusAggregator {
    weights: ProviderWeights,
    configured_providers: usize,
}

impl Default for ConsensusAggregator {
    fn default() -> Self {
        Self::new(ProviderWeights::default())
    }
}

impl ConsensusAggregator {
    /// Aggregator whose reliability denominator is the number of known
    /// provider types.
    pub fn new(weights: ProviderWeights) -> Self {
        Self { weights, configured_providers: ProviderId::all().len() }
    }

    /// Overrides the denominator of `reliability_score`.
    pub fn with_configured_providers(mut self, count: usize) -> Self {
        self.configured_providers = count.max(1);
        self
    }

    pub fn weights(&self) -> &ProviderWeights {
        &self.weights
    }

    /// Fuses `readings` hour by hour.
    ///
    /// Providers with no readings are treated as absent. Fails with
    /// [`ConsensusError::InsufficientSources`] when fewer than [`QUORUM`]
    /// remain. The output never extends past the shortest provider, and
    /// hours where no provider had a valid temperature are omitted.
    pub fn aggregate(&self, readings: &ProviderReadings) -> Result<WeatherConsensus, ConsensusError> {
        let reporting: ProviderReadings = readings
            .iter()
            .filter(|(_, series)| !series.is_empty())
            .map(|(name, series)| (name.clone(), series.clone()))
            .collect();

        if reporting.len() < QUORUM {
            return Err(ConsensusError::InsufficientSources {
                available: reporting.len(),
                required: QUORUM,
            });
        }

        let consistency = score_sources(&reporting);
        let fusion_weights: BTreeMap<&str, f64> = reporting
            .keys()
            .map(|name| {
                let score = consistency.get(name).copied().unwrap_or_default();
                (name.as_str(), self.weights.weight(name) * score)
            })
            .collect();

        let min_hours = reporting.values().map(Vec::len).min().unwrap_or(0);
        let hourly_data: Vec<AggregatedHour> = (0..min_hours)
            .filter_map(|hour| self.fuse_hour(hour, &reporting, &fusion_weights))
            .collect();

        let reliability_score = (reporting.len() as f64 / self.configured_providers as f64).min(1.0);

        info!(
            sources = reporting.len(),
            hours = hourly_data.len(),
            reliability = reliability_score,
            "Consensus aggregated"
        );

        Ok(WeatherConsensus {
            hourly_data,
            sources_used: reporting.keys().cloned().collect(),
            reliability_score,
            source_consistency_scores: consistency,
        })
    }

    fn fuse_hour(
        &self,
        hour: usize,
        readings: &ProviderReadings,
        fusion_weights: &BTreeMap<&str, f64>,
    ) -> Option<AggregatedHour> {
        let mut temps = Vec::new();
        let mut temp_weights = Vec::new();
        let mut precips = Vec::new();
        let mut winds = Vec::new();
        let mut humidities = Vec::new();
        let mut conditions = Vec::new();

        for (provider, series) in readings {
            let Some(reading) = series.get(hour) else {
                continue;
            };
            if let Some(t) = reading.temperature() {
                temps.push(t);
                temp_weights.push(fusion_weights.get(provider.as_str()).copied().unwrap_or_default());
            } else {
                debug!(provider = %provider, hour, value = reading.temperature_c, "Dropping out-of-range temperature");
            }
            precips.extend(reading.precipitation());
            winds.extend(reading.wind_speed());
            humidities.extend(reading.humidity());
            conditions.extend(reading.condition());
        }

        if temps.is_empty() {
            debug!(hour, "No valid temperature from any provider, skipping hour");
            return None;
        }

        let (cleaned, cleaned_weights) = match iqr_bounds(&temps) {
            Some((low, high)) => temps
                .iter()
                .zip(&temp_weights)
                .filter(|(t, _)| (low..=high).contains(*t))
                .map(|(t, w)| (*t, *w))
                .unzip(),
            None => (temps.clone(), temp_weights.clone()),
        };
        let basis = if cleaned.is_empty() { &temps } else { &cleaned };

        let temperature = if cleaned.len() >= 2 && cleaned.len() == cleaned_weights.len() {
            weighted_median(&cleaned, &cleaned_weights)
        } else {
            trimmed_mean(basis, DEFAULT_TRIM_FRACTION)
        };

        let raw_min = temps.iter().copied().fold(f64::INFINITY, f64::min);
        let raw_max = temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (ci_low, ci_high) = confidence_interval(basis, DEFAULT_CONFIDENCE);

        Some(AggregatedHour {
            hour_index: hour,
            temperature_c: round_to(temperature, 1),
            precipitation_mm: round_to(robust_mean(&precips), 2),
            wind_speed_ms: round_to(robust_mean(&winds), 1),
            humidity_pct: round_to(robust_mean(&humidities), 1),
            condition: most_frequent(conditions)
                .unwrap_or(AggregatedHour::UNKNOWN_CONDITION)
                .to_string(),
            temp_range: (round_to(raw_min, 1), round_to(raw_max, 1)),
            temp_confidence_interval: (round_to(ci_low, 1), round_to(ci_high, 1)),
            temp_uncertainty_stdev: round_to(population_stdev(basis), 2),
            contributing_sources: temps.len(),
        })
    }
}

/// Trimmed mean of the outlier-cleaned values, or of the raw values if
/// cleaning left nothing. NaN when no provider reported a valid value.
fn robust_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let cleaned = remove_outliers(values);
    let basis = if cleaned.is_empty() { values } else { &cleaned[..] };
    trimmed_mean(basis, DEFAULT_TRIM_FRACTION)
}
