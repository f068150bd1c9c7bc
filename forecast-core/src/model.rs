use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::ConsensusError;
use crate::provider::ProviderId;

pub const TEMPERATURE_RANGE_C: RangeInclusive<f64> = -50.0..=60.0;
pub const PRECIPITATION_RANGE_MM: RangeInclusive<f64> = 0.0..=500.0;
pub const WIND_SPEED_RANGE_MS: RangeInclusive<f64> = 0.0..=100.0;
pub const HUMIDITY_RANGE_PCT: RangeInclusive<f64> = 0.0..=100.0;

/// Readings per provider, keyed by provider name.
///
/// A `BTreeMap` so every pass over the providers sees the same order; ties
/// in the dominant condition go to the provider that sorts first.
pub type ProviderReadings = BTreeMap<String, Vec<SourceReading>>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ConsensusError> {
        let location = Self { latitude, longitude };
        location.validate()?;
        Ok(location)
    }

    pub fn validate(&self) -> Result<(), ConsensusError> {
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ConsensusError::validation(format!(
                "coordinates ({}, {}) out of range (lat: -90 to 90, lon: -180 to 180)",
                self.latitude, self.longitude
            )));
        }
        Ok(())
    }
}

/// One provider's normalized observation for one forecast hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReading {
    pub temperature_c: f64,
    pub precipitation_mm: f64,
    pub wind_speed_ms: f64,
    pub humidity_pct: f64,
    pub condition: String,
}

fn within(value: f64, range: &RangeInclusive<f64>) -> Option<f64> {
    range.contains(&value).then_some(value)
}

impl SourceReading {
    pub fn temperature(&self) -> Option<f64> {
        within(self.temperature_c, &TEMPERATURE_RANGE_C)
    }

    pub fn precipitation(&self) -> Option<f64> {
        within(self.precipitation_mm, &PRECIPITATION_RANGE_MM)
    }

    pub fn wind_speed(&self) -> Option<f64> {
        within(self.wind_speed_ms, &WIND_SPEED_RANGE_MS)
    }

    pub fn humidity(&self) -> Option<f64> {
        within(self.humidity_pct, &HUMIDITY_RANGE_PCT)
    }

    pub fn condition(&self) -> Option<&str> {
        let trimmed = self.condition.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Static prior reliability per provider.
///
/// Keyed by provider name; providers missing from the table get
/// [`ProviderWeights::FALLBACK`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderWeights(BTreeMap<String, f64>);

impl ProviderWeights {
    pub const FALLBACK: f64 = 1.0;

    pub fn new(weights: BTreeMap<String, f64>) -> Self {
        Self(weights)
    }

    pub fn weight(&self, provider: &str) -> f64 {
        self.0.get(provider).copied().unwrap_or(Self::FALLBACK)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, w)| (name.as_str(), *w))
    }

    pub fn set(&mut self, provider: impl Into<String>, weight: f64) {
        self.0.insert(provider.into(), weight);
    }
}

impl Default for ProviderWeights {
    /// Keyed commercial APIs are trusted a little more than the free endpoints.
    fn default() -> Self {
        let table = [
            (ProviderId::WeatherApi, 1.2),
            (ProviderId::OpenWeather, 1.2),
            (ProviderId::OpenMeteo, 1.0),
            (ProviderId::Wttr, 0.8),
            (ProviderId::SevenTimer, 0.7),
        ];
        Self(table.into_iter().map(|(id, w)| (id.as_str().to_string(), w)).collect())
    }
}

/// One fused hour. Numeric fields no provider reported validly are NaN
/// (serialized as `null`) and show up in [`AggregatedHour::missing_fields`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedHour {
    pub hour_index: usize,
    pub temperature_c: f64,
    pub precipitation_mm: f64,
    pub wind_speed_ms: f64,
    pub humidity_pct: f64,
    pub condition: String,
    pub temp_range: (f64, f64),
    pub temp_confidence_interval: (f64, f64),
    pub temp_uncertainty_stdev: f64,
    pub contributing_sources: usize,
}

impl AggregatedHour {
    pub const UNKNOWN_CONDITION: &'static str = "Unknown";

    /// Names of fields that carry no usable value for this hour.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.temperature_c.is_finite() {
            missing.push("temperature");
        }
        if !self.precipitation_mm.is_finite() {
            missing.push("precipitation");
        }
        if !self.wind_speed_ms.is_finite() {
            missing.push("wind_speed");
        }
        if !self.humidity_pct.is_finite() {
            missing.push("humidity");
        }
        if self.condition.trim().is_empty() || self.condition == Self::UNKNOWN_CONDITION {
            missing.push("condition");
        }
        missing
    }
}

/// Result of one aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherConsensus {
    pub hourly_data: Vec<AggregatedHour>,
    pub sources_used: BTreeSet<String>,
    pub reliability_score: f64,
    pub source_consistency_scores: BTreeMap<String, f64>,
}

impl WeatherConsensus {
    pub fn temperatures(&self) -> Vec<f64> {
        self.hourly_data.iter().map(|h| h.temperature_c).collect()
    }

    pub fn mean_temperature(&self) -> Option<f64> {
        if self.hourly_data.is_empty() {
            return None;
        }
        Some(crate::stats::mean(&self.temperatures()))
    }

    pub fn total_precipitation(&self) -> f64 {
        self.hourly_data.iter().map(|h| h.precipitation_mm).filter(|p| p.is_finite()).sum()
    }

    pub fn max_wind_speed(&self) -> f64 {
        self.hourly_data.iter().map(|h| h.wind_speed_ms).fold(0.0, f64::max)
    }

    /// Most frequent hourly condition, earliest hour winning ties.
    pub fn dominant_condition(&self) -> Option<&str> {
        crate::stats::most_frequent(self.hourly_data.iter().map(|h| h.condition.as_str()))
    }

    /// Plain-text digest handed to the recommendation generator.
    pub fn summary(&self) -> String {
        if self.hourly_data.is_empty() {
            return "No hourly forecast data available.".to_string();
        }
        let temps = self.temperatures();
        let min_temp = temps.iter().copied().fold(f64::INFINITY, f64::min);
        let max_temp = temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let total_precip = self.total_precipitation();
        let rain_flag = if total_precip > 1.0 { "(rain expected)" } else { "(dry)" };
        let humidity = self
            .hourly_data
            .iter()
            .map(|h| h.humidity_pct)
            .find(|h| h.is_finite())
            .map_or_else(|| "unknown".to_string(), |h| format!("{h}%"));

        format!(
            "Temperature: {min_temp}°C to {max_temp}°C\n\
             Conditions: {}\n\
             Precipitation: {total_precip:.1}mm total {rain_flag}\n\
             Wind: up to {:.1} m/s\n\
             Humidity: {humidity}",
            self.dominant_condition().unwrap_or(AggregatedHour::UNKNOWN_CONDITION),
            self.max_wind_speed(),
        )
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn out_of_range_fields_are_rejected_individually() {
        let r = SourceReading {
            temperature_c: 75.0,
            precipitation_mm: -1.0,
            wind_speed_ms: 12.0,
            humidity_pct: 101.0,
            condition: "  ".to_string(),
        };
        assert_eq!(r.temperature(), None);
        assert_eq!(r.precipitation(), None);
        assert_eq!(r.wind_speed(), Some(12.0));
        assert_eq!(r.humidity(), None);
        assert_eq!(r.condition(), None);
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let mut r = reading(-50.0);
        r.humidity_pct = 100.0;
        assert_eq!(r.temperature(), Some(-50.0));
        assert_eq!(r.humidity(), Some(100.0));
        r.temperature_c = f64::NAN;
        assert_eq!(r.temperature(), None);
    }

    #[test]
    fn location_rejects_out_of_range_coordinates() {
        assert!(Location::new(48.85, 2.35).is_ok());
        assert!(Location::new(90.0, -180.0).is_ok());
        let err = Location::new(91.0, 0.0).unwrap_err();
        assert!(matches!(err, ConsensusError::Validation(_)));
        assert!(Location::new(0.0, 180.5).is_err());
    }

    #[test]
    fn provider_weights_fall_back_for_unknown_providers() {
        let weights = ProviderWeights::default();
        assert_eq!(weights.weight("weatherapi"), 1.2);
        assert_eq!(weights.weight("7timer"), 0.7);
        assert_eq!(weights.weight("somewhere-else"), ProviderWeights::FALLBACK);
    }

    #[test]
    fn summary_reports_range_and_rain_flag() {
        let mut consensus = consensus(8.0, 0.5);
        consensus.hourly_data[3].temperature_c = 12.5;
        let summary = consensus.summary();
        assert!(summary.contains("Temperature: 8°C to 12.5°C"));
        assert!(summary.contains("Conditions: Overcast"));
        assert!(summary.contains("5.0mm total (rain expected)"));
        assert!(summary.contains("Humidity: 70%"));
    }

    #[test]
    fn summary_without_hours_has_no_placeholder_numbers() {
        let mut consensus = consensus(8.0, 0.0);
        consensus.hourly_data.clear();
        let summary = consensus.summary();
        assert_eq!(summary, "No hourly forecast data available.");
        assert!(!summary.contains("inf"));
    }

    #[test]
    fn summary_skips_unreported_values() {
        let mut consensus = consensus(8.0, 1.0);
        consensus.hourly_data[0].humidity_pct = f64::NAN;
        consensus.hourly_data[1].precipitation_mm = f64::NAN;
        let summary = consensus.summary();
        assert!(summary.contains("9.0mm total (rain expected)"));
        assert!(summary.contains("Humidity: 70%"));
        assert!(!summary.contains("NaN"));
    }

    #[test]
    fn missing_fields_flags_unknown_condition() {
        let mut h = hour(0, 10.0, 0.0);
        assert!(h.missing_fields().is_empty());
        h.condition = AggregatedHour::UNKNOWN_CONDITION.to_string();
        assert_eq!(h.missing_fields(), vec!["condition"]);
    }
}
