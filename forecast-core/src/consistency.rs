//! Per-provider agreement with the other providers over the forecast window.

use std::collections::BTreeMap;

use crate::model::{ProviderReadings, SourceReading};
use crate::stats::mean;

/// Score given to a provider that never had a peer to compare against.
pub const NEUTRAL_CONSISTENCY: f64 = 0.5;

type FieldAccessor = fn(&SourceReading) -> Option<f64>;
type DeviationScale = fn(f64) -> f64;

/// Each numeric field with the divisor that normalizes its deviation from
/// the peer mean.
const FIELDS: [(FieldAccessor, DeviationScale); 4] = [
    (SourceReading::temperature, |peer| peer.abs().max(1.0)),
    (SourceReading::precipitation, |peer| (peer + 0.1).max(0.1)),
    (SourceReading::wind_speed, |peer| (peer + 0.1).max(0.1)),
    (SourceReading::humidity, |_| 100.0),
];

/// Scores every provider in `readings` in [0, 1].
///
/// 1.0 means the provider matched its peers' mean every hour. Scores are
/// recomputed from scratch on every call.
pub fn score_sources(readings: &ProviderReadings) -> BTreeMap<String, f64> {
    let window = readings.values().map(Vec::len).max().unwrap_or(0);

    readings
        .iter()
        .map(|(provider, own)| {
            let deviations: Vec<f64> = (0..window)
                .filter_map(|hour| {
                    let reading = own.get(hour)?;
                    let peers: Vec<&SourceReading> = readings
                        .iter()
                        .filter(|(name, _)| *name != provider)
                        .filter_map(|(_, series)| series.get(hour))
                        .collect();
                    hour_deviation(reading, &peers)
                })
                .collect();

            let score = if deviations.is_empty() {
                NEUTRAL_CONSISTENCY
            } else {
                1.0 - mean(&deviations).min(1.0)
            };
            (provider.clone(), score.max(0.0))
        })
        .collect()
}

/// Mean normalized deviation of `reading` from `peers` for one hour.
///
/// Out-of-range values are left out on both sides; `None` when no field
/// could be compared.
fn hour_deviation(reading: &SourceReading, peers: &[&SourceReading]) -> Option<f64> {
    if peers.is_empty() {
        return None;
    }

    let per_field: Vec<f64> = FIELDS
        .iter()
        .filter_map(|(field, scale)| {
            let own = field(reading)?;
            let peer_values: Vec<f64> = peers.iter().filter_map(|p| field(p)).collect();
            if peer_values.is_empty() {
                return None;
            }
            let peer_mean = mean(&peer_values);
            Some((own - peer_mean).abs() / scale(peer_mean))
        })
        .collect();

    (!per_field.is_empty()).then(|| mean(&per_field))
}
