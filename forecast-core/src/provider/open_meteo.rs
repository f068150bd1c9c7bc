use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    http::read_body,
    model::{AggregatedHour, Location, SourceReading},
    provider::{ForecastProvider, ProviderId, current_hour},
};

const URL: &str = "https://api.open-meteo.com/v1/forecast";
const HOURLY_FIELDS: &str =
    "temperature_2m,precipitation,windspeed_10m,relativehumidity_2m,weathercode";

/// Keyless Open-Meteo forecast API.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    http: Client,
}

impl Default for OpenMeteoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenMeteoProvider {
    pub fn new() -> Self {
        Self { http: Client::new() }
    }
}

#[derive(Debug, Deserialize)]
struct OmHourly {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    precipitation: Vec<Option<f64>>,
    windspeed_10m: Vec<Option<f64>>,
    relativehumidity_2m: Vec<Option<f64>>,
    weathercode: Vec<Option<u16>>,
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    #[serde(default)]
    utc_offset_seconds: i64,
    hourly: OmHourly,
}

/// WMO weather interpretation code as text.
pub fn decode_wmo(code: u16) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 | 48 => "Foggy",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        71 => "Slight snow",
        73 => "Moderate snow",
        75 => "Heavy snow",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 | 99 => "Thunderstorm with hail",
        _ => AggregatedHour::UNKNOWN_CONDITION,
    }
}

fn at(series: &[Option<f64>], i: usize) -> f64 {
    series.get(i).copied().flatten().unwrap_or(f64::NAN)
}

/// Parses an hourly forecast body, starting at the current hour in the
/// location's own time zone.
pub fn parse_forecast(body: &str, now: DateTime<Utc>, hours: usize) -> Result<Vec<SourceReading>> {
    let parsed: OmResponse = serde_json::from_str(body).context("Failed to parse Open-Meteo JSON")?;

    let local_hour = (current_hour(now) + TimeDelta::seconds(parsed.utc_offset_seconds)).naive_utc();
    let hourly = parsed.hourly;

    let start = hourly
        .time
        .iter()
        .position(|t| {
            NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M").is_ok_and(|t| t >= local_hour)
        })
        .ok_or_else(|| anyhow!("Open-Meteo response has no hours from {local_hour} onwards"))?;
    let end = (start + hours).min(hourly.time.len());

    Ok((start..end)
        .map(|i| SourceReading {
            temperature_c: at(&hourly.temperature_2m, i),
            precipitation_mm: at(&hourly.precipitation, i),
            wind_speed_ms: at(&hourly.windspeed_10m, i),
            humidity_pct: at(&hourly.relativehumidity_2m, i),
            condition: hourly
                .weathercode
                .get(i)
                .copied()
                .flatten()
                .map(decode_wmo)
                .unwrap_or(AggregatedHour::UNKNOWN_CONDITION)
                .to_string(),
        })
        .collect())
}

#[async_trait]
impl ForecastProvider for OpenMeteoProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenMeteo
    }

    async fn hourly_forecast(&self, location: &Location, hours: usize) -> Result<Vec<SourceReading>> {
        let res = self
            .http
            .get(URL)
            .query(&[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                ("hourly", HOURLY_FIELDS.to_string()),
                ("windspeed_unit", "ms".to_string()),
                ("timezone", "auto".to_string()),
                ("forecast_days", "2".to_string()),
            ])
            .send()
            .await
            .context("Failed to send request to Open-Meteo")?;

        let body = read_body(res, "Open-Meteo forecast").await?;
        parse_forecast(&body, Utc::now(), hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const BODY: &str = r#"{
        "latitude": 48.86, "longitude": 2.34, "utc_offset_seconds": 3600, "timezone": "Europe/Paris",
        "hourly": {
            "time": ["2026-03-01T09:00", "2026-03-01T10:00", "2026-03-01T11:00", "2026-03-01T12:00"],
            "temperature_2m": [6.1, 7.4, null, 9.8],
            "precipitation": [0.0, 0.2, 0.4, 0.0],
            "windspeed_10m": [3.1, 3.6, 4.0, 4.4],
            "relativehumidity_2m": [81, 78, 75, 70],
            "weathercode": [3, 61, 61, 140]
        }
    }"#;

    #[test]
    fn starts_at_current_local_hour() {
        // 09:20 UTC is 10:20 in the location's zone
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 20, 0).unwrap();
        let readings = parse_forecast(BODY, now, 10).unwrap();

        assert_eq!(readings.len(), 3);
        assert_eq!(readings[0].temperature_c, 7.4);
        assert_eq!(readings[0].precipitation_mm, 0.2);
        assert_eq!(readings[0].wind_speed_ms, 3.6);
        assert_eq!(readings[0].humidity_pct, 78.0);
        assert_eq!(readings[0].condition, "Slight rain");
    }

    #[test]
    fn null_values_fail_range_validation() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let readings = parse_forecast(BODY, now, 2).unwrap();

        assert_eq!(readings.len(), 2);
        assert!(readings[1].temperature_c.is_nan());
        assert_eq!(readings[1].temperature(), None);
    }

    #[test]
    fn unknown_weather_code_decodes_as_unknown() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 11, 0, 0).unwrap();
        let readings = parse_forecast(BODY, now, 1).unwrap();
        assert_eq!(readings[0].condition, "Unknown");
    }

    #[test]
    fn forecast_entirely_in_the_past_is_an_error() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        assert!(parse_forecast(BODY, now, 10).is_err());
    }

    #[test]
    fn wmo_table_covers_common_codes() {
        assert_eq!(decode_wmo(0), "Clear sky");
        assert_eq!(decode_wmo(48), "Foggy");
        assert_eq!(decode_wmo(99), "Thunderstorm with hail");
    }
}
