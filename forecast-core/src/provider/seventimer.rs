use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    http::read_body,
    model::{Location, SourceReading},
    provider::{ForecastProvider, ProviderId},
};

const URL: &str = "http://www.7timer.info/bin/api.pl";
const KMH_TO_MS: f64 = 0.277778;
const DEFAULT_HUMIDITY_PCT: f64 = 50.0;

/// 7Timer "civil" product. It carries no precipitation amount, so one is
/// estimated from the weather description.
#[derive(Debug, Clone)]
pub struct SevenTimerProvider {
    http: Client,
}

impl Default for SevenTimerProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SevenTimerProvider {
    pub fn new() -> Self {
        Self { http: Client::new() }
    }
}

#[derive(Debug, Deserialize)]
struct StWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct StPoint {
    temp2m: f64,
    weather: String,
    wind10m: StWind,
    #[serde(default)]
    rh2m: Value,
}

#[derive(Debug, Deserialize)]
struct StResponse {
    dataseries: Vec<StPoint>,
}

/// Rough hourly precipitation in mm for a weather description.
pub fn estimate_precipitation(weather: &str) -> f64 {
    let lower = weather.to_lowercase();
    if lower.contains("rain") || lower.contains("shower") {
        2.0
    } else if lower.contains("drizzle") {
        0.5
    } else if lower.contains("snow") {
        1.0
    } else {
        0.0
    }
}

/// Relative humidity given either as a number or as a `"NN%"` string.
fn humidity(raw: &Value) -> f64 {
    match raw {
        Value::Number(n) => n.as_f64().unwrap_or(DEFAULT_HUMIDITY_PCT),
        Value::String(s) => s.trim().trim_end_matches('%').parse().unwrap_or(DEFAULT_HUMIDITY_PCT),
        _ => DEFAULT_HUMIDITY_PCT,
    }
}

pub fn parse_forecast(body: &str, hours: usize) -> Result<Vec<SourceReading>> {
    let parsed: StResponse = serde_json::from_str(body).context("Failed to parse 7Timer JSON")?;

    Ok(parsed
        .dataseries
        .into_iter()
        .take(hours)
        .map(|point| SourceReading {
            temperature_c: point.temp2m,
            precipitation_mm: estimate_precipitation(&point.weather),
            wind_speed_ms: point.wind10m.speed * KMH_TO_MS,
            humidity_pct: humidity(&point.rh2m),
            condition: point.weather,
        })
        .collect())
}

#[async_trait]
impl ForecastProvider for SevenTimerProvider {
    fn id(&self) -> ProviderId {
        ProviderId::SevenTimer
    }

    async fn hourly_forecast(&self, location: &Location, hours: usize) -> Result<Vec<SourceReading>> {
        let res = self
            .http
            .get(URL)
            .query(&[
                ("lon", location.longitude.to_string()),
                ("lat", location.latitude.to_string()),
                ("product", "civil".to_string()),
                ("output", "json".to_string()),
            ])
            .send()
            .await
            .context("Failed to send request to 7Timer")?;

        let body = read_body(res, "7Timer forecast").await?;
        parse_forecast(&body, hours)
    }
}
