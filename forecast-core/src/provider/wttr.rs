use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    http::read_body,
    model::{AggregatedHour, Location, SourceReading},
    provider::{ForecastProvider, ProviderId},
};

const BASE_URL: &str = "https://wttr.in";

/// wttr.in JSON (`format=j1`). Numbers arrive as strings.
#[derive(Debug, Clone)]
pub struct WttrProvider {
    http: Client,
}

impl Default for WttrProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl WttrProvider {
    pub fn new() -> Self {
        Self { http: Client::new() }
    }
}

#[derive(Debug, Deserialize)]
struct WtText {
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WtHour {
    #[serde(rename = "tempC")]
    temp_c: String,
    #[serde(rename = "precipMM")]
    precip_mm: String,
    windspeed_kmph: String,
    humidity: String,
    #[serde(default)]
    weather_desc: Vec<WtText>,
}

#[derive(Debug, Deserialize)]
struct WtDay {
    hourly: Vec<WtHour>,
}

#[derive(Debug, Deserialize)]
struct WtResponse {
    weather: Vec<WtDay>,
}

fn number(field: &str, raw: &str) -> Result<f64> {
    raw.trim().parse().map_err(|_| anyhow!("wttr.in {field} is not a number: '{raw}'"))
}

pub fn parse_forecast(body: &str, hours: usize) -> Result<Vec<SourceReading>> {
    let parsed: WtResponse = serde_json::from_str(body).context("Failed to parse wttr.in JSON")?;

    parsed
        .weather
        .into_iter()
        .flat_map(|day| day.hourly)
        .take(hours)
        .map(|h| {
            Ok(SourceReading {
                temperature_c: number("tempC", &h.temp_c)?,
                precipitation_mm: number("precipMM", &h.precip_mm)?,
                wind_speed_ms: number("windspeedKmph", &h.windspeed_kmph)? / 3.6,
                humidity_pct: number("humidity", &h.humidity)?,
                condition: h
                    .weather_desc
                    .into_iter()
                    .next()
                    .map(|d| d.value.trim().to_string())
                    .unwrap_or_else(|| AggregatedHour::UNKNOWN_CONDITION.to_string()),
            })
        })
        .collect()
}

#[async_trait]
impl ForecastProvider for WttrProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Wttr
    }

    async fn hourly_forecast(&self, location: &Location, hours: usize) -> Result<Vec<SourceReading>> {
        let url = format!("{BASE_URL}/{},{}", location.latitude, location.longitude);

        let res = self
            .http
            .get(&url)
            .query(&[("format", "j1")])
            .send()
            .await
            .context("Failed to send request to wttr.in")?;

        let body = read_body(res, "wttr.in forecast").await?;
        parse_forecast(&body, hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hour(temp: &str, wind: &str) -> String {
        format!(
            r#"{{"time":"0","tempC":"{temp}","precipMM":"0.4","windspeedKmph":"{wind}","humidity":"77",
                "weatherDesc":[{{"value":"Light rain shower "}}]}}"#
        )
    }

    #[test]
    fn parses_string_numbers_across_days() {
        let body = format!(
            r#"{{"weather":[{{"hourly":[{},{}]}},{{"hourly":[{}]}}]}}"#,
            hour("7", "18"),
            hour("9", "9"),
            hour("4", "0"),
        );
        let readings = parse_forecast(&body, 10).unwrap();

        assert_eq!(readings.len(), 3);
        assert_eq!(readings[0].temperature_c, 7.0);
        assert_eq!(readings[0].wind_speed_ms, 5.0);
        assert_eq!(readings[0].precipitation_mm, 0.4);
        assert_eq!(readings[0].humidity_pct, 77.0);
        assert_eq!(readings[0].condition, "Light rain shower");
        assert_eq!(readings[2].temperature_c, 4.0);
    }

    #[test]
    fn garbage_number_is_an_error() {
        let body = format!(r#"{{"weather":[{{"hourly":[{}]}}]}}"#, hour("n/a", "5"));
        let err = parse_forecast(&body, 10).unwrap_err();
        assert!(err.to_string().contains("tempC"));
    }
}
