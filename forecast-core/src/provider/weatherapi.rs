use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    http::read_body,
    model::{Location, SourceReading},
    provider::{ForecastProvider, ProviderId, current_hour},
};

const URL: &str = "http://api.weatherapi.com/v1/forecast.json";

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    http: Client,
}

impl WeatherApiProvider {
    pub fn new(api_key: String) -> Self {
        Self { api_key, http: Client::new() }
    }
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaForecastHour {
    time_epoch: i64,
    temp_c: f64,
    precip_mm: f64,
    wind_kph: f64,
    humidity: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    hour: Vec<WaForecastHour>,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WaForecastResponse {
    forecast: WaForecast,
}

/// Parses a forecast body into readings from the current hour on.
pub fn parse_forecast(body: &str, now: DateTime<Utc>, hours: usize) -> Result<Vec<SourceReading>> {
    let parsed: WaForecastResponse =
        serde_json::from_str(body).context("Failed to parse WeatherAPI forecast JSON")?;

    let from = current_hour(now).timestamp();

    Ok(parsed
        .forecast
        .forecastday
        .into_iter()
        .flat_map(|day| day.hour)
        .filter(|h| h.time_epoch >= from)
        .take(hours)
        .map(|h| SourceReading {
            temperature_c: h.temp_c,
            precipitation_mm: h.precip_mm,
            wind_speed_ms: h.wind_kph / 3.6,
            humidity_pct: h.humidity,
            condition: h.condition.text,
        })
        .collect())
}

#[async_trait]
impl ForecastProvider for WeatherApiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::WeatherApi
    }

    async fn hourly_forecast(&self, location: &Location, hours: usize) -> Result<Vec<SourceReading>> {
        let q = format!("{},{}", location.latitude, location.longitude);

        let res = self
            .http
            .get(URL)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", q.as_str()),
                ("days", "2"),
                ("aqi", "no"),
                ("alerts", "no"),
            ])
            .send()
            .await
            .context("Failed to send request to WeatherAPI.com (forecast)")?;

        let body = read_body(res, "WeatherAPI forecast").await?;
        parse_forecast(&body, Utc::now(), hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hour(epoch: i64, temp: f64) -> String {
        format!(
            r#"{{"time_epoch":{epoch},"time":"-","temp_c":{temp},"precip_mm":0.3,"wind_kph":18.0,
                "humidity":64,"condition":{{"text":"Patchy rain nearby","code":1063}}}}"#
        )
    }

    #[test]
    fn skips_past_hours_and_spans_days() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 22, 0, 0).unwrap().timestamp();
        let day_one = [hour(start - 3600, 5.0), hour(start, 6.0), hour(start + 3600, 7.0)].join(",");
        let day_two = [hour(start + 7200, 8.0), hour(start + 10800, 9.0)].join(",");
        let body = format!(
            r#"{{"location":{{"name":"Paris"}},"forecast":{{"forecastday":[{{"hour":[{day_one}]}},{{"hour":[{day_two}]}}]}}}}"#
        );

        let now = Utc.with_ymd_and_hms(2026, 3, 1, 22, 45, 0).unwrap();
        let readings = parse_forecast(&body, now, 3).unwrap();

        let temps: Vec<f64> = readings.iter().map(|r| r.temperature_c).collect();
        assert_eq!(temps, vec![6.0, 7.0, 8.0]);
        assert_eq!(readings[0].wind_speed_ms, 5.0);
        assert_eq!(readings[0].humidity_pct, 64.0);
        assert_eq!(readings[0].condition, "Patchy rain nearby");
    }

    #[test]
    fn malformed_body_is_an_error() {
        let err = parse_forecast(r#"{"error":{"code":2006}}"#, Utc::now(), 10).unwrap_err();
        assert!(err.to_string().contains("Failed to parse WeatherAPI forecast JSON"));
    }
}
