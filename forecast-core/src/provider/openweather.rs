use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    http::read_body,
    model::{AggregatedHour, Location, SourceReading},
    provider::{ForecastProvider, ProviderId},
};

const URL: &str = "https://api.openweathermap.org/data/2.5/forecast";

/// OpenWeatherMap 5 day / 3 hour forecast. Each step is treated as one
/// reading, with the 3-hour rain total spread evenly.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self { api_key, http: Client::new() }
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct OwRain {
    #[serde(rename = "3h", default)]
    three_hours: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastItem {
    main: OwMain,
    wind: OwWind,
    #[serde(default)]
    weather: Vec<OwWeather>,
    #[serde(default)]
    rain: Option<OwRain>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastItem>,
}

pub fn parse_forecast(body: &str, hours: usize) -> Result<Vec<SourceReading>> {
    let parsed: OwForecastResponse =
        serde_json::from_str(body).context("Failed to parse OpenWeather forecast JSON")?;

    Ok(parsed
        .list
        .into_iter()
        .take(hours)
        .map(|item| SourceReading {
            temperature_c: item.main.temp,
            precipitation_mm: item.rain.unwrap_or_default().three_hours / 3.0,
            wind_speed_ms: item.wind.speed,
            humidity_pct: item.main.humidity,
            condition: item
                .weather
                .into_iter()
                .next()
                .map(|w| w.description)
                .unwrap_or_else(|| AggregatedHour::UNKNOWN_CONDITION.to_string()),
        })
        .collect())
}

#[async_trait]
impl ForecastProvider for OpenWeatherProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeather
    }

    async fn hourly_forecast(&self, location: &Location, hours: usize) -> Result<Vec<SourceReading>> {
        let res = self
            .http
            .get(URL)
            .query(&[
                ("lat", location.latitude.to_string()),
                ("lon", location.longitude.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
                ("cnt", hours.to_string()),
            ])
            .send()
            .await
            .context("Failed to send request to OpenWeather (forecast)")?;

        let body = read_body(res, "OpenWeather forecast").await?;
        parse_forecast(&body, hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"cod":"200","cnt":3,"list":[
        {"dt":1,"main":{"temp":11.5,"humidity":72},"wind":{"speed":4.2},
         "weather":[{"id":500,"description":"light rain"}],"rain":{"3h":1.5},"dt_txt":"2026-03-01 12:00:00"},
        {"dt":2,"main":{"temp":12.0,"humidity":70},"wind":{"speed":3.9},
         "weather":[{"id":803,"description":"broken clouds"}],"dt_txt":"2026-03-01 15:00:00"},
        {"dt":3,"main":{"temp":10.1,"humidity":80},"wind":{"speed":2.0},
         "weather":[],"dt_txt":"2026-03-01 18:00:00"}
    ]}"#;

    #[test]
    fn spreads_three_hour_rain() {
        let readings = parse_forecast(BODY, 10).unwrap();
        assert_eq!(readings.len(), 3);
        assert_eq!(readings[0].precipitation_mm, 0.5);
        assert_eq!(readings[0].condition, "light rain");
        assert_eq!(readings[1].precipitation_mm, 0.0);
        assert_eq!(readings[1].humidity_pct, 70.0);
    }

    #[test]
    fn missing_description_is_unknown() {
        let readings = parse_forecast(BODY, 10).unwrap();
        assert_eq!(readings[2].condition, "Unknown");
    }

    #[test]
    fn honours_hour_limit() {
        assert_eq!(parse_forecast(BODY, 2).unwrap().len(), 2);
    }
}
