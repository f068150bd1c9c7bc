use crate::{
    Config,
    model::{Location, SourceReading},
    provider::{
        open_meteo::OpenMeteoProvider, openweather::OpenWeatherProvider,
        seventimer::SevenTimerProvider, weatherapi::WeatherApiProvider, wttr::WttrProvider,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use std::{fmt::Debug, sync::Arc};
use tracing::debug;

pub mod open_meteo;
pub mod openweather;
pub mod seventimer;
pub mod weatherapi;
pub mod wttr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderId {
    OpenMeteo,
    WeatherApi,
    OpenWeather,
    SevenTimer,
    Wttr,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenMeteo => "open-meteo",
            ProviderId::WeatherApi => "weatherapi",
            ProviderId::OpenWeather => "openweather",
            ProviderId::SevenTimer => "7timer",
            ProviderId::Wttr => "wttr",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[
            ProviderId::OpenMeteo,
            ProviderId::WeatherApi,
            ProviderId::OpenWeather,
            ProviderId::SevenTimer,
            ProviderId::Wttr,
        ]
    }

    /// Whether the provider needs an API key before it can be queried.
    pub fn requires_key(&self) -> bool {
        matches!(self, ProviderId::WeatherApi | ProviderId::OpenWeather)
    }

    pub fn keyed() -> impl Iterator<Item = ProviderId> {
        Self::all().iter().copied().filter(ProviderId::requires_key)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "open-meteo" => Ok(ProviderId::OpenMeteo),
            "weatherapi" => Ok(ProviderId::WeatherApi),
            "openweather" => Ok(ProviderId::OpenWeather),
            "7timer" => Ok(ProviderId::SevenTimer),
            "wttr" => Ok(ProviderId::Wttr),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: open-meteo, weatherapi, openweather, 7timer, wttr."
            )),
        }
    }
}

/// A source of hourly forecasts normalized to °C, mm, m/s and %.
#[async_trait]
pub trait ForecastProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    /// Up to `hours` consecutive readings starting at the current hour.
    async fn hourly_forecast(
        &self,
        location: &Location,
        hours: usize,
    ) -> anyhow::Result<Vec<SourceReading>>;
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Arc<dyn ForecastProvider>> {
    let api_key = || {
        config.provider_api_key(id).map(str::to_owned).ok_or_else(|| {
            anyhow::anyhow!(
                "No API key configured for provider '{id}'.\n\
                 Hint: run `forecast configure {id}` and enter your API key."
            )
        })
    };

    let provider: Arc<dyn ForecastProvider> = match id {
        ProviderId::OpenMeteo => Arc::new(OpenMeteoProvider::new()),
        ProviderId::WeatherApi => Arc::new(WeatherApiProvider::new(api_key()?)),
        ProviderId::OpenWeather => Arc::new(OpenWeatherProvider::new(api_key()?)),
        ProviderId::SevenTimer => Arc::new(SevenTimerProvider::new()),
        ProviderId::Wttr => Arc::new(WttrProvider::new()),
    };

    Ok(provider)
}

/// Every keyless provider plus each keyed provider whose key is configured.
pub fn providers_from_config(config: &Config) -> Vec<Arc<dyn ForecastProvider>> {
    ProviderId::all()
        .iter()
        .filter_map(|id| match provider_from_config(*id, config) {
            Ok(provider) => Some(provider),
            Err(_) => {
                debug!(provider = %id, "Skipping provider without API key");
                None
            }
        })
        .collect()
}

/// Start of the hour containing `now`.
pub(crate) fn current_hour(now: DateTime<Utc>) -> DateTime<Utc> {
    now.duration_trunc(TimeDelta::hours(1)).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use chrono::TimeZone;

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let s = id.as_str();
            let parsed = ProviderId::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn provider_id_parse_ignores_case() {
        assert_eq!(ProviderId::try_from("Open-Meteo").unwrap(), ProviderId::OpenMeteo);
        assert_eq!(ProviderId::try_from("WTTR").unwrap(), ProviderId::Wttr);
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn only_commercial_providers_need_keys() {
        let keyed: Vec<ProviderId> = ProviderId::keyed().collect();
        assert_eq!(keyed, vec![ProviderId::WeatherApi, ProviderId::OpenWeather]);
    }

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = provider_from_config(ProviderId::OpenWeather, &cfg).unwrap_err();
        assert!(err.to_string().contains("No API key configured for provider"));
        assert!(provider_from_config(ProviderId::Wttr, &cfg).is_ok());
    }

    #[test]
    fn providers_from_config_includes_keyed_providers_once_configured() {
        let mut cfg = Config::default();
        let ids: Vec<ProviderId> = providers_from_config(&cfg).iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec![ProviderId::OpenMeteo, ProviderId::SevenTimer, ProviderId::Wttr]);

        cfg.upsert_provider_api_key(ProviderId::WeatherApi, "KEY".to_string());
        let ids: Vec<ProviderId> = providers_from_config(&cfg).iter().map(|p| p.id()).collect();
        assert_eq!(ids.len(), 4);
        assert!(ids.contains(&ProviderId::WeatherApi));
    }

    #[test]
    fn current_hour_truncates_minutes() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 14, 37, 12).unwrap();
        assert_eq!(current_hour(now), Utc.with_ymd_and_hms(2026, 3, 1, 14, 0, 0).unwrap());
    }
}
