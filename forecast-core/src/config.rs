use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use crate::error::ConsensusError;
use crate::model::{Location, ProviderWeights};
use crate::notify::DEFAULT_NTFY_SERVER;
use crate::provider::ProviderId;
use crate::refine::DEFAULT_MAX_REFINEMENTS;
use crate::rubric::DEFAULT_QUALITY_THRESHOLD;

/// Configuration for a single keyed provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorBackend {
    Groq,
    HuggingFace,
}

impl GeneratorBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratorBackend::Groq => "groq",
            GeneratorBackend::HuggingFace => "huggingface",
        }
    }
}

impl std::fmt::Display for GeneratorBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub backend: GeneratorBackend,
    pub api_key: String,
    /// Overrides the backend's default model.
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub topic: Option<String>,
    pub server: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self { topic: None, server: DEFAULT_NTFY_SERVER.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub threshold: f64,
    pub max_refinements: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self { threshold: DEFAULT_QUALITY_THRESHOLD, max_refinements: DEFAULT_MAX_REFINEMENTS }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub provider_timeout_secs: u64,
    pub generator_timeout_secs: u64,
    pub hours: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { provider_timeout_secs: 10, generator_timeout_secs: 30, hours: 10 }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [location]
/// latitude = 48.8566
/// longitude = 2.3522
///
/// [providers.weatherapi]
/// api_key = "..."
///
/// [generator]
/// backend = "groq"
/// api_key = "..."
///
/// [notify]
/// topic = "my-weather"
///
/// [weights]
/// wttr = 0.5
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub location: Option<Location>,
    pub providers: HashMap<String, ProviderConfig>,
    pub generator: Option<GeneratorConfig>,
    pub notify: NotifyConfig,
    pub quality: QualityConfig,
    pub fetch: FetchConfig,
    pub weights: ProviderWeights,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "forecast", "forecast-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set or replace a provider API key.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers.insert(provider_id.as_str().to_string(), ProviderConfig { api_key });
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers
            .get(provider_id.as_str())
            .map(|cfg| cfg.api_key.as_str())
            .filter(|key| !key.trim().is_empty())
    }

    /// Keyless providers are always enabled; keyed ones once their key is set.
    pub fn is_provider_enabled(&self, provider_id: ProviderId) -> bool {
        !provider_id.requires_key() || self.provider_api_key(provider_id).is_some()
    }

    pub fn enabled_providers(&self) -> Vec<ProviderId> {
        ProviderId::all().iter().copied().filter(|id| self.is_provider_enabled(*id)).collect()
    }

    pub fn set_generator(&mut self, backend: GeneratorBackend, api_key: String) {
        let model = self
            .generator
            .take()
            .filter(|current| current.backend == backend)
            .and_then(|current| current.model);
        self.generator = Some(GeneratorConfig { backend, api_key, model });
    }

    pub fn location(&self) -> Result<Location, ConsensusError> {
        self.location.ok_or_else(|| {
            ConsensusError::config(
                "no location configured; set LOCATION_LAT and LOCATION_LON or run `forecast configure location`",
            )
        })
    }

    pub fn topic(&self) -> Option<&str> {
        self.notify.topic.as_deref().filter(|t| !t.trim().is_empty())
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.provider_timeout_secs)
    }

    pub fn generator_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.generator_timeout_secs)
    }

    /// Applies overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Applies overrides from `lookup`, which maps a variable name to its
    /// value. Blank values count as unset.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let lat = var("LOCATION_LAT")
            .map(|v| v.parse::<f64>().with_context(|| format!("LOCATION_LAT is not a number: {v}")))
            .transpose()?;
        let lon = var("LOCATION_LON")
            .map(|v| v.parse::<f64>().with_context(|| format!("LOCATION_LON is not a number: {v}")))
            .transpose()?;
        match (lat, lon) {
            (Some(latitude), Some(longitude)) => {
                self.location = Some(Location { latitude, longitude });
            }
            (None, None) => {}
            _ => return Err(anyhow!("LOCATION_LAT and LOCATION_LON must be set together")),
        }

        if let Some(topic) = var("NTFY_TOPIC") {
            self.notify.topic = Some(topic);
        }
        if let Some(key) = var("WEATHERAPI_KEY") {
            self.upsert_provider_api_key(ProviderId::WeatherApi, key);
        }
        if let Some(key) = var("OPENWEATHER_KEY") {
            self.upsert_provider_api_key(ProviderId::OpenWeather, key);
        }

        // Groq is applied last so it wins when both keys are present.
        if let Some(key) = var("HUGGINGFACE_API_KEY") {
            self.set_generator(GeneratorBackend::HuggingFace, key);
        }
        if let Some(key) = var("GROQ_API_KEY") {
            self.set_generator(GeneratorBackend::Groq, key);
        }

        if let Some(v) = var("QUALITY_THRESHOLD") {
            self.quality.threshold = v
                .parse()
                .with_context(|| format!("QUALITY_THRESHOLD is not a number: {v}"))?;
        }
        if let Some(v) = var("MAX_REFINEMENTS") {
            self.quality.max_refinements = v
                .parse()
                .with_context(|| format!("MAX_REFINEMENTS is not a non-negative integer: {v}"))?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConsensusError> {
        if let Some(location) = &self.location {
            location.validate()?;
        }
        if !(0.0..=1.0).contains(&self.quality.threshold) {
            return Err(ConsensusError::config(format!(
                "quality threshold {} must be between 0 and 1",
                self.quality.threshold
            )));
        }
        if self.fetch.provider_timeout_secs == 0 || self.fetch.generator_timeout_secs == 0 {
            return Err(ConsensusError::config("timeouts must be at least one second"));
        }
        if self.fetch.hours == 0 {
            return Err(ConsensusError::config("forecast hours must be at least 1"));
        }
        if let Some((provider, weight)) =
            self.weights.iter().find(|(_, w)| !w.is_finite() || *w < 0.0)
        {
            return Err(ConsensusError::config(format!(
                "weight {weight} for provider '{provider}' must be a finite, non-negative number"
            )));
        }
        Ok(())
    }
}
