use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use forecast_core::{
    Config, ConsensusAggregator, GeneratorBackend, NotificationSink, NtfySink, ProviderId,
    RefinementLoop, RubricResult, RubricScorer, WeatherConsensus,
    fetch::fetch_all,
    generator::generator_from_config,
    notify::REPORT_TITLE,
    provider::providers_from_config,
    report::format_report,
};
use inquire::{CustomType, Password, Select, Text};
use tracing::{info, warn};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "forecast",
    version,
    about = "Multi-source weather consensus with graded clothing advice"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch all providers, build the consensus, generate advice and send the report.
    Run {
        /// Build the report but do not publish it.
        #[arg(long)]
        dry_run: bool,

        /// Print the consensus forecast as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Interactively configure a setting.
    Configure {
        /// "weatherapi", "openweather", "generator", "topic" or "location".
        target: String,
    },

    /// Report whether the configuration is ready to run, without network access.
    Check,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigureTarget {
    Provider(ProviderId),
    Generator,
    Topic,
    Location,
}

impl TryFrom<&str> for ConfigureTarget {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "generator" => return Ok(ConfigureTarget::Generator),
            "topic" | "ntfy" => return Ok(ConfigureTarget::Topic),
            "location" => return Ok(ConfigureTarget::Location),
            _ => {}
        }

        let id = ProviderId::try_from(value)?;
        if !id.requires_key() {
            bail!("Provider '{id}' needs no configuration.");
        }
        Ok(ConfigureTarget::Provider(id))
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Run { dry_run, json } => run_pipeline(dry_run, json).await,
            Command::Configure { target } => configure(ConfigureTarget::try_from(target.as_str())?),
            Command::Check => check(),
        }
    }
}

fn load_config() -> Result<Config> {
    let mut config = Config::load()?;
    config.apply_env().context("Invalid environment override")?;
    config.validate()?;
    Ok(config)
}

fn log_grade(stage: &str, result: &RubricResult) {
    if result.passed {
        info!(stage, score = result.overall_score, level = %result.level, "Quality check passed");
    } else {
        warn!(
            stage,
            score = result.overall_score,
            level = %result.level,
            issues = ?result.issues,
            "Quality check below threshold"
        );
    }
}

async fn run_pipeline(dry_run: bool, json: bool) -> Result<()> {
    let config = load_config()?;
    let location = config.location()?;

    let topic = config.topic().map(str::to_owned);
    if topic.is_none() && !dry_run {
        bail!(
            "No ntfy topic configured.\n\
             Hint: set NTFY_TOPIC, run `forecast configure topic`, or pass --dry-run."
        );
    }
    let generator = generator_from_config(&config)?;

    let providers = providers_from_config(&config);
    info!(
        latitude = location.latitude,
        longitude = location.longitude,
        providers = providers.len(),
        "Fetching forecasts"
    );
    let readings =
        fetch_all(&providers, location, config.fetch.hours, config.provider_timeout()).await;

    let consensus = ConsensusAggregator::new(config.weights.clone()).aggregate(&readings)?;

    let scorer = RubricScorer::new(config.quality.threshold);
    log_grade("data", &scorer.evaluate_data(&consensus));

    let refiner =
        RefinementLoop::new(scorer, config.quality.max_refinements, config.generator_timeout());
    let refinement = refiner.run(generator.as_ref(), &consensus).await?;

    let report = format_report(&consensus, &refinement.text);
    log_grade("report", &scorer.evaluate_message(&report, &refinement.text));

    if json {
        let out = serde_json::to_string_pretty(&consensus)
            .context("Failed to serialize consensus forecast")?;
        println!("{out}");
    } else {
        print_summary(&consensus, refinement.attempts, &refinement.result);
    }

    match topic.filter(|_| !dry_run) {
        Some(topic) => {
            NtfySink::new(config.notify.server.as_str())
                .send(&topic, REPORT_TITLE, &report)
                .await?;
            info!(topic = %topic, "Notification sent");
        }
        None if !json => println!("\n{report}"),
        None => {}
    }

    Ok(())
}

fn print_summary(consensus: &WeatherConsensus, attempts: u32, advice: &RubricResult) {
    let temps = consensus.temperatures();
    let low = temps.iter().copied().fold(f64::INFINITY, f64::min);
    let high = temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let sources: Vec<&str> = consensus.sources_used.iter().map(String::as_str).collect();

    println!("Forecast built {}", chrono::Local::now().format("%Y-%m-%d %H:%M"));
    println!("  Sources:      {}", sources.join(", "));
    println!("  Reliability:  {:.0}%", consensus.reliability_score * 100.0);
    println!("  Hours:        {}", consensus.hourly_data.len());
    if !temps.is_empty() {
        println!("  Temperature:  {low:.1}°C - {high:.1}°C");
    }
    for (provider, score) in &consensus.source_consistency_scores {
        println!("  Consistency:  {provider} {score:.2}");
    }
    println!("  Advice:       {} after {attempts} attempt(s)", advice.level);
}

fn configure(target: ConfigureTarget) -> Result<()> {
    let mut config = Config::load()?;

    match target {
        ConfigureTarget::Provider(id) => {
            let api_key = Password::new(&format!("API key for {id}:"))
                .without_confirmation()
                .prompt()
                .context("Failed to read API key")?;
            config.upsert_provider_api_key(id, api_key.trim().to_string());
        }
        ConfigureTarget::Generator => {
            let backend =
                Select::new("Generator backend:", vec![GeneratorBackend::Groq, GeneratorBackend::HuggingFace])
                    .prompt()
                    .context("Failed to read generator backend")?;
            let api_key = Password::new(&format!("API key for {backend}:"))
                .without_confirmation()
                .prompt()
                .context("Failed to read API key")?;
            config.set_generator(backend, api_key.trim().to_string());
        }
        ConfigureTarget::Topic => {
            let topic = Text::new("ntfy topic:").prompt().context("Failed to read topic")?;
            let topic = topic.trim();
            if topic.is_empty() {
                return Err(anyhow!("Topic must not be empty"));
            }
            config.notify.topic = Some(topic.to_string());
        }
        ConfigureTarget::Location => {
            let latitude = CustomType::<f64>::new("Latitude:")
                .with_help_message("-90 to 90")
                .prompt()
                .context("Failed to read latitude")?;
            let longitude = CustomType::<f64>::new("Longitude:")
                .with_help_message("-180 to 180")
                .prompt()
                .context("Failed to read longitude")?;
            config.location = Some(forecast_core::Location::new(latitude, longitude)?);
        }
    }

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

fn check() -> Result<()> {
    let config = load_config()?;
    let mut missing = Vec::new();

    println!("Config file: {}", Config::config_file_path()?.display());

    match config.location {
        Some(loc) => println!("Location:    {}, {}", loc.latitude, loc.longitude),
        None => missing.push("location"),
    }

    let enabled: Vec<String> = config.enabled_providers().iter().map(|id| id.to_string()).collect();
    println!("Providers:   {}", enabled.join(", "));

    match &config.generator {
        Some(generator) => println!("Generator:   {}", generator.backend),
        None => missing.push("generator API key"),
    }

    match config.topic() {
        Some(topic) => println!("ntfy topic:  {topic} ({})", config.notify.server),
        None => missing.push("ntfy topic"),
    }

    println!(
        "Quality:     threshold {}, up to {} refinement(s)",
        config.quality.threshold, config.quality.max_refinements
    );

    if missing.is_empty() {
        println!("Ready.");
        Ok(())
    } else {
        Err(anyhow!("Not ready, missing: {}", missing.join(", ")))
    }
}
