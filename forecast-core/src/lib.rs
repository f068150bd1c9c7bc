//! Core library for the `forecast` CLI.
//!
//! This crate defines:
//! - Robust statistics and multi-provider consensus aggregation
//! - Rubric grading and bounded refinement of generated recommendations
//! - Abstraction over weather providers, text generators and notification sinks
//! - Configuration & credentials handling
//!
//! It is used by `forecast-cli`, but can also be reused by other binaries or services.

pub mod aggregator;
pub mod config;
pub mod consistency;
pub mod error;
pub mod fetch;
pub mod generator;
mod http;
pub mod model;
pub mod notify;
pub mod provider;
pub mod refine;
pub mod report;
pub mod rubric;
pub mod stats;

pub use aggregator::ConsensusAggregator;
pub use config::{Config, GeneratorBackend, ProviderConfig};
pub use error::ConsensusError;
pub use generator::{Feedback, Generator};
pub use model::{AggregatedHour, Location, ProviderReadings, ProviderWeights, SourceReading, WeatherConsensus};
pub use notify::{NotificationSink, NtfySink};
pub use provider::{ForecastProvider, ProviderId};
pub use refine::{Refinement, RefinementLoop};
pub use rubric::{QualityLevel, RubricResult, RubricScorer};
