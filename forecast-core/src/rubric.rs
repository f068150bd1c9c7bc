//! Rubric grading of consensus data, generated recommendations, and
//! composed notification messages.
//!
//! Every check is an independent function returning a [`CheckOutcome`];
//! [`RubricScorer::grade`] folds a list of outcomes into a [`RubricResult`].

use serde::{Deserialize, Serialize};

use crate::model::{AggregatedHour, WeatherConsensus};
use crate::stats::{mean, sample_stdev};

pub const DEFAULT_QUALITY_THRESHOLD: f64 = 0.7;

pub const RECOMMENDED_HOURS: usize = 10;
pub const RECOMMENDED_SOURCES: usize = 3;

pub const MIN_TEXT_CHARS: usize = 20;
pub const MAX_TEXT_CHARS: usize = 500;
pub const GENERIC_TEXT_CHARS: usize = 50;

pub const MIN_MESSAGE_CHARS: usize = 100;
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Leading characters of the recommendation that must appear verbatim in
/// the composed message.
pub const EMBED_PREFIX_CHARS: usize = 50;

pub const WEATHER_TERMS: [&str; 11] = [
    "wear", "clothing", "jacket", "coat", "umbrella", "rain", "cold", "warm", "hot", "temperature",
    "weather",
];
pub const ACTION_TERMS: [&str; 6] = ["should", "recommend", "suggest", "wear", "bring", "take"];
pub const GENERIC_PHRASES: [&str; 3] = ["the weather", "weather conditions", "it depends"];

pub const REQUIRED_SECTIONS: [&str; 4] = ["Temperature", "Rain", "Wind", "Recommendation"];
pub const VISUAL_MARKERS: [&str; 4] = ["🌡️", "☁️", "🌬️", "👔"];
pub const TEMPERATURE_UNITS: [&str; 2] = ["°C", "°F"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Excellent,
    Good,
    Acceptable,
    Poor,
    Unacceptable,
}

impl QualityLevel {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 0.9 => QualityLevel::Excellent,
            s if s >= 0.75 => QualityLevel::Good,
            s if s >= 0.6 => QualityLevel::Acceptable,
            s if s >= 0.4 => QualityLevel::Poor,
            _ => QualityLevel::Unacceptable,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLevel::Excellent => "excellent",
            QualityLevel::Good => "good",
            QualityLevel::Acceptable => "acceptable",
            QualityLevel::Poor => "poor",
            QualityLevel::Unacceptable => "unacceptable",
        }
    }
}

impl std::fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricResult {
    pub overall_score: f64,
    pub level: QualityLevel,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    pub passed: bool,
}

/// Score of a single rubric check.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub score: f64,
    pub issue: Option<String>,
    pub suggestion: Option<String>,
    /// A blocking failure keeps the whole result from passing.
    pub blocking: bool,
}

impl CheckOutcome {
    pub fn pass() -> Self {
        Self { score: 1.0, issue: None, suggestion: None, blocking: false }
    }

    pub fn fail(score: f64, issue: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            score,
            issue: Some(issue.into()),
            suggestion: Some(suggestion.into()),
            blocking: false,
        }
    }

    fn blocking(mut self) -> Self {
        self.blocking = true;
        self
    }

    pub fn passed(&self) -> bool {
        self.issue.is_none()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RubricScorer {
    threshold: f64,
}

impl Default for RubricScorer {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY_THRESHOLD)
    }
}

impl RubricScorer {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Folds check outcomes into one result: the unweighted mean of their
    /// scores, with issues and suggestions kept in check order.
    pub fn grade<I>(&self, outcomes: I) -> RubricResult
    where
        I: IntoIterator<Item = CheckOutcome>,
    {
        let mut scores = Vec::new();
        let mut issues = Vec::new();
        let mut suggestions = Vec::new();
        let mut blocked = false;

        for outcome in outcomes {
            scores.push(outcome.score);
            blocked |= outcome.blocking;
            issues.extend(outcome.issue);
            suggestions.extend(outcome.suggestion);
        }

        let overall_score = mean(&scores);
        RubricResult {
            overall_score,
            level: QualityLevel::from_score(overall_score),
            issues,
            suggestions,
            passed: !blocked && overall_score >= self.threshold,
        }
    }

    /// Grades the completeness and plausibility of an aggregated forecast.
    pub fn evaluate_data(&self, consensus: &WeatherConsensus) -> RubricResult {
        let temps = consensus.temperatures();
        let checks = [
            Some(check_hour_count(consensus.hourly_data.len())),
            Some(check_source_count(consensus.sources_used.len())),
            Some(check_reliability(consensus.reliability_score)),
            check_temperature_spread(&temps),
            Some(check_required_fields(&consensus.hourly_data)),
        ];
        self.grade(checks.into_iter().flatten())
    }

    /// Grades a generated recommendation against the forecast it describes.
    pub fn evaluate_text(&self, text: &str, consensus: &WeatherConsensus) -> RubricResult {
        let lower = text.to_lowercase();
        let chars = text.chars().count();
        let checks = [
            Some(check_text_length(chars)),
            Some(check_weather_vocabulary(&lower)),
            Some(check_actionable(&lower)),
            consensus.mean_temperature().map(|t| check_temperature_direction(&lower, t)),
            (!consensus.hourly_data.is_empty())
                .then(|| check_rain_mention(&lower, consensus.total_precipitation())),
            Some(check_generic(&lower, chars)),
        ];
        self.grade(checks.into_iter().flatten())
    }

    /// Grades the composed notification that embeds `generated_text`.
    pub fn evaluate_message(&self, message: &str, generated_text: &str) -> RubricResult {
        self.grade([
            check_message_length(message.chars().count()),
            check_sections(message),
            check_embeds_text(message, generated_text),
            check_temperature_unit(message),
            check_visual_markers(message),
        ])
    }
}

pub fn check_hour_count(hours: usize) -> CheckOutcome {
    if hours >= RECOMMENDED_HOURS {
        return CheckOutcome::pass();
    }
    CheckOutcome::fail(
        0.5,
        format!("Only {hours} hours of data available (recommended: {RECOMMENDED_HOURS})"),
        "Consider fetching from additional sources",
    )
}

pub fn check_source_count(sources: usize) -> CheckOutcome {
    match sources {
        n if n >= RECOMMENDED_SOURCES => CheckOutcome::pass(),
        n if n < 2 => CheckOutcome::fail(
            0.4,
            format!("Only {n} source(s) used (recommended: {RECOMMENDED_SOURCES}+)"),
            "Add more weather API keys for better reliability",
        ),
        n => CheckOutcome::fail(
            0.7,
            format!("Only {n} sources used (recommended: {RECOMMENDED_SOURCES}+)"),
            "Consider adding more weather sources",
        ),
    }
}

/// Scores the reliability ratio itself; flags it below one half.
pub fn check_reliability(reliability: f64) -> CheckOutcome {
    let score = reliability.clamp(0.0, 1.0);
    if reliability < 0.5 {
        CheckOutcome::fail(
            score,
            format!("Low reliability score: {reliability:.2}"),
            "Data may be inconsistent across sources",
        )
    } else {
        CheckOutcome { score, ..CheckOutcome::pass() }
    }
}

pub fn check_temperature_spread(temps: &[f64]) -> Option<CheckOutcome> {
    if temps.is_empty() {
        return None;
    }
    let min = temps.iter().copied().fold(f64::INFINITY, f64::min);
    let max = temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let spread = max - min;
    let stdev = sample_stdev(temps);

    Some(if spread > 30.0 {
        CheckOutcome::fail(
            0.6,
            format!("Large temperature range: {spread:.1}°C"),
            "Verify data consistency across sources",
        )
    } else if stdev > 10.0 {
        CheckOutcome::fail(
            0.7,
            format!("High temperature variability: std={stdev:.1}°C"),
            "Temperature data may be inconsistent",
        )
    } else {
        CheckOutcome::pass()
    })
}

/// Looks for missing fields in the first three hours.
pub fn check_required_fields(hours: &[AggregatedHour]) -> CheckOutcome {
    let mut missing: Vec<&str> = Vec::new();
    for field in hours.iter().take(3).flat_map(AggregatedHour::missing_fields) {
        if !missing.contains(&field) {
            missing.push(field);
        }
    }
    if missing.is_empty() {
        return CheckOutcome::pass();
    }
    CheckOutcome::fail(
        0.5,
        format!("Missing fields in some hours: {}", missing.join(", ")),
        "Ensure all sources provide complete data",
    )
}

/// A recommendation below the minimum length can never pass.
pub fn check_text_length(chars: usize) -> CheckOutcome {
    if chars < MIN_TEXT_CHARS {
        CheckOutcome::fail(
            0.4,
            format!(
                "Recommendation too short: {chars} characters is insufficient length (minimum {MIN_TEXT_CHARS})"
            ),
            "Generate a more detailed recommendation",
        )
        .blocking()
    } else if chars > MAX_TEXT_CHARS {
        CheckOutcome::fail(
            0.7,
            format!("Recommendation too long: {chars} characters (maximum {MAX_TEXT_CHARS})"),
            "Generate a more concise recommendation",
        )
    } else {
        CheckOutcome::pass()
    }
}

pub fn check_weather_vocabulary(lower: &str) -> CheckOutcome {
    let found = WEATHER_TERMS.iter().filter(|term| lower.contains(*term)).count();
    if found >= 2 {
        return CheckOutcome::pass();
    }
    CheckOutcome::fail(
        0.5,
        "Recommendation may not be weather-relevant",
        "Ensure recommendation addresses weather conditions",
    )
}

pub fn check_actionable(lower: &str) -> CheckOutcome {
    if ACTION_TERMS.iter().any(|term| lower.contains(term)) {
        return CheckOutcome::pass();
    }
    CheckOutcome::fail(
        0.6,
        "Recommendation may lack actionable advice",
        "Include specific clothing recommendations",
    )
}

/// Flags warm-only wording on a cold day and cold-only wording on a hot one.
pub fn check_temperature_direction(lower: &str, mean_temp: f64) -> CheckOutcome {
    let warm = lower.contains("warm");
    let cold = lower.contains("cold");
    if mean_temp < 10.0 && warm && !cold {
        CheckOutcome::fail(
            0.6,
            "Recommendation may not match cold weather conditions",
            "Ensure recommendation reflects actual temperature",
        )
    } else if mean_temp > 25.0 && cold && !warm {
        CheckOutcome::fail(
            0.6,
            "Recommendation may not match warm weather conditions",
            "Ensure recommendation reflects actual temperature",
        )
    } else {
        CheckOutcome::pass()
    }
}

pub fn check_rain_mention(lower: &str, total_precipitation: f64) -> CheckOutcome {
    if total_precipitation > 5.0 && !lower.contains("rain") && !lower.contains("umbrella") {
        return CheckOutcome::fail(
            0.7,
            "Recommendation may not address expected precipitation",
            "Include rain protection in recommendation",
        );
    }
    CheckOutcome::pass()
}

pub fn check_generic(lower: &str, chars: usize) -> CheckOutcome {
    let boilerplate = GENERIC_PHRASES.iter().any(|phrase| lower.contains(phrase));
    if boilerplate && chars < GENERIC_TEXT_CHARS {
        return CheckOutcome::fail(
            0.5,
            "Recommendation may be too generic",
            "Provide more specific, actionable advice",
        );
    }
    CheckOutcome::pass()
}

pub fn check_message_length(chars: usize) -> CheckOutcome {
    if chars < MIN_MESSAGE_CHARS {
        CheckOutcome::fail(
            0.5,
            "Notification too short (may be incomplete)",
            "Ensure all sections are included",
        )
    } else if chars > MAX_MESSAGE_CHARS {
        CheckOutcome::fail(
            0.7,
            "Notification too long (may be overwhelming)",
            "Consider condensing information",
        )
    } else {
        CheckOutcome::pass()
    }
}

pub fn check_sections(message: &str) -> CheckOutcome {
    let missing: Vec<&str> =
        REQUIRED_SECTIONS.iter().copied().filter(|section| !message.contains(section)).collect();
    if missing.is_empty() {
        return CheckOutcome::pass();
    }
    CheckOutcome::fail(
        0.4,
        format!("Missing sections: {}", missing.join(", ")),
        "Include all required notification sections",
    )
}

/// The first [`EMBED_PREFIX_CHARS`] characters of the recommendation must
/// appear in the message.
pub fn check_embeds_text(message: &str, generated_text: &str) -> CheckOutcome {
    let prefix: String = generated_text.chars().take(EMBED_PREFIX_CHARS).collect();
    if prefix.is_empty() || message.contains(&prefix) {
        return CheckOutcome::pass();
    }
    CheckOutcome::fail(
        0.6,
        "Recommendation may not be properly included",
        "Ensure recommendation is in notification",
    )
}

pub fn check_temperature_unit(message: &str) -> CheckOutcome {
    if TEMPERATURE_UNITS.iter().any(|unit| message.contains(unit)) {
        return CheckOutcome::pass();
    }
    CheckOutcome::fail(
        0.5,
        "Temperature information may be missing",
        "Include temperature in notification",
    )
}

pub fn check_visual_markers(message: &str) -> CheckOutcome {
    if VISUAL_MARKERS.iter().any(|marker| message.contains(marker)) {
        return CheckOutcome::pass();
    }
    CheckOutcome::fail(
        0.7,
        "Notification may lack visual formatting",
        "Consider adding emojis for better readability",
    )
}
