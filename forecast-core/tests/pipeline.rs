use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use forecast_core::{
    ConsensusAggregator, ConsensusError, Feedback, Generator, ProviderReadings, RefinementLoop,
    RubricScorer, SourceReading, report::format_report,
};

fn series(temps: &[f64], precipitation_mm: f64, condition: &str) -> Vec<SourceReading> {
    temps
        .iter()
        .map(|t| SourceReading {
            temperature_c: *t,
            precipitation_mm,
            wind_speed_ms: 5.5,
            humidity_pct: 82.0,
            condition: condition.to_string(),
        })
        .collect()
}

fn rainy_morning() -> ProviderReadings {
    let base = [4.0, 4.5, 5.0, 5.5, 6.0, 6.5, 7.0, 7.5, 8.0, 8.5];
    let shifted: Vec<f64> = base.iter().map(|t| t + 0.4).collect();
    let glitched: Vec<f64> =
        base.iter().enumerate().map(|(i, t)| if i == 3 { 45.0 } else { t - 0.3 }).collect();

    [
        ("open-meteo".to_string(), series(&base, 1.2, "Moderate rain")),
        ("weatherapi".to_string(), series(&shifted, 1.0, "Moderate rain")),
        ("wttr".to_string(), series(&glitched, 0.8, "Light rain")),
        ("7timer".to_string(), series(&base[..8], 2.0, "lightrainday")),
    ]
    .into_iter()
    .collect()
}

/// Replies in order and records the feedback each call received.
#[derive(Debug)]
struct Scripted {
    replies: Vec<&'static str>,
    seen: Mutex<Vec<Option<Feedback>>>,
}

#[async_trait]
impl Generator for Scripted {
    async fn generate(&self, summary: &str, feedback: Option<&Feedback>) -> anyhow::Result<String> {
        assert!(summary.contains("(rain expected)"));
        let mut seen = self.seen.lock().unwrap();
        seen.push(feedback.cloned());
        let reply = self.replies.get(seen.len() - 1).or(self.replies.last()).copied();
        Ok(reply.unwrap_or_default().to_string())
    }
}

const ADVICE: &str = "A cold and rainy morning: you should wear a warm waterproof jacket over \
    a sweater and bring an umbrella, since steady rain is expected for most of the day.";

#[tokio::test]
async fn consensus_to_graded_report() {
    let consensus = ConsensusAggregator::default().aggregate(&rainy_morning()).unwrap();

    assert_eq!(consensus.hourly_data.len(), 8);
    assert_eq!(consensus.sources_used.len(), 4);
    assert!((consensus.reliability_score - 0.8).abs() < 1e-9);
    assert!(consensus.source_consistency_scores["wttr"] < consensus.source_consistency_scores["open-meteo"]);

    // the 45 °C glitch is rejected but still visible in the raw range
    let glitch_hour = &consensus.hourly_data[3];
    assert!((glitch_hour.temperature_c - 5.5).abs() <= 1.0);
    assert_eq!(glitch_hour.temp_range.1, 45.0);
    assert_eq!(consensus.hourly_data[0].condition, "Moderate rain");

    let scorer = RubricScorer::default();
    let data = scorer.evaluate_data(&consensus);
    // only the hour count falls short
    assert_eq!(data.issues.len(), 1, "{:?}", data.issues);

    let generator = Scripted { replies: vec!["Nice day.", ADVICE], seen: Mutex::default() };
    let refinement = RefinementLoop::new(scorer, 2, Duration::from_secs(5))
        .run(&generator, &consensus)
        .await
        .unwrap();

    assert_eq!(refinement.attempts, 2);
    assert_eq!(refinement.text, ADVICE);
    assert!(refinement.result.passed);
    let seen = generator.seen.lock().unwrap();
    assert!(seen[0].is_none());
    assert!(seen[1].as_ref().is_some_and(|f| !f.issues.is_empty()));

    let report = format_report(&consensus, &refinement.text);
    assert!(report.contains("• ⚠️ Rain expected"));
    let message = scorer.evaluate_message(&report, &refinement.text);
    assert!(message.passed, "{:?}", message.issues);
}

#[test]
fn single_surviving_provider_is_below_quorum() {
    let mut readings = rainy_morning();
    readings.retain(|name, _| name == "open-meteo");
    readings.insert("wttr".to_string(), Vec::new());

    let err = ConsensusAggregator::default().aggregate(&readings).unwrap_err();
    assert!(matches!(err, ConsensusError::InsufficientSources { available: 1, required: 2 }));
}
