//! Bounded generate/evaluate loop over the recommendation text.

use std::time::Duration;

use tracing::{info, warn};

use crate::error::ConsensusError;
use crate::generator::{Feedback, Generator};
use crate::model::WeatherConsensus;
use crate::rubric::{RubricResult, RubricScorer};

pub const DEFAULT_MAX_REFINEMENTS: u32 = 2;
pub const DEFAULT_GENERATOR_TIMEOUT: Duration = Duration::from_secs(30);

/// The accepted text with its last evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    pub text: String,
    pub result: RubricResult,
    /// Number of generator calls made.
    pub attempts: u32,
}

enum Step {
    Generate(Option<Feedback>),
    Evaluate(String),
    Accept(String, RubricResult),
}

#[derive(Debug, Clone)]
pub struct RefinementLoop {
    scorer: RubricScorer,
    max_refinements: u32,
    timeout: Duration,
}

impl Default for RefinementLoop {
    fn default() -> Self {
        Self::new(RubricScorer::default(), DEFAULT_MAX_REFINEMENTS, DEFAULT_GENERATOR_TIMEOUT)
    }
}

impl RefinementLoop {
    pub fn new(scorer: RubricScorer, max_refinements: u32, timeout: Duration) -> Self {
        Self { scorer, max_refinements, timeout }
    }

    pub fn max_refinements(&self) -> u32 {
        self.max_refinements
    }

    /// Generates a recommendation for `consensus`, regenerating with the
    /// previous evaluation's feedback until it passes or the refinement
    /// budget runs out. The last text is accepted either way.
    ///
    /// A generator failure or timeout ends the loop with
    /// [`ConsensusError::Transport`]; it is never retried.
    pub async fn run(
        &self,
        generator: &dyn Generator,
        consensus: &WeatherConsensus,
    ) -> Result<Refinement, ConsensusError> {
        let summary = consensus.summary();
        let mut iteration: u32 = 0;
        let mut step = Step::Generate(None);

        loop {
            step = match step {
                Step::Generate(feedback) => {
                    let text = self.generate(generator, &summary, feedback.as_ref()).await?;
                    Step::Evaluate(text)
                }
                Step::Evaluate(text) => {
                    let result = self.scorer.evaluate_text(&text, consensus);
                    info!(
                        iteration,
                        score = result.overall_score,
                        level = %result.level,
                        passed = result.passed,
                        "Evaluated recommendation"
                    );

                    if result.passed {
                        Step::Accept(text, result)
                    } else if iteration < self.max_refinements {
                        iteration += 1;
                        Step::Generate(Some(Feedback::from(&result)))
                    } else {
                        warn!(
                            attempts = iteration + 1,
                            issues = ?result.issues,
                            "Refinement budget spent; accepting best-effort recommendation"
                        );
                        Step::Accept(text, result)
                    }
                }
                Step::Accept(text, result) => {
                    return Ok(Refinement { text, result, attempts: iteration + 1 });
                }
            };
        }
    }

    async fn generate(
        &self,
        generator: &dyn Generator,
        summary: &str,
        feedback: Option<&Feedback>,
    ) -> Result<String, ConsensusError> {
        match tokio::time::timeout(self.timeout, generator.generate(summary, feedback)).await {
            Ok(Ok(text)) => Ok(text.trim().to_string()),
            Ok(Err(err)) => Err(ConsensusError::transport("generator", format!("{err:#}"))),
            Err(_) => Err(ConsensusError::transport(
                "generator",
                format!("timed out after {}s", self.timeout.as_secs_f64()),
            )),
        }
    }
}
