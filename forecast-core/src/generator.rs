//! Clients for the hosted language models that write the clothing
//! recommendation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::config::{Config, GeneratorBackend};
use crate::http::read_json;
use crate::rubric::RubricResult;

pub const GROQ_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const GROQ_DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

pub const HUGGINGFACE_ENDPOINT: &str = "https://api-inference.huggingface.co/models";
pub const HUGGINGFACE_DEFAULT_MODEL: &str = "mistralai/Mistral-7B-Instruct-v0.2";

const SYSTEM_PROMPT: &str = "You are a helpful weather assistant that provides practical clothing \
     advice. Keep responses brief and actionable.";

/// Issues and suggestions from the previous evaluation, handed back to the
/// generator on a refinement pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feedback {
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

impl Feedback {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty() && self.suggestions.is_empty()
    }
}

impl From<&RubricResult> for Feedback {
    fn from(result: &RubricResult) -> Self {
        Self { issues: result.issues.clone(), suggestions: result.suggestions.clone() }
    }
}

#[async_trait]
pub trait Generator: Send + Sync + Debug {
    async fn generate(&self, summary: &str, feedback: Option<&Feedback>) -> Result<String>;
}

/// User prompt for a consensus summary, with any feedback appended.
pub fn build_prompt(summary: &str, feedback: Option<&Feedback>) -> String {
    let mut prompt = format!(
        "Based on the following 10-hour weather forecast, provide a concise clothing \
         recommendation (2-3 sentences max).\n\
         Focus on practical advice about what to wear.\n\n\
         Weather forecast:\n{summary}\n\n\
         Provide a friendly, practical recommendation about what to wear today."
    );

    if let Some(feedback) = feedback.filter(|f| !f.is_empty()) {
        prompt.push_str("\n\nYour previous answer had these issues:\n");
        for issue in &feedback.issues {
            prompt.push_str(&format!("- {issue}\n"));
        }
        prompt.push_str("Apply these suggestions:\n");
        for suggestion in &feedback.suggestions {
            prompt.push_str(&format!("- {suggestion}\n"));
        }
    }

    prompt
}

/// OpenAI-compatible chat completion endpoint (Groq by default).
#[derive(Debug, Clone)]
pub struct ChatCompletionGenerator {
    api_key: String,
    model: String,
    endpoint: String,
    http: Client,
}

impl ChatCompletionGenerator {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: GROQ_DEFAULT_MODEL.to_string(),
            endpoint: GROQ_ENDPOINT.to_string(),
            http: Client::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: String,
}

fn first_choice(response: ChatResponse) -> Result<String> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Chat completion response contained no choices"))?;
    Ok(choice.message.content.trim().to_string())
}

#[async_trait]
impl Generator for ChatCompletionGenerator {
    async fn generate(&self, summary: &str, feedback: Option<&Feedback>) -> Result<String> {
        let prompt = build_prompt(summary, feedback);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: &prompt },
            ],
            temperature: 0.7,
            max_tokens: 200,
        };

        let res = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to chat completion endpoint")?;

        let parsed: ChatResponse = read_json(res, "Chat completion").await?;
        first_choice(parsed)
    }
}

/// Hugging Face text-generation inference API.
#[derive(Debug, Clone)]
pub struct HuggingFaceGenerator {
    api_key: String,
    model: String,
    http: Client,
}

impl HuggingFaceGenerator {
    pub fn new(api_key: String) -> Self {
        Self { api_key, model: HUGGINGFACE_DEFAULT_MODEL.to_string(), http: Client::new() }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    max_new_tokens: u32,
    temperature: f32,
    return_full_text: bool,
}

#[derive(Debug, Serialize)]
struct InferenceRequest {
    inputs: String,
    parameters: InferenceParameters,
}

#[derive(Debug, Deserialize)]
struct InferenceOutput {
    generated_text: String,
}

fn first_generation(outputs: Vec<InferenceOutput>) -> Result<String> {
    let output = outputs
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Unexpected response format from Hugging Face"))?;
    Ok(output.generated_text.trim().to_string())
}

#[async_trait]
impl Generator for HuggingFaceGenerator {
    async fn generate(&self, summary: &str, feedback: Option<&Feedback>) -> Result<String> {
        let request = InferenceRequest {
            inputs: format!("<s>[INST] {} [/INST]", build_prompt(summary, feedback)),
            parameters: InferenceParameters {
                max_new_tokens: 150,
                temperature: 0.7,
                return_full_text: false,
            },
        };

        let url = format!("{HUGGINGFACE_ENDPOINT}/{}", self.model);
        let res = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Hugging Face inference API")?;

        let parsed: Vec<InferenceOutput> = read_json(res, "Hugging Face inference").await?;
        first_generation(parsed)
    }
}

/// Builds the configured generator backend.
pub fn generator_from_config(config: &Config) -> Result<Box<dyn Generator>> {
    let settings = config.generator.as_ref().ok_or_else(|| {
        anyhow::anyhow!(
            "No recommendation generator configured.\n\
             Hint: set GROQ_API_KEY or HUGGINGFACE_API_KEY, or run `forecast configure generator`."
        )
    })?;

    let boxed: Box<dyn Generator> = match settings.backend {
        GeneratorBackend::Groq => {
            let client = ChatCompletionGenerator::new(settings.api_key.clone());
            match &settings.model {
                Some(model) => Box::new(client.with_model(model.clone())),
                None => Box::new(client),
            }
        }
        GeneratorBackend::HuggingFace => {
            let client = HuggingFaceGenerator::new(settings.api_key.clone());
            match &settings.model {
                Some(model) => Box::new(client.with_model(model.clone())),
                None => Box::new(client),
            }
        }
    };

    Ok(boxed)
}
