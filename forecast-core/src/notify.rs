use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::fmt::Debug;

use crate::http::read_body;

pub const DEFAULT_NTFY_SERVER: &str = "https://ntfy.sh";
pub const REPORT_TITLE: &str = "Morning Weather Report";

#[async_trait]
pub trait NotificationSink: Send + Sync + Debug {
    async fn send(&self, topic: &str, title: &str, body: &str) -> Result<()>;
}

/// Publishes to an ntfy server by POSTing the body to `<server>/<topic>`.
#[derive(Debug, Clone)]
pub struct NtfySink {
    server: String,
    http: Client,
}

impl Default for NtfySink {
    fn default() -> Self {
        Self::new(DEFAULT_NTFY_SERVER)
    }
}

impl NtfySink {
    pub fn new(server: impl Into<String>) -> Self {
        Self { server: server.into(), http: Client::new() }
    }

    pub fn topic_url(&self, topic: &str) -> String {
        format!("{}/{}", self.server.trim_end_matches('/'), topic)
    }
}

#[async_trait]
impl NotificationSink for NtfySink {
    async fn send(&self, topic: &str, title: &str, body: &str) -> Result<()> {
        let url = self.topic_url(topic);

        let res = self
            .http
            .post(&url)
            .header("Title", title)
            .header("Priority", "default")
            .header("Tags", "sunny,clothing")
            .body(body.as_bytes().to_vec())
            .send()
            .await
            .with_context(|| format!("Failed to send notification to {url}"))?;

        read_body(res, "ntfy publish").await?;
        Ok(())
    }
}
