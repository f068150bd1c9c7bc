//! Response handling shared by every outbound HTTP client.

use anyhow::{Context, Result};
use reqwest::Response;
use serde::de::DeserializeOwned;

/// Reads the response body, turning a non-2xx status into an error that
/// carries the status and the start of the body.
pub(crate) async fn read_body(res: Response, what: &str) -> Result<String> {
    let status = res.status();
    let body = res.text().await.with_context(|| format!("Failed to read {what} response body"))?;

    if !status.is_success() {
        return Err(anyhow::anyhow!(
            "{what} request failed with status {}: {}",
            status,
            truncate_body(&body),
        ));
    }

    Ok(body)
}

pub(crate) async fn read_json<T: DeserializeOwned>(res: Response, what: &str) -> Result<T> {
    let body = read_body(res, what).await?;
    serde_json::from_str(&body).with_context(|| format!("Failed to parse {what} JSON"))
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_bodies_are_kept() {
        assert_eq!(truncate_body("Bad Request"), "Bad Request");
    }

    #[test]
    fn long_bodies_are_cut_on_a_char_boundary() {
        let body = "é".repeat(300);
        let cut = truncate_body(&body);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 203);
    }
}
