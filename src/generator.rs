//! Client for the remote challenge-generation service.
//!
//! One endpoint: POST {base}/v1/challenges/new with the standard request
//! body, returning a full challenge document. The document is treated as an
//! opaque data source — server-side answer hashes are carried, never
//! validated. There is no retry/backoff here; a failure surfaces to the
//! caller as an error state.
//!
//! NOTE: We never log the API key and keep payload truncations short.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::config::GeneratorConfig;
use crate::domain::{ChallengeDoc, ChallengeType};

/// Remote document retrieval failure. Surfaced as an empty/error state by
/// the session flows; retry policy belongs to the service, not this client.
#[derive(Debug, Error)]
pub enum FetchFailure {
  #[error("generator transport error: {0}")]
  Transport(String),
  #[error("generator HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("generator response decode error: {0}")]
  Decode(String),
}

/// Request body for a new challenge document.
#[derive(Clone, Debug, Serialize)]
pub struct ChallengeRequest {
  #[serde(rename = "type")]
  pub challenge_type: ChallengeType,
  pub difficulty: Option<String>,
  pub count: usize,
  pub adaptive: bool,
  pub use_llm: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub seed: Option<u64>,
  pub locale: String,
  #[serde(rename = "timeBudgetSec")]
  pub time_budget_sec: u64,
}

impl ChallengeRequest {
  /// Fill the request from config defaults, with per-call overrides.
  pub fn from_config(
    cfg: &GeneratorConfig,
    challenge_type: ChallengeType,
    difficulty: Option<String>,
    adaptive: bool,
    seed: Option<u64>,
  ) -> Self {
    Self {
      challenge_type,
      difficulty: difficulty.or_else(|| Some(cfg.difficulty.clone())),
      count: cfg.count,
      adaptive,
      use_llm: cfg.use_llm,
      seed,
      locale: cfg.locale.clone(),
      time_budget_sec: cfg.time_budget_sec,
    }
  }
}

#[derive(Clone)]
pub struct Generator {
  client: reqwest::Client,
  pub base_url: String,
  api_key: Option<String>,
}

impl Generator {
  /// Construct the client if a base URL is configured (GENERATOR_BASE_URL
  /// wins over the TOML value); otherwise return None and the seed bank
  /// serves documents.
  pub fn from_sources(cfg: &GeneratorConfig) -> Option<Self> {
    let base_url =
      std::env::var("GENERATOR_BASE_URL").ok().or_else(|| cfg.base_url.clone())?;
    let api_key = std::env::var("GENERATOR_API_KEY").ok();

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self { client, base_url: base_url.trim_end_matches('/').to_string(), api_key })
  }

  /// Request one challenge document. Single request/response, no streaming,
  /// no retries.
  #[instrument(level = "info", skip(self, req), fields(challenge_type = req.challenge_type.as_str(), count = req.count))]
  pub async fn create_challenge(&self, req: &ChallengeRequest) -> Result<ChallengeDoc, FetchFailure> {
    let url = format!("{}/v1/challenges/new", self.base_url);

    let mut builder = self
      .client
      .post(&url)
      .header(USER_AGENT, "matea-backend/0.1")
      .header(CONTENT_TYPE, "application/json");
    if let Some(key) = &self.api_key {
      builder = builder.header(AUTHORIZATION, format!("Bearer {}", key));
    }

    let start = std::time::Instant::now();
    let res = builder
      .json(req)
      .send()
      .await
      .map_err(|e| FetchFailure::Transport(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_error_message(&body).unwrap_or(body);
      error!(target: "challenge", status, %message, "Generator request failed");
      return Err(FetchFailure::Http { status, message });
    }

    let doc: ChallengeDoc =
      res.json().await.map_err(|e| FetchFailure::Decode(e.to_string()))?;
    info!(
      target: "challenge",
      challenge_id = %doc.challenge_id,
      items = doc.items.len(),
      elapsed = ?start.elapsed(),
      "Generator document received"
    );
    Ok(doc)
  }
}

/// Try to extract a clean error message from a generator error body.
fn extract_error_message(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: EObj,
  }
  #[derive(Deserialize)]
  struct EObj {
    message: String,
  }
  #[derive(Deserialize)]
  struct EFlat {
    message: String,
  }
  if let Ok(w) = serde_json::from_str::<EWrap>(body) {
    return Some(w.error.message);
  }
  serde_json::from_str::<EFlat>(body).ok().map(|f| f.message)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::GeneratorConfig;

  #[test]
  fn request_body_uses_wire_names() {
    let cfg = GeneratorConfig::default();
    let req =
      ChallengeRequest::from_config(&cfg, ChallengeType::Numerical, None, true, Some(7));
    let v = serde_json::to_value(&req).unwrap();
    assert_eq!(v["type"], "numerical");
    assert_eq!(v["difficulty"], "medium");
    assert_eq!(v["count"], 5);
    assert_eq!(v["use_llm"], true);
    assert_eq!(v["timeBudgetSec"], 600);
    assert_eq!(v["seed"], 7);
  }

  #[test]
  fn error_message_extraction() {
    assert_eq!(
      extract_error_message(r#"{"error":{"message":"bad seed"}}"#).as_deref(),
      Some("bad seed")
    );
    assert_eq!(
      extract_error_message(r#"{"message":"overloaded"}"#).as_deref(),
      Some("overloaded")
    );
    assert_eq!(extract_error_message("plain text"), None);
  }
}
