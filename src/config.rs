//! Loading application configuration (timings, scoring, storage, generator)
//! from TOML.
//!
//! See `AppConfig` for the expected schema. Every field has a default, so an
//! empty file — or no file at all — yields a fully working configuration.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info};

use crate::store::STORE_FILE;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub timing: TimingConfig,
  #[serde(default)]
  pub scoring: ScoringConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub generator: GeneratorConfig,
}

/// Per-item phase durations in seconds.
#[derive(Clone, Debug, Deserialize)]
pub struct TimingConfig {
  #[serde(default = "default_memorize_sec")]
  pub memorize_sec: u64,
  #[serde(default = "default_answer_sec")]
  pub answer_sec: u64,
}

impl Default for TimingConfig {
  fn default() -> Self {
    Self { memorize_sec: default_memorize_sec(), answer_sec: default_answer_sec() }
  }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ScoringConfig {
  /// Points awarded per correctly answered item.
  #[serde(default = "default_item_points")]
  pub item_points: i64,
  /// Minutes booked per session when the client does not choose one.
  #[serde(default = "default_duration_min")]
  pub default_duration_min: i64,
  /// Multiplier applied when the played track is the rotating daily pick.
  #[serde(default = "default_daily_bonus")]
  pub daily_bonus_multiplier: f64,
}

impl Default for ScoringConfig {
  fn default() -> Self {
    Self {
      item_points: default_item_points(),
      default_duration_min: default_duration_min(),
      daily_bonus_multiplier: default_daily_bonus(),
    }
  }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct StorageConfig {
  /// Training-data file. Defaults to `./matea.training.v1.json`.
  #[serde(default)]
  pub path: Option<PathBuf>,
}

impl StorageConfig {
  pub fn resolved_path(&self) -> PathBuf {
    self.path.clone().unwrap_or_else(|| PathBuf::from(STORE_FILE))
  }
}

/// Remote challenge-generation service settings. `base_url` may also come
/// from the GENERATOR_BASE_URL environment variable, which wins over TOML.
#[derive(Clone, Debug, Deserialize)]
pub struct GeneratorConfig {
  #[serde(default)]
  pub base_url: Option<String>,
  #[serde(default = "default_count")]
  pub count: usize,
  #[serde(default = "default_difficulty")]
  pub difficulty: String,
  #[serde(default = "default_use_llm")]
  pub use_llm: bool,
  #[serde(default = "default_locale")]
  pub locale: String,
  #[serde(default = "default_time_budget")]
  pub time_budget_sec: u64,
}

impl Default for GeneratorConfig {
  fn default() -> Self {
    Self {
      base_url: None,
      count: default_count(),
      difficulty: default_difficulty(),
      use_llm: default_use_llm(),
      locale: default_locale(),
      time_budget_sec: default_time_budget(),
    }
  }
}

fn default_memorize_sec() -> u64 {
  20
}
fn default_answer_sec() -> u64 {
  10
}
fn default_item_points() -> i64 {
  1000
}
fn default_duration_min() -> i64 {
  10
}
fn default_daily_bonus() -> f64 {
  2.0
}
fn default_count() -> usize {
  5
}
fn default_difficulty() -> String {
  "medium".into()
}
fn default_use_llm() -> bool {
  true
}
fn default_locale() -> String {
  "id-ID".into()
}
fn default_time_budget() -> u64 {
  600
}

/// Attempt to load `AppConfig` from MATEA_CONFIG_PATH. On any parsing/IO
/// error, returns None and the caller falls back to defaults.
pub fn load_app_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("MATEA_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "matea_backend", %path, "Loaded app config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "matea_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "matea_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_toml_yields_defaults() {
    let cfg: AppConfig = toml::from_str("").unwrap();
    assert_eq!(cfg.timing.memorize_sec, 20);
    assert_eq!(cfg.timing.answer_sec, 10);
    assert_eq!(cfg.scoring.item_points, 1000);
    assert_eq!(cfg.generator.count, 5);
    assert_eq!(cfg.generator.locale, "id-ID");
    assert!(cfg.generator.base_url.is_none());
  }

  #[test]
  fn partial_sections_keep_other_defaults() {
    let cfg: AppConfig = toml::from_str(
      r#"
      [timing]
      memorize_sec = 5

      [generator]
      base_url = "http://localhost:9000"
      "#,
    )
    .unwrap();
    assert_eq!(cfg.timing.memorize_sec, 5);
    assert_eq!(cfg.timing.answer_sec, 10);
    assert_eq!(cfg.generator.base_url.as_deref(), Some("http://localhost:9000"));
    assert_eq!(cfg.scoring.default_duration_min, 10);
  }
}
