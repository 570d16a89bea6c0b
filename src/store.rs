//! Persisted training progression: XP, streak, daily completion flags and
//! the append-only session log, plus the daily-rollover state machine.
//!
//! This module owns:
//!   - the single versioned JSON document on disk (`matea.training.v1.json`)
//!   - the rollover rules applied on every read and before every mutation
//!   - `add_session`, the sole mutation entry point from challenge flows
//!   - a watch channel observers use to re-read state after a write
//!
//! Writes are last-writer-wins; concurrent writers are expected and the
//! rollover recomputation self-heals gross inconsistency. Absent or
//! unparsable state falls back to defaults, never an error.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::ChallengeType;
use crate::util::{date_of, days_between};

pub const LEVEL_SIZE: i64 = 100;
pub const DAILY_GOAL_XP: i64 = 50;
/// Every finished session grants at least this much XP.
pub const MIN_SESSION_XP: i64 = 5;
pub const STORE_FILE: &str = "matea.training.v1.json";

/// One finished challenge session. Immutable once appended.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
  pub id: String,
  #[serde(rename = "dateISO")]
  pub date_iso: DateTime<Utc>,
  pub challenge_id: ChallengeType,
  pub score: i64,
  pub duration_min: i64,
  pub bonus_multiplier: f64,
  pub adaptive: bool,
}

/// Which of the three tracks were completed today.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct CompletedToday {
  pub memory: bool,
  pub spatial: bool,
  pub numerical: bool,
}

impl CompletedToday {
  #[allow(dead_code)]
  pub fn get(&self, c: ChallengeType) -> bool {
    match c {
      ChallengeType::Memory => self.memory,
      ChallengeType::Spatial => self.spatial,
      ChallengeType::Numerical => self.numerical,
    }
  }

  pub fn set(&mut self, c: ChallengeType, v: bool) {
    match c {
      ChallengeType::Memory => self.memory = v,
      ChallengeType::Spatial => self.spatial = v,
      ChallengeType::Numerical => self.numerical = v,
    }
  }

  pub fn count(&self) -> usize {
    [self.memory, self.spatial, self.numerical].iter().filter(|b| **b).count()
  }
}

/// The persisted progression document.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingData {
  pub xp: i64,
  pub streak: i64,
  pub last_active_date: Option<NaiveDate>,
  pub completed_today: CompletedToday,
  pub sessions: Vec<Session>,
}

impl Default for TrainingData {
  fn default() -> Self {
    Self {
      xp: 0,
      streak: 0,
      last_active_date: None,
      completed_today: CompletedToday::default(),
      sessions: Vec::new(),
    }
  }
}

/// Level is a pure function of XP.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelInfo {
  pub level: i64,
  pub xp_in_level: i64,
  pub to_next: i64,
  /// Percent progress through the current level, 0–100.
  pub progress: i64,
}

pub fn calc_level(xp: i64) -> LevelInfo {
  let xp_in_level = xp.rem_euclid(LEVEL_SIZE);
  LevelInfo {
    level: xp.div_euclid(LEVEL_SIZE) + 1,
    xp_in_level,
    to_next: LEVEL_SIZE - xp_in_level,
    progress: ((xp_in_level as f64 / LEVEL_SIZE as f64) * 100.0).round() as i64,
  }
}

/// XP granted for a session: raw score times bonus, floored at the minimum.
pub fn gained_xp(score: i64, bonus_multiplier: f64) -> i64 {
  ((score as f64 * bonus_multiplier).round() as i64).max(MIN_SESSION_XP)
}

/// Daily rollover, applied before anything reads or writes the data.
///
/// First use pins today's date. Same-day calls are idempotent. Exactly one
/// day elapsed resets only the completion flags — the streak moves when the
/// first session of the new day lands, not here. Anything else (2+ days, or
/// a clock that went backwards) also zeroes the streak.
pub fn ensure_daily(data: &mut TrainingData, today: NaiveDate) {
  let Some(last) = data.last_active_date else {
    data.last_active_date = Some(today);
    data.completed_today = CompletedToday::default();
    return;
  };
  let d = days_between(last, today);
  if d == 0 {
    return;
  }
  if d == 1 {
    data.completed_today = CompletedToday::default();
    data.last_active_date = Some(today);
    return;
  }
  data.streak = 0;
  data.completed_today = CompletedToday::default();
  data.last_active_date = Some(today);
}

/// What the challenge flow reports when a session finishes.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
  pub challenge_id: ChallengeType,
  pub score: i64,
  pub duration_min: i64,
  pub bonus_multiplier: f64,
  pub adaptive: bool,
}

/// Read-only projection recomputed from the raw data on demand; none of
/// these values are stored.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedStats {
  pub xp: i64,
  pub streak: i64,
  pub last_active_date: Option<NaiveDate>,
  pub completed_today: CompletedToday,
  pub completed_count_today: usize,
  pub daily_xp_today: i64,
  pub daily_goal_xp: i64,
  /// Percent toward the daily XP goal, capped at 100.
  pub daily_progress: i64,
  pub focus_minutes_today: i64,
  pub weekly_active_days: usize,
  #[serde(flatten)]
  pub level: LevelInfo,
  pub sessions_total: usize,
}

pub fn derive_stats(data: &TrainingData, now: DateTime<Utc>) -> DerivedStats {
  let today = date_of(now);
  let todays = || data.sessions.iter().filter(|s| date_of(s.date_iso) == today);

  let daily_xp_today: i64 =
    todays().map(|s| gained_xp(s.score, s.bonus_multiplier)).sum();
  let focus_minutes_today: i64 = todays().map(|s| s.duration_min).sum();

  let mut week_days: std::collections::HashSet<NaiveDate> = std::collections::HashSet::new();
  for s in &data.sessions {
    if now.signed_duration_since(s.date_iso) <= Duration::days(6) {
      week_days.insert(date_of(s.date_iso));
    }
  }

  let capped = daily_xp_today.min(DAILY_GOAL_XP);
  DerivedStats {
    xp: data.xp,
    streak: data.streak,
    last_active_date: data.last_active_date,
    completed_today: data.completed_today,
    completed_count_today: data.completed_today.count(),
    daily_xp_today,
    daily_goal_xp: DAILY_GOAL_XP,
    daily_progress: ((capped as f64 / DAILY_GOAL_XP as f64) * 100.0).round().min(100.0) as i64,
    focus_minutes_today,
    weekly_active_days: week_days.len(),
    level: calc_level(data.xp),
    sessions_total: data.sessions.len(),
  }
}

/// Process-wide progression store: one JSON document, healed on every
/// access, broadcast on every write.
pub struct TrainingStore {
  path: PathBuf,
  data: RwLock<TrainingData>,
  rev: watch::Sender<u64>,
}

impl TrainingStore {
  /// Open the store at `path`, falling back to defaults when the file is
  /// absent or unreadable.
  #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
  pub fn open(path: impl AsRef<Path>) -> Self {
    let path = path.as_ref().to_path_buf();
    let data = load(&path);
    info!(
      target: "training",
      xp = data.xp,
      streak = data.streak,
      sessions = data.sessions.len(),
      "Training store opened"
    );
    let (rev, _) = watch::channel(0);
    Self { path, data: RwLock::new(data), rev }
  }

  /// Observers re-read the full state whenever the revision ticks;
  /// there is no partial/delta sync.
  pub fn subscribe(&self) -> watch::Receiver<u64> {
    self.rev.subscribe()
  }

  /// Current data, after applying the daily rollover.
  #[allow(dead_code)]
  pub async fn snapshot(&self) -> TrainingData {
    self.snapshot_at(Utc::now()).await
  }

  pub async fn snapshot_at(&self, now: DateTime<Utc>) -> TrainingData {
    let mut d = self.data.write().await;
    ensure_daily(&mut d, date_of(now));
    d.clone()
  }

  /// Derived dashboard projection.
  pub async fn stats(&self) -> DerivedStats {
    let now = Utc::now();
    let data = self.snapshot_at(now).await;
    derive_stats(&data, now)
  }

  /// Record a finished session. Called exactly once per completed (or
  /// abandoned-with-result) session; this is the only mutation entry point
  /// from challenge flows.
  #[instrument(level = "info", skip(self, payload), fields(challenge = payload.challenge_id.as_str(), score = payload.score))]
  pub async fn add_session(&self, payload: SessionPayload) -> (Session, i64) {
    self.add_session_at(payload, Utc::now()).await
  }

  pub async fn add_session_at(
    &self,
    payload: SessionPayload,
    now: DateTime<Utc>,
  ) -> (Session, i64) {
    let mut d = self.data.write().await;
    let today = date_of(now);

    // Continuity is judged against the state as it was before this call:
    // the pre-rollover active date and the pre-append session log.
    let prev_last_active = d.last_active_date;
    let had_session_today = d.sessions.iter().any(|s| date_of(s.date_iso) == today);

    ensure_daily(&mut d, today);

    let gained = gained_xp(payload.score, payload.bonus_multiplier);
    let session = Session {
      id: Uuid::new_v4().to_string(),
      date_iso: now,
      challenge_id: payload.challenge_id,
      score: payload.score,
      duration_min: payload.duration_min,
      bonus_multiplier: payload.bonus_multiplier,
      adaptive: payload.adaptive,
    };

    d.sessions.push(session.clone());
    d.xp += gained;
    d.completed_today.set(payload.challenge_id, true);

    if !had_session_today {
      let continued =
        matches!(prev_last_active, Some(prev) if days_between(prev, today) == 1);
      d.streak = if continued { (d.streak + 1).max(1) } else { 1 };
    }
    d.last_active_date = Some(today);

    persist(&self.path, &d);
    self.rev.send_modify(|r| *r += 1);

    info!(
      target: "training",
      session_id = %session.id,
      gained_xp = gained,
      xp = d.xp,
      streak = d.streak,
      "Session recorded"
    );
    (session, gained)
  }
}

fn load(path: &Path) -> TrainingData {
  match std::fs::read_to_string(path) {
    Ok(raw) => match serde_json::from_str::<TrainingData>(&raw) {
      Ok(data) => data,
      Err(e) => {
        warn!(target: "training", path = %path.display(), error = %e, "Persisted state unparsable; starting fresh");
        TrainingData::default()
      }
    },
    Err(_) => TrainingData::default(),
  }
}

fn persist(path: &Path, data: &TrainingData) {
  match serde_json::to_string(data) {
    Ok(json) => {
      if let Err(e) = std::fs::write(path, json) {
        warn!(target: "training", path = %path.display(), error = %e, "Failed to persist training data");
      }
    }
    Err(e) => {
      warn!(target: "training", error = %e, "Failed to serialize training data");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn day(n: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, n, 12, 0, 0).unwrap()
  }

  fn tmp_store() -> TrainingStore {
    let path =
      std::env::temp_dir().join(format!("matea-training-test-{}.json", Uuid::new_v4()));
    TrainingStore::open(path)
  }

  fn payload(challenge_id: ChallengeType, score: i64, bonus: f64) -> SessionPayload {
    SessionPayload {
      challenge_id,
      score,
      duration_min: 5,
      bonus_multiplier: bonus,
      adaptive: true,
    }
  }

  #[test]
  fn level_is_a_pure_function_of_xp() {
    let l = calc_level(250);
    assert_eq!(l.level, 3);
    assert_eq!(l.xp_in_level, 50);
    assert_eq!(l.to_next, 50);
    assert_eq!(l.progress, 50);

    let l = calc_level(0);
    assert_eq!(l.level, 1);
    assert_eq!(l.progress, 0);

    for xp in [0, 1, 99, 100, 1234] {
      let l = calc_level(xp);
      assert_eq!(l.level, xp / 100 + 1);
      assert!((0..=100).contains(&l.progress));
    }
  }

  #[test]
  fn rollover_state_machine() {
    let d1 = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    let d2 = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
    let d4 = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();

    let mut data = TrainingData::default();
    ensure_daily(&mut data, d1);
    assert_eq!(data.last_active_date, Some(d1));

    data.streak = 3;
    data.completed_today.memory = true;

    // same day: idempotent
    ensure_daily(&mut data, d1);
    assert!(data.completed_today.memory);

    // next day: flags reset, streak untouched
    ensure_daily(&mut data, d2);
    assert!(!data.completed_today.memory);
    assert_eq!(data.streak, 3);
    assert_eq!(data.last_active_date, Some(d2));

    // two-day gap: streak gone
    ensure_daily(&mut data, d4);
    assert_eq!(data.streak, 0);

    // regression also resets
    data.streak = 5;
    ensure_daily(&mut data, d1);
    assert_eq!(data.streak, 0);
  }

  #[tokio::test]
  async fn streak_continuity_increments_once_per_day() {
    let store = tmp_store();

    store.add_session_at(payload(ChallengeType::Memory, 10, 1.0), day(1)).await;
    assert_eq!(store.snapshot_at(day(1)).await.streak, 1);

    // next day: +1
    store.add_session_at(payload(ChallengeType::Spatial, 10, 1.0), day(2)).await;
    assert_eq!(store.snapshot_at(day(2)).await.streak, 2);

    // second session the same day: unchanged
    store.add_session_at(payload(ChallengeType::Numerical, 10, 1.0), day(2)).await;
    assert_eq!(store.snapshot_at(day(2)).await.streak, 2);

    // 2+ day gap: back to 1
    store.add_session_at(payload(ChallengeType::Memory, 10, 1.0), day(5)).await;
    assert_eq!(store.snapshot_at(day(5)).await.streak, 1);
  }

  #[tokio::test]
  async fn xp_floor_applies_to_zero_scores() {
    let store = tmp_store();
    let (_, gained) =
      store.add_session_at(payload(ChallengeType::Memory, 0, 1.0), day(1)).await;
    assert_eq!(gained, MIN_SESSION_XP);
    assert_eq!(store.snapshot_at(day(1)).await.xp, MIN_SESSION_XP);
  }

  #[tokio::test]
  async fn fresh_store_end_to_end() {
    let store = tmp_store();
    let before = store.snapshot_at(day(1)).await;
    assert_eq!((before.xp, before.streak), (0, 0));

    let (session, gained) = store
      .add_session_at(
        SessionPayload {
          challenge_id: ChallengeType::Memory,
          score: 10,
          duration_min: 5,
          bonus_multiplier: 2.0,
          adaptive: true,
        },
        day(1),
      )
      .await;

    assert_eq!(gained, 20);
    let after = store.snapshot_at(day(1)).await;
    assert_eq!(after.xp, 20);
    assert!(after.completed_today.memory);
    assert_eq!(after.streak, 1);
    assert_eq!(after.sessions.len(), 1);
    assert_eq!(after.sessions[0].id, session.id);
  }

  #[tokio::test]
  async fn completion_flags_require_a_matching_session_today() {
    let store = tmp_store();
    store.add_session_at(payload(ChallengeType::Spatial, 100, 1.0), day(1)).await;
    let data = store.snapshot_at(day(1)).await;
    assert!(data.completed_today.spatial);
    let today = date_of(day(1));
    assert!(data
      .sessions
      .iter()
      .any(|s| s.challenge_id == ChallengeType::Spatial && date_of(s.date_iso) == today));
  }

  #[tokio::test]
  async fn derived_stats_recompute_from_sessions() {
    let store = tmp_store();
    store.add_session_at(payload(ChallengeType::Memory, 10, 2.0), day(1)).await;
    store.add_session_at(payload(ChallengeType::Spatial, 0, 1.0), day(1)).await;
    // a session from three days ago must not count toward today
    store.add_session_at(payload(ChallengeType::Memory, 50, 1.0), day(4)).await;

    let data = store.snapshot_at(day(4)).await;
    let stats = derive_stats(&data, day(4));
    assert_eq!(stats.daily_xp_today, 50);
    assert_eq!(stats.focus_minutes_today, 5);
    assert_eq!(stats.weekly_active_days, 2);
    assert_eq!(stats.daily_progress, 100);
    assert_eq!(stats.sessions_total, 3);
  }

  #[tokio::test]
  async fn persistence_roundtrip_and_malformed_fallback() {
    let path =
      std::env::temp_dir().join(format!("matea-training-test-{}.json", Uuid::new_v4()));
    {
      let store = TrainingStore::open(&path);
      store.add_session_at(payload(ChallengeType::Numerical, 30, 1.0), day(1)).await;
    }
    let reopened = TrainingStore::open(&path);
    let data = reopened.snapshot_at(day(1)).await;
    assert_eq!(data.xp, 30);
    assert_eq!(data.sessions.len(), 1);

    std::fs::write(&path, "{not json").unwrap();
    let fallback = TrainingStore::open(&path);
    assert_eq!(fallback.snapshot_at(day(1)).await.xp, 0);
  }

  #[tokio::test]
  async fn writes_signal_subscribers() {
    let store = tmp_store();
    let mut rx = store.subscribe();
    let before = *rx.borrow_and_update();
    store.add_session_at(payload(ChallengeType::Memory, 10, 1.0), day(1)).await;
    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), before + 1);
  }
}
