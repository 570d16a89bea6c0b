//! Small utility helpers used across modules.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// Whole calendar days from `a` to `b` (negative if `b` precedes `a`).
/// Mirrors the day math the progression store uses for streaks/rollovers.
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
  (b - a).num_days()
}

/// Calendar date (UTC) of a timestamp, the "YYYY-MM-DD" bucket sessions
/// are grouped by.
pub fn date_of(ts: DateTime<Utc>) -> NaiveDate {
  ts.date_naive()
}

/// Day-of-month of a timestamp; drives the rotating daily-challenge pick.
pub fn day_of_month(ts: DateTime<Utc>) -> u32 {
  ts.day()
}

/// Round to `p` decimal places.
/// The option renderer and the geometry comparisons must round identically,
/// so both go through this.
pub fn round_to(n: f64, p: u32) -> f64 {
  let f = 10f64.powi(p as i32);
  (n * f).round() / f
}

/// Format whole seconds as "MM:SS" for countdown displays.
pub fn fmt_clock(secs: u64) -> String {
  format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
#[allow(dead_code)]
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    s.to_string()
  } else {
    let cut = s
      .char_indices()
      .take_while(|(i, _)| *i < max)
      .last()
      .map(|(i, c)| i + c.len_utf8())
      .unwrap_or(0);
    format!("{}… ({} bytes total)", &s[..cut], s.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn day_math() {
    let a = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    let b = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();
    assert_eq!(days_between(a, b), 3);
    assert_eq!(days_between(b, a), -3);
  }

  #[test]
  fn rounding_matches_renderer() {
    assert_eq!(round_to(33.994, 1), 34.0);
    assert_eq!(round_to(6.05, 1), 6.1);
  }

  #[test]
  fn clock_format() {
    assert_eq!(fmt_clock(0), "00:00");
    assert_eq!(fmt_clock(75), "01:15");
  }
}
