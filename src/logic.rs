//! Per-item answer drafts and correctness evaluation, shared by the HTTP
//! and WebSocket surfaces.
//!
//! `check_answer` is total: whatever the draft or payload contains, the
//! result is a boolean. Engine failures (bad expression, malformed markup,
//! missing fields) mean "incorrect", never an error to the caller.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::domain::{
  Cell, ChallengeItem, EquationRender, FunctionRender, ReflectRender, Render, RotateRender,
  RouteRender, SceneChange, Target24Render,
};
use crate::engine::expression::{eval_function, safe_eval, uses_exactly, ExprBuilder};
use crate::engine::geometry::{
  grid_to_pixel_centers, option_landmark_centers, option_marker_cell, reflect_point,
  rotate_grid_points, same_centers, walk_route, CENTER_TOL,
};
use crate::engine::maze;

/// Equality tolerance for target/ratio answers.
const EPS_TARGET: f64 = 1e-6;
/// Equality tolerance for equation/function answers.
const EPS_EXACT: f64 = 1e-9;

/// Transient input state for the item being answered. Rebuilt from scratch
/// on every item transition; nothing carries over.
#[derive(Clone, Debug, Default)]
pub struct AnswerDraft {
  /// target_24 expression builder.
  pub builder: Option<ExprBuilder>,
  /// equation_fill keypad slots ("" = empty).
  pub digits: Vec<String>,
  pub focus_blank: usize,
  /// Free numeric answer for the quickfire variants.
  pub free: String,
  /// number_maze path, excluding the start cell.
  pub path: Vec<Cell>,
  /// lexicon_match term → chosen definition.
  pub mapping: HashMap<String, String>,
  /// sequence_missing inputs, one slot per masked index.
  pub seq_inputs: Vec<Option<i64>>,
  /// scene_recall selected candidate text.
  pub selected_text: Option<String>,
  /// Spatial selected option id.
  pub selected_option: Option<String>,
}

impl AnswerDraft {
  /// Fresh draft shaped for `item`: builder chips, keypad width and
  /// sequence slots sized from the render payload.
  pub fn for_item(item: &ChallengeItem) -> Self {
    let mut draft = AnswerDraft::default();
    match &item.render {
      Render::Target24(r) => {
        draft.builder = Some(ExprBuilder::new(target_numbers(item, r), r.slots));
      }
      Render::EquationFill(r) => {
        draft.digits = vec![String::new(); r.blanks];
      }
      Render::SequenceMissing(r) => {
        draft.seq_inputs = vec![None; r.mask_indices.len()];
      }
      _ => {}
    }
    draft
  }

  /// Keypad digit entry: fill the focused slot, spill into the next empty
  /// one, overwrite the focused slot when everything is full.
  pub fn type_digit(&mut self, digit: &str, blanks: usize) {
    self.digits.resize(blanks, String::new());
    let i = self.focus_blank.min(blanks.saturating_sub(1));
    if self.digits[i].is_empty() {
      self.digits[i] = digit.to_string();
      return;
    }
    let next = (i + 1).min(blanks.saturating_sub(1));
    if self.digits[next].is_empty() {
      self.digits[next] = digit.to_string();
    } else {
      self.digits[i] = digit.to_string();
    }
  }

  /// Keypad erase: clear the focused slot, else the last filled one
  /// (moving focus there).
  pub fn erase_digit(&mut self, blanks: usize) {
    self.digits.resize(blanks, String::new());
    let i = self.focus_blank.min(blanks.saturating_sub(1));
    if !self.digits[i].is_empty() {
      self.digits[i].clear();
      return;
    }
    for j in (0..blanks).rev() {
      if !self.digits[j].is_empty() {
        self.digits[j].clear();
        self.focus_blank = j;
        return;
      }
    }
  }

  pub fn clear_digits(&mut self, blanks: usize) {
    self.digits = vec![String::new(); blanks];
    self.focus_blank = 0;
  }

  /// Whether a maze click on `cell` extends the current path: a unit step
  /// from the last path point, while moves remain.
  pub fn can_step(&self, start: Cell, max_steps: usize, cell: Cell) -> bool {
    let last = self.path.last().copied().unwrap_or(start);
    let manhattan = (last.0 - cell.0).abs() + (last.1 - cell.1).abs();
    manhattan == 1 && self.path.len() < max_steps
  }
}

/// Evaluate the draft against the item. Pure and total.
pub fn check_answer(item: &ChallengeItem, draft: &AnswerDraft) -> bool {
  let ok = match &item.render {
    Render::LexiconMatch(r) => {
      !r.pairs.is_empty()
        && r.pairs.iter().all(|p| draft.mapping.get(&p.term) == Some(&p.definition))
    }
    Render::SequenceMissing(r) => {
      !r.mask_indices.is_empty()
        && r.mask_indices.iter().enumerate().all(|(j, &m)| {
          match (draft.seq_inputs.get(j).copied().flatten(), r.sequence.get(m)) {
            (Some(v), Some(&expect)) => v == expect,
            _ => false,
          }
        })
    }
    Render::SceneRecall(r) => {
      let expect = scene_expected(&r.change);
      draft.selected_text.as_deref() == Some(expect.as_str())
    }
    Render::Target24(r) => check_target_24(item, r, draft),
    Render::NumberMaze(r) => maze::check_path(r, &draft.path),
    Render::EquationFill(r) => check_equation_fill(r, &draft.digits),
    Render::FunctionMachine(r) => check_function_machine(r, &draft.free),
    Render::ModularArith(_) => check_modular_arith(item, &draft.free),
    Render::BaseConvert(_) => check_base_convert(item, &draft.free),
    Render::ProbRatio(_) => check_prob_ratio(item, &draft.free),
    Render::RouteNav(r) => selected_matches(draft, expected_route_option(item, r)),
    Render::MirrorReflect(r) => selected_matches(draft, expected_reflect_option(item, r)),
    Render::MapRotate(r) => selected_matches(draft, expected_rotate_option(item, r)),
  };
  debug!(target: "challenge", item = %item.item_id, variant = item.render.variant_name(), ok, "Answer evaluated");
  ok
}

/// The expected answer text for a scene change.
pub fn scene_expected(change: &SceneChange) -> String {
  match change {
    SceneChange::Removed { target_id } => target_id.clone(),
    SceneChange::Moved { target_id, to } => format!("{}@{}-{}", target_id, to.0, to.1),
  }
}

/// The number chips for a target item, falling back to metadata when the
/// render payload omits them.
fn target_numbers(item: &ChallengeItem, r: &Target24Render) -> Vec<i64> {
  if !r.numbers.is_empty() {
    return r.numbers.clone();
  }
  item.metadata.as_ref().and_then(|m| m.numbers.clone()).unwrap_or_default()
}

fn check_target_24(item: &ChallengeItem, r: &Target24Render, draft: &AnswerDraft) -> bool {
  let Some(builder) = &draft.builder else { return false };
  if !builder.can_submit() {
    return false;
  }
  let expr = builder.compose();
  let Ok(v) = safe_eval(&expr) else { return false };
  (v - r.target as f64).abs() < EPS_TARGET && uses_exactly(&expr, &target_numbers(item, r))
}

fn check_equation_fill(r: &EquationRender, digits: &[String]) -> bool {
  fn fill(side: &str, digits: &[String], idx: &mut usize) -> String {
    side
      .chars()
      .map(|ch| {
        if ch == '□' {
          let d = digits.get(*idx).cloned().unwrap_or_default();
          *idx += 1;
          d
        } else {
          ch.to_string()
        }
      })
      .collect()
  }
  let mut idx = 0usize;
  let left = fill(&r.expression_left, digits, &mut idx);
  let right = fill(&r.expression_right, digits, &mut idx);
  if idx != r.blanks {
    return false;
  }
  match (safe_eval(&left), safe_eval(&right)) {
    (Ok(l), Ok(rv)) => (l - rv).abs() < EPS_EXACT,
    _ => false,
  }
}

static QUERY_ARG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(([-\d.]+)\)").unwrap());

fn check_function_machine(r: &FunctionRender, free: &str) -> bool {
  let Ok(want) = free.trim().parse::<f64>() else { return false };
  let Some(x) = QUERY_ARG
    .captures(&r.query)
    .and_then(|cap| cap[1].parse::<f64>().ok())
  else {
    return false;
  };
  let Ok(gx) = eval_function(&r.functions.g, x) else { return false };
  let Ok(fgx) = eval_function(&r.functions.f, gx) else { return false };
  (want - fgx).abs() < EPS_EXACT
}

static MOD_TERMS: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(\d+)\s*×\s*(\d+)\s*\+\s*(\d+)").unwrap());

fn check_modular_arith(item: &ChallengeItem, free: &str) -> bool {
  let Ok(want) = free.trim().parse::<f64>() else { return false };
  let Some(m) = item.metadata.as_ref().and_then(|md| md.modulus) else { return false };
  if m == 0 {
    return false;
  }
  let Some(cap) = MOD_TERMS.captures(&item.prompt) else { return false };
  let (Ok(a), Ok(b), Ok(c)) =
    (cap[1].parse::<i64>(), cap[2].parse::<i64>(), cap[3].parse::<i64>())
  else {
    return false;
  };
  want == ((a * b + c).rem_euclid(m)) as f64
}

static BINARY: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)ubah\s+([01]+)₂").unwrap());

fn check_base_convert(item: &ChallengeItem, free: &str) -> bool {
  let Ok(want) = free.trim().parse::<f64>() else { return false };
  let Some(bits) = BINARY.captures(&item.prompt).map(|cap| cap[1].to_string()) else {
    return false;
  };
  match i64::from_str_radix(&bits, 2) {
    Ok(v) => want == v as f64,
    Err(_) => false,
  }
}

fn check_prob_ratio(item: &ChallengeItem, free: &str) -> bool {
  let Ok(want) = free.trim().parse::<f64>() else { return false };
  let Some((num, den)) = item.metadata.as_ref().and_then(|md| md.fraction) else {
    return false;
  };
  if den == 0 {
    return false;
  }
  (want - num as f64 / den as f64).abs() < EPS_TARGET
}

fn selected_matches(draft: &AnswerDraft, expected: Option<String>) -> bool {
  match (&draft.selected_option, expected) {
    (Some(sel), Some(exp)) => *sel == exp,
    _ => false,
  }
}

/// Id of the option whose marker sits where the described walk ends.
pub fn expected_route_option(item: &ChallengeItem, r: &RouteRender) -> Option<String> {
  let grid = r.grid as i64;
  let start = r
    .base
    .landmarks
    .iter()
    .find(|lm| lm.name == r.action.from)
    .map(|lm| lm.pos)
    .unwrap_or((0, 0));
  let end = walk_route(start, grid, &r.action.steps);
  find_marker_option(item, grid, end)
}

/// Id of the option whose marker sits on the reflected landmark.
/// The reflected landmark is the one named "Pasar", else the first.
pub fn expected_reflect_option(item: &ChallengeItem, r: &ReflectRender) -> Option<String> {
  let grid = r.grid as i64;
  let target = r
    .base
    .landmarks
    .iter()
    .find(|lm| lm.name == "Pasar")
    .or_else(|| r.base.landmarks.first())?;
  let reflected = reflect_point(target.pos, &r.action.axis);
  find_marker_option(item, grid, reflected)
}

/// Id of the option whose landmark centers match the rotated map.
pub fn expected_rotate_option(item: &ChallengeItem, r: &RotateRender) -> Option<String> {
  let cells: Vec<Cell> = r.base.landmarks.iter().map(|lm| lm.pos).collect();
  let expected = grid_to_pixel_centers(&rotate_grid_points(&cells, r.grid as i64, r.action.deg));
  item
    .options
    .rendered()
    .iter()
    .find(|o| same_centers(&option_landmark_centers(&o.render), &expected, CENTER_TOL))
    .and_then(|o| o.option_id.clone())
}

fn find_marker_option(item: &ChallengeItem, grid: i64, cell: Cell) -> Option<String> {
  item
    .options
    .rendered()
    .iter()
    .find(|o| option_marker_cell(&o.render, grid) == Some(cell))
    .and_then(|o| o.option_id.clone())
}
