//! Domain models used by the backend: challenge documents, variant-tagged
//! render payloads, option payloads, and map/scene primitives.
//!
//! `Render` is a tagged union keyed by the wire field `variant`, one payload
//! shape per tag, so verification code never probes loose JSON fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three fixed challenge tracks. Doubles as the per-day completion key
/// in the progression store.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
  Memory,
  Spatial,
  Numerical,
}

impl ChallengeType {
  pub const ALL: [ChallengeType; 3] =
    [ChallengeType::Memory, ChallengeType::Spatial, ChallengeType::Numerical];

  pub fn as_str(self) -> &'static str {
    match self {
      ChallengeType::Memory => "memory",
      ChallengeType::Spatial => "spatial",
      ChallengeType::Numerical => "numerical",
    }
  }
}

/// A grid cell as (row, col). Rows grow downward, matching the renderer.
pub type Cell = (i64, i64);

/// One generated challenge document: a handful of items played in order.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeDoc {
  pub challenge_id: String,
  #[serde(rename = "type")]
  pub challenge_type: ChallengeType,
  #[serde(default)]
  pub difficulty: Option<String>,
  pub generated_at: DateTime<Utc>,
  pub items: Vec<ChallengeItem>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub scoring: Option<serde_json::Value>,
}

/// A single puzzle within a document. `render` is variant-specific and
/// read-only to the engines.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeItem {
  pub item_id: String,
  pub prompt: String,
  #[serde(flatten)]
  pub render: Render,
  #[serde(default)]
  pub options: Options,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub answer_spec: Option<AnswerSpec>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub metadata: Option<Metadata>,
  /// Server-side solution hash; carried opaquely, never validated here.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub answer_hash: Option<String>,
}

/// Variant-tagged render payloads. The wire format is
/// `{"variant": "...", "render": {...}}` on the item itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "variant", content = "render", rename_all = "snake_case")]
pub enum Render {
  LexiconMatch(LexiconRender),
  SequenceMissing(SequenceRender),
  SceneRecall(SceneRender),
  // "Target24" does not snake_case to the wire tag on its own
  #[serde(rename = "target_24")]
  Target24(Target24Render),
  NumberMaze(MazeRender),
  EquationFill(EquationRender),
  FunctionMachine(FunctionRender),
  ModularArith(FreeRender),
  BaseConvert(FreeRender),
  ProbRatio(FreeRender),
  RouteNav(RouteRender),
  MirrorReflect(ReflectRender),
  MapRotate(RotateRender),
}

impl Render {
  pub fn variant_name(&self) -> &'static str {
    match self {
      Render::LexiconMatch(_) => "lexicon_match",
      Render::SequenceMissing(_) => "sequence_missing",
      Render::SceneRecall(_) => "scene_recall",
      Render::Target24(_) => "target_24",
      Render::NumberMaze(_) => "number_maze",
      Render::EquationFill(_) => "equation_fill",
      Render::FunctionMachine(_) => "function_machine",
      Render::ModularArith(_) => "modular_arith",
      Render::BaseConvert(_) => "base_convert",
      Render::ProbRatio(_) => "prob_ratio",
      Render::RouteNav(_) => "route_nav",
      Render::MirrorReflect(_) => "mirror_reflect",
      Render::MapRotate(_) => "map_rotate",
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LexiconPair {
  pub term: String,
  pub definition: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LexiconRender {
  pub pairs: Vec<LexiconPair>,
  #[serde(default)]
  pub distractors: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceRender {
  pub sequence: Vec<i64>,
  pub mask_indices: Vec<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SceneObject {
  pub id: String,
  pub icon: String,
  pub pos: Cell,
}

/// What changed between the memorized scene and the question.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SceneChange {
  #[serde(rename_all = "camelCase")]
  Removed { target_id: String },
  #[serde(rename_all = "camelCase")]
  Moved { target_id: String, to: Cell },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SceneRender {
  #[serde(default = "default_scene_grid")]
  pub grid: usize,
  pub objects: Vec<SceneObject>,
  pub change: SceneChange,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Target24Render {
  pub numbers: Vec<i64>,
  #[serde(default = "default_target_24")]
  pub target: i64,
  #[serde(default = "default_slots")]
  pub slots: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MazeEdges {
  /// Operators on horizontal edges: `h[r][c]` joins (r,c)–(r,c+1).
  pub h: Vec<Vec<String>>,
  /// Operators on vertical edges: `v[r][c]` joins (r,c)–(r+1,c).
  pub v: Vec<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MazeRender {
  #[serde(default = "default_maze_grid")]
  pub grid: usize,
  pub cells: Vec<Vec<i64>>,
  pub edges: MazeEdges,
  pub start: Cell,
  #[serde(default = "default_max_steps")]
  pub max_steps: usize,
  pub target: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquationRender {
  pub expression_left: String,
  pub expression_right: String,
  #[serde(default = "default_blanks")]
  pub blanks: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionDefs {
  pub f: String,
  pub g: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionRender {
  pub functions: FunctionDefs,
  /// e.g. "f(g(3))" — the inner argument is read out of this string.
  pub query: String,
}

/// Variants whose puzzle data lives in the prompt/metadata only.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FreeRender {}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Landmark {
  pub name: String,
  #[serde(default)]
  pub icon: Option<String>,
  pub pos: Cell,
}

/// The static map a spatial item is asked about.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MapBase {
  #[serde(default)]
  pub roads: Vec<(Cell, Cell)>,
  #[serde(default)]
  pub river: Vec<Cell>,
  #[serde(default)]
  pub landmarks: Vec<Landmark>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub north: Option<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Direction {
  N,
  S,
  E,
  W,
}

impl Direction {
  /// Unit step as (dr, dc).
  pub fn delta(self) -> (i64, i64) {
    match self {
      Direction::N => (-1, 0),
      Direction::S => (1, 0),
      Direction::E => (0, 1),
      Direction::W => (0, -1),
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouteAction {
  /// Name of the landmark the walk starts from.
  pub from: String,
  pub steps: Vec<(Direction, u32)>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRender {
  #[serde(default = "default_map_grid")]
  pub grid: usize,
  #[serde(default)]
  pub base: MapBase,
  pub action: RouteAction,
}

/// Mirror line, always on cell centers.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Axis {
  Vertical { x: i64 },
  Horizontal { y: i64 },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReflectAction {
  pub axis: Axis,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectRender {
  #[serde(default = "default_map_grid")]
  pub grid: usize,
  #[serde(default)]
  pub base: MapBase,
  pub action: ReflectAction,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RotateAction {
  #[serde(default = "default_rotate_deg")]
  pub deg: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateRender {
  #[serde(default = "default_rotate_grid")]
  pub grid: usize,
  #[serde(default)]
  pub base: MapBase,
  pub action: RotateAction,
}

/// Multiple-choice options. Memory items use plain candidate strings;
/// spatial items use rendered options with ids.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Options {
  Rendered(Vec<ChallengeOption>),
  Text(Vec<String>),
}

impl Default for Options {
  fn default() -> Self {
    Options::Text(Vec::new())
  }
}

impl Options {
  pub fn rendered(&self) -> &[ChallengeOption] {
    match self {
      Options::Rendered(v) => v,
      Options::Text(_) => &[],
    }
  }

  /// Candidate strings for the memory variants; the challenge document may
  /// carry them here or under `answerSpec`.
  #[allow(dead_code)]
  pub fn texts(&self) -> &[String] {
    match self {
      Options::Text(v) => v,
      Options::Rendered(_) => &[],
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeOption {
  #[serde(default)]
  pub option_id: Option<String>,
  #[serde(default)]
  pub render: OptionRender,
}

/// Rendered option payload. `marker`/`centers` are the structured
/// coordinates the verifier prefers; `svg` is scraped when they are absent.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OptionRender {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub kind: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub svg: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub marker: Option<Cell>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub centers: Option<Vec<(f64, f64)>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AnswerSpec {
  #[serde(default)]
  pub options: Vec<String>,
}

/// Loose per-item metadata used by the prompt-driven numeric variants.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Metadata {
  #[serde(default, rename = "mod", skip_serializing_if = "Option::is_none")]
  pub modulus: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fraction: Option<(i64, i64)>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub numbers: Option<Vec<i64>>,
}

fn default_scene_grid() -> usize {
  4
}
fn default_target_24() -> i64 {
  24
}
fn default_slots() -> usize {
  7
}
fn default_maze_grid() -> usize {
  3
}
fn default_max_steps() -> usize {
  4
}
fn default_blanks() -> usize {
  2
}
fn default_map_grid() -> usize {
  5
}
fn default_rotate_grid() -> usize {
  4
}
fn default_rotate_deg() -> i32 {
  90
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn item_roundtrips_with_variant_tag() {
    let json = serde_json::json!({
      "itemId": "i1",
      "variant": "target_24",
      "prompt": "Capai 24",
      "render": { "numbers": [3, 8, 1, 2], "target": 24, "slots": 7 },
    });
    let item: ChallengeItem = serde_json::from_value(json).unwrap();
    match &item.render {
      Render::Target24(r) => {
        assert_eq!(r.numbers, vec![3, 8, 1, 2]);
        assert_eq!(r.target, 24);
      }
      other => panic!("wrong variant: {}", other.variant_name()),
    }
    let back = serde_json::to_value(&item).unwrap();
    assert_eq!(back["variant"], "target_24");
    assert_eq!(back["render"]["slots"], 7);
  }

  #[test]
  fn render_defaults_apply() {
    let json = serde_json::json!({
      "itemId": "i2",
      "variant": "number_maze",
      "prompt": "maze",
      "render": {
        "cells": [[2, 3], [4, 5]],
        "edges": { "h": [["+"], ["+"]], "v": [["×", "×"]] },
        "start": [0, 0],
        "target": 5,
      },
    });
    let item: ChallengeItem = serde_json::from_value(json).unwrap();
    match &item.render {
      Render::NumberMaze(r) => {
        assert_eq!(r.grid, 3);
        assert_eq!(r.max_steps, 4);
      }
      _ => panic!("wrong variant"),
    }
  }

  #[test]
  fn options_accept_both_shapes() {
    let texts: Options = serde_json::from_value(serde_json::json!(["a", "b"])).unwrap();
    assert_eq!(texts.texts().len(), 2);

    let rendered: Options = serde_json::from_value(serde_json::json!([
      { "optionId": "A", "render": { "kind": "svg", "svg": "<svg/>" } }
    ]))
    .unwrap();
    assert_eq!(rendered.rendered().len(), 1);
    assert_eq!(rendered.rendered()[0].option_id.as_deref(), Some("A"));
  }

  #[test]
  fn axis_tags() {
    let a: Axis = serde_json::from_value(serde_json::json!({"type": "vertical", "x": 2})).unwrap();
    match a {
      Axis::Vertical { x } => assert_eq!(x, 2),
      _ => panic!("wrong axis"),
    }
  }
}
