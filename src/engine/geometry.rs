//! Coordinate transforms for the spatial variants: grid rotation, axis
//! reflection, grid→pixel affine mapping, tolerance matching, and option
//! coordinate extraction.
//!
//! PAD/CELL are shared with the option renderer; the comparisons only work
//! because both sides use the same constants and the same one-decimal
//! rounding.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{Axis, Cell, Direction, OptionRender};
use crate::util::round_to;

pub const PAD: f64 = 6.0;
pub const CELL: f64 = 56.0;

/// Per-axis pixel tolerance when matching landmark centers.
pub const CENTER_TOL: f64 = 2.0;

/// One 90° clockwise rotation inside an `n × n` zero-indexed grid.
pub fn rot90((r, c): Cell, n: i64) -> Cell {
  (c, n - 1 - r)
}

/// Rotate every point by `deg` (a multiple of 90°), order-preserving.
pub fn rotate_grid_points(pts: &[Cell], n: i64, deg: i32) -> Vec<Cell> {
  let times = (deg.div_euclid(90)).rem_euclid(4);
  pts
    .iter()
    .map(|&p| {
      let mut cur = p;
      for _ in 0..times {
        cur = rot90(cur, n);
      }
      cur
    })
    .collect()
}

/// Map grid cells to their pixel centers, rounded like the renderer rounds.
pub fn grid_to_pixel_centers(pts: &[Cell]) -> Vec<(f64, f64)> {
  pts
    .iter()
    .map(|&(r, c)| {
      let x = PAD + c as f64 * CELL + CELL / 2.0;
      let y = PAD + r as f64 * CELL + CELL / 2.0;
      (round_to(x, 1), round_to(y, 1))
    })
    .collect()
}

/// Greedy bipartite matching: every point in `a` must claim a distinct
/// point of `b` within `tol` pixels on both axes, and cardinalities must
/// agree. Greedy claiming can mispair clusters of near-coincident points
/// tighter than `tol`; rendered landmarks sit a full cell apart, so the
/// simple version holds.
pub fn same_centers(a: &[(f64, f64)], b: &[(f64, f64)], tol: f64) -> bool {
  if a.len() != b.len() {
    return false;
  }
  let mut used = vec![false; b.len()];
  for &(ax, ay) in a {
    let mut ok = false;
    for (i, &(bx, by)) in b.iter().enumerate() {
      if used[i] {
        continue;
      }
      if (ax - bx).abs() <= tol && (ay - by).abs() <= tol {
        used[i] = true;
        ok = true;
        break;
      }
    }
    if !ok {
      return false;
    }
  }
  true
}

/// Mirror a cell across an axis lying on cell centers.
pub fn reflect_point((r, c): Cell, axis: &Axis) -> Cell {
  match *axis {
    Axis::Vertical { x } => (r, 2 * x - c),
    Axis::Horizontal { y } => (2 * y - r, c),
  }
}

/// Walk `steps` from `start` in unit moves, clamping each move into the
/// grid. Moves into a wall are absorbed, not errors.
pub fn walk_route(start: Cell, grid: i64, steps: &[(Direction, u32)]) -> Cell {
  let (mut r, mut c) = start;
  for &(dir, count) in steps {
    let (dr, dc) = dir.delta();
    for _ in 0..count {
      r = (r + dr).clamp(0, grid - 1);
      c = (c + dc).clamp(0, grid - 1);
    }
  }
  (r, c)
}

// --- Option coordinate extraction ---
//
// Structured coordinates on the option payload are authoritative when
// present; the SVG fallback recovers them from the markup. Tags are
// scanned element-wise, so attribute order inside a tag does not matter.

/// The red marker's grid cell for a route/reflect option.
pub fn option_marker_cell(render: &OptionRender, grid: i64) -> Option<Cell> {
  if let Some(cell) = render.marker {
    return Some(cell);
  }
  render.svg.as_deref().and_then(|svg| marker_cell_from_svg(svg, grid))
}

/// The landmark pixel centers for a rotation option.
pub fn option_landmark_centers(render: &OptionRender) -> Vec<(f64, f64)> {
  if let Some(centers) = &render.centers {
    return centers.clone();
  }
  render.svg.as_deref().map(landmark_centers_from_svg).unwrap_or_default()
}

static CIRCLE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<circle\b[^>]*>").unwrap());
static RECT_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<rect\b[^>]*>").unwrap());
static POLYGON_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<polygon\b[^>]*>").unwrap());
static ATTR: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r#"([a-zA-Z_:-]+)\s*=\s*"([^"]*)""#).unwrap());

const MARKER_FILL: &str = "#ef4444";
const LANDMARK_FILL: &str = "#eab308";

fn attr<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
  ATTR
    .captures_iter(tag)
    .find(|cap| &cap[1] == name)
    .and_then(|cap| cap.get(2))
    .map(|m| m.as_str())
}

fn attr_f64(tag: &str, name: &str) -> Option<f64> {
  attr(tag, name)?.trim().parse::<f64>().ok()
}

fn pixel_to_cell_index(v: f64) -> i64 {
  ((v - PAD - CELL / 2.0) / CELL).round() as i64
}

/// Recover the red marker's grid cell from option SVG markup.
/// None when there is no marker or it falls outside the grid.
pub fn marker_cell_from_svg(svg: &str, grid: i64) -> Option<Cell> {
  for m in CIRCLE_TAG.find_iter(svg) {
    let tag = m.as_str();
    if attr(tag, "fill") != Some(MARKER_FILL) {
      continue;
    }
    let cx = attr_f64(tag, "cx")?;
    let cy = attr_f64(tag, "cy")?;
    let c = pixel_to_cell_index(cx);
    let r = pixel_to_cell_index(cy);
    if r < 0 || c < 0 || r >= grid || c >= grid {
      return None;
    }
    return Some((r, c));
  }
  None
}

/// Recover the yellow landmark centers (squares, circles, triangles) from
/// option SVG markup, rounded to the renderer's decimal.
pub fn landmark_centers_from_svg(svg: &str) -> Vec<(f64, f64)> {
  let mut out: Vec<(f64, f64)> = Vec::new();

  for m in RECT_TAG.find_iter(svg) {
    let tag = m.as_str();
    if attr(tag, "fill") != Some(LANDMARK_FILL)
      || attr(tag, "width") != Some("24")
      || attr(tag, "height") != Some("24")
    {
      continue;
    }
    if let (Some(x), Some(y)) = (attr_f64(tag, "x"), attr_f64(tag, "y")) {
      out.push((x + 12.0, y + 12.0));
    }
  }

  for m in CIRCLE_TAG.find_iter(svg) {
    let tag = m.as_str();
    if attr(tag, "fill") != Some(LANDMARK_FILL) || attr(tag, "r") != Some("12") {
      continue;
    }
    if let (Some(cx), Some(cy)) = (attr_f64(tag, "cx"), attr_f64(tag, "cy")) {
      out.push((cx, cy));
    }
  }

  for m in POLYGON_TAG.find_iter(svg) {
    let tag = m.as_str();
    if attr(tag, "fill") != Some(LANDMARK_FILL) {
      continue;
    }
    let Some(points) = attr(tag, "points") else { continue };
    let vertices: Vec<(f64, f64)> = points
      .split_whitespace()
      .filter_map(|pair| {
        let (x, y) = pair.split_once(',')?;
        Some((x.parse::<f64>().ok()?, y.parse::<f64>().ok()?))
      })
      .collect();
    if vertices.is_empty() {
      continue;
    }
    let n = vertices.len() as f64;
    let cx = vertices.iter().map(|p| p.0).sum::<f64>() / n;
    let cy = vertices.iter().map(|p| p.1).sum::<f64>() / n;
    out.push((cx, cy));
  }

  out.into_iter().map(|(x, y)| (round_to(x, 1), round_to(y, 1))).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn full_turn_is_identity() {
    for n in 2..=8 {
      let pts: Vec<Cell> = vec![(0, 0), (1, n - 2), (n - 1, n - 1)];
      assert_eq!(rotate_grid_points(&pts, n, 360), pts, "grid {n}");
    }
  }

  #[test]
  fn quarter_turn_moves_corner() {
    assert_eq!(rot90((0, 0), 4), (0, 3));
    assert_eq!(rotate_grid_points(&[(0, 0)], 4, 90), vec![(0, 3)]);
    assert_eq!(rotate_grid_points(&[(0, 0)], 4, 180), vec![(3, 3)]);
    assert_eq!(rotate_grid_points(&[(1, 2)], 4, 270), vec![(1, 0)]);
  }

  #[test]
  fn reflection_is_an_involution() {
    let axis = Axis::Vertical { x: 2 };
    let p = (3, 0);
    assert_eq!(reflect_point(reflect_point(p, &axis), &axis), p);

    let axis = Axis::Horizontal { y: 1 };
    let p = (4, 2);
    assert_eq!(reflect_point(reflect_point(p, &axis), &axis), p);
  }

  #[test]
  fn reflection_mirrors_across_the_line() {
    assert_eq!(reflect_point((3, 0), &Axis::Vertical { x: 2 }), (3, 4));
    assert_eq!(reflect_point((0, 1), &Axis::Horizontal { y: 2 }), (4, 1));
  }

  #[test]
  fn pixel_centers_use_shared_constants() {
    assert_eq!(grid_to_pixel_centers(&[(0, 0)]), vec![(34.0, 34.0)]);
    assert_eq!(grid_to_pixel_centers(&[(1, 2)]), vec![(146.0, 90.0)]);
  }

  #[test]
  fn center_matching_needs_equal_cardinality_and_distinct_partners() {
    let a = vec![(34.0, 34.0), (90.0, 34.0)];
    let near = vec![(35.5, 33.0), (89.0, 35.9)];
    assert!(same_centers(&a, &near, CENTER_TOL));

    assert!(!same_centers(&a, &a[..1].to_vec(), CENTER_TOL));
    // two queries cannot share one target
    let doubled = vec![(34.0, 34.0), (34.0, 34.0)];
    assert!(!same_centers(&doubled, &a, CENTER_TOL));
    let far = vec![(34.0, 34.0), (90.0, 40.0)];
    assert!(!same_centers(&a, &far, CENTER_TOL));
  }

  #[test]
  fn route_walk_absorbs_wall_hits() {
    use Direction::*;
    let end = walk_route((0, 0), 5, &[(N, 3), (E, 2)]);
    assert_eq!(end, (0, 2));
    let end = walk_route((4, 4), 5, &[(S, 1), (E, 9), (W, 2)]);
    assert_eq!(end, (4, 2));
  }

  #[test]
  fn marker_scrape_ignores_attribute_order() {
    let svg =
      r##"<svg><circle cx="90" cy="34" r="8" fill="#ef4444" /><circle fill="#ffffff" cx="1" cy="1" r="2"/></svg>"##;
    assert_eq!(marker_cell_from_svg(svg, 5), Some((0, 1)));

    let svg = r##"<svg><circle fill="#ef4444" cx="34" cy="146" r="8"/></svg>"##;
    assert_eq!(marker_cell_from_svg(svg, 5), Some((2, 0)));
  }

  #[test]
  fn marker_scrape_rejects_out_of_grid_and_missing() {
    let svg = r##"<svg><circle cx="1000" cy="34" r="8" fill="#ef4444"/></svg>"##;
    assert_eq!(marker_cell_from_svg(svg, 5), None);
    assert_eq!(marker_cell_from_svg("<svg></svg>", 5), None);
  }

  #[test]
  fn landmark_scrape_covers_all_three_icons() {
    let svg = r##"<svg>
      <rect x="22" y="22" width="24" height="24" rx="4" ry="4" fill="#eab308" />
      <circle cx="90" cy="34" r="12" fill="#eab308" />
      <polygon points="146,20 134,44 158,44" fill="#eab308" />
      <circle cx="34" cy="90" r="8" fill="#ef4444" />
    </svg>"##;
    let centers = landmark_centers_from_svg(svg);
    assert_eq!(centers, vec![(34.0, 34.0), (90.0, 34.0), (146.0, 36.0)]);
  }

  #[test]
  fn structured_coordinates_win_over_svg() {
    let render = OptionRender {
      kind: Some("svg".into()),
      svg: Some(r##"<svg><circle cx="34" cy="34" r="8" fill="#ef4444"/></svg>"##.into()),
      marker: Some((4, 4)),
      centers: None,
    };
    assert_eq!(option_marker_cell(&render, 5), Some((4, 4)));
  }
}
