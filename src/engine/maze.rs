//! Number-maze path evaluation: walk a user-drawn path over a grid whose
//! edges carry arithmetic operators, accumulating from the start cell.
//!
//! Division fails closed: a zero or non-dividing divisor rejects the whole
//! path. All operations stay integral when valid, so the target check is
//! exact integer equality.

use crate::domain::{Cell, MazeRender};
use crate::engine::expression::Op;

/// True iff the path's accumulated value hits the maze target.
///
/// `user_path` excludes the start cell. Points are clamped into grid bounds
/// and the walk is truncated to `max_steps` moves before evaluation. A bad
/// grid shape (missing cell or edge operator) rejects the path rather than
/// panicking.
pub fn check_path(maze: &MazeRender, user_path: &[Cell]) -> bool {
  let grid = maze.grid as i64;
  if grid <= 0 {
    return false;
  }

  let clamp = |(r, c): Cell| -> Cell { (r.clamp(0, grid - 1), c.clamp(0, grid - 1)) };

  let mut path: Vec<Cell> = Vec::with_capacity(user_path.len() + 1);
  path.push(clamp(maze.start));
  path.extend(user_path.iter().map(|&p| clamp(p)));
  path.truncate(maze.max_steps + 1);

  let Some(mut acc) = cell_value(maze, path[0]) else { return false };

  for pair in path.windows(2) {
    let (r0, c0) = pair[0];
    let (r1, c1) = pair[1];
    let (dr, dc) = (r1 - r0, c1 - c0);

    let op = if dr == 0 && dc.abs() == 1 {
      let cc = c0.min(c1);
      let Some(op) = edge_op(&maze.edges.h, r0, cc) else { return false };
      op
    } else if dc == 0 && dr.abs() == 1 {
      let rr = r0.min(r1);
      let Some(op) = edge_op(&maze.edges.v, rr, c0) else { return false };
      op
    } else {
      // Non-unit step: the interactive surface never produces one; the
      // evaluator's defensive default is addition.
      Op::Add
    };

    let Some(b) = cell_value(maze, (r1, c1)) else { return false };
    acc = match op {
      Op::Add => acc + b,
      Op::Sub => acc - b,
      Op::Mul => acc * b,
      Op::Div => {
        if b == 0 || acc % b != 0 {
          return false;
        }
        acc / b
      }
    };
  }

  acc == maze.target
}

fn cell_value(maze: &MazeRender, (r, c): Cell) -> Option<i64> {
  maze.cells.get(r as usize)?.get(c as usize).copied()
}

fn edge_op(edges: &[Vec<String>], r: i64, c: i64) -> Option<Op> {
  let s = edges.get(r as usize)?.get(c as usize)?;
  Op::from_glyph(s)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::MazeEdges;

  fn two_by_two(target: i64) -> MazeRender {
    MazeRender {
      grid: 2,
      cells: vec![vec![2, 3], vec![4, 5]],
      edges: MazeEdges {
        h: vec![vec!["+".into()], vec!["+".into()]],
        v: vec![vec!["×".into(), "×".into()]],
      },
      start: (0, 0),
      max_steps: 4,
      target,
    }
  }

  #[test]
  fn single_horizontal_step_adds() {
    // 2 + 3 = 5
    assert!(check_path(&two_by_two(5), &[(0, 1)]));
    assert!(!check_path(&two_by_two(6), &[(0, 1)]));
  }

  #[test]
  fn vertical_edges_use_their_own_operator_grid() {
    // 2 × 4 = 8
    assert!(check_path(&two_by_two(8), &[(1, 0)]));
    // 2 × 4 then + 5 (horizontal on row 1) = 13
    assert!(check_path(&two_by_two(13), &[(1, 0), (1, 1)]));
  }

  #[test]
  fn empty_path_scores_the_start_cell_alone() {
    assert!(check_path(&two_by_two(2), &[]));
  }

  #[test]
  fn division_fails_closed() {
    let maze = MazeRender {
      grid: 2,
      cells: vec![vec![7, 2], vec![0, 9]],
      edges: MazeEdges {
        h: vec![vec!["÷".into()], vec!["+".into()]],
        v: vec![vec!["÷".into(), "+".into()]],
      },
      start: (0, 0),
      max_steps: 4,
      target: 7,
    };
    // 7 ÷ 2 is not integral: rejected even though 7 was the target before.
    assert!(!check_path(&maze, &[(0, 1)]));
    // division by the zero cell below: rejected
    assert!(!check_path(&maze, &[(1, 0)]));

    let even = MazeRender {
      cells: vec![vec![8, 2], vec![0, 9]],
      target: 4,
      ..maze
    };
    assert!(check_path(&even, &[(0, 1)]));
  }

  #[test]
  fn path_is_truncated_to_max_steps() {
    let mut maze = two_by_two(5);
    maze.max_steps = 1;
    // second step would land on 5; with one step allowed the value stays 2+3
    assert!(check_path(&maze, &[(0, 1), (1, 1)]));
  }

  #[test]
  fn out_of_bounds_points_are_clamped() {
    // (0, 9) clamps to (0, 1): same as a single step right
    assert!(check_path(&two_by_two(5), &[(0, 9)]));
    // (-3, -3) clamps onto the start; the degenerate step defaults to +
    assert!(check_path(&two_by_two(4), &[(-3, -3)]));
  }
}
