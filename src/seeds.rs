//! Built-in challenge bank and the option renderer for spatial items.
//!
//! These documents keep the backend useful with no generator configured and
//! give the verification engines realistic fixtures. Rendered options carry
//! both structured coordinates and SVG markup drawn with the same affine
//! constants the geometry engine inverts.

use chrono::Utc;
use rand::seq::SliceRandom;
use uuid::Uuid;

use crate::domain::{
  AnswerSpec, Axis, Cell, ChallengeDoc, ChallengeItem, ChallengeOption, ChallengeType,
  Direction, EquationRender, FunctionDefs, FunctionRender, Landmark, LexiconPair,
  LexiconRender, MapBase, MazeEdges, MazeRender, Metadata, OptionRender, Options, ReflectAction,
  ReflectRender, Render, RotateAction, RotateRender, RouteAction, RouteRender, SceneChange,
  SceneObject, SceneRender, SequenceRender, Target24Render,
};
use crate::engine::geometry::{grid_to_pixel_centers, rotate_grid_points, CELL, PAD};

/// Build a seed document for one challenge type: up to `count` items
/// sampled from the built-in bank.
pub fn seed_doc(
  challenge_type: ChallengeType,
  difficulty: Option<String>,
  count: usize,
) -> ChallengeDoc {
  let bank = match challenge_type {
    ChallengeType::Memory => memory_items(),
    ChallengeType::Spatial => spatial_items(),
    ChallengeType::Numerical => numerical_items(),
  };
  let mut rng = rand::thread_rng();
  let items: Vec<ChallengeItem> =
    bank.choose_multiple(&mut rng, count.min(bank.len())).cloned().collect();

  ChallengeDoc {
    challenge_id: Uuid::new_v4().to_string(),
    challenge_type,
    difficulty,
    generated_at: Utc::now(),
    items,
    scoring: None,
  }
}

fn memory_items() -> Vec<ChallengeItem> {
  vec![
    ChallengeItem {
      item_id: "m-lex-1".into(),
      prompt: "Hafalkan pasangan istilah berikut, lalu cocokkan kembali.".into(),
      render: Render::LexiconMatch(LexiconRender {
        pairs: vec![
          pair("Neuron", "Sel penghantar sinyal saraf"),
          pair("Sinapsis", "Celah komunikasi antarneuron"),
          pair("Korteks", "Lapisan luar otak"),
        ],
        distractors: vec![
          "Cairan pelindung otak".into(),
          "Hormon pengatur tidur".into(),
        ],
      }),
      options: Options::default(),
      answer_spec: None,
      metadata: None,
      answer_hash: None,
    },
    ChallengeItem {
      item_id: "m-seq-1".into(),
      prompt: "Hafalkan barisan angka, lalu isi angka yang hilang.".into(),
      render: Render::SequenceMissing(SequenceRender {
        sequence: vec![3, 6, 12, 24, 48, 96],
        mask_indices: vec![1, 4],
      }),
      options: Options::default(),
      answer_spec: None,
      metadata: None,
      answer_hash: None,
    },
    ChallengeItem {
      item_id: "m-scene-1".into(),
      prompt: "Satu objek hilang dari pemandangan. Objek mana yang hilang?".into(),
      render: Render::SceneRecall(SceneRender {
        grid: 4,
        objects: vec![
          object("house", (0, 1)),
          object("tree", (1, 3)),
          object("car", (2, 0)),
          object("lamp", (3, 2)),
        ],
        change: SceneChange::Removed { target_id: "car".into() },
      }),
      options: Options::default(),
      answer_spec: Some(AnswerSpec {
        options: vec!["house".into(), "tree".into(), "car".into(), "lamp".into()],
      }),
      metadata: None,
      answer_hash: None,
    },
    ChallengeItem {
      item_id: "m-scene-2".into(),
      prompt: "Satu objek berpindah tempat. Pilih objek dan posisi barunya.".into(),
      render: Render::SceneRecall(SceneRender {
        grid: 4,
        objects: vec![
          object("school", (0, 0)),
          object("boat", (2, 2)),
          object("tower", (3, 1)),
        ],
        change: SceneChange::Moved { target_id: "boat".into(), to: (1, 3) },
      }),
      options: Options::default(),
      answer_spec: Some(AnswerSpec {
        options: vec![
          "boat@1-3".into(),
          "boat@2-1".into(),
          "tower@0-2".into(),
          "school@1-1".into(),
        ],
      }),
      metadata: None,
      answer_hash: None,
    },
  ]
}

fn spatial_items() -> Vec<ChallengeItem> {
  let route_base = MapBase {
    roads: vec![((2, 0), (2, 4))],
    river: vec![(4, 0), (3, 1), (4, 2)],
    landmarks: vec![
      landmark("Pasar", "square", (2, 1)),
      landmark("Sekolah", "circle", (0, 3)),
      landmark("Taman", "triangle", (4, 4)),
    ],
    north: Some("up".into()),
  };
  let mirror_base = MapBase {
    roads: vec![((0, 2), (4, 2))],
    river: vec![],
    landmarks: vec![
      landmark("Pasar", "square", (3, 0)),
      landmark("Sekolah", "circle", (1, 2)),
      landmark("Taman", "triangle", (0, 4)),
    ],
    north: Some("up".into()),
  };
  let rotate_base = MapBase {
    roads: vec![],
    river: vec![],
    landmarks: vec![
      landmark("Pasar", "square", (0, 1)),
      landmark("Sekolah", "circle", (1, 3)),
      landmark("Taman", "triangle", (3, 2)),
    ],
    north: Some("up".into()),
  };

  vec![
    ChallengeItem {
      item_id: "s-route-1".into(),
      prompt:
        "Hafalkan peta. Dari Pasar, berjalan 1 langkah ke utara lalu 2 langkah ke timur. Di mana posisi akhirnya?"
          .into(),
      render: Render::RouteNav(RouteRender {
        grid: 5,
        base: route_base.clone(),
        action: RouteAction {
          from: "Pasar".into(),
          steps: vec![(Direction::N, 1), (Direction::E, 2)],
        },
      }),
      options: marker_options(5, &route_base, &[(1, 3), (3, 1), (1, 2), (2, 3)]),
      answer_spec: None,
      metadata: None,
      answer_hash: None,
    },
    ChallengeItem {
      item_id: "s-mirror-1".into(),
      prompt:
        "Hafalkan peta. Di mana bayangan Pasar setelah dicerminkan terhadap garis hijau?".into(),
      render: Render::MirrorReflect(ReflectRender {
        grid: 5,
        base: mirror_base.clone(),
        action: ReflectAction { axis: Axis::Vertical { x: 2 } },
      }),
      options: marker_options(5, &mirror_base, &[(3, 0), (3, 4), (1, 4), (4, 2)]),
      answer_spec: None,
      metadata: None,
      answer_hash: None,
    },
    ChallengeItem {
      item_id: "s-rotate-1".into(),
      prompt:
        "Hafalkan peta, lalu pilih tampilan peta setelah diputar 90° searah jarum jam.".into(),
      render: Render::MapRotate(RotateRender {
        grid: 4,
        base: rotate_base.clone(),
        action: RotateAction { deg: 90 },
      }),
      options: rotation_options(4, &rotate_base, &[90, 180, 270, 0]),
      answer_spec: None,
      metadata: None,
      answer_hash: None,
    },
  ]
}

fn numerical_items() -> Vec<ChallengeItem> {
  vec![
    ChallengeItem {
      item_id: "n-24-1".into(),
      prompt: "Susun ekspresi bernilai 24 dengan memakai semua angka tepat sekali.".into(),
      render: Render::Target24(Target24Render { numbers: vec![2, 3, 4, 1], target: 24, slots: 7 }),
      options: Options::default(),
      answer_spec: None,
      metadata: Some(Metadata { numbers: Some(vec![2, 3, 4, 1]), ..Metadata::default() }),
      answer_hash: None,
    },
    ChallengeItem {
      item_id: "n-maze-1".into(),
      prompt: "Hafalkan labirin angka, lalu klik jalur yang menghasilkan nilai target.".into(),
      render: Render::NumberMaze(MazeRender {
        grid: 3,
        cells: vec![vec![2, 3, 1], vec![4, 5, 2], vec![7, 1, 3]],
        edges: MazeEdges {
          h: vec![
            vec!["+".into(), "-".into()],
            vec!["×".into(), "+".into()],
            vec!["-".into(), "×".into()],
          ],
          v: vec![
            vec!["×".into(), "+".into(), "-".into()],
            vec!["+".into(), "-".into(), "×".into()],
          ],
        },
        start: (0, 0),
        max_steps: 4,
        target: 10,
      }),
      options: Options::default(),
      answer_spec: None,
      metadata: None,
      answer_hash: None,
    },
    ChallengeItem {
      item_id: "n-eq-1".into(),
      prompt: "Isi kotak kosong agar kedua sisi persamaan bernilai sama.".into(),
      render: Render::EquationFill(EquationRender {
        expression_left: "□+7".into(),
        expression_right: "12-□".into(),
        blanks: 2,
      }),
      options: Options::default(),
      answer_spec: None,
      metadata: None,
      answer_hash: None,
    },
    ChallengeItem {
      item_id: "n-fn-1".into(),
      prompt: "Mesin fungsi: f(x) = 2*x+1 dan g(x) = x-3. Hitung f(g(5)).".into(),
      render: Render::FunctionMachine(FunctionRender {
        functions: FunctionDefs { f: "2*x+1".into(), g: "x-3".into() },
        query: "f(g(5))".into(),
      }),
      options: Options::default(),
      answer_spec: None,
      metadata: None,
      answer_hash: None,
    },
    ChallengeItem {
      item_id: "n-mod-1".into(),
      prompt: "Hitung sisa pembagian dari 7 × 5 + 3 terhadap modulus.".into(),
      render: Render::ModularArith(Default::default()),
      options: Options::default(),
      answer_spec: None,
      metadata: Some(Metadata { modulus: Some(6), ..Metadata::default() }),
      answer_hash: None,
    },
    ChallengeItem {
      item_id: "n-base-1".into(),
      prompt: "Ubah 1011₂ ke bilangan basis sepuluh.".into(),
      render: Render::BaseConvert(Default::default()),
      options: Options::default(),
      answer_spec: None,
      metadata: None,
      answer_hash: None,
    },
    ChallengeItem {
      item_id: "n-prob-1".into(),
      prompt:
        "Sebuah kantong berisi 3 bola merah dari total 4 bola. Tulis peluang terambilnya bola merah sebagai desimal."
          .into(),
      render: Render::ProbRatio(Default::default()),
      options: Options::default(),
      answer_spec: None,
      metadata: Some(Metadata { fraction: Some((3, 4)), ..Metadata::default() }),
      answer_hash: None,
    },
  ]
}

fn pair(term: &str, definition: &str) -> LexiconPair {
  LexiconPair { term: term.into(), definition: definition.into() }
}

fn object(id: &str, pos: Cell) -> SceneObject {
  SceneObject { id: id.into(), icon: id.into(), pos }
}

fn landmark(name: &str, icon: &str, pos: Cell) -> Landmark {
  Landmark { name: name.into(), icon: Some(icon.into()), pos }
}

/// Marker options for route/reflect items: one rendered map per candidate
/// cell, with the red marker both drawn and carried as structured data.
fn marker_options(grid: usize, base: &MapBase, cells: &[Cell]) -> Options {
  let ids = ["A", "B", "C", "D"];
  Options::Rendered(
    cells
      .iter()
      .zip(ids)
      .map(|(&cell, id)| ChallengeOption {
        option_id: Some(id.into()),
        render: OptionRender {
          kind: Some("svg".into()),
          svg: Some(render_map_svg(grid, base, Some(cell), None)),
          marker: Some(cell),
          centers: None,
        },
      })
      .collect(),
  )
}

/// Rotation options: the landmark set drawn at each candidate rotation,
/// with the resulting pixel centers carried as structured data.
fn rotation_options(grid: usize, base: &MapBase, degrees: &[i32]) -> Options {
  let ids = ["A", "B", "C", "D"];
  let cells: Vec<Cell> = base.landmarks.iter().map(|lm| lm.pos).collect();
  Options::Rendered(
    degrees
      .iter()
      .zip(ids)
      .map(|(&deg, id)| {
        let rotated = rotate_grid_points(&cells, grid as i64, deg);
        let rotated_base = MapBase {
          roads: base.roads.clone(),
          river: base.river.clone(),
          landmarks: base
            .landmarks
            .iter()
            .zip(&rotated)
            .map(|(lm, &pos)| Landmark { name: lm.name.clone(), icon: lm.icon.clone(), pos })
            .collect(),
          north: base.north.clone(),
        };
        ChallengeOption {
          option_id: Some(id.into()),
          render: OptionRender {
            kind: Some("svg".into()),
            svg: Some(render_map_svg(grid, &rotated_base, None, None)),
            marker: None,
            centers: Some(grid_to_pixel_centers(&rotated)),
          },
        }
      })
      .collect(),
  )
}

fn center_of((r, c): Cell) -> (f64, f64) {
  (PAD + c as f64 * CELL + CELL / 2.0, PAD + r as f64 * CELL + CELL / 2.0)
}

/// Draw an option map: background, grid lines, roads, river, optional
/// mirror axis, landmarks, optional marker.
/// The geometry engine's scraper is the inverse of this drawing.
pub fn render_map_svg(
  grid: usize,
  base: &MapBase,
  marker: Option<Cell>,
  axis: Option<&Axis>,
) -> String {
  let size = CELL * grid as f64;
  let pad = PAD;
  let mut parts: Vec<String> = Vec::new();
  parts.push(format!(
    r##"<svg xmlns="http://www.w3.org/2000/svg" width="{size}" height="{size}" viewBox="0 0 {size} {size}">"##
  ));
  parts.push(format!(r##"<rect width="{size}" height="{size}" fill="#0B1020" rx="12" ry="12" />"##));

  for i in 0..=grid {
    let offset = pad + i as f64 * CELL;
    parts.push(format!(
      r##"<line x1="{pad}" y1="{offset}" x2="{}" y2="{offset}" stroke="#1f2937" stroke-width="1" />"##,
      size - pad
    ));
    parts.push(format!(
      r##"<line x1="{offset}" y1="{pad}" x2="{offset}" y2="{}" stroke="#1f2937" stroke-width="1" />"##,
      size - pad
    ));
  }

  for (a, b) in &base.roads {
    let (x1, y1) = center_of(*a);
    let (x2, y2) = center_of(*b);
    parts.push(format!(
      r##"<line x1="{x1}" y1="{y1}" x2="{x2}" y2="{y2}" stroke="#64748b" stroke-width="6" />"##
    ));
  }

  if base.river.len() >= 2 {
    let pts: Vec<String> = base
      .river
      .iter()
      .map(|&cell| {
        let (x, y) = center_of(cell);
        format!("{x},{y}")
      })
      .collect();
    parts.push(format!(
      r##"<polyline points="{}" fill="none" stroke="#38bdf8" stroke-width="6" opacity="0.9" />"##,
      pts.join(" ")
    ));
  }

  if let Some(axis) = axis {
    match *axis {
      Axis::Vertical { x } => {
        let px = pad + x as f64 * CELL + CELL / 2.0;
        parts.push(format!(
          r##"<line x1="{px}" y1="{pad}" x2="{px}" y2="{}" stroke="#22c55e" stroke-width="2" />"##,
          size - pad
        ));
      }
      Axis::Horizontal { y } => {
        let py = pad + y as f64 * CELL + CELL / 2.0;
        parts.push(format!(
          r##"<line x1="{pad}" y1="{py}" x2="{}" y2="{py}" stroke="#22c55e" stroke-width="2" />"##,
          size - pad
        ));
      }
    }
  }

  for lm in &base.landmarks {
    let (cx, cy) = center_of(lm.pos);
    match lm.icon.as_deref() {
      Some("circle") => {
        parts.push(format!(r##"<circle cx="{cx}" cy="{cy}" r="12" fill="#eab308" />"##));
      }
      Some("triangle") => {
        parts.push(format!(
          r##"<polygon points="{cx},{} {},{} {},{}" fill="#eab308" />"##,
          cy - 14.0,
          cx - 12.0,
          cy + 10.0,
          cx + 12.0,
          cy + 10.0
        ));
      }
      _ => {
        parts.push(format!(
          r##"<rect x="{}" y="{}" width="24" height="24" rx="4" ry="4" fill="#eab308" />"##,
          cx - 12.0,
          cy - 12.0
        ));
      }
    }
    parts.push(format!(
      r##"<text x="{cx}" y="{}" fill="#cbd5e1" font-size="12" text-anchor="middle">{}</text>"##,
      cy + 28.0,
      lm.name
    ));
  }

  if let Some(cell) = marker {
    let (x, y) = center_of(cell);
    parts.push(format!(r##"<circle cx="{x}" cy="{y}" r="8" fill="#ef4444" />"##));
  }

  parts.push("</svg>".to_string());
  parts.join("")
}
