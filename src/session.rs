//! Per-item challenge session state machine.
//!
//! Each item runs memorize → answer. Every phase has its own countdown,
//! modeled as an explicit handle that is cancelled on every transition and
//! on every exit route — a stale tick must never act after its phase ended,
//! which the item epoch enforces even if an abort races a send.
//!
//! The controller owns the per-item answer draft and rebuilds it from
//! scratch on every item transition; nothing carries over between items.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::TimingConfig;
use crate::domain::{Cell, ChallengeDoc, ChallengeItem, ChallengeType, Render};
use crate::engine::expression::{Op, Paren};
use crate::logic::{self, AnswerDraft};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Memorize,
  Answer,
}

/// One countdown tick. `left == 0` is the elapsed signal.
#[derive(Clone, Copy, Debug)]
pub struct TimerMsg {
  pub epoch: u64,
  pub phase: Phase,
  pub left: u64,
}

/// A cancellable one-second-tick countdown. Dropping the handle aborts the
/// task, so an abandoned session cannot leak a running timer.
pub struct Countdown {
  handle: JoinHandle<()>,
}

impl Countdown {
  pub fn start(epoch: u64, phase: Phase, secs: u64, tx: mpsc::UnboundedSender<TimerMsg>) -> Self {
    let handle = tokio::spawn(async move {
      let mut left = secs;
      while left > 0 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        left -= 1;
        if tx.send(TimerMsg { epoch, phase, left }).is_err() {
          return;
        }
      }
    });
    Self { handle }
  }

  pub fn cancel(&self) {
    self.handle.abort();
  }
}

impl Drop for Countdown {
  fn drop(&mut self) {
    self.handle.abort();
  }
}

/// What the controller reports back to its driver (the WS loop).
#[derive(Clone, Debug)]
pub enum SessionEvent {
  ItemStarted { index: usize, total: usize, item: ChallengeItem },
  PhaseChanged { phase: Phase, seconds: u64 },
  Tick { phase: Phase, left: u64 },
  AnswerResult { index: usize, correct: bool, auto: bool, item_score: i64, score: i64 },
  Completed { score: i64 },
}

pub struct SessionController {
  doc: ChallengeDoc,
  timing: TimingConfig,
  item_points: i64,
  ix: usize,
  score: i64,
  phase: Phase,
  epoch: u64,
  draft: AnswerDraft,
  timer_tx: mpsc::UnboundedSender<TimerMsg>,
  mem_timer: Option<Countdown>,
  ans_timer: Option<Countdown>,
  finished: bool,
}

impl SessionController {
  /// Start a session over a non-empty document. The returned events
  /// announce the first item and its memorize phase.
  pub fn new(
    doc: ChallengeDoc,
    timing: TimingConfig,
    item_points: i64,
    timer_tx: mpsc::UnboundedSender<TimerMsg>,
  ) -> (Self, Vec<SessionEvent>) {
    let mut ctl = Self {
      doc,
      timing,
      item_points,
      ix: 0,
      score: 0,
      phase: Phase::Memorize,
      epoch: 0,
      draft: AnswerDraft::default(),
      timer_tx,
      mem_timer: None,
      ans_timer: None,
      finished: false,
    };
    let events = if ctl.doc.items.is_empty() {
      ctl.finished = true;
      vec![SessionEvent::Completed { score: 0 }]
    } else {
      ctl.start_item()
    };
    (ctl, events)
  }

  pub fn challenge_type(&self) -> ChallengeType {
    self.doc.challenge_type
  }

  #[allow(dead_code)]
  pub fn challenge_id(&self) -> &str {
    &self.doc.challenge_id
  }

  #[allow(dead_code)]
  pub fn is_finished(&self) -> bool {
    self.finished
  }

  #[allow(dead_code)]
  pub fn score(&self) -> i64 {
    self.score
  }

  #[allow(dead_code)]
  pub fn phase(&self) -> Phase {
    self.phase
  }

  #[allow(dead_code)]
  pub fn draft(&self) -> &AnswerDraft {
    &self.draft
  }

  fn current_item(&self) -> &ChallengeItem {
    &self.doc.items[self.ix]
  }

  fn start_item(&mut self) -> Vec<SessionEvent> {
    self.cancel_timers();
    self.epoch += 1;
    self.phase = Phase::Memorize;
    self.draft = AnswerDraft::for_item(self.current_item());
    self.mem_timer = Some(Countdown::start(
      self.epoch,
      Phase::Memorize,
      self.timing.memorize_sec,
      self.timer_tx.clone(),
    ));
    debug!(
      target: "challenge",
      item = %self.current_item().item_id,
      index = self.ix,
      "Item started"
    );
    vec![
      SessionEvent::ItemStarted {
        index: self.ix,
        total: self.doc.items.len(),
        item: self.current_item().clone(),
      },
      SessionEvent::PhaseChanged { phase: Phase::Memorize, seconds: self.timing.memorize_sec },
    ]
  }

  /// Feed a countdown message. Stale messages — wrong epoch or a phase the
  /// controller already left — are dropped.
  pub fn on_timer(&mut self, msg: TimerMsg) -> Vec<SessionEvent> {
    if self.finished || msg.epoch != self.epoch || msg.phase != self.phase {
      return Vec::new();
    }
    if msg.left > 0 {
      return vec![SessionEvent::Tick { phase: msg.phase, left: msg.left }];
    }
    match self.phase {
      Phase::Memorize => self.enter_answer(),
      Phase::Answer => self.submit(true),
    }
  }

  fn enter_answer(&mut self) -> Vec<SessionEvent> {
    if let Some(t) = self.mem_timer.take() {
      t.cancel();
    }
    self.phase = Phase::Answer;
    self.ans_timer = Some(Countdown::start(
      self.epoch,
      Phase::Answer,
      self.timing.answer_sec,
      self.timer_tx.clone(),
    ));
    vec![SessionEvent::PhaseChanged { phase: Phase::Answer, seconds: self.timing.answer_sec }]
  }

  /// Score the current draft and advance. Explicit submits are only
  /// honored during the answer phase; the answer countdown hitting zero
  /// submits with `auto = true`, and an empty draft simply scores nothing.
  pub fn submit(&mut self, auto: bool) -> Vec<SessionEvent> {
    if !self.answering() {
      return Vec::new();
    }
    let correct = logic::check_answer(self.current_item(), &self.draft);
    let item_score = if correct { self.item_points } else { 0 };
    self.score += item_score;
    info!(
      target: "challenge",
      item = %self.current_item().item_id,
      correct,
      auto,
      score = self.score,
      "Answer submitted"
    );
    let mut events = vec![SessionEvent::AnswerResult {
      index: self.ix,
      correct,
      auto,
      item_score,
      score: self.score,
    }];
    events.extend(self.advance());
    events
  }

  /// Advance without scoring. Permitted only while answering.
  pub fn skip(&mut self) -> Vec<SessionEvent> {
    if !self.answering() {
      return Vec::new();
    }
    self.advance()
  }

  fn advance(&mut self) -> Vec<SessionEvent> {
    if self.ix + 1 < self.doc.items.len() {
      self.ix += 1;
      self.start_item()
    } else {
      self.finished = true;
      self.cancel_timers();
      vec![SessionEvent::Completed { score: self.score }]
    }
  }

  /// Cancel any pending countdowns. Called on every transition and on
  /// every exit route (completion, quit, socket teardown).
  pub fn cancel_timers(&mut self) {
    if let Some(t) = self.mem_timer.take() {
      t.cancel();
    }
    if let Some(t) = self.ans_timer.take() {
      t.cancel();
    }
  }

  fn answering(&self) -> bool {
    !self.finished && self.phase == Phase::Answer
  }

  // --- per-variant input surface; everything is inert during memorize ---

  pub fn select_option(&mut self, option_id: String) {
    if self.answering() {
      self.draft.selected_option = Some(option_id);
    }
  }

  pub fn select_text(&mut self, text: String) {
    if self.answering() {
      self.draft.selected_text = Some(text);
    }
  }

  pub fn set_mapping(&mut self, term: String, definition: String) {
    if self.answering() {
      self.draft.mapping.insert(term, definition);
    }
  }

  pub fn set_sequence_input(&mut self, index: usize, value: i64) {
    if self.answering() {
      if let Some(slot) = self.draft.seq_inputs.get_mut(index) {
        *slot = Some(value);
      }
    }
  }

  pub fn push_number(&mut self, index: usize) {
    if self.answering() {
      if let Some(b) = self.draft.builder.as_mut() {
        b.push_number(index);
      }
    }
  }

  pub fn push_op(&mut self, glyph: &str) {
    if !self.answering() {
      return;
    }
    let Some(op) = Op::from_glyph(glyph) else { return };
    if let Some(b) = self.draft.builder.as_mut() {
      b.push_op(op);
    }
  }

  pub fn push_paren(&mut self, glyph: &str) {
    if !self.answering() {
      return;
    }
    let paren = match glyph {
      "(" => Paren::Open,
      ")" => Paren::Close,
      _ => return,
    };
    if let Some(b) = self.draft.builder.as_mut() {
      b.push_paren(paren);
    }
  }

  pub fn remove_token(&mut self, index: usize) {
    if self.answering() {
      if let Some(b) = self.draft.builder.as_mut() {
        b.remove_at(index);
      }
    }
  }

  pub fn backspace(&mut self) {
    if self.answering() {
      if let Some(b) = self.draft.builder.as_mut() {
        b.backspace();
      }
    }
  }

  pub fn clear_tokens(&mut self) {
    if self.answering() {
      if let Some(b) = self.draft.builder.as_mut() {
        b.clear();
      }
    }
  }

  pub fn type_digit(&mut self, digit: &str) {
    if !self.answering() || digit.len() != 1 || !digit.chars().all(|c| c.is_ascii_digit()) {
      return;
    }
    if let Some(blanks) = self.blanks() {
      self.draft.type_digit(digit, blanks);
    }
  }

  pub fn erase_digit(&mut self) {
    if !self.answering() {
      return;
    }
    if let Some(blanks) = self.blanks() {
      self.draft.erase_digit(blanks);
    }
  }

  pub fn clear_digits(&mut self) {
    if !self.answering() {
      return;
    }
    if let Some(blanks) = self.blanks() {
      self.draft.clear_digits(blanks);
    }
  }

  pub fn focus_blank(&mut self, index: usize) {
    if !self.answering() {
      return;
    }
    if let Some(blanks) = self.blanks() {
      self.draft.focus_blank = index.min(blanks.saturating_sub(1));
    }
  }

  pub fn set_free(&mut self, text: String) {
    if self.answering() {
      self.draft.free = text;
    }
  }

  pub fn click_cell(&mut self, cell: Cell) {
    if !self.answering() {
      return;
    }
    let Render::NumberMaze(r) = &self.current_item().render else { return };
    if self.draft.can_step(r.start, r.max_steps, cell) {
      self.draft.path.push(cell);
    }
  }

  pub fn reset_path(&mut self) {
    if self.answering() {
      self.draft.path.clear();
    }
  }

  fn blanks(&self) -> Option<usize> {
    match &self.current_item().render {
      Render::EquationFill(r) => Some(r.blanks),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{
    AnswerSpec, ChallengeDoc, Options, SceneChange, SceneRender, Target24Render,
  };
  use chrono::Utc;

  fn scene_item(item_id: &str, target_id: &str) -> ChallengeItem {
    ChallengeItem {
      item_id: item_id.into(),
      prompt: "Objek mana yang hilang?".into(),
      render: Render::SceneRecall(SceneRender {
        grid: 4,
        objects: vec![],
        change: SceneChange::Removed { target_id: target_id.into() },
      }),
      options: Options::default(),
      answer_spec: Some(AnswerSpec { options: vec![target_id.into(), "other".into()] }),
      metadata: None,
      answer_hash: None,
    }
  }

  fn builder_item(item_id: &str) -> ChallengeItem {
    ChallengeItem {
      item_id: item_id.into(),
      prompt: "Capai 24.".into(),
      render: Render::Target24(Target24Render { numbers: vec![2, 3, 4, 1], target: 24, slots: 7 }),
      options: Options::default(),
      answer_spec: None,
      metadata: None,
      answer_hash: None,
    }
  }

  fn doc(items: Vec<ChallengeItem>) -> ChallengeDoc {
    ChallengeDoc {
      challenge_id: "test-doc".into(),
      challenge_type: ChallengeType::Memory,
      difficulty: None,
      generated_at: Utc::now(),
      items,
      scoring: None,
    }
  }

  fn timing() -> TimingConfig {
    TimingConfig { memorize_sec: 20, answer_sec: 10 }
  }

  fn new_ctl(items: Vec<ChallengeItem>) -> (SessionController, Vec<SessionEvent>) {
    let (tx, _rx) = mpsc::unbounded_channel();
    SessionController::new(doc(items), timing(), 1000, tx)
  }

  fn elapse(ctl: &mut SessionController, phase: Phase) -> Vec<SessionEvent> {
    // epoch is 1-based per item; craft the elapsed message directly
    ctl.on_timer(TimerMsg { epoch: ctl.epoch, phase, left: 0 })
  }

  #[tokio::test]
  async fn starts_in_memorize_with_first_item() {
    let (ctl, events) = new_ctl(vec![scene_item("i1", "car")]);
    assert_eq!(ctl.phase(), Phase::Memorize);
    assert!(matches!(events[0], SessionEvent::ItemStarted { index: 0, total: 1, .. }));
    assert!(matches!(
      events[1],
      SessionEvent::PhaseChanged { phase: Phase::Memorize, seconds: 20 }
    ));
  }

  #[tokio::test]
  async fn inputs_are_inert_during_memorize() {
    let (mut ctl, _) = new_ctl(vec![scene_item("i1", "car")]);
    ctl.select_text("car".into());
    assert!(ctl.draft().selected_text.is_none());

    // skip is also disallowed while memorizing
    assert!(ctl.skip().is_empty());
    assert!(ctl.submit(false).is_empty());
    assert_eq!(ctl.phase(), Phase::Memorize);
  }

  #[tokio::test]
  async fn memorize_elapsed_enters_answer_phase() {
    let (mut ctl, _) = new_ctl(vec![scene_item("i1", "car")]);
    let events = elapse(&mut ctl, Phase::Memorize);
    assert!(matches!(
      events[0],
      SessionEvent::PhaseChanged { phase: Phase::Answer, seconds: 10 }
    ));
    assert_eq!(ctl.phase(), Phase::Answer);

    ctl.select_text("car".into());
    let events = ctl.submit(false);
    assert!(matches!(
      events[0],
      SessionEvent::AnswerResult { correct: true, auto: false, item_score: 1000, .. }
    ));
    assert!(matches!(events[1], SessionEvent::Completed { score: 1000 }));
    assert!(ctl.is_finished());
  }

  #[tokio::test]
  async fn stale_timer_messages_are_dropped() {
    let (mut ctl, _) = new_ctl(vec![scene_item("i1", "car"), scene_item("i2", "boat")]);
    let old_epoch = ctl.epoch;
    elapse(&mut ctl, Phase::Memorize);

    // late memorize tick from the finished phase: same epoch, wrong phase
    assert!(ctl.on_timer(TimerMsg { epoch: old_epoch, phase: Phase::Memorize, left: 0 }).is_empty());

    // answer the first item; a tick from its epoch must not touch item 2
    ctl.select_text("car".into());
    ctl.submit(false);
    assert!(ctl.on_timer(TimerMsg { epoch: old_epoch, phase: Phase::Answer, left: 0 }).is_empty());
    assert_eq!(ctl.phase(), Phase::Memorize); // item 2 memorizing, untouched
  }

  #[tokio::test]
  async fn auto_submit_with_empty_draft_is_incorrect_and_advances() {
    let (mut ctl, _) = new_ctl(vec![scene_item("i1", "car"), scene_item("i2", "boat")]);
    elapse(&mut ctl, Phase::Memorize);
    let events = elapse(&mut ctl, Phase::Answer);
    assert!(matches!(
      events[0],
      SessionEvent::AnswerResult { correct: false, auto: true, item_score: 0, .. }
    ));
    assert!(matches!(events[1], SessionEvent::ItemStarted { index: 1, .. }));
    assert_eq!(ctl.phase(), Phase::Memorize);
  }

  #[tokio::test]
  async fn skip_advances_without_scoring() {
    let (mut ctl, _) = new_ctl(vec![scene_item("i1", "car"), scene_item("i2", "boat")]);
    elapse(&mut ctl, Phase::Memorize);
    let events = ctl.skip();
    assert!(matches!(events[0], SessionEvent::ItemStarted { index: 1, .. }));
    assert_eq!(ctl.score(), 0);
  }

  #[tokio::test]
  async fn item_transition_rebuilds_the_draft() {
    let (mut ctl, _) = new_ctl(vec![builder_item("i1"), builder_item("i2")]);
    elapse(&mut ctl, Phase::Memorize);
    ctl.push_number(0);
    ctl.push_op("×");
    assert_eq!(ctl.draft().builder.as_ref().unwrap().tokens().len(), 2);

    ctl.skip();
    // fresh item, fresh builder: chips free, no tokens
    let b = ctl.draft().builder.as_ref().unwrap();
    assert!(b.tokens().is_empty());
    assert!(!b.number_used(0));
  }

  #[tokio::test]
  async fn maze_inputs_go_through_adjacency_guard() {
    use crate::domain::{MazeEdges, MazeRender};
    let maze = ChallengeItem {
      item_id: "mz".into(),
      prompt: "maze".into(),
      render: Render::NumberMaze(MazeRender {
        grid: 2,
        cells: vec![vec![2, 3], vec![4, 5]],
        edges: MazeEdges {
          h: vec![vec!["+".into()], vec!["+".into()]],
          v: vec![vec!["×".into(), "×".into()]],
        },
        start: (0, 0),
        max_steps: 2,
        target: 5,
      }),
      options: Options::default(),
      answer_spec: None,
      metadata: None,
      answer_hash: None,
    };
    let (mut ctl, _) = new_ctl(vec![maze]);
    elapse(&mut ctl, Phase::Memorize);

    ctl.click_cell((1, 1)); // diagonal from start: rejected
    assert!(ctl.draft().path.is_empty());
    ctl.click_cell((0, 1));
    ctl.click_cell((1, 1));
    assert_eq!(ctl.draft().path.len(), 2);
    ctl.click_cell((1, 0)); // over the step budget
    assert_eq!(ctl.draft().path.len(), 2);

    ctl.reset_path();
    assert!(ctl.draft().path.is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn countdown_ticks_down_to_the_elapsed_signal() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _cd = Countdown::start(7, Phase::Answer, 3, tx);
    let mut seen = Vec::new();
    while let Some(msg) = rx.recv().await {
      assert_eq!(msg.epoch, 7);
      seen.push(msg.left);
      if msg.left == 0 {
        break;
      }
    }
    assert_eq!(seen, vec![2, 1, 0]);
  }

  #[tokio::test(start_paused = true)]
  async fn cancelled_countdown_stops_ticking() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let cd = Countdown::start(1, Phase::Memorize, 30, tx);
    let first = rx.recv().await.unwrap();
    assert_eq!(first.left, 29);
    cd.cancel();
    // channel closes once the aborted task's sender is dropped
    assert!(rx.recv().await.is_none());
  }

  #[tokio::test]
  async fn empty_document_completes_immediately() {
    let (ctl, events) = new_ctl(vec![]);
    assert!(ctl.is_finished());
    assert!(matches!(events[0], SessionEvent::Completed { score: 0 }));
  }
}
