//! WebSocket upgrade + the interactive session loop.
//!
//! One socket multiplexes three event sources: client messages, countdown
//! ticks from the active session's timers, and training-store change
//! signals (so every open view refreshes its stats when any of them — or
//! another connection — records a session). Dropping the active session on
//! any exit route aborts its timers.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{error, info, instrument};

use crate::generator::ChallengeRequest;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::session::{SessionController, SessionEvent, TimerMsg};
use crate::state::AppState;
use crate::store::SessionPayload;
use crate::domain::ChallengeType;
use crate::util::{day_of_month, fmt_clock};

/// The session being played over this socket, plus the report parameters
/// chosen at start.
struct ActiveSession {
  ctl: SessionController,
  adaptive: bool,
  duration_min: i64,
}

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "matea_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "matea_backend", "WebSocket connected");

  let (timer_tx, mut timer_rx) = mpsc::unbounded_channel::<TimerMsg>();
  let mut store_rx = state.store.subscribe();
  let mut active: Option<ActiveSession> = None;

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => {
            let replies = match serde_json::from_str::<ClientWsMessage>(&txt) {
              Ok(incoming) => handle_client_ws(incoming, &state, &mut active, &timer_tx).await,
              Err(e) => vec![ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }],
            };
            if send_all(&mut socket, replies).await.is_err() {
              break;
            }
          }
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }

      Some(msg) = timer_rx.recv() => {
        let events = match active.as_mut() {
          Some(session) => session.ctl.on_timer(msg),
          None => Vec::new(),
        };
        let replies = drain_events(&state, &mut active, events).await;
        if send_all(&mut socket, replies).await.is_err() {
          break;
        }
      }

      changed = store_rx.changed() => {
        if changed.is_err() {
          continue;
        }
        let stats = state.store.stats().await;
        if send_all(&mut socket, vec![ServerWsMessage::Stats { stats }]).await.is_err() {
          break;
        }
      }
    }
  }

  // Dropping the active session aborts any pending countdowns.
  drop(active);
  info!(target: "matea_backend", "WebSocket disconnected");
}

async fn send_all(socket: &mut WebSocket, replies: Vec<ServerWsMessage>) -> Result<(), ()> {
  for reply in replies {
    let out = serde_json::to_string(&reply).unwrap_or_else(|e| {
      serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) })
        .to_string()
    });
    if let Err(e) = socket.send(Message::Text(out)).await {
      error!(target: "matea_backend", error = %e, "WS send error");
      return Err(());
    }
  }
  Ok(())
}

async fn handle_client_ws(
  msg: ClientWsMessage,
  state: &AppState,
  active: &mut Option<ActiveSession>,
  timer_tx: &mpsc::UnboundedSender<TimerMsg>,
) -> Vec<ServerWsMessage> {
  match msg {
    ClientWsMessage::Ping => vec![ServerWsMessage::Pong],

    ClientWsMessage::Stats => {
      vec![ServerWsMessage::Stats { stats: state.store.stats().await }]
    }

    ClientWsMessage::StartSession { challenge_type, difficulty, adaptive, duration_min, seed } => {
      // Starting over an in-flight session abandons it; its timers die here.
      *active = None;
      let adaptive = adaptive.unwrap_or(true);
      let req = ChallengeRequest::from_config(
        &state.config.generator,
        challenge_type,
        difficulty,
        adaptive,
        seed,
      );
      let doc = match state.new_challenge_doc(req).await {
        Ok((doc, origin)) => {
          info!(target: "challenge", challenge_id = %doc.challenge_id, %origin, "WS session document served");
          doc
        }
        Err(e) => {
          return vec![ServerWsMessage::Error {
            message: format!("Gagal memuat tantangan: {}", e),
          }]
        }
      };
      if doc.items.is_empty() {
        return vec![ServerWsMessage::Error { message: "Tidak ada soal.".into() }];
      }

      let started = ServerWsMessage::SessionStarted {
        challenge_id: doc.challenge_id.clone(),
        challenge_type,
        total: doc.items.len(),
      };
      let (ctl, events) = SessionController::new(
        doc,
        state.config.timing.clone(),
        state.config.scoring.item_points,
        timer_tx.clone(),
      );
      *active = Some(ActiveSession {
        ctl,
        adaptive,
        duration_min: duration_min.unwrap_or(state.config.scoring.default_duration_min),
      });

      let mut replies = vec![started];
      replies.extend(drain_events(state, active, events).await);
      replies
    }

    ClientWsMessage::Submit => {
      let events = match active.as_mut() {
        Some(session) => session.ctl.submit(false),
        None => Vec::new(),
      };
      drain_events(state, active, events).await
    }

    ClientWsMessage::Skip => {
      let events = match active.as_mut() {
        Some(session) => session.ctl.skip(),
        None => Vec::new(),
      };
      drain_events(state, active, events).await
    }

    ClientWsMessage::QuitSession => {
      // Abandoned without a result: timers cancelled, nothing recorded.
      *active = None;
      Vec::new()
    }

    // Per-variant inputs mutate the draft silently; correctness is only
    // decided at submit time.
    other => {
      if let Some(session) = active.as_mut() {
        apply_input(&mut session.ctl, other);
      }
      Vec::new()
    }
  }
}

fn apply_input(ctl: &mut SessionController, msg: ClientWsMessage) {
  match msg {
    ClientWsMessage::SelectOption { option_id } => ctl.select_option(option_id),
    ClientWsMessage::SelectText { text } => ctl.select_text(text),
    ClientWsMessage::SetMapping { term, definition } => ctl.set_mapping(term, definition),
    ClientWsMessage::SetSequenceInput { index, value } => ctl.set_sequence_input(index, value),
    ClientWsMessage::PushNumber { index } => ctl.push_number(index),
    ClientWsMessage::PushOp { op } => ctl.push_op(&op),
    ClientWsMessage::PushParen { paren } => ctl.push_paren(&paren),
    ClientWsMessage::RemoveToken { index } => ctl.remove_token(index),
    ClientWsMessage::Backspace => ctl.backspace(),
    ClientWsMessage::ClearTokens => ctl.clear_tokens(),
    ClientWsMessage::TypeDigit { digit } => ctl.type_digit(&digit),
    ClientWsMessage::EraseDigit => ctl.erase_digit(),
    ClientWsMessage::ClearDigits => ctl.clear_digits(),
    ClientWsMessage::FocusBlank { index } => ctl.focus_blank(index),
    ClientWsMessage::SetFree { text } => ctl.set_free(text),
    ClientWsMessage::ClickCell { row, col } => ctl.click_cell((row, col)),
    ClientWsMessage::ResetPath => ctl.reset_path(),
    _ => {}
  }
}

/// Translate controller events to wire messages. A completion takes the
/// session out of the slot and records it in the training store with the
/// daily-challenge bonus applied.
async fn drain_events(
  state: &AppState,
  active: &mut Option<ActiveSession>,
  events: Vec<SessionEvent>,
) -> Vec<ServerWsMessage> {
  let mut out = Vec::new();
  for ev in events {
    match ev {
      SessionEvent::ItemStarted { index, total, item } => {
        out.push(ServerWsMessage::Item { index, total, item });
      }
      SessionEvent::PhaseChanged { phase, seconds } => {
        out.push(ServerWsMessage::Phase { phase, seconds, clock: fmt_clock(seconds) });
      }
      SessionEvent::Tick { phase, left } => {
        out.push(ServerWsMessage::Tick { phase, left, clock: fmt_clock(left) });
      }
      SessionEvent::AnswerResult { index, correct, auto, item_score, score } => {
        out.push(ServerWsMessage::AnswerResult { index, correct, auto, item_score, score });
      }
      SessionEvent::Completed { score } => {
        let Some(session) = active.take() else { continue };
        let now = Utc::now();
        let challenge_id = session.ctl.challenge_type();
        let daily = ChallengeType::ALL[day_of_month(now) as usize % ChallengeType::ALL.len()];
        let bonus = if challenge_id == daily {
          state.config.scoring.daily_bonus_multiplier
        } else {
          1.0
        };
        let (recorded, gained_xp) = state
          .store
          .add_session(SessionPayload {
            challenge_id,
            score,
            duration_min: session.duration_min,
            bonus_multiplier: bonus,
            adaptive: session.adaptive,
          })
          .await;
        let stats = state.store.stats().await;
        info!(
          target: "training",
          session_id = %recorded.id,
          score,
          gained_xp,
          "WS session completed"
        );
        out.push(ServerWsMessage::SessionComplete { score, gained_xp, session: recorded, stats });
      }
    }
  }
  out
}
