//! HTTP endpoint handlers. These are thin wrappers that forward to state,
//! store and generator logic. Each handler is instrumented and logs
//! parameters plus basic result info.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::{info, instrument};

use crate::domain::ChallengeDoc;
use crate::generator::ChallengeRequest;
use crate::protocol::*;
use crate::state::AppState;
use crate::store::SessionPayload;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state, body), fields(challenge_type = body.challenge_type.as_str()))]
pub async fn http_new_challenge(
  State(state): State<Arc<AppState>>,
  Json(body): Json<NewChallengeIn>,
) -> Result<Json<ChallengeDoc>, (StatusCode, Json<ErrorOut>)> {
  let mut req = ChallengeRequest::from_config(
    &state.config.generator,
    body.challenge_type,
    body.difficulty,
    body.adaptive.unwrap_or(true),
    body.seed,
  );
  if let Some(count) = body.count {
    req.count = count;
  }
  if let Some(use_llm) = body.use_llm {
    req.use_llm = use_llm;
  }
  if let Some(locale) = body.locale {
    req.locale = locale;
  }
  if let Some(budget) = body.time_budget_sec {
    req.time_budget_sec = budget;
  }

  match state.new_challenge_doc(req).await {
    Ok((doc, origin)) => {
      info!(target: "challenge", challenge_id = %doc.challenge_id, %origin, "HTTP challenge served");
      Ok(Json(doc))
    }
    Err(e) => Err((StatusCode::BAD_GATEWAY, Json(ErrorOut { message: e.to_string() }))),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.store.stats().await)
}

#[instrument(level = "info", skip(state, body), fields(challenge = body.challenge_id.as_str(), score = body.score))]
pub async fn http_post_session(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SessionIn>,
) -> impl IntoResponse {
  let payload = SessionPayload {
    challenge_id: body.challenge_id,
    score: body.score,
    duration_min: body
      .duration_min
      .unwrap_or(state.config.scoring.default_duration_min),
    bonus_multiplier: body.bonus_multiplier,
    adaptive: body.adaptive,
  };
  let (session, gained_xp) = state.store.add_session(payload).await;
  let stats = state.store.stats().await;
  info!(target: "training", session_id = %session.id, gained_xp, "HTTP session recorded");
  Json(SessionOut { session, gained_xp, stats })
}
