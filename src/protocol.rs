//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{ChallengeItem, ChallengeType};
use crate::session::Phase;
use crate::store::{DerivedStats, Session};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    #[serde(rename_all = "camelCase")]
    StartSession {
        challenge_type: ChallengeType,
        #[serde(default)]
        difficulty: Option<String>,
        #[serde(default)]
        adaptive: Option<bool>,
        #[serde(default)]
        duration_min: Option<i64>,
        #[serde(default)]
        seed: Option<u64>,
    },
    // --- per-variant inputs; only meaningful during the answer phase ---
    #[serde(rename_all = "camelCase")]
    SelectOption {
        option_id: String,
    },
    SelectText {
        text: String,
    },
    SetMapping {
        term: String,
        definition: String,
    },
    SetSequenceInput {
        index: usize,
        value: i64,
    },
    PushNumber {
        index: usize,
    },
    PushOp {
        op: String,
    },
    PushParen {
        paren: String,
    },
    RemoveToken {
        index: usize,
    },
    Backspace,
    ClearTokens,
    TypeDigit {
        digit: String,
    },
    EraseDigit,
    ClearDigits,
    FocusBlank {
        index: usize,
    },
    SetFree {
        text: String,
    },
    ClickCell {
        row: i64,
        col: i64,
    },
    ResetPath,
    // --- session control ---
    Submit,
    Skip,
    QuitSession,
    Stats,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    #[serde(rename_all = "camelCase")]
    SessionStarted {
        challenge_id: String,
        challenge_type: ChallengeType,
        total: usize,
    },
    Item {
        index: usize,
        total: usize,
        item: ChallengeItem,
    },
    Phase {
        phase: Phase,
        seconds: u64,
        clock: String,
    },
    Tick {
        phase: Phase,
        left: u64,
        clock: String,
    },
    #[serde(rename_all = "camelCase")]
    AnswerResult {
        index: usize,
        correct: bool,
        auto: bool,
        item_score: i64,
        score: i64,
    },
    #[serde(rename_all = "camelCase")]
    SessionComplete {
        score: i64,
        gained_xp: i64,
        session: Session,
        stats: DerivedStats,
    },
    Stats {
        stats: DerivedStats,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs
//

/// Body of POST /api/v1/challenges/new — the standard generation request.
/// Omitted fields fall back to config defaults.
#[derive(Debug, Deserialize)]
pub struct NewChallengeIn {
    #[serde(rename = "type")]
    pub challenge_type: ChallengeType,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub adaptive: Option<bool>,
    #[serde(default)]
    pub use_llm: Option<bool>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default, rename = "timeBudgetSec")]
    pub time_budget_sec: Option<u64>,
}

/// Body of POST /api/v1/sessions — a finished session report.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIn {
    pub challenge_id: ChallengeType,
    pub score: i64,
    #[serde(default)]
    pub duration_min: Option<i64>,
    pub bonus_multiplier: f64,
    #[serde(default)]
    pub adaptive: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOut {
    pub session: Session,
    pub gained_xp: i64,
    pub stats: DerivedStats,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_parse_from_wire_json() {
        let msg: ClientWsMessage = serde_json::from_str(
            r#"{"type":"start_session","challengeType":"numerical","durationMin":15}"#,
        )
        .unwrap();
        match msg {
            ClientWsMessage::StartSession { challenge_type, duration_min, adaptive, .. } => {
                assert_eq!(challenge_type, ChallengeType::Numerical);
                assert_eq!(duration_min, Some(15));
                assert_eq!(adaptive, None);
            }
            other => panic!("wrong variant: {other:?}"),
        }

        let msg: ClientWsMessage =
            serde_json::from_str(r#"{"type":"select_option","optionId":"B"}"#).unwrap();
        assert!(matches!(msg, ClientWsMessage::SelectOption { option_id } if option_id == "B"));

        let msg: ClientWsMessage =
            serde_json::from_str(r#"{"type":"click_cell","row":1,"col":2}"#).unwrap();
        assert!(matches!(msg, ClientWsMessage::ClickCell { row: 1, col: 2 }));
    }

    #[test]
    fn server_messages_tag_with_snake_case() {
        let json =
            serde_json::to_value(ServerWsMessage::Phase { phase: Phase::Memorize, seconds: 20, clock: "00:20".into() })
                .unwrap();
        assert_eq!(json["type"], "phase");
        assert_eq!(json["phase"], "memorize");
        assert_eq!(json["clock"], "00:20");
    }

    #[test]
    fn session_report_accepts_camel_case() {
        let body: SessionIn = serde_json::from_str(
            r#"{"challengeId":"memory","score":10,"durationMin":5,"bonusMultiplier":2}"#,
        )
        .unwrap();
        assert_eq!(body.challenge_id, ChallengeType::Memory);
        assert_eq!(body.duration_min, Some(5));
        assert_eq!(body.bonus_multiplier, 2.0);
        assert!(!body.adaptive);
    }
}
