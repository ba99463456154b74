use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every way a scoring call can be refused. None of these are fatal; a rejected
/// call leaves all persisted rows as they were.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("invalid ball input: {reason}")]
    InvalidBallInput { reason: String },
    #[error("innings {innings_id} is closed")]
    InningsClosed { innings_id: i64 },
    #[error("player {player_id} is not valid as {role}")]
    UnknownPlayer { player_id: String, role: &'static str },
    #[error("innings {innings_id} changed (expected revision {expected}, found {found})")]
    ConcurrentModification {
        innings_id: i64,
        expected: u64,
        found: u64,
    },
    #[error("innings {innings_id} has no ball to undo")]
    NothingToUndo { innings_id: i64 },
    #[error("match {match_id} not found")]
    MatchNotFound { match_id: String },
    #[error("innings {innings_id} not found")]
    InningsNotFound { innings_id: i64 },
    #[error("invalid transition: {reason}")]
    InvalidTransition { reason: String },
    #[error("storage: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("feed: {0}")]
    Feed(#[from] crate::feed::FeedError),
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl ScoringError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        ScoringError::InvalidBallInput { reason: reason.into() }
    }

    pub fn transition(reason: impl Into<String>) -> Self {
        ScoringError::InvalidTransition { reason: reason.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ScoringError::InvalidBallInput { .. } => ErrorKind::InvalidBallInput,
            ScoringError::InningsClosed { .. } => ErrorKind::InningsClosed,
            ScoringError::UnknownPlayer { .. } => ErrorKind::UnknownPlayer,
            ScoringError::ConcurrentModification { .. } => ErrorKind::ConcurrentModification,
            ScoringError::NothingToUndo { .. } => ErrorKind::NothingToUndo,
            ScoringError::MatchNotFound { .. } | ScoringError::InningsNotFound { .. } => {
                ErrorKind::NotFound
            }
            ScoringError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            ScoringError::Feed(_) => ErrorKind::FeedUnavailable,
            ScoringError::Storage(_) | ScoringError::Serialization(_) | ScoringError::LockPoisoned => {
                ErrorKind::Storage
            }
        }
    }
}

/// Stable wire name for an error, handed to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidBallInput,
    InningsClosed,
    UnknownPlayer,
    ConcurrentModification,
    NothingToUndo,
    NotFound,
    InvalidTransition,
    FeedUnavailable,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidBallInput => "invalid_ball_input",
            ErrorKind::InningsClosed => "innings_closed",
            ErrorKind::UnknownPlayer => "unknown_player",
            ErrorKind::ConcurrentModification => "concurrent_modification",
            ErrorKind::NothingToUndo => "nothing_to_undo",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::FeedUnavailable => "feed_unavailable",
            ErrorKind::Storage => "storage",
        }
    }

    /// Only a concurrency conflict is worth retrying with fresh state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::ConcurrentModification)
    }
}

/// `{ ok: true, value } | { ok: false, error_kind, message }` envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Outcome<T> {
    Ok { ok: bool, value: T },
    Err { ok: bool, error_kind: ErrorKind, message: String },
}

impl<T> From<Result<T, ScoringError>> for Outcome<T> {
    fn from(result: Result<T, ScoringError>) -> Self {
        match result {
            Ok(value) => Outcome::Ok { ok: true, value },
            Err(err) => Outcome::Err {
                ok: false,
                error_kind: err.kind(),
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(ScoringError::invalid("x").kind(), ErrorKind::InvalidBallInput);
        assert_eq!(
            ScoringError::InningsNotFound { innings_id: 3 }.kind(),
            ErrorKind::NotFound
        );
        assert!(ErrorKind::ConcurrentModification.is_retryable());
        assert!(!ErrorKind::InningsClosed.is_retryable());
    }

    #[test]
    fn test_outcome_envelope_json() {
        let ok: Outcome<u32> = Ok(7).into();
        assert_eq!(serde_json::to_string(&ok).unwrap(), r#"{"ok":true,"value":7}"#);

        let err: Outcome<u32> = Err(ScoringError::NothingToUndo { innings_id: 1 }).into();
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["error_kind"], "nothing_to_undo");
    }
}
