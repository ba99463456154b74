//! Rows the scoring core owns, plus the match record it reads.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::events::{DismissalKind, InningsId, MatchId, PlayerId, TeamId};
use crate::rates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Upcoming,
    Live,
    Completed,
    Abandoned,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Upcoming => "upcoming",
            MatchStatus::Live => "live",
            MatchStatus::Completed => "completed",
            MatchStatus::Abandoned => "abandoned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "upcoming" => Some(MatchStatus::Upcoming),
            "live" => Some(MatchStatus::Live),
            "completed" => Some(MatchStatus::Completed),
            "abandoned" => Some(MatchStatus::Abandoned),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Abandoned)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchFormat {
    LimitedOvers { overs: u32 },
    Unlimited,
}

impl MatchFormat {
    pub fn overs_limit(&self) -> Option<u32> {
        match self {
            MatchFormat::LimitedOvers { overs } => Some(*overs),
            MatchFormat::Unlimited => None,
        }
    }

    pub fn from_overs_limit(limit: Option<u32>) -> Self {
        match limit {
            Some(overs) => MatchFormat::LimitedOvers { overs },
            None => MatchFormat::Unlimited,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub format: MatchFormat,
    pub status: MatchStatus,
}

impl Match {
    pub fn involves(&self, team: &str) -> bool {
        self.home_team == team || self.away_team == team
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extras {
    pub total: u32,
    pub byes: u32,
    pub leg_byes: u32,
    pub wides: u32,
    pub no_balls: u32,
    pub penalties: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InningsTotals {
    pub runs: u32,
    pub wickets: u32,
    pub legal_balls: u32,
    pub extras: Extras,
}

impl InningsTotals {
    pub fn overs(&self) -> String {
        rates::format_overs(self.legal_balls)
    }

    pub fn run_rate(&self) -> f64 {
        rates::run_rate(self.runs, self.legal_balls)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Innings {
    pub id: InningsId,
    pub match_id: MatchId,
    pub number: u32,
    pub batting_team: TeamId,
    pub bowling_team: TeamId,
    pub totals: InningsTotals,
    pub completed: bool,
    /// Bumped on every committed change; the optimistic concurrency token.
    pub revision: u64,
}

impl Innings {
    /// Over and ball-in-over (1-based) of the next delivery.
    pub fn next_pointer(&self) -> (u32, u32) {
        let legal = self.totals.legal_balls;
        (legal / rates::BALLS_PER_OVER, legal % rates::BALLS_PER_OVER + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattingPerformance {
    pub innings_id: InningsId,
    pub player_id: PlayerId,
    pub runs: u32,
    pub balls_faced: u32,
    pub fours: u32,
    pub sixes: u32,
    pub is_out: bool,
    pub dismissal: Option<DismissalKind>,
}

impl BattingPerformance {
    pub fn new(innings_id: InningsId, player_id: &str) -> Self {
        Self {
            innings_id,
            player_id: player_id.to_string(),
            runs: 0,
            balls_faced: 0,
            fours: 0,
            sixes: 0,
            is_out: false,
            dismissal: None,
        }
    }

    pub fn strike_rate(&self) -> f64 {
        rates::strike_rate(self.runs, self.balls_faced)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BowlingPerformance {
    pub innings_id: InningsId,
    pub player_id: PlayerId,
    pub legal_balls: u32,
    pub runs_conceded: u32,
    pub wickets: u32,
    pub wides: u32,
    pub no_balls: u32,
}

impl BowlingPerformance {
    pub fn new(innings_id: InningsId, player_id: &str) -> Self {
        Self {
            innings_id,
            player_id: player_id.to_string(),
            legal_balls: 0,
            runs_conceded: 0,
            wickets: 0,
            wides: 0,
            no_balls: 0,
        }
    }

    pub fn overs(&self) -> String {
        rates::format_overs(self.legal_balls)
    }

    pub fn economy(&self) -> f64 {
        rates::economy_rate(self.runs_conceded, self.legal_balls)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    NoInnings,
    InningsOpen,
    InningsBreak,
    Completed,
}

impl MatchPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchPhase::NoInnings => "no_innings",
            MatchPhase::InningsOpen => "innings_open",
            MatchPhase::InningsBreak => "innings_break",
            MatchPhase::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "no_innings" => Some(MatchPhase::NoInnings),
            "innings_open" => Some(MatchPhase::InningsOpen),
            "innings_break" => Some(MatchPhase::InningsBreak),
            "completed" => Some(MatchPhase::Completed),
            _ => None,
        }
    }
}

/// The one current-state record per match that drives real-time display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveMatchState {
    pub match_id: MatchId,
    pub phase: MatchPhase,
    pub innings_id: Option<InningsId>,
    pub innings_number: Option<u32>,
    /// `None` while the slot waits for the next batsman.
    pub striker_id: Option<PlayerId>,
    pub non_striker_id: Option<PlayerId>,
    pub bowler_id: Option<PlayerId>,
    /// Over and ball-in-over of the last accepted delivery.
    pub over: u32,
    pub ball: u32,
    pub runs: u32,
    pub wickets: u32,
    pub overs: String,
    pub last_event: String,
    pub revision: u64,
    pub updated_at: String,
}

impl LiveMatchState {
    pub fn new(match_id: &str) -> Self {
        Self {
            match_id: match_id.to_string(),
            phase: MatchPhase::NoInnings,
            innings_id: None,
            innings_number: None,
            striker_id: None,
            non_striker_id: None,
            bowler_id: None,
            over: 0,
            ball: 0,
            runs: 0,
            wickets: 0,
            overs: rates::format_overs(0),
            last_event: String::new(),
            revision: 0,
            updated_at: String::new(),
        }
    }

    /// Equal in everything a reader displays; ignores revision and timestamp.
    pub fn same_content(&self, other: &LiveMatchState) -> bool {
        let mut a = self.clone();
        a.revision = other.revision;
        a.updated_at = other.updated_at.clone();
        &a == other
    }

    /// Hex SHA-256 over the snapshot, so readers can drop redeliveries.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }

    pub fn is_at_crease(&self, player: &str) -> bool {
        self.striker_id.as_deref() == Some(player) || self.non_striker_id.as_deref() == Some(player)
    }
}
