//! Delivery descriptions: the raw input a scorer submits and the canonical
//! event the engine records.

use serde::{Deserialize, Serialize};

pub type PlayerId = String;
pub type TeamId = String;
pub type MatchId = String;
pub type InningsId = i64;
pub type BallId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraKind {
    Wide,
    NoBall,
    Bye,
    LegBye,
    Penalty,
}

impl ExtraKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtraKind::Wide => "wide",
            ExtraKind::NoBall => "no_ball",
            ExtraKind::Bye => "bye",
            ExtraKind::LegBye => "leg_bye",
            ExtraKind::Penalty => "penalty",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "wide" => Some(ExtraKind::Wide),
            "no_ball" => Some(ExtraKind::NoBall),
            "bye" => Some(ExtraKind::Bye),
            "leg_bye" => Some(ExtraKind::LegBye),
            "penalty" => Some(ExtraKind::Penalty),
            _ => None,
        }
    }

    /// Wides and no-balls must be bowled again.
    pub fn is_illegal_delivery(&self) -> bool {
        matches!(self, ExtraKind::Wide | ExtraKind::NoBall)
    }

    /// Byes and leg-byes are fielding failures, not the bowler's.
    pub fn charged_to_bowler(&self) -> bool {
        matches!(self, ExtraKind::Wide | ExtraKind::NoBall)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DismissalKind {
    Bowled,
    Caught,
    Lbw,
    RunOut,
    Stumped,
    HitWicket,
}

impl DismissalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DismissalKind::Bowled => "bowled",
            DismissalKind::Caught => "caught",
            DismissalKind::Lbw => "lbw",
            DismissalKind::RunOut => "run_out",
            DismissalKind::Stumped => "stumped",
            DismissalKind::HitWicket => "hit_wicket",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bowled" => Some(DismissalKind::Bowled),
            "caught" => Some(DismissalKind::Caught),
            "lbw" => Some(DismissalKind::Lbw),
            "run_out" => Some(DismissalKind::RunOut),
            "stumped" => Some(DismissalKind::Stumped),
            "hit_wicket" => Some(DismissalKind::HitWicket),
            _ => None,
        }
    }

    pub fn credited_to_bowler(&self) -> bool {
        !matches!(self, DismissalKind::RunOut)
    }

    /// Dismissals still possible off a delivery of this extra kind.
    pub fn allowed_on(&self, extra: Option<ExtraKind>) -> bool {
        match extra {
            Some(ExtraKind::NoBall) => matches!(self, DismissalKind::RunOut),
            Some(ExtraKind::Wide) => matches!(
                self,
                DismissalKind::RunOut | DismissalKind::Stumped | DismissalKind::HitWicket
            ),
            _ => true,
        }
    }
}

/// A delivery as described by the scorer's console. Counts are signed so a
/// malformed submission can be reported rather than failing to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallInput {
    pub innings_id: InningsId,
    pub over: u32,
    pub ball: u32,
    pub striker_id: PlayerId,
    pub non_striker_id: PlayerId,
    pub bowler_id: PlayerId,
    #[serde(default)]
    pub runs_off_bat: i32,
    #[serde(default)]
    pub is_four: bool,
    #[serde(default)]
    pub is_six: bool,
    #[serde(default)]
    pub extra: Option<ExtraKind>,
    #[serde(default)]
    pub extra_runs: i32,
    #[serde(default)]
    pub is_wicket: bool,
    #[serde(default)]
    pub dismissal: Option<DismissalKind>,
    #[serde(default)]
    pub dismissed_id: Option<PlayerId>,
    #[serde(default)]
    pub fielder_id: Option<PlayerId>,
    /// Innings revision the caller read before building this ball.
    #[serde(default)]
    pub expected_revision: Option<u64>,
}

impl BallInput {
    /// A dot ball with everything else defaulted.
    pub fn dot(
        innings_id: InningsId,
        over: u32,
        ball: u32,
        striker_id: &str,
        non_striker_id: &str,
        bowler_id: &str,
    ) -> Self {
        Self {
            innings_id,
            over,
            ball,
            striker_id: striker_id.to_string(),
            non_striker_id: non_striker_id.to_string(),
            bowler_id: bowler_id.to_string(),
            runs_off_bat: 0,
            is_four: false,
            is_six: false,
            extra: None,
            extra_runs: 0,
            is_wicket: false,
            dismissal: None,
            dismissed_id: None,
            fielder_id: None,
            expected_revision: None,
        }
    }

    pub fn runs(mut self, runs: i32) -> Self {
        self.runs_off_bat = runs;
        self.is_four = runs == 4;
        self.is_six = runs == 6;
        self
    }

    pub fn extra(mut self, kind: ExtraKind, runs: i32) -> Self {
        self.extra = Some(kind);
        self.extra_runs = runs;
        self
    }

    pub fn wicket(mut self, kind: DismissalKind, dismissed_id: &str) -> Self {
        self.is_wicket = true;
        self.dismissal = Some(kind);
        self.dismissed_id = Some(dismissed_id.to_string());
        self
    }

    pub fn fielder(mut self, fielder_id: &str) -> Self {
        self.fielder_id = Some(fielder_id.to_string());
        self
    }

    pub fn at_revision(mut self, revision: u64) -> Self {
        self.expected_revision = Some(revision);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dismissal {
    pub kind: DismissalKind,
    pub player_id: PlayerId,
    pub fielder_id: Option<PlayerId>,
}

/// Canonical delivery. Only constructed by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallEvent {
    pub innings_id: InningsId,
    pub over: u32,
    pub ball: u32,
    pub striker_id: PlayerId,
    pub non_striker_id: PlayerId,
    pub bowler_id: PlayerId,
    pub runs_off_bat: u32,
    pub is_four: bool,
    pub is_six: bool,
    pub extra: Option<ExtraKind>,
    pub extra_runs: u32,
    pub wicket: Option<Dismissal>,
}

impl BallEvent {
    pub fn is_legal_delivery(&self) -> bool {
        !self.extra.map(|e| e.is_illegal_delivery()).unwrap_or(false)
    }

    pub fn total_runs(&self) -> u32 {
        self.runs_off_bat + self.extra_runs
    }

    pub fn is_wide(&self) -> bool {
        self.extra == Some(ExtraKind::Wide)
    }

    pub fn is_no_ball(&self) -> bool {
        self.extra == Some(ExtraKind::NoBall)
    }

    /// Runs that go against the bowler's analysis.
    pub fn runs_conceded(&self) -> u32 {
        let extra = match self.extra {
            Some(kind) if kind.charged_to_bowler() => self.extra_runs,
            _ => 0,
        };
        self.runs_off_bat + extra
    }

    pub fn bowler_wicket(&self) -> bool {
        self.wicket
            .as_ref()
            .map(|w| w.kind.credited_to_bowler())
            .unwrap_or(false)
    }

    pub fn dismissed(&self) -> Option<&PlayerId> {
        self.wicket.as_ref().map(|w| &w.player_id)
    }
}

/// A delivery as stored: the canonical event plus its row identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallRecord {
    pub id: BallId,
    pub seq: u32,
    pub event: BallEvent,
    pub recorded_at: String,
}
