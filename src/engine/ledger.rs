//! Player performance ledger: the striker's batting line and the bowler's
//! analysis, both driven by the same delivery.

use serde::{Deserialize, Serialize};

use super::events::BallEvent;
use super::state::{BattingPerformance, BowlingPerformance};
use crate::config::ScoringRules;
use crate::error::ScoringError;

/// What to do with one ledger row after a delivery (or its undo).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowWrite<T> {
    Keep,
    Upsert(T),
    Delete,
}

impl<T> RowWrite<T> {
    pub fn row(&self) -> Option<&T> {
        match self {
            RowWrite::Upsert(row) => Some(row),
            _ => None,
        }
    }
}

/// Which rows a delivery brought into existence; an undo deletes them again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowsCreated {
    pub striker: bool,
    pub non_striker: bool,
    pub bowler: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerWrites {
    pub striker: RowWrite<BattingPerformance>,
    pub non_striker: RowWrite<BattingPerformance>,
    pub bowler: RowWrite<BowlingPerformance>,
}

/// Current rows for the three players a delivery can touch.
#[derive(Debug, Clone, Default)]
pub struct LedgerRows {
    pub striker: Option<BattingPerformance>,
    pub non_striker: Option<BattingPerformance>,
    pub bowler: Option<BowlingPerformance>,
}

pub fn balls_faced(ball: &BallEvent, rules: &ScoringRules) -> u32 {
    if ball.is_wide() {
        0
    } else if ball.is_no_ball() {
        rules.no_ball_counts_as_faced as u32
    } else {
        1
    }
}

/// Apply one delivery to the ledger.
pub fn apply(
    ball: &BallEvent,
    rules: &ScoringRules,
    rows: LedgerRows,
) -> Result<(LedgerWrites, RowsCreated), ScoringError> {
    let mut created = RowsCreated::default();
    let dismissed = ball.dismissed().map(String::as_str);

    // A wide is never faced; the striker's line only moves if they are out.
    let striker = if !ball.is_wide() || dismissed == Some(ball.striker_id.as_str()) {
        created.striker = rows.striker.is_none();
        let mut row = rows
            .striker
            .unwrap_or_else(|| BattingPerformance::new(ball.innings_id, &ball.striker_id));
        if row.is_out {
            return Err(ScoringError::invalid(format!("{} is already out", row.player_id)));
        }
        if !ball.is_wide() {
            row.runs += ball.runs_off_bat;
            row.balls_faced += balls_faced(ball, rules);
            row.fours += ball.is_four as u32;
            row.sixes += ball.is_six as u32;
        }
        if let Some(w) = ball.wicket.as_ref().filter(|w| w.player_id == ball.striker_id) {
            row.is_out = true;
            row.dismissal = Some(w.kind);
        }
        RowWrite::Upsert(row)
    } else {
        RowWrite::Keep
    };

    let non_striker = match ball.wicket.as_ref().filter(|w| w.player_id == ball.non_striker_id) {
        Some(w) => {
            created.non_striker = rows.non_striker.is_none();
            let mut row = rows
                .non_striker
                .unwrap_or_else(|| BattingPerformance::new(ball.innings_id, &ball.non_striker_id));
            if row.is_out {
                return Err(ScoringError::invalid(format!("{} is already out", row.player_id)));
            }
            row.is_out = true;
            row.dismissal = Some(w.kind);
            RowWrite::Upsert(row)
        }
        None => RowWrite::Keep,
    };

    created.bowler = rows.bowler.is_none();
    let mut bowler = rows
        .bowler
        .unwrap_or_else(|| BowlingPerformance::new(ball.innings_id, &ball.bowler_id));
    bowler.legal_balls += ball.is_legal_delivery() as u32;
    bowler.runs_conceded += ball.runs_conceded();
    bowler.wickets += ball.bowler_wicket() as u32;
    bowler.wides += ball.is_wide() as u32;
    bowler.no_balls += ball.is_no_ball() as u32;

    Ok((
        LedgerWrites {
            striker,
            non_striker,
            bowler: RowWrite::Upsert(bowler),
        },
        created,
    ))
}

/// Take one delivery back out of the ledger. `created` is what `apply`
/// reported when the delivery went in and `faced` is the balls-faced count it
/// added to the striker, so a later rules change cannot skew the reversal.
pub fn revert(
    ball: &BallEvent,
    faced: u32,
    created: RowsCreated,
    rows: LedgerRows,
) -> Result<LedgerWrites, ScoringError> {
    let dismissed = ball.dismissed().map(String::as_str);

    let striker = if !ball.is_wide() || dismissed == Some(ball.striker_id.as_str()) {
        if created.striker {
            RowWrite::Delete
        } else {
            let mut row = rows.striker.ok_or_else(|| missing("batting", &ball.striker_id))?;
            if !ball.is_wide() {
                row.runs = sub(row.runs, ball.runs_off_bat)?;
                row.balls_faced = sub(row.balls_faced, faced)?;
                row.fours = sub(row.fours, ball.is_four as u32)?;
                row.sixes = sub(row.sixes, ball.is_six as u32)?;
            }
            if dismissed == Some(ball.striker_id.as_str()) {
                row.is_out = false;
                row.dismissal = None;
            }
            RowWrite::Upsert(row)
        }
    } else {
        RowWrite::Keep
    };

    let non_striker = if dismissed == Some(ball.non_striker_id.as_str()) {
        if created.non_striker {
            RowWrite::Delete
        } else {
            let mut row = rows.non_striker.ok_or_else(|| missing("batting", &ball.non_striker_id))?;
            row.is_out = false;
            row.dismissal = None;
            RowWrite::Upsert(row)
        }
    } else {
        RowWrite::Keep
    };

    let bowler = if created.bowler {
        RowWrite::Delete
    } else {
        let mut row = rows.bowler.ok_or_else(|| missing("bowling", &ball.bowler_id))?;
        row.legal_balls = sub(row.legal_balls, ball.is_legal_delivery() as u32)?;
        row.runs_conceded = sub(row.runs_conceded, ball.runs_conceded())?;
        row.wickets = sub(row.wickets, ball.bowler_wicket() as u32)?;
        row.wides = sub(row.wides, ball.is_wide() as u32)?;
        row.no_balls = sub(row.no_balls, ball.is_no_ball() as u32)?;
        RowWrite::Upsert(row)
    };

    Ok(LedgerWrites {
        striker,
        non_striker,
        bowler,
    })
}

fn missing(table: &str, player: &str) -> ScoringError {
    ScoringError::transition(format!("no {} row for {} to revert", table, player))
}

fn sub(value: u32, by: u32) -> Result<u32, ScoringError> {
    value
        .checked_sub(by)
        .ok_or_else(|| ScoringError::transition(format!("ledger underflow: {} < {}", value, by)))
}
