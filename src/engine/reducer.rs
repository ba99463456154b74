//! Innings aggregator: (Innings, BallEvent) -> Innings.
//!
//! `apply_ball` and `revert_ball` are exact inverses for any ball that
//! `apply_ball` accepted.

use super::events::{BallEvent, ExtraKind};
use super::state::{Extras, Innings};
use crate::error::ScoringError;

/// Fold one delivery into the innings totals.
pub fn apply_ball(innings: &mut Innings, ball: &BallEvent) -> Result<(), ScoringError> {
    if innings.completed {
        return Err(ScoringError::InningsClosed { innings_id: innings.id });
    }
    if ball.innings_id != innings.id {
        return Err(ScoringError::invalid(format!(
            "ball for innings {} applied to innings {}",
            ball.innings_id, innings.id
        )));
    }
    let expected = innings.next_pointer();
    if (ball.over, ball.ball) != expected {
        return Err(ScoringError::invalid(format!(
            "delivery {}.{} out of sequence, next is {}.{}",
            ball.over, ball.ball, expected.0, expected.1
        )));
    }

    let totals = &mut innings.totals;
    totals.runs += ball.total_runs();
    if ball.wicket.is_some() {
        totals.wickets += 1;
    }
    if ball.is_legal_delivery() {
        totals.legal_balls += 1;
    }
    if let Some(kind) = ball.extra {
        totals.extras.total += ball.extra_runs;
        *extra_slot(&mut totals.extras, kind) += ball.extra_runs;
    }
    Ok(())
}

/// Take one previously applied delivery back out of the totals.
pub fn revert_ball(innings: &mut Innings, ball: &BallEvent) -> Result<(), ScoringError> {
    if innings.completed {
        return Err(ScoringError::InningsClosed { innings_id: innings.id });
    }
    let totals = &mut innings.totals;
    totals.runs = sub(totals.runs, ball.total_runs(), "runs")?;
    if ball.wicket.is_some() {
        totals.wickets = sub(totals.wickets, 1, "wickets")?;
    }
    if ball.is_legal_delivery() {
        totals.legal_balls = sub(totals.legal_balls, 1, "legal_balls")?;
    }
    if let Some(kind) = ball.extra {
        totals.extras.total = sub(totals.extras.total, ball.extra_runs, "extras")?;
        let slot = extra_slot(&mut totals.extras, kind);
        *slot = sub(*slot, ball.extra_runs, kind.as_str())?;
    }
    Ok(())
}

fn extra_slot(extras: &mut Extras, kind: ExtraKind) -> &mut u32 {
    match kind {
        ExtraKind::Bye => &mut extras.byes,
        ExtraKind::LegBye => &mut extras.leg_byes,
        ExtraKind::Wide => &mut extras.wides,
        ExtraKind::NoBall => &mut extras.no_balls,
        ExtraKind::Penalty => &mut extras.penalties,
    }
}

// A revert that would underflow means the ball was never applied here.
fn sub(value: u32, by: u32, field: &str) -> Result<u32, ScoringError> {
    value
        .checked_sub(by)
        .ok_or_else(|| ScoringError::transition(format!("cannot revert {}: {} < {}", field, value, by)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::{Dismissal, DismissalKind};
    use crate::engine::state::InningsTotals;

    fn innings() -> Innings {
        Innings {
            id: 1,
            match_id: "m".into(),
            number: 1,
            batting_team: "home".into(),
            bowling_team: "away".into(),
            totals: InningsTotals::default(),
            completed: false,
            revision: 0,
        }
    }

    fn ball(inn: &Innings, runs: u32, extra: Option<ExtraKind>, extra_runs: u32) -> BallEvent {
        let (over, ball) = inn.next_pointer();
        BallEvent {
            innings_id: 1,
            over,
            ball,
            striker_id: "a".into(),
            non_striker_id: "b".into(),
            bowler_id: "x".into(),
            runs_off_bat: runs,
            is_four: runs == 4,
            is_six: runs == 6,
            extra,
            extra_runs,
            wicket: None,
        }
    }

    #[test]
    fn test_legal_four() {
        let mut inn = innings();
        let b = ball(&inn, 4, None, 0);
        apply_ball(&mut inn, &b).unwrap();
        assert_eq!(inn.totals.runs, 4);
        assert_eq!(inn.totals.legal_balls, 1);
        assert_eq!(inn.totals.wickets, 0);
        assert_eq!(inn.totals.overs(), "0.1");
    }

    #[test]
    fn test_wide_does_not_advance_pointer() {
        let mut inn = innings();
        let b = ball(&inn, 0, Some(ExtraKind::Wide), 1);
        apply_ball(&mut inn, &b).unwrap();
        assert_eq!(inn.totals.runs, 1);
        assert_eq!(inn.totals.legal_balls, 0);
        assert_eq!(inn.totals.extras.wides, 1);
        assert_eq!(inn.totals.extras.total, 1);
        assert_eq!(inn.next_pointer(), (0, 1));
    }

    #[test]
    fn test_extras_categories() {
        let mut inn = innings();
        for (kind, runs) in [
            (ExtraKind::Bye, 2),
            (ExtraKind::LegBye, 1),
            (ExtraKind::NoBall, 1),
            (ExtraKind::Penalty, 5),
        ] {
            let b = ball(&inn, 0, Some(kind), runs);
            apply_ball(&mut inn, &b).unwrap();
        }
        let e = inn.totals.extras;
        assert_eq!((e.byes, e.leg_byes, e.no_balls, e.penalties), (2, 1, 1, 5));
        assert_eq!(e.total, 9);
        assert_eq!(inn.totals.runs, 9);
        assert_eq!(inn.totals.legal_balls, 3);
    }

    #[test]
    fn test_out_of_sequence_rejected() {
        let mut inn = innings();
        let mut b = ball(&inn, 1, None, 0);
        b.ball = 2;
        assert!(matches!(apply_ball(&mut inn, &b), Err(ScoringError::InvalidBallInput { .. })));
        assert_eq!(inn.totals, InningsTotals::default());
    }

    #[test]
    fn test_closed_innings_rejects() {
        let mut inn = innings();
        inn.completed = true;
        let b = ball(&inn, 1, None, 0);
        assert!(matches!(apply_ball(&mut inn, &b), Err(ScoringError::InningsClosed { innings_id: 1 })));
    }

    #[test]
    fn test_revert_is_inverse() {
        let mut inn = innings();
        let first = ball(&inn, 2, None, 0);
        apply_ball(&mut inn, &first).unwrap();
        let before = inn.clone();

        let mut wicket = ball(&inn, 0, Some(ExtraKind::LegBye), 1);
        wicket.wicket = Some(Dismissal {
            kind: DismissalKind::RunOut,
            player_id: "b".into(),
            fielder_id: None,
        });
        apply_ball(&mut inn, &wicket).unwrap();
        assert_eq!(inn.totals.wickets, 1);

        revert_ball(&mut inn, &wicket).unwrap();
        assert_eq!(inn, before);
    }

    #[test]
    fn test_revert_underflow_is_error() {
        let mut inn = innings();
        let b = ball(&inn, 3, None, 0);
        assert!(revert_ball(&mut inn, &b).is_err());
    }
}
