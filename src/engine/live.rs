//! Live state publisher: the per-match phase machine and the snapshot that
//! follows every accepted delivery.

use std::collections::HashSet;

use super::events::{BallEvent, ExtraKind, PlayerId};
use super::state::{Innings, LiveMatchState, MatchPhase};
use crate::error::ScoringError;
use crate::rates;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseSignal {
    InningsOpened,
    BallAccepted,
    InningsClosed { ends_match: bool },
}

pub fn transition(phase: MatchPhase, signal: PhaseSignal) -> Result<MatchPhase, ScoringError> {
    match (phase, signal) {
        (MatchPhase::NoInnings | MatchPhase::InningsBreak, PhaseSignal::InningsOpened) => {
            Ok(MatchPhase::InningsOpen)
        }
        (MatchPhase::InningsOpen, PhaseSignal::BallAccepted) => Ok(MatchPhase::InningsOpen),
        (MatchPhase::InningsOpen, PhaseSignal::InningsClosed { ends_match: false }) => {
            Ok(MatchPhase::InningsBreak)
        }
        (MatchPhase::InningsOpen, PhaseSignal::InningsClosed { ends_match: true }) => {
            Ok(MatchPhase::Completed)
        }
        // Declaring the match over during the break.
        (MatchPhase::InningsBreak, PhaseSignal::InningsClosed { ends_match: true }) => {
            Ok(MatchPhase::Completed)
        }
        (phase, signal) => Err(ScoringError::transition(format!(
            "{:?} not allowed in phase {}",
            signal,
            phase.as_str()
        ))),
    }
}

/// Short human-readable description. Priority: wicket > six > four > named
/// extra > plain runs.
pub fn describe(ball: &BallEvent) -> String {
    if let Some(w) = &ball.wicket {
        return format!("WICKET! {} {}", w.player_id, w.kind.as_str().replace('_', " "));
    }
    if ball.is_six {
        return "SIX!".to_string();
    }
    if ball.is_four {
        return "FOUR!".to_string();
    }
    if let Some(kind) = ball.extra {
        let name = match kind {
            ExtraKind::Wide => "Wide",
            ExtraKind::NoBall => "No ball",
            ExtraKind::Bye => "Bye",
            ExtraKind::LegBye => "Leg bye",
            ExtraKind::Penalty => "Penalty",
        };
        return if ball.runs_off_bat > 0 {
            format!("{} +{} ({} off the bat)", name, ball.extra_runs, ball.runs_off_bat)
        } else {
            format!("{} +{}", name, ball.extra_runs)
        };
    }
    match ball.runs_off_bat {
        0 => "Dot ball".to_string(),
        1 => "1 run".to_string(),
        n => format!("{} runs", n),
    }
}

/// The pair at the crease for the next delivery, striker first.
///
/// Odd runs off the bat on a legal ball swap ends; the end of an over swaps
/// them again. Wides and no-balls never swap, whatever was run off them, and
/// neither do byes or leg-byes. A scorer who saw the batsmen cross on such a
/// ball names them in their new places on the next delivery. A dismissed
/// batsman leaves an empty slot.
pub fn next_pair(ball: &BallEvent, legal_balls_after: u32) -> (Option<PlayerId>, Option<PlayerId>) {
    let mut striker = Some(ball.striker_id.clone());
    let mut non_striker = Some(ball.non_striker_id.clone());
    if ball.is_legal_delivery() {
        if ball.runs_off_bat % 2 == 1 {
            std::mem::swap(&mut striker, &mut non_striker);
        }
        if legal_balls_after % rates::BALLS_PER_OVER == 0 {
            std::mem::swap(&mut striker, &mut non_striker);
        }
    }
    if let Some(out) = ball.dismissed() {
        if striker.as_ref() == Some(out) {
            striker = None;
        }
        if non_striker.as_ref() == Some(out) {
            non_striker = None;
        }
    }
    (striker, non_striker)
}

/// The batsmen named on a delivery must be the pair at the crease, except that
/// a new batsman may fill a slot a dismissal left empty.
pub fn check_crease(
    live: &LiveMatchState,
    ball: &BallEvent,
    dismissed: &HashSet<PlayerId>,
) -> Result<(), ScoringError> {
    if live.phase != MatchPhase::InningsOpen || live.innings_id != Some(ball.innings_id) {
        return Err(ScoringError::transition(format!(
            "innings {} is not the open innings of match {}",
            ball.innings_id, live.match_id
        )));
    }
    let vacancies = live.striker_id.is_none() as usize + live.non_striker_id.is_none() as usize;
    let mut newcomers = 0;
    for player in [&ball.striker_id, &ball.non_striker_id] {
        if live.is_at_crease(player) {
            continue;
        }
        if dismissed.contains(player) {
            return Err(ScoringError::invalid(format!("{} is already out", player)));
        }
        newcomers += 1;
        if newcomers > vacancies {
            return Err(ScoringError::invalid(format!("{} is not at the crease", player)));
        }
    }
    Ok(())
}

/// Snapshot after an innings opens with its opening pair.
pub fn opened(
    prev: &LiveMatchState,
    innings: &Innings,
    openers: &[PlayerId; 2],
    now: &str,
) -> Result<LiveMatchState, ScoringError> {
    let phase = transition(prev.phase, PhaseSignal::InningsOpened)?;
    Ok(LiveMatchState {
        match_id: prev.match_id.clone(),
        phase,
        innings_id: Some(innings.id),
        innings_number: Some(innings.number),
        striker_id: Some(openers[0].clone()),
        non_striker_id: Some(openers[1].clone()),
        bowler_id: None,
        over: 0,
        ball: 0,
        runs: innings.totals.runs,
        wickets: innings.totals.wickets,
        overs: innings.totals.overs(),
        last_event: format!("Innings {} under way", innings.number),
        revision: prev.revision + 1,
        updated_at: now.to_string(),
    })
}

/// Snapshot after `ball` has been folded into `innings`.
pub fn after_ball(
    prev: &LiveMatchState,
    innings: &Innings,
    ball: &BallEvent,
    now: &str,
) -> Result<LiveMatchState, ScoringError> {
    let phase = transition(prev.phase, PhaseSignal::BallAccepted)?;
    let (striker_id, non_striker_id) = next_pair(ball, innings.totals.legal_balls);
    Ok(LiveMatchState {
        match_id: prev.match_id.clone(),
        phase,
        innings_id: Some(innings.id),
        innings_number: Some(innings.number),
        striker_id,
        non_striker_id,
        bowler_id: Some(ball.bowler_id.clone()),
        over: ball.over,
        ball: ball.ball,
        runs: innings.totals.runs,
        wickets: innings.totals.wickets,
        overs: innings.totals.overs(),
        last_event: describe(ball),
        revision: prev.revision + 1,
        updated_at: now.to_string(),
    })
}

/// Snapshot after the innings is marked complete.
pub fn closed(
    prev: &LiveMatchState,
    innings: &Innings,
    ends_match: bool,
    now: &str,
) -> Result<LiveMatchState, ScoringError> {
    let phase = transition(prev.phase, PhaseSignal::InningsClosed { ends_match })?;
    let summary = format!(
        "End of innings {}: {}/{} ({} ov)",
        innings.number,
        innings.totals.runs,
        innings.totals.wickets,
        innings.totals.overs()
    );
    Ok(LiveMatchState {
        phase,
        last_event: if ends_match { format!("{}. Match complete", summary) } else { summary },
        revision: prev.revision + 1,
        updated_at: now.to_string(),
        ..prev.clone()
    })
}

/// Snapshot when a match is called complete between innings.
pub fn completed(prev: &LiveMatchState, now: &str) -> Result<LiveMatchState, ScoringError> {
    let phase = transition(prev.phase, PhaseSignal::InningsClosed { ends_match: true })?;
    Ok(LiveMatchState {
        phase,
        last_event: "Match complete".to_string(),
        revision: prev.revision + 1,
        updated_at: now.to_string(),
        ..prev.clone()
    })
}

/// Put back the snapshot that preceded an undone delivery. The revision keeps
/// climbing so readers see the change.
pub fn restored(prior: &LiveMatchState, current: &LiveMatchState, now: &str) -> LiveMatchState {
    LiveMatchState {
        revision: current.revision + 1,
        updated_at: now.to_string(),
        ..prior.clone()
    }
}
