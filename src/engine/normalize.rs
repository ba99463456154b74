//! Ball normalizer: turns a scorer's raw description into a canonical
//! [`BallEvent`], or says exactly why it cannot.

use std::collections::HashSet;

use super::events::{BallEvent, BallInput, Dismissal, ExtraKind, PlayerId};
use crate::error::ScoringError;

pub const MAX_RUNS_OFF_BAT: i32 = 6;

/// Who may appear in which role for one innings.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    pub batting: HashSet<PlayerId>,
    pub bowling: HashSet<PlayerId>,
}

impl Roster {
    pub fn new<I, J>(batting: I, bowling: J) -> Self
    where
        I: IntoIterator<Item = PlayerId>,
        J: IntoIterator<Item = PlayerId>,
    {
        Self {
            batting: batting.into_iter().collect(),
            bowling: bowling.into_iter().collect(),
        }
    }

    fn require_batter(&self, id: &str, role: &'static str) -> Result<(), ScoringError> {
        if self.batting.contains(id) {
            Ok(())
        } else {
            Err(ScoringError::UnknownPlayer { player_id: id.to_string(), role })
        }
    }

    fn require_fielder(&self, id: &str, role: &'static str) -> Result<(), ScoringError> {
        if self.bowling.contains(id) {
            Ok(())
        } else {
            Err(ScoringError::UnknownPlayer { player_id: id.to_string(), role })
        }
    }
}

/// Validate `input` against `roster`. No I/O, no side effects.
pub fn normalize(input: &BallInput, roster: &Roster) -> Result<BallEvent, ScoringError> {
    if input.ball == 0 || input.ball > 6 {
        return Err(ScoringError::invalid(format!("ball index {} outside 1..=6", input.ball)));
    }
    if input.runs_off_bat < 0 || input.runs_off_bat > MAX_RUNS_OFF_BAT {
        return Err(ScoringError::invalid(format!(
            "runs off bat {} outside 0..=6",
            input.runs_off_bat
        )));
    }
    if input.extra_runs < 0 {
        return Err(ScoringError::invalid(format!("negative extra runs {}", input.extra_runs)));
    }
    let runs_off_bat = input.runs_off_bat as u32;
    let extra_runs = input.extra_runs as u32;

    check_extras(input.extra, runs_off_bat, extra_runs)?;
    check_boundaries(input, runs_off_bat, extra_runs)?;

    if input.striker_id == input.non_striker_id {
        return Err(ScoringError::invalid("striker and non-striker are the same player"));
    }
    roster.require_batter(&input.striker_id, "striker")?;
    roster.require_batter(&input.non_striker_id, "non_striker")?;
    roster.require_fielder(&input.bowler_id, "bowler")?;
    if let Some(fielder) = &input.fielder_id {
        roster.require_fielder(fielder, "fielder")?;
    }

    let wicket = build_dismissal(input)?;

    Ok(BallEvent {
        innings_id: input.innings_id,
        over: input.over,
        ball: input.ball,
        striker_id: input.striker_id.clone(),
        non_striker_id: input.non_striker_id.clone(),
        bowler_id: input.bowler_id.clone(),
        runs_off_bat,
        is_four: input.is_four,
        is_six: input.is_six,
        extra: input.extra,
        extra_runs,
        wicket,
    })
}

fn check_extras(extra: Option<ExtraKind>, runs_off_bat: u32, extra_runs: u32) -> Result<(), ScoringError> {
    match extra {
        None if extra_runs > 0 => Err(ScoringError::invalid("extra runs without an extra category")),
        None => Ok(()),
        Some(ExtraKind::Wide) if runs_off_bat > 0 => {
            Err(ScoringError::invalid("a wide cannot carry runs off the bat"))
        }
        Some(ExtraKind::Bye | ExtraKind::LegBye) if runs_off_bat > 0 => {
            Err(ScoringError::invalid("byes cannot carry runs off the bat"))
        }
        Some(kind) if extra_runs == 0 => Err(ScoringError::invalid(format!(
            "{} must carry at least one run",
            kind.as_str()
        ))),
        Some(_) => Ok(()),
    }
}

fn check_boundaries(input: &BallInput, runs_off_bat: u32, extra_runs: u32) -> Result<(), ScoringError> {
    if input.is_four && input.is_six {
        return Err(ScoringError::invalid("both four and six flagged"));
    }
    if input.is_six && runs_off_bat != 6 {
        return Err(ScoringError::invalid(format!("six flagged with {} off the bat", runs_off_bat)));
    }
    if input.is_four && runs_off_bat != 4 {
        let boundary_byes = matches!(input.extra, Some(ExtraKind::Bye | ExtraKind::LegBye))
            && runs_off_bat == 0
            && extra_runs == 4;
        if !boundary_byes {
            return Err(ScoringError::invalid(format!(
                "four flagged with {} off the bat",
                runs_off_bat
            )));
        }
    }
    Ok(())
}

fn build_dismissal(input: &BallInput) -> Result<Option<Dismissal>, ScoringError> {
    if !input.is_wicket {
        if input.dismissal.is_some() || input.dismissed_id.is_some() {
            return Err(ScoringError::invalid("dismissal details without a wicket"));
        }
        return Ok(None);
    }
    let kind = input
        .dismissal
        .ok_or_else(|| ScoringError::invalid("wicket without a dismissal kind"))?;
    if !kind.allowed_on(input.extra) {
        return Err(ScoringError::invalid(format!(
            "{} is not possible off a {}",
            kind.as_str(),
            input.extra.map(|e| e.as_str()).unwrap_or("legal ball")
        )));
    }
    let player_id = input.dismissed_id.clone().unwrap_or_else(|| input.striker_id.clone());
    if player_id != input.striker_id && player_id != input.non_striker_id {
        return Err(ScoringError::invalid(format!("dismissed player {} is not at the crease", player_id)));
    }
    if player_id == input.non_striker_id && kind != super::events::DismissalKind::RunOut {
        return Err(ScoringError::invalid("only a run out can dismiss the non-striker"));
    }
    Ok(Some(Dismissal {
        kind,
        player_id,
        fielder_id: input.fielder_id.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::DismissalKind;

    fn roster() -> Roster {
        Roster::new(
            ["a1", "a2", "a3"].map(String::from),
            ["b1", "b2"].map(String::from),
        )
    }

    fn dot() -> BallInput {
        BallInput::dot(1, 0, 1, "a1", "a2", "b1")
    }

    fn assert_invalid(input: BallInput) {
        match normalize(&input, &roster()) {
            Err(ScoringError::InvalidBallInput { .. }) => {}
            other => panic!("expected InvalidBallInput, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_four() {
        let ev = normalize(&dot().runs(4), &roster()).unwrap();
        assert_eq!(ev.runs_off_bat, 4);
        assert!(ev.is_four);
        assert!(ev.is_legal_delivery());
        assert!(ev.wicket.is_none());
    }

    #[test]
    fn test_four_flag_conflicts() {
        let mut input = dot().runs(3);
        input.is_four = true;
        assert_invalid(input);

        let mut both = dot().runs(6);
        both.is_four = true;
        assert_invalid(both);
    }

    #[test]
    fn test_boundary_byes_allowed() {
        let mut input = dot().extra(ExtraKind::Bye, 4);
        input.is_four = true;
        let ev = normalize(&input, &roster()).unwrap();
        assert_eq!(ev.runs_off_bat, 0);
        assert_eq!(ev.extra_runs, 4);
    }

    #[test]
    fn test_negative_and_out_of_range_runs() {
        assert_invalid(dot().extra(ExtraKind::Wide, -1));
        let mut input = dot();
        input.runs_off_bat = 7;
        assert_invalid(input);
        let mut input = dot();
        input.ball = 7;
        assert_invalid(input);
    }

    #[test]
    fn test_extra_shape() {
        assert_invalid(dot().extra(ExtraKind::Wide, 0));
        let mut wide_with_bat = dot().extra(ExtraKind::Wide, 1);
        wide_with_bat.runs_off_bat = 1;
        assert_invalid(wide_with_bat);
        let mut stray = dot();
        stray.extra_runs = 2;
        assert_invalid(stray);
        assert!(normalize(&dot().runs(4).extra(ExtraKind::NoBall, 1), &roster()).is_ok());
    }

    #[test]
    fn test_wicket_requires_kind() {
        let mut input = dot();
        input.is_wicket = true;
        assert_invalid(input);

        let mut input = dot();
        input.dismissal = Some(DismissalKind::Bowled);
        assert_invalid(input);
    }

    #[test]
    fn test_dismissed_defaults_to_striker() {
        let mut input = dot();
        input.is_wicket = true;
        input.dismissal = Some(DismissalKind::Lbw);
        let ev = normalize(&input, &roster()).unwrap();
        assert_eq!(ev.dismissed().map(String::as_str), Some("a1"));
        assert!(ev.bowler_wicket());
    }

    #[test]
    fn test_non_striker_only_run_out() {
        assert_invalid(dot().wicket(DismissalKind::Caught, "a2"));
        let ev = normalize(&dot().wicket(DismissalKind::RunOut, "a2"), &roster()).unwrap();
        assert!(!ev.bowler_wicket());
        assert_invalid(dot().wicket(DismissalKind::RunOut, "a3"));
    }

    #[test]
    fn test_no_ball_only_run_out() {
        assert_invalid(dot().extra(ExtraKind::NoBall, 1).wicket(DismissalKind::Bowled, "a1"));
        assert!(normalize(
            &dot().extra(ExtraKind::Wide, 1).wicket(DismissalKind::Stumped, "a1"),
            &roster()
        )
        .is_ok());
    }

    #[test]
    fn test_unknown_players() {
        let mut input = dot();
        input.bowler_id = "a3".into();
        assert!(matches!(
            normalize(&input, &roster()),
            Err(ScoringError::UnknownPlayer { role: "bowler", .. })
        ));
        let mut input = dot();
        input.striker_id = "b2".into();
        assert!(matches!(
            normalize(&input, &roster()),
            Err(ScoringError::UnknownPlayer { role: "striker", .. })
        ));
        assert!(matches!(
            normalize(&dot().wicket(DismissalKind::Caught, "a1").fielder("zz"), &roster()),
            Err(ScoringError::UnknownPlayer { role: "fielder", .. })
        ));
    }

    #[test]
    fn test_same_batsman_twice() {
        let mut input = dot();
        input.non_striker_id = "a1".into();
        assert_invalid(input);
    }
}
