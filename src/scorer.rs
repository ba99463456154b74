//! Public entry points. Every write is one IMMEDIATE transaction: read the
//! innings, run the pure engine, write totals, ledger rows, the ball and the
//! live snapshot, commit. Snapshots are published to the feed after commit.

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::{Config, ScoringRules};
use crate::engine::events::{BallInput, BallRecord, MatchId, PlayerId};
use crate::engine::ledger::{self, LedgerRows};
use crate::engine::live;
use crate::engine::normalize::{normalize, Roster};
use crate::engine::reducer;
use crate::engine::state::{
    BattingPerformance, BowlingPerformance, Innings, LiveMatchState, Match, MatchFormat, MatchPhase,
    MatchStatus,
};
use crate::error::{Outcome, ScoringError};
use crate::feed::{FeedLimits, LiveFeed, LiveStateSubscription};
use crate::logging::{
    log, log_audit, log_ball_accepted, log_ball_rejected, log_innings_transition, log_undo, obj,
    ts_now, v_str, Domain, Level, ProfileScope,
};
use crate::storage::{self, ScoreStore};

/// What a collaborator gets back for a submitted delivery.
pub type SubmitOutcome = Outcome<BallRecord>;

/// Request to create a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMatch {
    pub id: MatchId,
    pub home_team: String,
    pub away_team: String,
    /// `None` for a match without an overs limit.
    #[serde(default)]
    pub overs_limit: Option<u32>,
}

pub struct Scorer {
    store: Mutex<ScoreStore>,
    feed: LiveFeed,
    rules: ScoringRules,
}

impl Scorer {
    pub fn open(config: &Config) -> Result<Self, ScoringError> {
        let store = ScoreStore::new(&config.sqlite_path)?;
        let limits = FeedLimits {
            history: config.feed_history,
            max_subscribers_per_match: config.max_subscribers_per_match,
        };
        Self::with_store(store, config.rules, limits)
    }

    pub fn with_store(mut store: ScoreStore, rules: ScoringRules, limits: FeedLimits) -> Result<Self, ScoringError> {
        store.init()?;
        Ok(Self {
            store: Mutex::new(store),
            feed: LiveFeed::new(limits),
            rules,
        })
    }

    pub fn rules(&self) -> ScoringRules {
        self.rules
    }

    fn lock(&self) -> Result<MutexGuard<'_, ScoreStore>, ScoringError> {
        self.store.lock().map_err(|_| ScoringError::LockPoisoned)
    }

    // -------------------------------------------------------------------------
    // Match and squad seams
    // -------------------------------------------------------------------------

    pub fn create_match(&self, new: NewMatch) -> Result<Match, ScoringError> {
        if new.home_team == new.away_team {
            return Err(ScoringError::transition("a match needs two different teams"));
        }
        if new.overs_limit == Some(0) {
            return Err(ScoringError::transition("overs limit must be at least 1"));
        }
        let m = Match {
            id: new.id,
            home_team: new.home_team,
            away_team: new.away_team,
            format: MatchFormat::from_overs_limit(new.overs_limit),
            status: MatchStatus::Upcoming,
        };

        let mut store = self.lock()?;
        let tx = store.transaction()?;
        if storage::get_match(&tx, &m.id)?.is_some() {
            return Err(ScoringError::transition(format!("match {} already exists", m.id)));
        }
        storage::insert_match(&tx, &m)?;
        storage::upsert_live(&tx, &LiveMatchState::new(&m.id))?;
        tx.commit()?;

        log(
            Level::Info,
            Domain::Live,
            "match_created",
            obj(&[
                ("match_id", v_str(&m.id)),
                ("home", v_str(&m.home_team)),
                ("away", v_str(&m.away_team)),
                ("overs_limit", json!(m.format.overs_limit())),
            ]),
        );
        Ok(m)
    }

    /// Add players to a team's squad. Returns the squad size afterwards.
    pub fn register_squad(&self, team_id: &str, players: &[PlayerId]) -> Result<usize, ScoringError> {
        let mut store = self.lock()?;
        let tx = store.transaction()?;
        storage::add_squad_members(&tx, team_id, players)?;
        let size = storage::squad(&tx, team_id)?.len();
        tx.commit()?;
        Ok(size)
    }

    pub fn abandon_match(&self, match_id: &str) -> Result<LiveMatchState, ScoringError> {
        let snapshot = {
            let mut store = self.lock()?;
            let tx = store.transaction()?;
            let m = require_match(&tx, match_id)?;
            if m.status.is_finished() {
                return Err(ScoringError::transition(format!(
                    "match {} is already {}",
                    match_id,
                    m.status.as_str()
                )));
            }
            storage::set_match_status(&tx, match_id, MatchStatus::Abandoned)?;
            let prev = storage::get_live(&tx, match_id)?.unwrap_or_else(|| LiveMatchState::new(match_id));
            let snapshot = LiveMatchState {
                phase: MatchPhase::Completed,
                last_event: "Match abandoned".to_string(),
                revision: prev.revision + 1,
                updated_at: ts_now(),
                ..prev
            };
            storage::upsert_live(&tx, &snapshot)?;
            tx.commit()?;
            snapshot
        };
        self.publish(snapshot.clone());
        self.close_topic(match_id);
        Ok(snapshot)
    }

    // -------------------------------------------------------------------------
    // Innings lifecycle
    // -------------------------------------------------------------------------

    pub fn open_innings(
        &self,
        match_id: &str,
        number: u32,
        batting_team: &str,
        bowling_team: &str,
        openers: [PlayerId; 2],
    ) -> Result<Innings, ScoringError> {
        let (innings, snapshot, from) = {
            let mut store = self.lock()?;
            let tx = store.transaction()?;
            let m = require_match(&tx, match_id)?;
            if m.status.is_finished() {
                return Err(ScoringError::transition(format!(
                    "match {} is {}",
                    match_id,
                    m.status.as_str()
                )));
            }
            if batting_team == bowling_team || !m.involves(batting_team) || !m.involves(bowling_team) {
                return Err(ScoringError::transition(format!(
                    "{} v {} is not a pairing in match {}",
                    batting_team, bowling_team, match_id
                )));
            }

            let existing = storage::innings_for_match(&tx, match_id)?;
            if let Some(open) = existing.iter().find(|i| !i.completed) {
                return Err(ScoringError::transition(format!("innings {} is still open", open.number)));
            }
            if number as usize != existing.len() + 1 {
                return Err(ScoringError::transition(format!(
                    "next innings is number {}, not {}",
                    existing.len() + 1,
                    number
                )));
            }

            if openers[0] == openers[1] {
                return Err(ScoringError::invalid("openers must be two different players"));
            }
            let squad = storage::squad(&tx, batting_team)?;
            if let Some(stranger) = openers.iter().find(|p| !squad.contains(*p)) {
                return Err(ScoringError::UnknownPlayer {
                    player_id: stranger.clone(),
                    role: "opener",
                });
            }

            let prev = storage::get_live(&tx, match_id)?.unwrap_or_else(|| LiveMatchState::new(match_id));
            let innings = storage::insert_innings(&tx, match_id, number, batting_team, bowling_team)?;
            let snapshot = live::opened(&prev, &innings, &openers, &ts_now())?;
            storage::set_match_status(&tx, match_id, MatchStatus::Live)?;
            storage::upsert_live(&tx, &snapshot)?;
            tx.commit()?;
            (innings, snapshot, prev.phase)
        };

        log_innings_transition(match_id, innings.id, from, snapshot.phase);
        self.publish(snapshot);
        Ok(innings)
    }

    /// Mark an innings complete. `ends_match` also completes the match and
    /// closes its feed topic.
    pub fn close_innings(&self, innings_id: i64, ends_match: bool) -> Result<Innings, ScoringError> {
        let (innings, snapshot, from) = {
            let mut store = self.lock()?;
            let tx = store.transaction()?;
            let mut innings = require_open_innings(&tx, innings_id)?;
            require_live_match(&tx, &innings.match_id)?;
            let prev = storage::get_live(&tx, &innings.match_id)?
                .unwrap_or_else(|| LiveMatchState::new(&innings.match_id));
            if prev.innings_id != Some(innings_id) {
                return Err(ScoringError::transition(format!(
                    "innings {} is not the open innings of match {}",
                    innings_id, innings.match_id
                )));
            }

            let read_revision = innings.revision;
            innings.completed = true;
            innings.revision = storage::update_innings(&tx, &innings, read_revision)?;
            let snapshot = live::closed(&prev, &innings, ends_match, &ts_now())?;
            if ends_match {
                storage::set_match_status(&tx, &innings.match_id, MatchStatus::Completed)?;
            }
            storage::upsert_live(&tx, &snapshot)?;
            tx.commit()?;
            (innings, snapshot, prev.phase)
        };

        log_innings_transition(&innings.match_id, innings.id, from, snapshot.phase);
        self.publish(snapshot);
        if ends_match {
            self.close_topic(&innings.match_id);
        }
        Ok(innings)
    }

    /// End a match during an innings break, after its last innings was closed
    /// without `ends_match`.
    pub fn complete_match(&self, match_id: &str) -> Result<LiveMatchState, ScoringError> {
        let (snapshot, innings_id) = {
            let mut store = self.lock()?;
            let tx = store.transaction()?;
            require_live_match(&tx, match_id)?;
            let prev = storage::get_live(&tx, match_id)?.unwrap_or_else(|| LiveMatchState::new(match_id));
            if prev.phase != MatchPhase::InningsBreak {
                return Err(ScoringError::transition(format!(
                    "match {} is in phase {}, not between innings",
                    match_id,
                    prev.phase.as_str()
                )));
            }
            let snapshot = live::completed(&prev, &ts_now())?;
            storage::set_match_status(&tx, match_id, MatchStatus::Completed)?;
            storage::upsert_live(&tx, &snapshot)?;
            tx.commit()?;
            (snapshot, prev.innings_id.unwrap_or_default())
        };

        log_innings_transition(match_id, innings_id, MatchPhase::InningsBreak, snapshot.phase);
        self.publish(snapshot.clone());
        self.close_topic(match_id);
        Ok(snapshot)
    }

    // -------------------------------------------------------------------------
    // Deliveries
    // -------------------------------------------------------------------------

    /// Validate and record one delivery. On any error nothing is persisted.
    pub fn submit_ball(&self, input: &BallInput) -> Result<BallRecord, ScoringError> {
        let _profile = ProfileScope::with_context("submit_ball", &[("innings_id", json!(input.innings_id))]);
        match self.try_submit(input) {
            Ok((record, innings, snapshot)) => {
                log_ball_accepted(&innings.match_id, &innings, &record.event, record.id);
                self.publish(snapshot);
                Ok(record)
            }
            Err(err) => {
                log_ball_rejected(input.innings_id, err.kind().as_str(), &err.to_string());
                Err(err)
            }
        }
    }

    /// [`submit_ball`](Self::submit_ball) wrapped in the `{ ok, ... }` envelope.
    pub fn submit(&self, input: &BallInput) -> SubmitOutcome {
        self.submit_ball(input).into()
    }

    fn try_submit(&self, input: &BallInput) -> Result<(BallRecord, Innings, LiveMatchState), ScoringError> {
        let mut store = self.lock()?;
        let tx = store.transaction()?;

        let mut innings = require_open_innings(&tx, input.innings_id)?;
        let read_revision = innings.revision;
        if let Some(expected) = input.expected_revision {
            if expected != read_revision {
                return Err(ScoringError::ConcurrentModification {
                    innings_id: innings.id,
                    expected,
                    found: read_revision,
                });
            }
        }
        require_live_match(&tx, &innings.match_id)?;

        let roster = Roster::new(
            storage::squad(&tx, &innings.batting_team)?,
            storage::squad(&tx, &innings.bowling_team)?,
        );
        let ball = normalize(input, &roster)?;

        let prev = storage::get_live(&tx, &innings.match_id)?
            .unwrap_or_else(|| LiveMatchState::new(&innings.match_id));
        let dismissed = storage::dismissed_players(&tx, innings.id)?;
        live::check_crease(&prev, &ball, &dismissed)?;

        reducer::apply_ball(&mut innings, &ball)?;
        let rows = load_ledger_rows(&tx, ball.innings_id, &ball.striker_id, &ball.non_striker_id, &ball.bowler_id)?;
        let (writes, created) = ledger::apply(&ball, &self.rules, rows)?;

        innings.revision = storage::update_innings(&tx, &innings, read_revision)?;
        let snapshot = live::after_ball(&prev, &innings, &ball, &ts_now())?;
        storage::apply_ledger_writes(&tx, &ball, &writes)?;
        log(
            Level::Debug,
            Domain::Ledger,
            "rows_written",
            obj(&[
                ("innings_id", json!(innings.id)),
                ("striker", v_str(&ball.striker_id)),
                ("bowler", v_str(&ball.bowler_id)),
                ("created", json!(created)),
            ]),
        );
        let faced = ledger::balls_faced(&ball, &self.rules);
        let record = storage::insert_ball(&tx, &ball, created, faced, &prev, &snapshot.updated_at)?;
        storage::upsert_live(&tx, &snapshot)?;
        tx.commit()?;

        Ok((record, innings, snapshot))
    }

    /// Reverse the most recent delivery still in effect. Returns the delivery
    /// that was taken back.
    pub fn undo_last_ball(&self, innings_id: i64) -> Result<BallRecord, ScoringError> {
        let (undone, undo_id, innings, snapshot) = {
            let mut store = self.lock()?;
            let tx = store.transaction()?;

            let mut innings = require_open_innings(&tx, innings_id)?;
            require_live_match(&tx, &innings.match_id)?;
            let read_revision = innings.revision;
            let stored = storage::last_active_ball(&tx, innings_id)?
                .ok_or(ScoringError::NothingToUndo { innings_id })?;
            let ball = &stored.record.event;

            reducer::revert_ball(&mut innings, ball)?;
            let rows = load_ledger_rows(&tx, ball.innings_id, &ball.striker_id, &ball.non_striker_id, &ball.bowler_id)?;
            let writes = ledger::revert(ball, stored.balls_faced, stored.created, rows)?;

            let current = storage::get_live(&tx, &innings.match_id)?
                .unwrap_or_else(|| LiveMatchState::new(&innings.match_id));
            let prior = stored.prior_live.as_ref().ok_or_else(|| {
                ScoringError::transition(format!("ball {} has no prior live state", stored.record.id))
            })?;
            let snapshot = live::restored(prior, &current, &ts_now());

            innings.revision = storage::update_innings(&tx, &innings, read_revision)?;
            storage::apply_ledger_writes(&tx, ball, &writes)?;
            let undo = storage::insert_undo(&tx, &stored.record, &snapshot.updated_at)?;
            storage::upsert_live(&tx, &snapshot)?;
            tx.commit()?;
            (stored.record, undo.id, innings, snapshot)
        };

        log_undo(&innings.match_id, &innings, undone.id, undo_id);
        self.publish(snapshot);
        Ok(undone)
    }

    // -------------------------------------------------------------------------
    // Feed
    // -------------------------------------------------------------------------

    /// Follow a match's live state. A finished match yields its final
    /// snapshot once and then ends.
    pub fn subscribe_live_state(&self, match_id: &str) -> Result<LiveStateSubscription, ScoringError> {
        let (seed, finished) = {
            let store = self.lock()?;
            let m = require_match(store.conn(), match_id)?;
            (storage::get_live(store.conn(), match_id)?, m.status.is_finished())
        };
        Ok(self.feed.subscribe(match_id, seed, finished)?)
    }

    pub fn feed(&self) -> &LiveFeed {
        &self.feed
    }

    fn publish(&self, snapshot: LiveMatchState) {
        let match_id = snapshot.match_id.clone();
        let revision = snapshot.revision;
        let fingerprint = snapshot.fingerprint();
        match self.feed.publish(snapshot) {
            Ok(_) => log_audit("live_published", &match_id, &fingerprint, revision),
            Err(err) => log(
                Level::Warn,
                Domain::Feed,
                "publish_failed",
                obj(&[("match_id", v_str(&match_id)), ("msg", v_str(&err.to_string()))]),
            ),
        }
    }

    fn close_topic(&self, match_id: &str) {
        if let Err(err) = self.feed.close(match_id) {
            log(
                Level::Warn,
                Domain::Feed,
                "close_failed",
                obj(&[("match_id", v_str(match_id)), ("msg", v_str(&err.to_string()))]),
            );
        }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub fn get_match(&self, match_id: &str) -> Result<Match, ScoringError> {
        let store = self.lock()?;
        require_match(store.conn(), match_id)
    }

    pub fn innings(&self, innings_id: i64) -> Result<Innings, ScoringError> {
        let store = self.lock()?;
        storage::get_innings(store.conn(), innings_id)?.ok_or(ScoringError::InningsNotFound { innings_id })
    }

    pub fn innings_for_match(&self, match_id: &str) -> Result<Vec<Innings>, ScoringError> {
        let store = self.lock()?;
        require_match(store.conn(), match_id)?;
        storage::innings_for_match(store.conn(), match_id)
    }

    pub fn batting_card(&self, innings_id: i64) -> Result<Vec<BattingPerformance>, ScoringError> {
        let store = self.lock()?;
        storage::batting_card(store.conn(), innings_id)
    }

    pub fn bowling_card(&self, innings_id: i64) -> Result<Vec<BowlingPerformance>, ScoringError> {
        let store = self.lock()?;
        storage::bowling_card(store.conn(), innings_id)
    }

    pub fn batting(&self, innings_id: i64, player_id: &str) -> Result<Option<BattingPerformance>, ScoringError> {
        let store = self.lock()?;
        storage::get_batting(store.conn(), innings_id, player_id)
    }

    pub fn bowling(&self, innings_id: i64, player_id: &str) -> Result<Option<BowlingPerformance>, ScoringError> {
        let store = self.lock()?;
        storage::get_bowling(store.conn(), innings_id, player_id)
    }

    /// Deliveries still in effect, oldest first.
    pub fn balls(&self, innings_id: i64) -> Result<Vec<BallRecord>, ScoringError> {
        let store = self.lock()?;
        storage::active_balls(store.conn(), innings_id)
    }

    pub fn live_state(&self, match_id: &str) -> Result<LiveMatchState, ScoringError> {
        let store = self.lock()?;
        storage::get_live(store.conn(), match_id)?.ok_or_else(|| ScoringError::MatchNotFound {
            match_id: match_id.to_string(),
        })
    }
}

fn require_match(conn: &rusqlite::Connection, match_id: &str) -> Result<Match, ScoringError> {
    storage::get_match(conn, match_id)?.ok_or_else(|| ScoringError::MatchNotFound {
        match_id: match_id.to_string(),
    })
}

/// Balls, undo and innings close only apply while the match is in play.
fn require_live_match(conn: &rusqlite::Connection, match_id: &str) -> Result<Match, ScoringError> {
    let m = require_match(conn, match_id)?;
    if m.status != MatchStatus::Live {
        return Err(ScoringError::transition(format!("match {} is {}", m.id, m.status.as_str())));
    }
    Ok(m)
}

fn require_open_innings(conn: &rusqlite::Connection, innings_id: i64) -> Result<Innings, ScoringError> {
    let innings = storage::get_innings(conn, innings_id)?.ok_or(ScoringError::InningsNotFound { innings_id })?;
    if innings.completed {
        return Err(ScoringError::InningsClosed { innings_id });
    }
    Ok(innings)
}

fn load_ledger_rows(
    conn: &rusqlite::Connection,
    innings_id: i64,
    striker_id: &str,
    non_striker_id: &str,
    bowler_id: &str,
) -> Result<LedgerRows, ScoringError> {
    Ok(LedgerRows {
        striker: storage::get_batting(conn, innings_id, striker_id)?,
        non_striker: storage::get_batting(conn, innings_id, non_striker_id)?,
        bowler: storage::get_bowling(conn, innings_id, bowler_id)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::{DismissalKind, ExtraKind};
    use crate::engine::state::InningsTotals;
    use crate::error::ErrorKind;

    fn scorer() -> (Scorer, Innings) {
        let scorer = Scorer::open(&Config::in_memory()).unwrap();
        scorer
            .create_match(NewMatch {
                id: "m1".into(),
                home_team: "lions".into(),
                away_team: "tigers".into(),
                overs_limit: Some(20),
            })
            .unwrap();
        let lions: Vec<PlayerId> = ["l1", "l2", "l3", "l4"].iter().map(|s| s.to_string()).collect();
        let tigers: Vec<PlayerId> = ["t1", "t2", "t3"].iter().map(|s| s.to_string()).collect();
        scorer.register_squad("lions", &lions).unwrap();
        scorer.register_squad("tigers", &tigers).unwrap();
        let innings = scorer
            .open_innings("m1", 1, "lions", "tigers", ["l1".into(), "l2".into()])
            .unwrap();
        (scorer, innings)
    }

    fn dot(innings_id: i64, over: u32, ball: u32) -> BallInput {
        BallInput::dot(innings_id, over, ball, "l1", "l2", "t1")
    }

    #[test]
    fn test_open_innings_goes_live() {
        let (scorer, innings) = scorer();
        assert_eq!(scorer.get_match("m1").unwrap().status, MatchStatus::Live);
        let live = scorer.live_state("m1").unwrap();
        assert_eq!(live.phase, MatchPhase::InningsOpen);
        assert_eq!(live.innings_id, Some(innings.id));
        assert_eq!(live.striker_id.as_deref(), Some("l1"));
    }

    #[test]
    fn test_second_innings_needs_first_closed() {
        let (scorer, _) = scorer();
        let err = scorer
            .open_innings("m1", 2, "tigers", "lions", ["t1".into(), "t2".into()])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[test]
    fn test_opener_outside_squad() {
        let scorer = Scorer::open(&Config::in_memory()).unwrap();
        scorer
            .create_match(NewMatch {
                id: "m2".into(),
                home_team: "a".into(),
                away_team: "b".into(),
                overs_limit: None,
            })
            .unwrap();
        scorer.register_squad("a", &["a1".to_string()]).unwrap();
        let err = scorer
            .open_innings("m2", 1, "a", "b", ["a1".into(), "zz".into()])
            .unwrap_err();
        assert!(matches!(err, ScoringError::UnknownPlayer { role: "opener", .. }));
    }

    #[test]
    fn test_submit_rotates_strike() {
        let (scorer, innings) = scorer();
        let record = scorer.submit_ball(&dot(innings.id, 0, 1).runs(1)).unwrap();
        assert_eq!(record.seq, 1);
        let live = scorer.live_state("m1").unwrap();
        assert_eq!(live.striker_id.as_deref(), Some("l2"));
        assert_eq!(live.runs, 1);
        assert_eq!(live.last_event, "1 run");

        // Batsmen have crossed, so the next delivery names them the other way.
        let next = BallInput::dot(innings.id, 0, 2, "l2", "l1", "t1");
        scorer.submit_ball(&next).unwrap();
        assert_eq!(scorer.innings(innings.id).unwrap().totals.legal_balls, 2);
    }

    #[test]
    fn test_rejection_leaves_rows_untouched() {
        let (scorer, innings) = scorer();
        scorer.submit_ball(&dot(innings.id, 0, 1).runs(4)).unwrap();
        let before = scorer.innings(innings.id).unwrap();
        let live_before = scorer.live_state("m1").unwrap();

        let err = scorer.submit_ball(&dot(innings.id, 0, 2).runs(7)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidBallInput);
        let err = scorer
            .submit_ball(&BallInput::dot(innings.id, 0, 2, "l1", "l2", "l3"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownPlayer);

        assert_eq!(scorer.innings(innings.id).unwrap(), before);
        assert_eq!(scorer.live_state("m1").unwrap(), live_before);
        assert_eq!(scorer.balls(innings.id).unwrap().len(), 1);
    }

    #[test]
    fn test_new_batsman_fills_vacancy() {
        let (scorer, innings) = scorer();
        scorer
            .submit_ball(&dot(innings.id, 0, 1).wicket(DismissalKind::Bowled, "l1"))
            .unwrap();
        assert!(scorer.live_state("m1").unwrap().striker_id.is_none());

        let err = scorer.submit_ball(&dot(innings.id, 0, 2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidBallInput);

        scorer
            .submit_ball(&BallInput::dot(innings.id, 0, 2, "l3", "l2", "t1"))
            .unwrap();
        assert_eq!(scorer.live_state("m1").unwrap().striker_id.as_deref(), Some("l3"));
    }

    #[test]
    fn test_undo_walks_back_to_start() {
        let (scorer, innings) = scorer();
        scorer.submit_ball(&dot(innings.id, 0, 1)).unwrap();
        scorer
            .submit_ball(&dot(innings.id, 0, 2).extra(ExtraKind::Wide, 1))
            .unwrap();
        scorer.undo_last_ball(innings.id).unwrap();
        scorer.undo_last_ball(innings.id).unwrap();
        let err = scorer.undo_last_ball(innings.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NothingToUndo);
        assert!(scorer.batting_card(innings.id).unwrap().is_empty());
        assert!(scorer.bowling_card(innings.id).unwrap().is_empty());
        assert_eq!(scorer.innings(innings.id).unwrap().totals, InningsTotals::default());
    }

    #[test]
    fn test_closed_innings_rejects_balls_and_undo() {
        let (scorer, innings) = scorer();
        scorer.submit_ball(&dot(innings.id, 0, 1)).unwrap();
        scorer.close_innings(innings.id, false).unwrap();
        assert_eq!(scorer.live_state("m1").unwrap().phase, MatchPhase::InningsBreak);

        let err = scorer.submit_ball(&dot(innings.id, 0, 2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InningsClosed);
        let err = scorer.undo_last_ball(innings.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InningsClosed);
    }

    #[test]
    fn test_abandoned_match_refuses_innings() {
        let (scorer, innings) = scorer();
        scorer.abandon_match("m1").unwrap();
        assert_eq!(scorer.get_match("m1").unwrap().status, MatchStatus::Abandoned);
        let err = scorer.submit_ball(&dot(innings.id, 0, 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert!(scorer.abandon_match("m1").is_err());
    }

    #[test]
    fn test_abandoned_match_refuses_undo_and_close() {
        let (scorer, innings) = scorer();
        scorer.submit_ball(&dot(innings.id, 0, 1).runs(2)).unwrap();
        let abandoned = scorer.abandon_match("m1").unwrap();

        let err = scorer.undo_last_ball(innings.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        let err = scorer.close_innings(innings.id, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);

        assert_eq!(scorer.balls(innings.id).unwrap().len(), 1);
        assert_eq!(scorer.innings(innings.id).unwrap().totals.runs, 2);
        assert_eq!(scorer.get_match("m1").unwrap().status, MatchStatus::Abandoned);
        let live = scorer.live_state("m1").unwrap();
        assert_eq!(live.phase, MatchPhase::Completed);
        assert_eq!(live.revision, abandoned.revision);
        assert!(scorer.feed().recent("m1").unwrap().is_empty());
    }

    #[test]
    fn test_complete_match_between_innings() {
        let (scorer, innings) = scorer();
        let err = scorer.complete_match("m1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);

        scorer.close_innings(innings.id, false).unwrap();
        let done = scorer.complete_match("m1").unwrap();
        assert_eq!(done.phase, MatchPhase::Completed);
        assert_eq!(done.last_event, "Match complete");
        assert_eq!(scorer.get_match("m1").unwrap().status, MatchStatus::Completed);
        assert!(scorer.feed().recent("m1").unwrap().is_empty());

        assert_eq!(scorer.complete_match("m1").unwrap_err().kind(), ErrorKind::InvalidTransition);
        let err = scorer
            .open_innings("m1", 2, "tigers", "lions", ["t1".into(), "t2".into()])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(scorer.complete_match("nope").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_submit_envelope() {
        let (scorer, innings) = scorer();
        let json = serde_json::to_value(scorer.submit(&dot(innings.id, 0, 3))).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["error_kind"], "invalid_ball_input");
    }
}
