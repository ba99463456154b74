//! SQLite persistence. Reads and writes are free functions over a
//! `&Connection` so the scorer can run them inside one transaction.

use std::collections::HashSet;
use std::time::Duration;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql, Transaction, TransactionBehavior};

use crate::engine::events::{BallEvent, BallRecord, Dismissal, DismissalKind, ExtraKind};
use crate::engine::ledger::{LedgerWrites, RowWrite, RowsCreated};
use crate::engine::state::{
    BattingPerformance, BowlingPerformance, Extras, Innings, InningsTotals, LiveMatchState, Match,
    MatchFormat, MatchPhase, MatchStatus,
};
use crate::error::ScoringError;
use crate::logging::{log, obj, v_str, Domain, Level};

pub struct ScoreStore {
    conn: Connection,
    path: String,
}

impl ScoreStore {
    pub fn new(path: &str) -> Result<Self, ScoringError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self {
            conn,
            path: path.to_string(),
        })
    }

    pub fn in_memory() -> Result<Self, ScoringError> {
        Self::new(":memory:")
    }

    pub fn init(&mut self) -> Result<(), ScoringError> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS matches (
                id TEXT PRIMARY KEY,
                home_team TEXT NOT NULL,
                away_team TEXT NOT NULL,
                overs_limit INTEGER,
                status TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS squads (
                team_id TEXT NOT NULL,
                player_id TEXT NOT NULL,
                PRIMARY KEY (team_id, player_id)
            );
            CREATE TABLE IF NOT EXISTS innings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                match_id TEXT NOT NULL REFERENCES matches(id),
                number INTEGER NOT NULL,
                batting_team TEXT NOT NULL,
                bowling_team TEXT NOT NULL,
                runs INTEGER NOT NULL DEFAULT 0,
                wickets INTEGER NOT NULL DEFAULT 0,
                legal_balls INTEGER NOT NULL DEFAULT 0,
                extras_total INTEGER NOT NULL DEFAULT 0,
                byes INTEGER NOT NULL DEFAULT 0,
                leg_byes INTEGER NOT NULL DEFAULT 0,
                wides INTEGER NOT NULL DEFAULT 0,
                no_balls INTEGER NOT NULL DEFAULT 0,
                penalties INTEGER NOT NULL DEFAULT 0,
                completed INTEGER NOT NULL DEFAULT 0,
                revision INTEGER NOT NULL DEFAULT 0,
                UNIQUE (match_id, number)
            );
            CREATE TABLE IF NOT EXISTS balls (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                innings_id INTEGER NOT NULL REFERENCES innings(id),
                seq INTEGER NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('delivery', 'undo')),
                supersedes INTEGER REFERENCES balls(id),
                over_index INTEGER NOT NULL,
                ball_in_over INTEGER NOT NULL,
                striker_id TEXT NOT NULL,
                non_striker_id TEXT NOT NULL,
                bowler_id TEXT NOT NULL,
                runs_off_bat INTEGER NOT NULL,
                is_four INTEGER NOT NULL,
                is_six INTEGER NOT NULL,
                extra_kind TEXT,
                extra_runs INTEGER NOT NULL,
                legal INTEGER NOT NULL,
                dismissal_kind TEXT,
                dismissed_id TEXT,
                fielder_id TEXT,
                created_striker_row INTEGER NOT NULL DEFAULT 0,
                created_non_striker_row INTEGER NOT NULL DEFAULT 0,
                created_bowler_row INTEGER NOT NULL DEFAULT 0,
                striker_balls_faced INTEGER NOT NULL DEFAULT 0,
                prior_live TEXT,
                recorded_at TEXT NOT NULL,
                UNIQUE (innings_id, seq)
            );
            CREATE TABLE IF NOT EXISTS batting_performance (
                innings_id INTEGER NOT NULL REFERENCES innings(id),
                player_id TEXT NOT NULL,
                runs INTEGER NOT NULL,
                balls_faced INTEGER NOT NULL,
                fours INTEGER NOT NULL,
                sixes INTEGER NOT NULL,
                is_out INTEGER NOT NULL,
                dismissal_kind TEXT,
                PRIMARY KEY (innings_id, player_id)
            );
            CREATE TABLE IF NOT EXISTS bowling_performance (
                innings_id INTEGER NOT NULL REFERENCES innings(id),
                player_id TEXT NOT NULL,
                legal_balls INTEGER NOT NULL,
                runs_conceded INTEGER NOT NULL,
                wickets INTEGER NOT NULL,
                wides INTEGER NOT NULL,
                no_balls INTEGER NOT NULL,
                PRIMARY KEY (innings_id, player_id)
            );
            CREATE TABLE IF NOT EXISTS live_match_state (
                match_id TEXT PRIMARY KEY REFERENCES matches(id),
                phase TEXT NOT NULL,
                innings_id INTEGER,
                innings_number INTEGER,
                striker_id TEXT,
                non_striker_id TEXT,
                bowler_id TEXT,
                over_index INTEGER NOT NULL,
                ball_in_over INTEGER NOT NULL,
                runs INTEGER NOT NULL,
                wickets INTEGER NOT NULL,
                overs TEXT NOT NULL,
                last_event TEXT NOT NULL,
                revision INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );
            COMMIT;",
        )?;
        log(
            Level::Debug,
            Domain::Storage,
            "schema_ready",
            obj(&[("path", v_str(&self.path))]),
        );
        Ok(())
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Write transaction that takes the database write lock up front, so two
    /// writers cannot both read the same innings revision and commit.
    pub fn transaction(&mut self) -> Result<Transaction<'_>, ScoringError> {
        Ok(self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}

// =============================================================================
// Column codecs
// =============================================================================

macro_rules! text_column {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let s = value.as_str()?;
                <$ty>::parse(s).ok_or_else(|| {
                    FromSqlError::Other(format!("unknown {} '{}'", stringify!($ty), s).into())
                })
            }
        }
    };
}

text_column!(ExtraKind);
text_column!(DismissalKind);
text_column!(MatchStatus);
text_column!(MatchPhase);

// =============================================================================
// Matches and squads
// =============================================================================

pub fn insert_match(conn: &Connection, m: &Match) -> Result<(), ScoringError> {
    conn.execute(
        "INSERT INTO matches (id, home_team, away_team, overs_limit, status) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![m.id, m.home_team, m.away_team, m.format.overs_limit(), m.status],
    )?;
    Ok(())
}

pub fn get_match(conn: &Connection, match_id: &str) -> Result<Option<Match>, ScoringError> {
    Ok(conn
        .query_row(
            "SELECT id, home_team, away_team, overs_limit, status FROM matches WHERE id = ?1",
            params![match_id],
            |row| {
                Ok(Match {
                    id: row.get(0)?,
                    home_team: row.get(1)?,
                    away_team: row.get(2)?,
                    format: MatchFormat::from_overs_limit(row.get(3)?),
                    status: row.get(4)?,
                })
            },
        )
        .optional()?)
}

pub fn set_match_status(conn: &Connection, match_id: &str, status: MatchStatus) -> Result<(), ScoringError> {
    conn.execute("UPDATE matches SET status = ?2 WHERE id = ?1", params![match_id, status])?;
    Ok(())
}

pub fn add_squad_members(conn: &Connection, team_id: &str, players: &[String]) -> Result<(), ScoringError> {
    let mut stmt = conn.prepare("INSERT OR IGNORE INTO squads (team_id, player_id) VALUES (?1, ?2)")?;
    for player in players {
        stmt.execute(params![team_id, player])?;
    }
    Ok(())
}

pub fn squad(conn: &Connection, team_id: &str) -> Result<HashSet<String>, ScoringError> {
    let mut stmt = conn.prepare("SELECT player_id FROM squads WHERE team_id = ?1")?;
    let rows = stmt.query_map(params![team_id], |row| row.get::<_, String>(0))?;
    Ok(rows.collect::<Result<HashSet<_>, _>>()?)
}

// =============================================================================
// Innings
// =============================================================================

const INNINGS_COLUMNS: &str = "id, match_id, number, batting_team, bowling_team, runs, wickets, \
    legal_balls, extras_total, byes, leg_byes, wides, no_balls, penalties, completed, revision";

fn map_innings(row: &Row<'_>) -> rusqlite::Result<Innings> {
    Ok(Innings {
        id: row.get(0)?,
        match_id: row.get(1)?,
        number: row.get(2)?,
        batting_team: row.get(3)?,
        bowling_team: row.get(4)?,
        totals: InningsTotals {
            runs: row.get(5)?,
            wickets: row.get(6)?,
            legal_balls: row.get(7)?,
            extras: Extras {
                total: row.get(8)?,
                byes: row.get(9)?,
                leg_byes: row.get(10)?,
                wides: row.get(11)?,
                no_balls: row.get(12)?,
                penalties: row.get(13)?,
            },
        },
        completed: row.get(14)?,
        revision: row.get::<_, i64>(15)? as u64,
    })
}

pub fn insert_innings(
    conn: &Connection,
    match_id: &str,
    number: u32,
    batting_team: &str,
    bowling_team: &str,
) -> Result<Innings, ScoringError> {
    conn.execute(
        "INSERT INTO innings (match_id, number, batting_team, bowling_team) VALUES (?1, ?2, ?3, ?4)",
        params![match_id, number, batting_team, bowling_team],
    )?;
    let id = conn.last_insert_rowid();
    get_innings(conn, id)?.ok_or(ScoringError::InningsNotFound { innings_id: id })
}

pub fn get_innings(conn: &Connection, innings_id: i64) -> Result<Option<Innings>, ScoringError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM innings WHERE id = ?1", INNINGS_COLUMNS),
            params![innings_id],
            map_innings,
        )
        .optional()?)
}

pub fn innings_for_match(conn: &Connection, match_id: &str) -> Result<Vec<Innings>, ScoringError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM innings WHERE match_id = ?1 ORDER BY number ASC",
        INNINGS_COLUMNS
    ))?;
    let rows = stmt.query_map(params![match_id], map_innings)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Write new totals if nobody else has since `expected_revision`. Returns the
/// new revision.
pub fn update_innings(conn: &Connection, innings: &Innings, expected_revision: u64) -> Result<u64, ScoringError> {
    let t = &innings.totals;
    let changed = conn.execute(
        "UPDATE innings SET runs = ?3, wickets = ?4, legal_balls = ?5, extras_total = ?6,
            byes = ?7, leg_byes = ?8, wides = ?9, no_balls = ?10, penalties = ?11,
            completed = ?12, revision = revision + 1
         WHERE id = ?1 AND revision = ?2",
        params![
            innings.id,
            expected_revision as i64,
            t.runs,
            t.wickets,
            t.legal_balls,
            t.extras.total,
            t.extras.byes,
            t.extras.leg_byes,
            t.extras.wides,
            t.extras.no_balls,
            t.extras.penalties,
            innings.completed,
        ],
    )?;
    if changed == 0 {
        let found = get_innings(conn, innings.id)?
            .ok_or(ScoringError::InningsNotFound { innings_id: innings.id })?
            .revision;
        return Err(ScoringError::ConcurrentModification {
            innings_id: innings.id,
            expected: expected_revision,
            found,
        });
    }
    Ok(expected_revision + 1)
}

// =============================================================================
// Ledger rows
// =============================================================================

fn map_batting(row: &Row<'_>) -> rusqlite::Result<BattingPerformance> {
    Ok(BattingPerformance {
        innings_id: row.get(0)?,
        player_id: row.get(1)?,
        runs: row.get(2)?,
        balls_faced: row.get(3)?,
        fours: row.get(4)?,
        sixes: row.get(5)?,
        is_out: row.get(6)?,
        dismissal: row.get(7)?,
    })
}

fn map_bowling(row: &Row<'_>) -> rusqlite::Result<BowlingPerformance> {
    Ok(BowlingPerformance {
        innings_id: row.get(0)?,
        player_id: row.get(1)?,
        legal_balls: row.get(2)?,
        runs_conceded: row.get(3)?,
        wickets: row.get(4)?,
        wides: row.get(5)?,
        no_balls: row.get(6)?,
    })
}

pub fn get_batting(conn: &Connection, innings_id: i64, player_id: &str) -> Result<Option<BattingPerformance>, ScoringError> {
    Ok(conn
        .query_row(
            "SELECT innings_id, player_id, runs, balls_faced, fours, sixes, is_out, dismissal_kind
             FROM batting_performance WHERE innings_id = ?1 AND player_id = ?2",
            params![innings_id, player_id],
            map_batting,
        )
        .optional()?)
}

/// Batting lines in the order players first appeared.
pub fn batting_card(conn: &Connection, innings_id: i64) -> Result<Vec<BattingPerformance>, ScoringError> {
    let mut stmt = conn.prepare(
        "SELECT innings_id, player_id, runs, balls_faced, fours, sixes, is_out, dismissal_kind
         FROM batting_performance WHERE innings_id = ?1 ORDER BY rowid ASC",
    )?;
    let rows = stmt.query_map(params![innings_id], map_batting)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn dismissed_players(conn: &Connection, innings_id: i64) -> Result<HashSet<String>, ScoringError> {
    let mut stmt = conn.prepare("SELECT player_id FROM batting_performance WHERE innings_id = ?1 AND is_out = 1")?;
    let rows = stmt.query_map(params![innings_id], |row| row.get::<_, String>(0))?;
    Ok(rows.collect::<Result<HashSet<_>, _>>()?)
}

pub fn get_bowling(conn: &Connection, innings_id: i64, player_id: &str) -> Result<Option<BowlingPerformance>, ScoringError> {
    Ok(conn
        .query_row(
            "SELECT innings_id, player_id, legal_balls, runs_conceded, wickets, wides, no_balls
             FROM bowling_performance WHERE innings_id = ?1 AND player_id = ?2",
            params![innings_id, player_id],
            map_bowling,
        )
        .optional()?)
}

pub fn bowling_card(conn: &Connection, innings_id: i64) -> Result<Vec<BowlingPerformance>, ScoringError> {
    let mut stmt = conn.prepare(
        "SELECT innings_id, player_id, legal_balls, runs_conceded, wickets, wides, no_balls
         FROM bowling_performance WHERE innings_id = ?1 ORDER BY rowid ASC",
    )?;
    let rows = stmt.query_map(params![innings_id], map_bowling)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn upsert_batting(conn: &Connection, row: &BattingPerformance) -> Result<(), ScoringError> {
    conn.execute(
        "INSERT INTO batting_performance
            (innings_id, player_id, runs, balls_faced, fours, sixes, is_out, dismissal_kind)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT (innings_id, player_id) DO UPDATE SET
            runs = excluded.runs, balls_faced = excluded.balls_faced, fours = excluded.fours,
            sixes = excluded.sixes, is_out = excluded.is_out, dismissal_kind = excluded.dismissal_kind",
        params![
            row.innings_id,
            row.player_id,
            row.runs,
            row.balls_faced,
            row.fours,
            row.sixes,
            row.is_out,
            row.dismissal,
        ],
    )?;
    Ok(())
}

fn upsert_bowling(conn: &Connection, row: &BowlingPerformance) -> Result<(), ScoringError> {
    conn.execute(
        "INSERT INTO bowling_performance
            (innings_id, player_id, legal_balls, runs_conceded, wickets, wides, no_balls)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (innings_id, player_id) DO UPDATE SET
            legal_balls = excluded.legal_balls, runs_conceded = excluded.runs_conceded,
            wickets = excluded.wickets, wides = excluded.wides, no_balls = excluded.no_balls",
        params![
            row.innings_id,
            row.player_id,
            row.legal_balls,
            row.runs_conceded,
            row.wickets,
            row.wides,
            row.no_balls,
        ],
    )?;
    Ok(())
}

fn write_batting(conn: &Connection, innings_id: i64, player_id: &str, write: &RowWrite<BattingPerformance>) -> Result<(), ScoringError> {
    match write {
        RowWrite::Keep => Ok(()),
        RowWrite::Upsert(row) => upsert_batting(conn, row),
        RowWrite::Delete => {
            conn.execute(
                "DELETE FROM batting_performance WHERE innings_id = ?1 AND player_id = ?2",
                params![innings_id, player_id],
            )?;
            Ok(())
        }
    }
}

pub fn apply_ledger_writes(conn: &Connection, ball: &BallEvent, writes: &LedgerWrites) -> Result<(), ScoringError> {
    write_batting(conn, ball.innings_id, &ball.striker_id, &writes.striker)?;
    write_batting(conn, ball.innings_id, &ball.non_striker_id, &writes.non_striker)?;
    match &writes.bowler {
        RowWrite::Keep => {}
        RowWrite::Upsert(row) => upsert_bowling(conn, row)?,
        RowWrite::Delete => {
            conn.execute(
                "DELETE FROM bowling_performance WHERE innings_id = ?1 AND player_id = ?2",
                params![ball.innings_id, ball.bowler_id],
            )?;
        }
    }
    Ok(())
}

// =============================================================================
// Balls
// =============================================================================

/// A delivery row with what its undo needs.
#[derive(Debug, Clone)]
pub struct StoredBall {
    pub record: BallRecord,
    pub created: RowsCreated,
    /// Balls faced credited to the striker when the delivery was recorded.
    pub balls_faced: u32,
    pub prior_live: Option<LiveMatchState>,
}

const BALL_COLUMNS: &str = "id, seq, innings_id, over_index, ball_in_over, striker_id, non_striker_id, \
    bowler_id, runs_off_bat, is_four, is_six, extra_kind, extra_runs, dismissal_kind, dismissed_id, \
    fielder_id, created_striker_row, created_non_striker_row, created_bowler_row, striker_balls_faced, prior_live, recorded_at";

fn map_ball(row: &Row<'_>) -> rusqlite::Result<StoredBall> {
    let dismissal: Option<DismissalKind> = row.get(13)?;
    let dismissed_id: Option<String> = row.get(14)?;
    let wicket = match (dismissal, dismissed_id) {
        (Some(kind), Some(player_id)) => Some(Dismissal {
            kind,
            player_id,
            fielder_id: row.get(15)?,
        }),
        _ => None,
    };
    let prior_live: Option<String> = row.get(20)?;
    let prior_live = match prior_live {
        Some(json) => Some(serde_json::from_str(&json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(20, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };
    Ok(StoredBall {
        record: BallRecord {
            id: row.get(0)?,
            seq: row.get(1)?,
            event: BallEvent {
                innings_id: row.get(2)?,
                over: row.get(3)?,
                ball: row.get(4)?,
                striker_id: row.get(5)?,
                non_striker_id: row.get(6)?,
                bowler_id: row.get(7)?,
                runs_off_bat: row.get(8)?,
                is_four: row.get(9)?,
                is_six: row.get(10)?,
                extra: row.get(11)?,
                extra_runs: row.get(12)?,
                wicket,
            },
            recorded_at: row.get(21)?,
        },
        created: RowsCreated {
            striker: row.get(16)?,
            non_striker: row.get(17)?,
            bowler: row.get(18)?,
        },
        balls_faced: row.get(19)?,
        prior_live,
    })
}

fn next_seq(conn: &Connection, innings_id: i64) -> Result<u32, ScoringError> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(seq), 0) + 1 FROM balls WHERE innings_id = ?1",
        params![innings_id],
        |row| row.get(0),
    )?)
}

fn insert_ball_row(
    conn: &Connection,
    kind: &str,
    supersedes: Option<i64>,
    ball: &BallEvent,
    created: RowsCreated,
    balls_faced: u32,
    prior_live: Option<&LiveMatchState>,
    recorded_at: &str,
) -> Result<BallRecord, ScoringError> {
    let seq = next_seq(conn, ball.innings_id)?;
    let prior_live = prior_live.map(serde_json::to_string).transpose()?;
    let wicket = ball.wicket.as_ref();
    conn.execute(
        "INSERT INTO balls (innings_id, seq, kind, supersedes, over_index, ball_in_over, striker_id,
            non_striker_id, bowler_id, runs_off_bat, is_four, is_six, extra_kind, extra_runs, legal,
            dismissal_kind, dismissed_id, fielder_id, created_striker_row, created_non_striker_row,
            created_bowler_row, striker_balls_faced, prior_live, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18,
            ?19, ?20, ?21, ?22, ?23, ?24)",
        params![
            ball.innings_id,
            seq,
            kind,
            supersedes,
            ball.over,
            ball.ball,
            ball.striker_id,
            ball.non_striker_id,
            ball.bowler_id,
            ball.runs_off_bat,
            ball.is_four,
            ball.is_six,
            ball.extra,
            ball.extra_runs,
            ball.is_legal_delivery(),
            wicket.map(|w| w.kind),
            wicket.map(|w| w.player_id.as_str()),
            wicket.and_then(|w| w.fielder_id.as_deref()),
            created.striker,
            created.non_striker,
            created.bowler,
            balls_faced,
            prior_live,
            recorded_at,
        ],
    )?;
    Ok(BallRecord {
        id: conn.last_insert_rowid(),
        seq,
        event: ball.clone(),
        recorded_at: recorded_at.to_string(),
    })
}

/// Append an accepted delivery. `balls_faced` is what the ledger credited the
/// striker and `prior_live` is the snapshot it replaced.
pub fn insert_ball(
    conn: &Connection,
    ball: &BallEvent,
    created: RowsCreated,
    balls_faced: u32,
    prior_live: &LiveMatchState,
    recorded_at: &str,
) -> Result<BallRecord, ScoringError> {
    insert_ball_row(conn, "delivery", None, ball, created, balls_faced, Some(prior_live), recorded_at)
}

/// Append the compensating event that supersedes `undone`.
pub fn insert_undo(conn: &Connection, undone: &BallRecord, recorded_at: &str) -> Result<BallRecord, ScoringError> {
    insert_ball_row(
        conn,
        "undo",
        Some(undone.id),
        &undone.event,
        RowsCreated::default(),
        0,
        None,
        recorded_at,
    )
}

const ACTIVE_DELIVERY: &str = "kind = 'delivery' AND NOT EXISTS
    (SELECT 1 FROM balls u WHERE u.kind = 'undo' AND u.supersedes = balls.id)";

pub fn last_active_ball(conn: &Connection, innings_id: i64) -> Result<Option<StoredBall>, ScoringError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {} FROM balls WHERE innings_id = ?1 AND {} ORDER BY seq DESC LIMIT 1",
                BALL_COLUMNS, ACTIVE_DELIVERY
            ),
            params![innings_id],
            map_ball,
        )
        .optional()?)
}

/// Deliveries that still count, in the order they were bowled.
pub fn active_balls(conn: &Connection, innings_id: i64) -> Result<Vec<BallRecord>, ScoringError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM balls WHERE innings_id = ?1 AND {} ORDER BY seq ASC",
        BALL_COLUMNS, ACTIVE_DELIVERY
    ))?;
    let rows = stmt.query_map(params![innings_id], map_ball)?;
    Ok(rows.map(|r| r.map(|b| b.record)).collect::<Result<Vec<_>, _>>()?)
}

// =============================================================================
// Live match state
// =============================================================================

pub fn get_live(conn: &Connection, match_id: &str) -> Result<Option<LiveMatchState>, ScoringError> {
    Ok(conn
        .query_row(
            "SELECT match_id, phase, innings_id, innings_number, striker_id, non_striker_id, bowler_id,
                over_index, ball_in_over, runs, wickets, overs, last_event, revision, updated_at
             FROM live_match_state WHERE match_id = ?1",
            params![match_id],
            |row| {
                Ok(LiveMatchState {
                    match_id: row.get(0)?,
                    phase: row.get(1)?,
                    innings_id: row.get(2)?,
                    innings_number: row.get(3)?,
                    striker_id: row.get(4)?,
                    non_striker_id: row.get(5)?,
                    bowler_id: row.get(6)?,
                    over: row.get(7)?,
                    ball: row.get(8)?,
                    runs: row.get(9)?,
                    wickets: row.get(10)?,
                    overs: row.get(11)?,
                    last_event: row.get(12)?,
                    revision: row.get::<_, i64>(13)? as u64,
                    updated_at: row.get(14)?,
                })
            },
        )
        .optional()?)
}

pub fn upsert_live(conn: &Connection, s: &LiveMatchState) -> Result<(), ScoringError> {
    conn.execute(
        "INSERT INTO live_match_state (match_id, phase, innings_id, innings_number, striker_id,
            non_striker_id, bowler_id, over_index, ball_in_over, runs, wickets, overs, last_event,
            revision, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
         ON CONFLICT (match_id) DO UPDATE SET
            phase = excluded.phase, innings_id = excluded.innings_id,
            innings_number = excluded.innings_number, striker_id = excluded.striker_id,
            non_striker_id = excluded.non_striker_id, bowler_id = excluded.bowler_id,
            over_index = excluded.over_index, ball_in_over = excluded.ball_in_over,
            runs = excluded.runs, wickets = excluded.wickets, overs = excluded.overs,
            last_event = excluded.last_event, revision = excluded.revision,
            updated_at = excluded.updated_at",
        params![
            s.match_id,
            s.phase,
            s.innings_id,
            s.innings_number,
            s.striker_id,
            s.non_striker_id,
            s.bowler_id,
            s.over,
            s.ball,
            s.runs,
            s.wickets,
            s.overs,
            s.last_event,
            s.revision as i64,
            s.updated_at,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ScoreStore {
        let mut s = ScoreStore::in_memory().unwrap();
        s.init().unwrap();
        insert_match(
            s.conn(),
            &Match {
                id: "m1".into(),
                home_team: "home".into(),
                away_team: "away".into(),
                format: MatchFormat::LimitedOvers { overs: 20 },
                status: MatchStatus::Upcoming,
            },
        )
        .unwrap();
        s
    }

    #[test]
    fn test_match_roundtrip() {
        let s = store();
        let m = get_match(s.conn(), "m1").unwrap().unwrap();
        assert_eq!(m.format, MatchFormat::LimitedOvers { overs: 20 });
        set_match_status(s.conn(), "m1", MatchStatus::Live).unwrap();
        assert_eq!(get_match(s.conn(), "m1").unwrap().unwrap().status, MatchStatus::Live);
        assert!(get_match(s.conn(), "nope").unwrap().is_none());
    }

    #[test]
    fn test_squad_dedupes() {
        let s = store();
        add_squad_members(s.conn(), "home", &["a".into(), "b".into(), "a".into()]).unwrap();
        assert_eq!(squad(s.conn(), "home").unwrap().len(), 2);
    }

    #[test]
    fn test_innings_revision_check() {
        let s = store();
        let mut inn = insert_innings(s.conn(), "m1", 1, "home", "away").unwrap();
        assert_eq!(inn.revision, 0);
        inn.totals.runs = 4;
        assert_eq!(update_innings(s.conn(), &inn, 0).unwrap(), 1);
        inn.totals.runs = 8;
        match update_innings(s.conn(), &inn, 0) {
            Err(ScoringError::ConcurrentModification { expected: 0, found: 1, .. }) => {}
            other => panic!("expected conflict, got {:?}", other),
        }
        assert_eq!(get_innings(s.conn(), inn.id).unwrap().unwrap().totals.runs, 4);
    }

    #[test]
    fn test_duplicate_innings_number_rejected() {
        let s = store();
        insert_innings(s.conn(), "m1", 1, "home", "away").unwrap();
        assert!(insert_innings(s.conn(), "m1", 1, "home", "away").is_err());
    }

    #[test]
    fn test_undo_row_supersedes_delivery() {
        let s = store();
        let inn = insert_innings(s.conn(), "m1", 1, "home", "away").unwrap();
        let ball = BallEvent {
            innings_id: inn.id,
            over: 0,
            ball: 1,
            striker_id: "a".into(),
            non_striker_id: "b".into(),
            bowler_id: "x".into(),
            runs_off_bat: 0,
            is_four: false,
            is_six: false,
            extra: Some(ExtraKind::Wide),
            extra_runs: 1,
            wicket: None,
        };
        let live = LiveMatchState::new("m1");
        let first = insert_ball(s.conn(), &ball, RowsCreated::default(), 0, &live, "t1").unwrap();
        let second = insert_ball(s.conn(), &ball, RowsCreated { bowler: true, ..Default::default() }, 0, &live, "t2").unwrap();
        assert_eq!((first.seq, second.seq), (1, 2));

        let last = last_active_ball(s.conn(), inn.id).unwrap().unwrap();
        assert_eq!(last.record.id, second.id);
        assert!(last.created.bowler);
        assert_eq!(last.balls_faced, 0);
        assert_eq!(last.prior_live.as_ref(), Some(&live));
        assert_eq!(last.record.event, ball);

        let undo = insert_undo(s.conn(), &second, "t3").unwrap();
        assert_eq!(undo.seq, 3);
        assert_eq!(last_active_ball(s.conn(), inn.id).unwrap().unwrap().record.id, first.id);
        assert_eq!(active_balls(s.conn(), inn.id).unwrap().len(), 1);
    }

    #[test]
    fn test_live_upsert() {
        let s = store();
        let mut live = LiveMatchState::new("m1");
        upsert_live(s.conn(), &live).unwrap();
        live.revision = 3;
        live.phase = MatchPhase::InningsOpen;
        live.striker_id = Some("a".into());
        upsert_live(s.conn(), &live).unwrap();
        assert_eq!(get_live(s.conn(), "m1").unwrap().unwrap(), live);
    }
}
