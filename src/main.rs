//! Scoring console. Reads one JSON command per line from stdin and writes one
//! `{ ok, ... }` result per line to stdout. Live snapshots of watched matches
//! also go to stdout, keyed by `snapshot`. Log records go to stderr.

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

use crease::config::Config;
use crease::engine::events::{BallInput, PlayerId};
use crease::error::{Outcome, ScoringError};
use crease::logging::{json_log, log, obj, v_num, v_str, Domain, Level};
use crease::rates;
use crease::scorer::{NewMatch, Scorer};

#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum Command {
    CreateMatch(NewMatch),
    Squad {
        team: String,
        players: Vec<PlayerId>,
    },
    OpenInnings {
        match_id: String,
        number: u32,
        batting: String,
        bowling: String,
        openers: [PlayerId; 2],
    },
    Ball(BallInput),
    Undo {
        innings_id: i64,
    },
    CloseInnings {
        innings_id: i64,
        #[serde(default)]
        ends_match: bool,
    },
    Abandon {
        match_id: String,
    },
    CompleteMatch {
        match_id: String,
    },
    Watch {
        match_id: String,
    },
    Scorecard {
        innings_id: i64,
    },
}

fn run(scorer: &Scorer, command: Command) -> Result<Value, ScoringError> {
    Ok(match command {
        Command::CreateMatch(new) => json!(scorer.create_match(new)?),
        Command::Squad { team, players } => json!({ "squad_size": scorer.register_squad(&team, &players)? }),
        Command::OpenInnings {
            match_id,
            number,
            batting,
            bowling,
            openers,
        } => json!(scorer.open_innings(&match_id, number, &batting, &bowling, openers)?),
        Command::Ball(input) => json!(scorer.submit_ball(&input)?),
        Command::Undo { innings_id } => json!({ "undone": scorer.undo_last_ball(innings_id)? }),
        Command::CloseInnings { innings_id, ends_match } => {
            json!(scorer.close_innings(innings_id, ends_match)?)
        }
        Command::Abandon { match_id } => json!(scorer.abandon_match(&match_id)?),
        Command::CompleteMatch { match_id } => json!(scorer.complete_match(&match_id)?),
        Command::Watch { .. } => Value::Null,
        Command::Scorecard { innings_id } => scorecard(scorer, innings_id)?,
    })
}

fn scorecard(scorer: &Scorer, innings_id: i64) -> Result<Value, ScoringError> {
    let innings = scorer.innings(innings_id)?;
    let m = scorer.get_match(&innings.match_id)?;
    let batting: Vec<Value> = scorer
        .batting_card(innings_id)?
        .iter()
        .map(|b| {
            json!({
                "player_id": b.player_id,
                "runs": b.runs,
                "balls": b.balls_faced,
                "fours": b.fours,
                "sixes": b.sixes,
                "out": b.dismissal.map(|d| d.as_str()),
                "strike_rate": b.strike_rate(),
            })
        })
        .collect();
    let bowling: Vec<Value> = scorer
        .bowling_card(innings_id)?
        .iter()
        .map(|b| {
            json!({
                "player_id": b.player_id,
                "overs": b.overs(),
                "runs": b.runs_conceded,
                "wickets": b.wickets,
                "wides": b.wides,
                "no_balls": b.no_balls,
                "economy": b.economy(),
            })
        })
        .collect();
    let balls_remaining = m
        .format
        .overs_limit()
        .map(|limit| rates::balls_remaining(limit, innings.totals.legal_balls));
    // Chasing side: target is the first innings total plus one.
    let target = match innings.number {
        2 => scorer
            .innings_for_match(&m.id)?
            .first()
            .map(|first| first.totals.runs + 1),
        _ => None,
    };
    let required_rate = target
        .zip(balls_remaining)
        .map(|(target, left)| rates::required_run_rate(target, innings.totals.runs, left));
    Ok(json!({
        "innings": innings,
        "overs": innings.totals.overs(),
        "run_rate": innings.totals.run_rate(),
        "balls_remaining": balls_remaining,
        "target": target,
        "required_run_rate": required_rate,
        "batting": batting,
        "bowling": bowling,
    }))
}

fn watch(scorer: &Scorer, match_id: &str) -> Result<JoinHandle<()>, ScoringError> {
    let mut subscription = scorer.subscribe_live_state(match_id)?;
    Ok(tokio::spawn(async move {
        while let Some(snapshot) = subscription.next().await {
            println!("{}", json!({ "snapshot": snapshot, "fingerprint": snapshot.fingerprint() }));
        }
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let scorer = Scorer::open(&cfg).with_context(|| format!("opening {}", cfg.sqlite_path))?;
    json_log(
        "startup",
        obj(&[
            ("sqlite_path", v_str(&cfg.sqlite_path)),
            ("no_ball_counts_as_faced", json!(cfg.rules.no_ball_counts_as_faced)),
            ("feed_history", v_num(cfg.feed_history as f64)),
        ]),
    );

    let mut watchers: HashMap<String, JoinHandle<()>> = HashMap::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut processed = 0u64;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        processed += 1;
        let command: Command = match serde_json::from_str(line) {
            Ok(c) => c,
            Err(e) => {
                println!("{}", json!({ "ok": false, "error_kind": "bad_command", "message": e.to_string() }));
                continue;
            }
        };

        let outcome: Outcome<Value> = match command {
            Command::Watch { match_id } => {
                if watchers.contains_key(&match_id) {
                    Ok(json!({ "watching": match_id }))
                } else {
                    watch(&scorer, &match_id).map(|handle| {
                        watchers.insert(match_id.clone(), handle);
                        json!({ "watching": match_id })
                    })
                }
            }
            other => run(&scorer, other),
        }
        .into();
        println!("{}", serde_json::to_string(&outcome)?);
    }

    // Readers end once their topic is closed and drained.
    for (match_id, handle) in watchers {
        scorer.feed().close(&match_id)?;
        handle.await.context("feed reader task")?;
    }
    log(
        Level::Info,
        Domain::System,
        "shutdown",
        obj(&[("commands", v_num(processed as f64))]),
    );
    Ok(())
}
