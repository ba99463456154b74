//! Structured JSON-lines logging for the scoring core.
//!
//! Every record is one JSON object on stderr carrying `ts`, `run_id`, `seq`,
//! `lvl`, `component`, `event` and a `data` payload. Stdout is left to the
//! console's command results. With `LOG_DIR` set the same lines also go to
//! `<LOG_DIR>/<run_id>/events.jsonl` and `trace.jsonl`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use crate::engine::events::BallEvent;
use crate::engine::state::{Innings, MatchPhase};

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

// =============================================================================
// Log Domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Scoring, // Ball acceptance and rejection
    Ledger,  // Batting and bowling rows
    Live,    // Phase transitions, snapshots
    Feed,    // Subscriber fan-out
    Storage, // Transactions, schema
    System,  // Startup, shutdown
    Profile, // Timing
    Audit,   // Undo trail
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Scoring => "scoring",
            Domain::Ledger => "ledger",
            Domain::Live => "live",
            Domain::Feed => "feed",
            Domain::Storage => "storage",
            Domain::System => "system",
            Domain::Profile => "profile",
            Domain::Audit => "audit",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS: comma-separated list or "all"
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunFiles {
    events: Mutex<BufWriter<File>>,
    trace: Mutex<BufWriter<File>>,
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    files: Option<RunFiles>,
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let files = std::env::var("LOG_DIR").ok().and_then(|base| open_run_files(&base, &run_id));
        RunContext { run_id, files }
    })
}

fn open_run_files(base: &str, run_id: &str) -> Option<RunFiles> {
    let mut run_dir = PathBuf::from(base);
    run_dir.push(run_id);
    if let Err(err) = create_dir_all(&run_dir) {
        eprintln!("[log] failed to create run dir: {}", err);
        return None;
    }
    let _ = std::fs::write(
        run_dir.join("manifest.json"),
        json!({
            "run_id": run_id,
            "ts": ts_now(),
            "pid": process::id(),
            "log_dir": run_dir.to_string_lossy(),
        })
        .to_string(),
    );
    let open = |name: &str| match File::create(run_dir.join(name)) {
        Ok(f) => Some(Mutex::new(BufWriter::new(f))),
        Err(err) => {
            eprintln!("[log] failed to create {}: {}", name, err);
            None
        }
    };
    Some(RunFiles {
        events: open("events.jsonl")?,
        trace: open("trace.jsonl")?,
    })
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["match_id", "innings_id", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

fn write_line(writer: &Mutex<BufWriter<File>>, line: &str) {
    if let Ok(mut w) = writer.lock() {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    emit_record(level, domain.as_str(), event, fields);
}

/// Module-named entry at info level, used by the binary.
pub fn json_log(module: &str, fields: Map<String, Value>) {
    emit_record(Level::Info, module, module, fields);
}

fn emit_record(level: Level, component: &str, event: &str, fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let line = render_record(&ctx.run_id, level, component, event, fields);
    if let Some(files) = &ctx.files {
        match level {
            Level::Trace | Level::Debug => write_line(&files.trace, &line),
            _ => write_line(&files.events, &line),
        }
    }
    eprintln!("{}", line);
}

fn render_record(run_id: &str, level: Level, component: &str, event: &str, fields: Map<String, Value>) -> String {
    let (mut top, data) = split_fields(fields);

    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(run_id));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));
    Value::Object(entry).to_string()
}

// =============================================================================
// Scoring helpers
// =============================================================================

pub fn log_ball_accepted(match_id: &str, innings: &Innings, ball: &BallEvent, ball_id: i64) {
    log(
        Level::Info,
        Domain::Scoring,
        "ball_accepted",
        obj(&[
            ("match_id", v_str(match_id)),
            ("innings_id", json!(innings.id)),
            ("ball_id", json!(ball_id)),
            ("delivery", v_str(&format!("{}.{}", ball.over, ball.ball))),
            ("striker", v_str(&ball.striker_id)),
            ("bowler", v_str(&ball.bowler_id)),
            ("runs_off_bat", json!(ball.runs_off_bat)),
            ("extra", ball.extra.map(|e| v_str(e.as_str())).unwrap_or(Value::Null)),
            ("extra_runs", json!(ball.extra_runs)),
            ("wicket", json!(ball.wicket.is_some())),
            ("score", v_str(&format!("{}/{}", innings.totals.runs, innings.totals.wickets))),
            ("revision", json!(innings.revision)),
        ]),
    );
}

pub fn log_ball_rejected(innings_id: i64, kind: &str, reason: &str) {
    log(
        Level::Warn,
        Domain::Scoring,
        "ball_rejected",
        obj(&[
            ("innings_id", json!(innings_id)),
            ("error_kind", v_str(kind)),
            ("msg", v_str(reason)),
        ]),
    );
}

pub fn log_undo(match_id: &str, innings: &Innings, ball_id: i64, undo_id: i64) {
    log(
        Level::Info,
        Domain::Audit,
        "ball_undone",
        obj(&[
            ("match_id", v_str(match_id)),
            ("innings_id", json!(innings.id)),
            ("ball_id", json!(ball_id)),
            ("undo_id", json!(undo_id)),
            ("score", v_str(&format!("{}/{}", innings.totals.runs, innings.totals.wickets))),
            ("revision", json!(innings.revision)),
        ]),
    );
}

pub fn log_innings_transition(match_id: &str, innings_id: i64, from: MatchPhase, to: MatchPhase) {
    log(
        Level::Info,
        Domain::Live,
        "phase",
        obj(&[
            ("match_id", v_str(match_id)),
            ("innings_id", json!(innings_id)),
            ("from", v_str(from.as_str())),
            ("to", v_str(to.as_str())),
        ]),
    );
}

pub fn log_audit(event_type: &str, match_id: &str, fingerprint: &str, revision: u64) {
    log(
        Level::Debug,
        Domain::Audit,
        event_type,
        obj(&[
            ("match_id", v_str(match_id)),
            ("fingerprint", v_str(fingerprint)),
            ("revision", json!(revision)),
        ]),
    );
}

// =============================================================================
// Field builders
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Profiling Scope
// =============================================================================

/// Emits the elapsed time of a scope on drop.
pub struct ProfileScope {
    label: &'static str,
    context: Map<String, Value>,
    started: Instant,
}

impl ProfileScope {
    pub fn new(label: &'static str) -> Self {
        Self::with_context(label, &[])
    }

    pub fn with_context(label: &'static str, fields: &[(&str, Value)]) -> Self {
        Self {
            label,
            context: obj(fields),
            started: Instant::now(),
        }
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut fields = std::mem::take(&mut self.context);
        fields.insert("label".to_string(), v_str(self.label));
        fields.insert("elapsed_ms".to_string(), v_num(elapsed_ms));
        log(Level::Trace, Domain::Profile, "profile", fields);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
    }

    #[test]
    fn test_obj_helper() {
        let m = obj(&[("key", v_str("value")), ("num", v_num(42.0))]);
        assert_eq!(m.get("key").unwrap(), "value");
        assert_eq!(m.get("num").unwrap(), 42.0);
    }

    #[test]
    fn test_split_fields_lifts_identity() {
        let (top, data) = split_fields(obj(&[
            ("match_id", v_str("m1")),
            ("runs", json!(4)),
        ]));
        assert_eq!(top.get("match_id").unwrap(), "m1");
        assert!(data.contains_key("runs"));
        assert!(!data.contains_key("match_id"));
    }

    #[test]
    fn test_record_never_looks_like_an_outcome() {
        let line = render_record(
            "run",
            Level::Info,
            "scoring",
            "ball_accepted",
            obj(&[("ok", json!(true)), ("innings_id", json!(3))]),
        );
        let record: Value = serde_json::from_str(&line).unwrap();
        assert!(record.get("ok").is_none());
        assert_eq!(record["data"]["ok"], true);
        assert_eq!(record["innings_id"], 3);
        assert_eq!(record["lvl"], "INFO");
    }

    #[test]
    fn test_seq_increments() {
        let s1 = next_seq();
        let s2 = next_seq();
        assert!(s2 > s1);
    }
}
