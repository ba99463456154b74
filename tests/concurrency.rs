use std::sync::{Arc, Barrier};
use std::thread;

use crease::config::Config;
use crease::engine::events::{BallInput, PlayerId};
use crease::error::{ErrorKind, ScoringError};
use crease::scorer::{NewMatch, Scorer};

fn players(ids: &[&str]) -> Vec<PlayerId> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn seed(scorer: &Scorer, match_id: &str) -> i64 {
    scorer
        .create_match(NewMatch {
            id: match_id.into(),
            home_team: format!("{}-home", match_id),
            away_team: format!("{}-away", match_id),
            overs_limit: Some(20),
        })
        .unwrap();
    scorer
        .register_squad(&format!("{}-home", match_id), &players(&["h1", "h2", "h3"]))
        .unwrap();
    scorer
        .register_squad(&format!("{}-away", match_id), &players(&["a1", "a2"]))
        .unwrap();
    scorer
        .open_innings(
            match_id,
            1,
            &format!("{}-home", match_id),
            &format!("{}-away", match_id),
            ["h1".into(), "h2".into()],
        )
        .unwrap()
        .id
}

#[test]
fn scenario_d_same_revision_one_wins() {
    let scorer = Arc::new(Scorer::open(&Config::in_memory()).unwrap());
    let innings_id = seed(&scorer, "d");
    let revision = scorer.innings(innings_id).unwrap().revision;

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = [1, 4]
        .into_iter()
        .map(|runs| {
            let scorer = Arc::clone(&scorer);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let input = BallInput::dot(innings_id, 0, 1, "h1", "h2", "a1")
                    .runs(runs)
                    .at_revision(revision);
                barrier.wait();
                scorer.submit_ball(&input)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let ok = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(ok, 1);
    let conflict = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(conflict.kind(), ErrorKind::ConcurrentModification);
    assert!(conflict.kind().is_retryable());

    let inn = scorer.innings(innings_id).unwrap();
    assert_eq!(inn.totals.legal_balls, 1);
    assert_eq!(inn.revision, revision + 1);
    assert_eq!(scorer.balls(innings_id).unwrap().len(), 1);
}

#[test]
fn stale_revision_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        sqlite_path: dir.path().join("shared.sqlite").to_string_lossy().into_owned(),
        ..Config::default()
    };
    let first = Scorer::open(&config).unwrap();
    let second = Scorer::open(&config).unwrap();
    let innings_id = seed(&first, "x");

    let read = second.innings(innings_id).unwrap().revision;
    first
        .submit_ball(&BallInput::dot(innings_id, 0, 1, "h1", "h2", "a1").at_revision(read))
        .unwrap();

    let err = second
        .submit_ball(&BallInput::dot(innings_id, 0, 1, "h1", "h2", "a1").runs(2).at_revision(read))
        .unwrap_err();
    match err {
        ScoringError::ConcurrentModification { expected, found, .. } => {
            assert_eq!(expected, read);
            assert_eq!(found, read + 1);
        }
        other => panic!("expected a conflict, got {other}"),
    }

    // A retry against fresh state goes through.
    let fresh = second.innings(innings_id).unwrap();
    let (over, ball) = fresh.next_pointer();
    second
        .submit_ball(&BallInput::dot(innings_id, over, ball, "h1", "h2", "a1").runs(2).at_revision(fresh.revision))
        .unwrap();
    assert_eq!(first.innings(innings_id).unwrap().totals.runs, 2);
}

#[test]
fn separate_innings_progress_independently() {
    let scorer = Arc::new(Scorer::open(&Config::in_memory()).unwrap());
    let ids: Vec<(String, i64)> = ["p", "q", "r"]
        .iter()
        .map(|m| (m.to_string(), seed(&scorer, m)))
        .collect();

    let handles: Vec<_> = ids
        .iter()
        .cloned()
        .map(|(_, innings_id)| {
            let scorer = Arc::clone(&scorer);
            thread::spawn(move || {
                for ball in 1..=6 {
                    scorer
                        .submit_ball(&BallInput::dot(innings_id, 0, ball, "h1", "h2", "a1").runs(2))
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    for (match_id, innings_id) in ids {
        let inn = scorer.innings(innings_id).unwrap();
        assert_eq!(inn.totals.runs, 12);
        assert_eq!(inn.totals.overs(), "1.0");
        let live = scorer.live_state(&match_id).unwrap();
        assert_eq!(live.striker_id.as_deref(), Some("h2"));
    }
}
