//! Latest-wins fan-out of live snapshots, one topic per match.
//!
//! Publishing swaps the topic's current value and wakes readers; it never
//! waits on them. A reader that falls behind sees only the newest snapshot,
//! and a reader that goes away is simply forgotten.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use thiserror::Error;
use tokio::sync::watch;

use crate::engine::events::MatchId;
use crate::engine::state::LiveMatchState;
use crate::logging::{log, obj, v_str, Domain, Level};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("subscriber limit reached for match {match_id} ({max_subscribers})")]
    SubscriberLimitReached { match_id: String, max_subscribers: usize },
    #[error("feed lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedLimits {
    pub history: usize,
    pub max_subscribers_per_match: usize,
}

impl Default for FeedLimits {
    fn default() -> Self {
        Self {
            history: 16,
            max_subscribers_per_match: 64,
        }
    }
}

struct Topic {
    sender: watch::Sender<Option<LiveMatchState>>,
    history: VecDeque<LiveMatchState>,
}

pub struct LiveFeed {
    topics: Mutex<HashMap<MatchId, Topic>>,
    limits: FeedLimits,
}

impl LiveFeed {
    pub fn new(limits: FeedLimits) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            limits,
        }
    }

    /// Publish a snapshot. Stale revisions (older than what the topic holds)
    /// are dropped so the topic never moves backwards.
    pub fn publish(&self, snapshot: LiveMatchState) -> Result<bool, FeedError> {
        let mut topics = self.topics.lock().map_err(|_| FeedError::LockPoisoned)?;
        let topic = topics
            .entry(snapshot.match_id.clone())
            .or_insert_with(|| Topic {
                sender: watch::channel(None).0,
                history: VecDeque::new(),
            });

        let revision = snapshot.revision;
        let accepted = topic.sender.send_if_modified(|current| {
            let newer = current.as_ref().map_or(true, |c| revision > c.revision);
            if newer {
                *current = Some(snapshot.clone());
            }
            newer
        });
        if accepted {
            topic.history.push_back(snapshot);
            while topic.history.len() > self.limits.history {
                topic.history.pop_front();
            }
        }
        log(
            Level::Trace,
            Domain::Feed,
            "publish",
            obj(&[
                ("revision", serde_json::json!(revision)),
                ("accepted", serde_json::json!(accepted)),
                ("readers", serde_json::json!(topic.sender.receiver_count())),
            ]),
        );
        Ok(accepted)
    }

    /// Register a reader. `seed` is the stored snapshot, used when the topic
    /// has not seen a publish yet. A `finished` match hands back a one-shot
    /// subscription that ends after the final snapshot.
    pub fn subscribe(
        &self,
        match_id: &str,
        seed: Option<LiveMatchState>,
        finished: bool,
    ) -> Result<LiveStateSubscription, FeedError> {
        let mut topics = self.topics.lock().map_err(|_| FeedError::LockPoisoned)?;
        let receiver = match topics.get(match_id) {
            Some(topic) => {
                if topic.sender.receiver_count() >= self.limits.max_subscribers_per_match {
                    return Err(FeedError::SubscriberLimitReached {
                        match_id: match_id.to_string(),
                        max_subscribers: self.limits.max_subscribers_per_match,
                    });
                }
                topic.sender.subscribe()
            }
            None if finished => watch::channel(seed).1,
            None => {
                let (sender, receiver) = watch::channel(seed.clone());
                topics.insert(
                    match_id.to_string(),
                    Topic {
                        sender,
                        history: seed.into_iter().collect(),
                    },
                );
                receiver
            }
        };
        log(
            Level::Debug,
            Domain::Feed,
            "subscribe",
            obj(&[("match_id", v_str(match_id))]),
        );
        Ok(LiveStateSubscription {
            match_id: match_id.to_string(),
            receiver,
            last_seen: None,
        })
    }

    /// Stop the topic; readers drain the final snapshot and then end.
    pub fn close(&self, match_id: &str) -> Result<(), FeedError> {
        let mut topics = self.topics.lock().map_err(|_| FeedError::LockPoisoned)?;
        topics.remove(match_id);
        Ok(())
    }

    /// Most recent snapshots kept for late readers, oldest first.
    pub fn recent(&self, match_id: &str) -> Result<Vec<LiveMatchState>, FeedError> {
        let topics = self.topics.lock().map_err(|_| FeedError::LockPoisoned)?;
        Ok(topics
            .get(match_id)
            .map(|t| t.history.iter().cloned().collect())
            .unwrap_or_default())
    }

    pub fn reader_count(&self, match_id: &str) -> usize {
        self.topics
            .lock()
            .ok()
            .and_then(|t| t.get(match_id).map(|topic| topic.sender.receiver_count()))
            .unwrap_or(0)
    }
}

impl Default for LiveFeed {
    fn default() -> Self {
        Self::new(FeedLimits::default())
    }
}

/// One reader's view of a match topic.
#[derive(Debug)]
pub struct LiveStateSubscription {
    match_id: String,
    receiver: watch::Receiver<Option<LiveMatchState>>,
    last_seen: Option<u64>,
}

impl LiveStateSubscription {
    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    /// The newest snapshot, whether or not it has been seen.
    pub fn latest(&self) -> Option<LiveMatchState> {
        self.receiver.borrow().clone()
    }

    /// Wait for a snapshot newer than the last one returned. `None` once the
    /// topic is closed and its final snapshot has been handed out.
    pub async fn next(&mut self) -> Option<LiveMatchState> {
        loop {
            if let Some(state) = self.take_unseen() {
                return Some(state);
            }
            if self.receiver.changed().await.is_err() {
                return self.take_unseen();
            }
        }
    }

    /// Non-blocking variant of [`next`](Self::next).
    pub fn try_next(&mut self) -> Option<LiveMatchState> {
        self.take_unseen()
    }

    fn take_unseen(&mut self) -> Option<LiveMatchState> {
        let current = self.receiver.borrow_and_update().clone()?;
        if self.last_seen.map_or(true, |seen| current.revision > seen) {
            self.last_seen = Some(current.revision);
            Some(current)
        } else {
            None
        }
    }
}
