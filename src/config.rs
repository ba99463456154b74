/// Process configuration, read from the environment with defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub sqlite_path: String,
    pub rules: ScoringRules,
    pub feed_history: usize,
    pub max_subscribers_per_match: usize,
}

/// Scoring conventions the pure engine needs to know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringRules {
    /// Whether a no-ball counts toward the striker's balls faced.
    pub no_ball_counts_as_faced: bool,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            no_ball_counts_as_faced: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sqlite_path: "./crease.sqlite".to_string(),
            rules: ScoringRules::default(),
            feed_history: 16,
            max_subscribers_per_match: 64,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sqlite_path: std::env::var("SQLITE_PATH").unwrap_or(defaults.sqlite_path),
            rules: ScoringRules {
                no_ball_counts_as_faced: std::env::var("NO_BALL_COUNTS_AS_FACED")
                    .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                    .unwrap_or(defaults.rules.no_ball_counts_as_faced),
            },
            feed_history: std::env::var("FEED_HISTORY").ok().and_then(|v| v.parse().ok()).unwrap_or(defaults.feed_history),
            max_subscribers_per_match: std::env::var("MAX_SUBSCRIBERS_PER_MATCH").ok().and_then(|v| v.parse().ok()).unwrap_or(defaults.max_subscribers_per_match),
        }
    }

    /// In-memory database, for tests and dry runs.
    pub fn in_memory() -> Self {
        Self {
            sqlite_path: ":memory:".to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert!(cfg.rules.no_ball_counts_as_faced);
        assert_eq!(cfg.feed_history, 16);
        assert_eq!(Config::in_memory().sqlite_path, ":memory:");
    }
}
