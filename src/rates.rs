//! Rate calculators. Pure functions over counts; a zero denominator yields 0.0.

pub const BALLS_PER_OVER: u32 = 6;

/// Runs scored per 100 balls faced.
pub fn strike_rate(runs: u32, balls_faced: u32) -> f64 {
    if balls_faced == 0 {
        return 0.0;
    }
    runs as f64 * 100.0 / balls_faced as f64
}

/// Runs conceded per over bowled.
pub fn economy_rate(runs_conceded: u32, legal_balls: u32) -> f64 {
    if legal_balls == 0 {
        return 0.0;
    }
    runs_conceded as f64 / (legal_balls as f64 / BALLS_PER_OVER as f64)
}

/// Runs per over for a batting side.
pub fn run_rate(runs: u32, legal_balls: u32) -> f64 {
    economy_rate(runs, legal_balls)
}

/// Runs per over still needed to reach `target` in the balls left.
pub fn required_run_rate(target: u32, runs: u32, balls_remaining: u32) -> f64 {
    let needed = target.saturating_sub(runs);
    if needed == 0 || balls_remaining == 0 {
        return 0.0;
    }
    needed as f64 / (balls_remaining as f64 / BALLS_PER_OVER as f64)
}

/// Legal balls left in a limited-overs innings.
pub fn balls_remaining(overs_limit: u32, legal_balls: u32) -> u32 {
    overs_limit.saturating_mul(BALLS_PER_OVER).saturating_sub(legal_balls)
}

/// Cricket notation: completed overs, a dot, then balls into the current over.
pub fn format_overs(legal_balls: u32) -> String {
    format!("{}.{}", legal_balls / BALLS_PER_OVER, legal_balls % BALLS_PER_OVER)
}

/// Overs as a true fraction (15.1 overs is 15 + 1/6).
pub fn overs_as_decimal(legal_balls: u32) -> f64 {
    legal_balls as f64 / BALLS_PER_OVER as f64
}
