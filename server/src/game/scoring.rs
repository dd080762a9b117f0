//! Rank-score delta formula.

/// Strategy computing one player's score change after a game.
pub trait ScoreFormula: Send + Sync {
    /// `score_difference` is the other team's total minus this team's total;
    /// `game_count` counts the player's previously recorded games.
    fn delta(&self, win: bool, game_count: u32, score_difference: i64) -> i32;
}

/// Asymmetric win/loss baseline, a bonus for new players and a bounded
/// catch-up term.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFormula;

impl ScoreFormula for DefaultFormula {
    fn delta(&self, win: bool, game_count: u32, score_difference: i64) -> i32 {
        let catch_up = score_difference as f64 / 50.0;
        let d = if win {
            20.0 + 80.0 / (f64::from(game_count) + 4.0) + catch_up.max(-5.0)
        } else {
            -20.0 + catch_up.min(5.0)
        };
        round_half_up(d)
    }
}

/// Rounds .5 towards positive infinity (`-2.5 → -2`, `2.5 → 3`).
fn round_half_up(x: f64) -> i32 {
    (x + 0.5).floor() as i32
}

/// Convenience wrapper around [`DefaultFormula`].
pub fn score_delta(win: bool, game_count: u32, score_difference: i64) -> i32 {
    DefaultFormula.delta(win, game_count, score_difference)
}
