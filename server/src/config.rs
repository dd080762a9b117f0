//! Runtime configuration for the lobby server.

use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// What to do when a player reports they are already inside the external
/// game lobby while being asked to join it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinConflictPolicy {
    /// Treat "already in game" as a successful join.
    Succeed,
    /// Treat it like any other join failure.
    Fail,
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Server tag used when a client does not announce one.
    pub default_server: String,
    /// Zero out rank scores in every room view.
    pub hide_rank_score: bool,
    /// Countdown length used when a creator does not pick one.
    pub default_waiting_time: u32,
    pub min_waiting_time: u32,
    pub max_waiting_time: u32,
    /// Wall-clock window for one remote action attempt.
    pub action_timeout: Duration,
    /// Attempts per remote action, first try included.
    pub action_attempts: u32,
    pub retry_backoff: Duration,
    /// How long every player gets to confirm they are ready to execute.
    pub barrier_timeout: Duration,
    /// Pause between external room creation and the joins.
    pub settle_delay: Duration,
    /// Countdown tick.
    pub tick: Duration,
    /// Upper bound on waiting for the end-of-game report.
    pub result_timeout: Duration,
    /// Auto-arrange accepts splits this close to the optimum.
    pub arrange_tolerance: i64,
    pub join_conflict: JoinConflictPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            default_server: "default".into(),
            hide_rank_score: false,
            default_waiting_time: 60,
            min_waiting_time: 5,
            max_waiting_time: 300,
            action_timeout: Duration::from_secs(20),
            action_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            barrier_timeout: Duration::from_secs(20),
            settle_delay: Duration::from_secs(3),
            tick: Duration::from_secs(1),
            result_timeout: Duration::from_secs(3 * 60 * 60),
            arrange_tolerance: 50,
            join_conflict: JoinConflictPolicy::Succeed,
        }
    }
}

fn var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

impl Settings {
    pub fn from_env() -> Self {
        let d = Settings::default();

        let join_conflict = match env::var("JOIN_CONFLICT_POLICY").as_deref() {
            Ok("fail") => JoinConflictPolicy::Fail,
            _ => JoinConflictPolicy::Succeed,
        };

        Settings {
            default_server: env::var("DEFAULT_SERVER").unwrap_or(d.default_server),
            hide_rank_score: env::var("HIDE_RANKSCORE").map(|v| v == "1").unwrap_or(false),
            default_waiting_time: var("DEFAULT_WAITING_TIME").unwrap_or(d.default_waiting_time),
            min_waiting_time: d.min_waiting_time,
            max_waiting_time: d.max_waiting_time,
            action_timeout: var("ACTION_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.action_timeout),
            action_attempts: var::<u32>("ACTION_ATTEMPTS")
                .map(|n| n.max(1))
                .unwrap_or(d.action_attempts),
            retry_backoff: var("RETRY_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.retry_backoff),
            barrier_timeout: var("BARRIER_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.barrier_timeout),
            settle_delay: var("SETTLE_DELAY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.settle_delay),
            tick: var("TICK_MS").map(Duration::from_millis).unwrap_or(d.tick),
            result_timeout: var("RESULT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.result_timeout), // 3 h default
            arrange_tolerance: var("ARRANGE_TOLERANCE").unwrap_or(d.arrange_tolerance),
            join_conflict,
        }
    }
}

static SETTINGS: Lazy<Settings> = Lazy::new(Settings::from_env);

pub fn settings() -> &'static Settings {
    &SETTINGS
}
