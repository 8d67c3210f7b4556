use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinError;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::GatewayError;
use crate::reporter;
use crate::types::{GameStatus, GoalEvent, Matchup, TickOutcome};
use crate::{
    GOAL_MILESTONE, IDLE_STATUS, MILESTONE_LABEL, TRACKED_PLAYER_ID, TRACKED_PLAYER_NAME,
};

/// Where the tracker reads game state and goal totals from.
///
/// `None` means "no data this tick"; implementations log the cause.
pub trait ScoreSource {
    fn tracked_game(&self) -> impl Future<Output = Option<GameStatus>> + Send;
    fn career_goals(&self) -> impl Future<Output = Option<u32>> + Send;
}

/// The bot's "Watching ..." status.
pub trait Presence {
    fn set_watching(&self, text: &str) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

/// Goal announcements. Failures are logged by the implementation.
pub trait Notifier {
    fn notify(&self, message: &str) -> impl Future<Output = ()> + Send;
}

/// Fixed parameters of the polling loop.
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub poll_interval: Duration,
    pub idle_status: String,
    pub player_id: u32,
    pub player_name: String,
    pub milestone: i64,
    pub milestone_label: String,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            idle_status: IDLE_STATUS.to_string(),
            player_id: TRACKED_PLAYER_ID,
            player_name: TRACKED_PLAYER_NAME.to_string(),
            milestone: GOAL_MILESTONE,
            milestone_label: MILESTONE_LABEL.to_string(),
        }
    }
}

/// State carried from one tick to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerState {
    /// Last career total read while a game was live. Zero until the first read.
    pub last_goals: u32,
    /// Teams of the most recent game found for the tracked team.
    pub matchup: Option<Matchup>,
    /// Consecutive retryable presence update failures.
    pub presence_failures: u32,
}

/// Notify only on an increase, and never on the first read after startup.
pub fn should_notify(last_goals: u32, current_goals: u32) -> bool {
    current_goals > last_goals && last_goals != 0
}

/// Goals left to the milestone; goes negative once it has been passed.
pub fn goals_remaining(milestone: i64, goals: u32) -> i64 {
    milestone - i64::from(goals)
}

pub fn format_goal_message(settings: &TrackerSettings, goals: u32) -> String {
    format!(
        "🚨 **{} has scored goal #{goals}** 🚨\n\n:hockey: ***Goals remaining to {}: {}***",
        settings.player_name,
        settings.milestone_label,
        goals_remaining(settings.milestone, goals),
    )
}

/// The polling loop: one owner of [`TrackerState`], one tick at a time.
pub struct Tracker<S, P, N> {
    source: S,
    presence: P,
    notifier: N,
    settings: TrackerSettings,
    state: TrackerState,
}

impl<S, P, N> Tracker<S, P, N>
where
    S: ScoreSource,
    P: Presence,
    N: Notifier,
{
    pub fn new(source: S, presence: P, notifier: N, settings: TrackerSettings) -> Self {
        Self {
            source,
            presence,
            notifier,
            settings,
            state: TrackerState::default(),
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    /// Run one polling cycle.
    ///
    /// Only a non-retryable presence failure is returned as an error; every
    /// other failure has already been logged and absorbed.
    pub async fn tick(&mut self) -> Result<TickOutcome, GatewayError> {
        let game = self.source.tracked_game().await;
        if let Some(game) = &game {
            self.state.matchup = Some(game.matchup.clone());
        }

        let Some(game) = game.filter(GameStatus::is_live) else {
            let idle = self.settings.idle_status.clone();
            self.update_presence(&idle).await?;
            return Ok(TickOutcome::Idle);
        };

        let matchup = game.matchup;
        self.update_presence(&matchup.to_string()).await?;

        let Some(goals) = self.source.career_goals().await else {
            return Ok(TickOutcome::Tracking {
                matchup,
                goals: None,
                notified: false,
            });
        };

        let previous = self.state.last_goals;
        let notified = should_notify(previous, goals);
        if notified {
            info!(
                "{} scored goal #{goals}! Sending message.",
                self.settings.player_name
            );
            let message = format_goal_message(&self.settings, goals);
            self.notifier.notify(&message).await;
            reporter::report_goal(&GoalEvent {
                timestamp: chrono::Utc::now().to_rfc3339(),
                player_id: self.settings.player_id,
                goals,
                previous_goals: previous,
                remaining: goals_remaining(self.settings.milestone, goals),
                matchup: Some(matchup.clone()),
            });
        } else if goals < previous {
            warn!("Career goals went down: {previous} -> {goals}");
        }
        self.state.last_goals = goals;

        Ok(TickOutcome::Tracking {
            matchup,
            goals: Some(goals),
            notified,
        })
    }

    /// Tick every `poll_interval` until `shutdown` resolves.
    ///
    /// The first tick fires one interval after start. `shutdown` is only
    /// observed between ticks, so an in-flight tick always completes.
    pub async fn run<F>(mut self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()>,
    {
        let period = self.settings.poll_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!("Entering polling loop (interval: {}s)", period.as_secs());
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Polling loop stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(outcome) => debug!("Tick: {outcome:?}"),
                        Err(e) => {
                            error!("Presence update failed, stopping polling loop: {e}");
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    async fn update_presence(&mut self, text: &str) -> Result<(), GatewayError> {
        match self.presence.set_watching(text).await {
            Ok(()) => {
                if self.state.presence_failures > 0 {
                    info!(
                        "Presence updates recovered after {} failure(s)",
                        self.state.presence_failures
                    );
                }
                self.state.presence_failures = 0;
                Ok(())
            }
            Err(e) if e.is_retryable() => {
                self.state.presence_failures += 1;
                warn!(
                    "Error updating status (consecutive failures: {}): {e}",
                    self.state.presence_failures
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Turn the joined result of a spawned [`Tracker::run`] into the process
/// outcome. A fatal stop or a failed task is an error.
pub fn loop_outcome(joined: Result<Result<(), GatewayError>, JoinError>) -> anyhow::Result<()> {
    joined
        .context("polling task failed")?
        .context("polling loop stopped")
}
