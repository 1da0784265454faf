//! The recovery loop: indefinite synchronization maintenance.
//!
//! Continuous mode wraps the goal-directed loop in a two-state machine on
//! the swarm: `Syncing` while an inner synchronization attempt runs under
//! its own child cancellation, `Monitoring` once it finishes. At every
//! check the loop samples coherence, tracks a slowly forgetting peak, and
//! evaluates the six-clause resync decision. Disruptions — external phase
//! randomization, topology damage, plain drift — show up as coherence
//! drops and trigger a relaunch; none of them ever surface to the caller.
//!
//! The outer cancellation token is the sole way out.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domain::errors::{SwarmError, SwarmResult};
use crate::domain::models::config::RecoveryConfig;
use crate::domain::models::pattern::Pattern;
use crate::events::{ResyncReason, SwarmEvent, SwarmEvents};

use super::goal_loop::GoalDirectedSync;

/// Decay applied to the tracked peak on every non-improving check, so a
/// stale historical peak cannot hold the swarm hostage forever.
const PEAK_DECAY: f64 = 0.9995;

// ---------------------------------------------------------------------------
// RecoveryState
// ---------------------------------------------------------------------------

/// The recovery monitor's working state between checks.
#[derive(Debug, Clone)]
pub struct RecoveryState {
    /// Coherence at the previous check.
    pub last_coherence: f64,
    /// Best coherence seen, decaying slowly toward the present.
    pub peak_coherence: f64,
    /// Consecutive checks without measurable improvement.
    pub stable_count: u32,
}

impl RecoveryState {
    /// Start tracking from the given coherence reading.
    pub fn starting_at(coherence: f64) -> Self {
        Self {
            last_coherence: coherence,
            peak_coherence: coherence,
            stable_count: 0,
        }
    }

    /// Fold a new reading into the peak and the stuck counter.
    pub fn observe(&mut self, current: f64, improvement_threshold: f64) {
        if current > self.peak_coherence {
            self.peak_coherence = current;
        } else {
            self.peak_coherence *= PEAK_DECAY;
        }

        let delta = current - self.last_coherence;
        if delta > improvement_threshold {
            self.stable_count = 0;
        } else if delta.abs() < improvement_threshold {
            self.stable_count += 1;
        }
    }

    /// Reset the peak to the present after a relaunch so the new attempt
    /// is not judged against pre-disruption glory.
    pub fn rebase(&mut self, current: f64) {
        self.peak_coherence = current;
        self.last_coherence = current;
        self.stable_count = 0;
    }
}

// ---------------------------------------------------------------------------
// Resync decision
// ---------------------------------------------------------------------------

/// Evaluate the resync decision: the first clause that fires names the
/// reason, `None` means the swarm is healthy enough to leave alone.
pub fn decide_resync(
    config: &RecoveryConfig,
    state: &RecoveryState,
    current: f64,
    target_coherence: f64,
) -> Option<ResyncReason> {
    // System non-functional.
    if current < config.minimum_viable_coherence {
        return Some(ResyncReason::BelowViable);
    }

    // Below the acceptable margin of the target.
    if current < target_coherence * config.target_margin_ratio {
        return Some(ResyncReason::BelowMargin);
    }

    // Definite disruption: large drop from the (decaying) peak.
    let peak = state.peak_coherence;
    if peak - current > peak * config.large_drop_ratio {
        return Some(ResyncReason::LargeDrop);
    }

    // Small drop while already short of target.
    if peak - current > peak * config.small_drop_ratio && current < target_coherence {
        return Some(ResyncReason::SmallDropBelowTarget);
    }

    // Flat below margin for too long.
    if state.stable_count > config.stuck_threshold
        && current < target_coherence * config.target_margin_ratio
    {
        return Some(ResyncReason::Stuck);
    }

    // Rapid degradation between consecutive checks.
    if current < state.last_coherence * (1.0 - config.small_drop_ratio) {
        return Some(ResyncReason::RapidDegradation);
    }

    None
}

// ---------------------------------------------------------------------------
// RecoveryLoop
// ---------------------------------------------------------------------------

/// Wraps a [`GoalDirectedSync`] for indefinite operation.
pub struct RecoveryLoop {
    engine: Arc<GoalDirectedSync>,
    events: Arc<SwarmEvents>,
}

impl RecoveryLoop {
    /// Build the loop over an engine and its event hub.
    pub fn new(engine: Arc<GoalDirectedSync>, events: Arc<SwarmEvents>) -> Self {
        Self { engine, events }
    }

    /// Maintain synchronization toward `target` until `token` is
    /// cancelled. Always returns `Err(Canceled)`; inner synchronization
    /// completions and relaunches are internal bookkeeping.
    pub async fn run(
        &self,
        token: &CancellationToken,
        target: Pattern,
        config: RecoveryConfig,
    ) -> SwarmResult<()> {
        let target_coherence = target.coherence;

        // Initial sync launch.
        let mut sync_token = token.child_token();
        let mut sync_task: Option<JoinHandle<()>> = Some(self.spawn_sync(&sync_token, &target));
        let mut sync_active = true;
        let mut last_sync_time = Instant::now();
        let mut state = RecoveryState::starting_at(self.engine.coherence());

        info!(
            target_coherence,
            check_interval_ms = config.check_interval_ms,
            "continuous synchronization started"
        );

        let mut interval = tokio::time::interval(config.check_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = token.cancelled() => {
                    sync_token.cancel();
                    if let Some(task) = sync_task.take() {
                        let _ = task.await;
                    }
                    debug!("continuous synchronization cancelled");
                    return Err(SwarmError::Canceled);
                }

                _ = interval.tick() => {
                    // Inner attempt finished (achieved, gave up, or was
                    // cancelled by a relaunch): back to pure monitoring.
                    if sync_task.as_ref().is_some_and(JoinHandle::is_finished) {
                        sync_task = None;
                        sync_active = false;
                        debug!("inner synchronization completed; monitoring");
                    }

                    let current = self.engine.coherence();
                    state.observe(current, config.improvement_threshold);

                    let reason = decide_resync(&config, &state, current, target_coherence);
                    if let Some(reason) = reason {
                        let cooled_down =
                            last_sync_time.elapsed() > config.min_resync_interval();
                        if !sync_active && cooled_down {
                            // Cancel anything lingering, clear stale
                            // monitor history, and relaunch.
                            sync_token.cancel();
                            if let Some(task) = sync_task.take() {
                                let _ = task.await;
                            }
                            self.engine.reset_monitor();
                            state.rebase(current);

                            sync_token = token.child_token();
                            sync_task = Some(self.spawn_sync(&sync_token, &target));
                            sync_active = true;
                            last_sync_time = Instant::now();

                            info!(
                                coherence = current,
                                reason = reason.as_str(),
                                "resynchronization launched"
                            );
                            self.events.publish(SwarmEvent::ResyncLaunched {
                                coherence: current,
                                reason,
                                at: Utc::now(),
                            });
                        }
                    }

                    state.last_coherence = current;
                }
            }
        }
    }

    /// Spawn one inner synchronization attempt under `sync_token`.
    fn spawn_sync(&self, sync_token: &CancellationToken, target: &Pattern) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let token = sync_token.clone();
        let target = target.clone();
        tokio::spawn(async move {
            // Failure to converge is not fatal in continuous mode; the
            // monitor will relaunch as long as the swarm stays short.
            let _ = engine.achieve(&token, target).await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RecoveryConfig {
        RecoveryConfig::for_target(0.85)
    }

    #[test]
    fn test_healthy_swarm_left_alone() {
        let config = config();
        let state = RecoveryState::starting_at(0.86);
        assert_eq!(decide_resync(&config, &state, 0.86, 0.85), None);
    }

    #[test]
    fn test_below_viable_fires_first() {
        let config = config();
        let state = RecoveryState::starting_at(0.9);
        assert_eq!(
            decide_resync(&config, &state, 0.2, 0.85),
            Some(ResyncReason::BelowViable)
        );
    }

    #[test]
    fn test_below_margin() {
        let config = config();
        let state = RecoveryState::starting_at(0.85);
        // 0.85 target at 0.95 margin: anything under 0.8075.
        assert_eq!(
            decide_resync(&config, &state, 0.78, 0.85),
            Some(ResyncReason::BelowMargin)
        );
    }

    #[test]
    fn test_large_drop_from_peak() {
        let config = config();
        let mut state = RecoveryState::starting_at(0.95);
        state.peak_coherence = 0.95;
        // Above margin (0.8075) but far off the 0.95 peak.
        assert_eq!(
            decide_resync(&config, &state, 0.82, 0.85),
            Some(ResyncReason::LargeDrop)
        );
    }

    #[test]
    fn test_small_drop_only_matters_below_target() {
        let config = config();
        let mut state = RecoveryState::starting_at(0.87);
        state.peak_coherence = 0.87;
        // Small drop from peak but still at/above target: healthy.
        assert_eq!(decide_resync(&config, &state, 0.85, 0.85), None);
        // Same relative drop below target triggers.
        state.peak_coherence = 0.88;
        assert_eq!(
            decide_resync(&config, &state, 0.83, 0.85),
            Some(ResyncReason::SmallDropBelowTarget)
        );
    }

    #[test]
    fn test_stuck_is_shadowed_by_margin_clause() {
        // Both clauses gate on the same margin and the margin clause sits
        // first, so a stuck-below-margin reading reports BelowMargin.
        let mut config = config();
        config.target_margin_ratio = 0.90;
        let mut state = RecoveryState::starting_at(0.758);
        state.peak_coherence = 0.758;
        state.stable_count = config.stuck_threshold + 1;
        let result = decide_resync(&config, &state, 0.758, 0.85);
        assert_eq!(result, Some(ResyncReason::BelowMargin));

        // Flat history parked above the margin stays healthy.
        state.peak_coherence = 0.77;
        state.last_coherence = 0.77;
        let result = decide_resync(&config, &state, 0.77, 0.85);
        assert_eq!(result, None);
    }

    #[test]
    fn test_rapid_degradation() {
        let config = config();
        let mut state = RecoveryState::starting_at(0.99);
        state.peak_coherence = 0.86;
        state.last_coherence = 0.99;
        // Above margin, within drop ratios of the rebased peak, but a
        // steep fall from the previous check.
        let result = decide_resync(&config, &state, 0.85, 0.85);
        assert_eq!(result, Some(ResyncReason::RapidDegradation));
    }

    #[test]
    fn test_peak_decays_toward_present() {
        let mut state = RecoveryState::starting_at(0.9);
        for _ in 0..2000 {
            state.observe(0.6, 0.005);
            state.last_coherence = 0.6;
        }
        assert!(
            state.peak_coherence < 0.9 * 0.9,
            "peak {} should have decayed",
            state.peak_coherence
        );
        assert!(state.peak_coherence >= 0.0);
    }

    #[test]
    fn test_stable_counter_resets_on_improvement() {
        let mut state = RecoveryState::starting_at(0.7);
        for _ in 0..4 {
            state.observe(0.7, 0.005);
            state.last_coherence = 0.7;
        }
        assert_eq!(state.stable_count, 4);
        state.observe(0.75, 0.005);
        assert_eq!(state.stable_count, 0);
    }
}
