//! The goal-directed synchronization loop.
//!
//! One engine per swarm. Each tick it measures the population's rhythm,
//! records the distance to target, tests for achievement, reconsiders the
//! strategy in charge, translates pattern gaps into nudges, applies
//! graded per-agent corrections with carefully balanced variation, and —
//! when the monitor reports a plateau — injects stochastic resonance to
//! shake the swarm loose.
//!
//! The application step is deliberately noisy. Pure gradient descent onto
//! the target phase collapses the population into lock-step, which reads
//! as coherence ≈ 1.0 even when the caller asked for 0.85. The per-agent
//! variation band, the sub-threshold perturbation walks, and the
//! over-synchronization throttle hold the swarm at its target instead of
//! overshooting past it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::domain::errors::{SwarmError, SwarmResult};
use crate::domain::models::action::{Action, ActionKind};
use crate::domain::models::config::SwarmConfig;
use crate::domain::models::limits::{
    coherence_limits, convergence_time_factor, validate_coherence_target,
};
use crate::domain::models::pattern::{identify_gaps, pattern_distance, Pattern};
use crate::domain::models::phase;
use crate::domain::ports::{DecisionMaker, SyncStrategy};
use crate::events::{SwarmEvent, SwarmEvents};
use crate::swarm::agent::{Agent, AgentId};

use super::completion::{Adjustments, PatternCompletion};
use super::monitor::ConvergenceMonitor;
use super::strategies::StrategyPool;

/// Hard ceiling on any iteration budget.
const MAX_ITERATION_CAP: u32 = 1000;

/// Fraction of the population consulted through the negotiation protocol
/// each tick.
const NEGOTIATION_FRACTION: f64 = 0.1;

/// Frequency shifts below this (seconds) are ignored as noise.
const MIN_FREQUENCY_SHIFT: f64 = 0.001;

// ---------------------------------------------------------------------------
// SyncReport
// ---------------------------------------------------------------------------

/// What a completed synchronization attempt looked like.
#[derive(Debug, Clone, Copy)]
pub struct SyncReport {
    /// Ticks consumed before the achievement test passed.
    pub iterations: u32,
    /// Coherence at the moment of success.
    pub final_coherence: f64,
    /// Wall time from launch to success.
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// GoalDirectedSync
// ---------------------------------------------------------------------------

/// The per-tick orchestrator driving a swarm toward its target.
pub struct GoalDirectedSync {
    agents: Arc<[Arc<Agent>]>,
    by_id: Arc<HashMap<AgentId, usize>>,
    config: Arc<SwarmConfig>,
    pool: Mutex<StrategyPool>,
    completion: PatternCompletion,
    monitor: Mutex<ConvergenceMonitor>,
    events: Arc<SwarmEvents>,
    rng: Mutex<StdRng>,
    target: RwLock<Pattern>,
    tick: AtomicU64,
}

impl std::fmt::Debug for GoalDirectedSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoalDirectedSync")
            .field("agents", &self.agents.len())
            .field("target", &self.target())
            .finish_non_exhaustive()
    }
}

impl GoalDirectedSync {
    /// Assemble the engine over an existing agent population.
    pub fn new(
        agents: Arc<[Arc<Agent>]>,
        by_id: Arc<HashMap<AgentId, usize>>,
        config: Arc<SwarmConfig>,
        monitor: ConvergenceMonitor,
        events: Arc<SwarmEvents>,
        initial_target: Pattern,
        seed: u64,
    ) -> Self {
        Self {
            agents,
            by_id,
            config,
            pool: Mutex::new(StrategyPool::standard()),
            completion: PatternCompletion::default(),
            monitor: Mutex::new(monitor),
            events,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            target: RwLock::new(initial_target),
            tick: AtomicU64::new(0),
        }
    }

    // -- observation ---------------------------------------------------------

    /// The target currently being chased (after any limit clamp).
    pub fn target(&self) -> Pattern {
        self.target.read().expect("target lock poisoned").clone()
    }

    /// Snapshot every agent's phase.
    pub fn phases(&self) -> Vec<f64> {
        self.agents.iter().map(|a| a.phase()).collect()
    }

    /// Order parameter over the whole population.
    pub fn coherence(&self) -> f64 {
        phase::order_parameter(&self.phases())
    }

    /// Circular variance over the whole population.
    pub fn phase_variance(&self) -> f64 {
        phase::circular_variance(&self.phases())
    }

    /// Measure the population's current pattern: circular mean phase,
    /// arithmetic mean period, order parameter, and a stability reading
    /// of `1 - circular variance`.
    pub fn measure_system_pattern(&self) -> Pattern {
        let phases = self.phases();
        let mean_secs = if self.agents.is_empty() {
            0.0
        } else {
            self.agents
                .iter()
                .map(|a| a.frequency().as_secs_f64())
                .sum::<f64>()
                / self.agents.len() as f64
        };
        Pattern {
            phase: phase::circular_mean(&phases),
            frequency: Duration::from_secs_f64(mean_secs.max(0.0)),
            coherence: phase::order_parameter(&phases),
            amplitude: 1.0,
            stability: 1.0 - phase::circular_variance(&phases),
        }
    }

    /// The completion engine, for template loading.
    pub fn completion(&self) -> &PatternCompletion {
        &self.completion
    }

    /// Name of the strategy currently in charge.
    pub fn current_strategy_name(&self) -> String {
        self.pool.lock().expect("pool lock poisoned").current_name()
    }

    // -- mutation surface ----------------------------------------------------

    /// Install a strategy: registered in the pool, put in charge, and
    /// pushed to every agent's embedded pointer.
    pub fn set_sync_strategy(&self, strategy: Arc<dyn SyncStrategy>) {
        {
            let mut pool = self.pool.lock().expect("pool lock poisoned");
            pool.register(Arc::clone(&strategy));
            pool.set_current(strategy.name());
        }
        for agent in self.agents.iter() {
            agent.set_strategy(Arc::clone(&strategy));
        }
    }

    /// Push a decision policy to every agent.
    pub fn set_decision_maker(&self, decider: Arc<dyn DecisionMaker>) {
        for agent in self.agents.iter() {
            agent.set_decision_maker(Arc::clone(&decider));
        }
    }

    /// Clear the monitor ahead of a fresh attempt. The recovery loop
    /// calls this when it relaunches synchronization.
    pub fn reset_monitor(&self) {
        self.monitor.lock().expect("monitor lock poisoned").reset();
    }

    // -- the loop ------------------------------------------------------------

    /// Drive the swarm toward `target` until the achievement test passes,
    /// the iteration budget runs out, or `token` is cancelled.
    ///
    /// A target coherence above the theoretical limit for this population
    /// is clamped silently; callers wanting a warning ask
    /// [`validate_coherence_target`] first.
    pub async fn achieve(
        &self,
        token: &CancellationToken,
        target: Pattern,
    ) -> SwarmResult<SyncReport> {
        let n = self.agents.len();

        // Clamp impossible coherence targets to physical reality.
        let (clamped_coherence, clamp_warning) = validate_coherence_target(n, target.coherence);
        if let Some(warning) = clamp_warning {
            debug!(target_coherence = target.coherence, "{warning}");
        }
        let target = Pattern {
            phase: phase::wrap(target.phase),
            coherence: clamped_coherence,
            ..target
        };
        *self.target.write().expect("target lock poisoned") = target.clone();

        {
            let mut monitor = self.monitor.lock().expect("monitor lock poisoned");
            monitor.reset();
            monitor.set_target(target.clone());
        }

        let budget = self.config.strategy.max_iterations_factor
            * convergence_time_factor(n, target.coherence);
        let max_iterations = (budget.ceil() as u32).clamp(1, MAX_ITERATION_CAP);

        info!(
            agents = n,
            target_coherence = target.coherence,
            max_iterations,
            "synchronization started"
        );
        self.events.publish(SwarmEvent::SyncStarted {
            target_coherence: target.coherence,
            max_iterations,
            at: Utc::now(),
        });

        let started = Instant::now();
        let mut interval = tokio::time::interval(self.config.strategy.update_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut previous_coherence = self.coherence();

        for iteration in 0..max_iterations {
            tokio::select! {
                () = token.cancelled() => {
                    debug!(iteration, "synchronization cancelled");
                    return Err(SwarmError::Canceled);
                }
                _ = interval.tick() => {}
            }

            let tick = self.tick.fetch_add(1, Ordering::Relaxed);
            let outcome = self.run_tick(tick, iteration, &target, previous_coherence);
            previous_coherence = outcome.coherence;

            if outcome.achieved {
                let report = SyncReport {
                    iterations: iteration + 1,
                    final_coherence: outcome.coherence,
                    elapsed: started.elapsed(),
                };
                info!(
                    iterations = report.iterations,
                    coherence = report.final_coherence,
                    "synchronization achieved"
                );
                self.events.publish(SwarmEvent::Converged {
                    coherence: report.final_coherence,
                    iterations: report.iterations,
                    at: Utc::now(),
                });
                return Ok(report);
            }
        }

        let final_coherence = self.coherence();
        warn!(
            max_iterations,
            final_coherence, "synchronization failed to converge"
        );
        self.events.publish(SwarmEvent::SyncFailed {
            iterations: max_iterations,
            final_coherence,
            at: Utc::now(),
        });
        Err(SwarmError::FailedToConverge {
            iterations: max_iterations,
        })
    }

    /// One full tick: measure, record, test, switch, complete, apply,
    /// escape. Synchronous by design; agent updates within a tick have no
    /// inter-agent dependencies.
    fn run_tick(
        &self,
        tick: u64,
        iteration: u32,
        target: &Pattern,
        previous_coherence: f64,
    ) -> TickOutcome {
        // 1-2. Measure and record.
        let current = self.measure_system_pattern();
        let coherence = current.coherence;
        let distance = pattern_distance(&current, target);
        {
            let mut monitor = self.monitor.lock().expect("monitor lock poisoned");
            monitor.record(Instant::now(), distance, coherence);
        }
        trace!(iteration, coherence, distance, "tick measured");

        // 3. Achievement test. Never declared on a launch's first tick:
        // every launch applies at least one adjustment pass, so a
        // relaunch that starts inside the tolerance band still moves the
        // swarm instead of returning untouched.
        if iteration > 0 && self.is_achieved(&current, target) {
            return TickOutcome {
                achieved: true,
                coherence,
            };
        }

        // 4. Reconsider the strategy in charge.
        let (should_switch, is_stuck) = {
            let monitor = self.monitor.lock().expect("monitor lock poisoned");
            (monitor.should_switch_strategy(), monitor.is_stuck())
        };
        if should_switch {
            self.switch_strategy(tick);
        }

        // Reward bookkeeping for whoever is in charge now.
        {
            let mut pool = self.pool.lock().expect("pool lock poisoned");
            let name = pool.current_name();
            pool.record_reward(&name, coherence - previous_coherence, coherence);
        }

        // 5-6. Identify gaps and complete the pattern.
        let gaps = identify_gaps(&current, target);
        let adjustments = self.completion.complete(&current, target, &gaps);

        // Negotiation: a rotating sample of agents runs the full
        // propose/decide/fund protocol against the global goal.
        self.negotiate_sample(tick, target);

        // 7. Graded application.
        self.apply_adjustments(&current, target, &adjustments);

        // Energy trickle.
        let trickle = self.config.energy.replenish_rate;
        if trickle > 0.0 {
            for agent in self.agents.iter() {
                agent.replenish_energy(trickle);
            }
        }

        // 8. Escape local minima.
        if is_stuck {
            self.inject_resonance(coherence);
        }

        TickOutcome {
            achieved: false,
            coherence,
        }
    }

    // -- achievement ---------------------------------------------------------

    /// The three-clause achievement test with size-banded tolerance.
    fn is_achieved(&self, current: &Pattern, target: &Pattern) -> bool {
        let n = self.agents.len();
        let limits = coherence_limits(n);
        let mut tolerance = self.config.convergence.tolerance_for(n);
        // Targets brushing the practical ceiling get double tolerance;
        // demanding the impossible precisely is how loops run forever.
        if target.coherence >= 0.95 * limits.practical {
            tolerance *= 2.0;
        }

        if current.coherence < target.coherence - tolerance {
            return false;
        }
        if pattern_distance(current, target) >= self.config.convergence.pattern_distance_threshold
        {
            return false;
        }
        if target.coherence >= self.config.thresholds.high_coherence {
            let convergence = phase::phase_convergence(&self.phases(), target.phase);
            if convergence < self.config.convergence.phase_convergence_goal {
                return false;
            }
        }
        true
    }

    // -- strategy switching --------------------------------------------------

    fn switch_strategy(&self, tick: u64) {
        let (from, to, strategy) = {
            let mut pool = self.pool.lock().expect("pool lock poisoned");
            let from = pool.current_name();
            let mut rng = self.rng.lock().expect("rng lock poisoned");
            let strategy = pool.select_next(&self.config.strategy, &mut rng);
            (from, pool.current_name(), strategy)
        };
        if from != to {
            debug!(%from, %to, tick, "strategy switched");
            for agent in self.agents.iter() {
                agent.set_strategy(Arc::clone(&strategy));
            }
            self.events.publish(SwarmEvent::StrategySwitched {
                from,
                to,
                tick,
                at: Utc::now(),
            });
        }
    }

    // -- negotiation ---------------------------------------------------------

    /// Run the agent negotiation protocol over a rotating sample.
    fn negotiate_sample(&self, tick: u64, target: &Pattern) {
        let n = self.agents.len();
        if n == 0 {
            return;
        }
        let sample = ((n as f64 * NEGOTIATION_FRACTION).ceil() as usize).clamp(1, n);
        let start = (tick as usize * sample) % n;

        let agents = Arc::clone(&self.agents);
        let by_id = Arc::clone(&self.by_id);
        let lookup = move |id: &AgentId| by_id.get(id).map(|&index| agents[index].phase());

        for offset in 0..sample {
            let agent = &self.agents[(start + offset) % n];
            let (action, accepted) = agent.propose_adjustment(target, tick, &lookup);
            if accepted {
                agent.apply_action(&action);
            }
        }
    }

    // -- graded application --------------------------------------------------

    /// The adjustment step: special cases first, then the distance
    /// ladder, then per-agent composition with variation and noise.
    fn apply_adjustments(&self, current: &Pattern, target: &Pattern, adjustments: &Adjustments) {
        let n = self.agents.len();
        if n == 0 {
            return;
        }
        let thresholds = &self.config.thresholds;
        let variation_cfg = &self.config.variation;
        let coherence = current.coherence;
        let variance = self.phase_variance();
        let base_scale = self.config.convergence.base_adjustment_scale;

        // Load-distribution mode: the target *wants* incoherence. Kick a
        // fraction of agents apart and skip the alignment pipeline
        // entirely. Never merged into the graded path below.
        if target.coherence < 0.4 && coherence > target.coherence {
            let mut rng = self.rng.lock().expect("rng lock poisoned");
            let fraction = self.config.resonance.affected_agents;
            for agent in self.agents.iter() {
                if rng.gen::<f64>() < fraction {
                    let kick = (rng.gen::<f64>() - 0.5) * 2.0 * std::f64::consts::PI;
                    agent.shift_phase(kick);
                }
            }
            return;
        }

        // Scale selection: wrong-anchor escape first, then the ladder.
        let adjustment_scale =
            if coherence >= thresholds.high_coherence && variance > thresholds.phase_variance {
                // Synchronized to the wrong anchor; pull aggressively.
                base_scale * 1.2
            } else {
                let delta_t = target.coherence - coherence;
                if delta_t <= 0.01 {
                    0.1
                } else if delta_t <= 0.05 {
                    0.2
                } else if delta_t <= 0.1 {
                    0.3
                } else if delta_t <= 0.2 {
                    0.4
                } else {
                    (base_scale * (1.0 - coherence * 0.15)).max(0.4)
                }
            };

        let size_normalized = (n as f64 / 100.0).min(1.0);
        let over_synced =
            coherence > thresholds.very_high_coherence && variance < thresholds.phase_variance;
        let frequency_shift = if adjustments.frequency_shift.abs() > MIN_FREQUENCY_SHIFT {
            adjustments.frequency_shift
        } else {
            0.0
        };

        let mut rng = self.rng.lock().expect("rng lock poisoned");
        for (index, agent) in self.agents.iter().enumerate() {
            let phase_diff = phase::signed_diff(target.phase, agent.phase());

            let variation_band = variation_cfg.base_range[0]
                + (1.0 - size_normalized)
                    * (variation_cfg.base_range[1] - variation_cfg.base_range[0])
                + coherence * variation_cfg.coherence_factor;
            let variation = (rng.gen::<f64>() - 0.5) * variation_band;

            let threshold = 0.01 + coherence * 0.03 + (1.0 - size_normalized) * 0.02;

            // Over-synchronization guard: fully locked swarms get only a
            // third of the agents adjusted per tick, and gently; the rest
            // random-walk so the attractor never becomes a single point.
            let mut scale = adjustment_scale;
            if over_synced {
                if index % 3 != 0 {
                    let walk = (rng.gen::<f64>() - 0.5) * variation_cfg.random_walk_magnitude;
                    agent.shift_phase(walk);
                    continue;
                }
                scale *= 0.2;
            }

            let intended = adjustments.phase_shift * 0.3 + phase_diff * scale;
            if intended.abs() < threshold {
                // Below threshold: hold, or occasionally wander. The
                // wander is what keeps a settled swarm from congealing.
                if coherence > thresholds.moderate_coherence
                    && rng.gen::<f64>() < variation_cfg.perturbation_chance
                {
                    let walk = (rng.gen::<f64>() - 0.5) * variation_cfg.perturbation_magnitude;
                    agent.shift_phase(walk);
                }
                continue;
            }

            let spread = 0.3 + (1.0 - size_normalized) * 0.2;
            let random_factor = 1.0 + (rng.gen::<f64>() - 0.5) * spread;
            let effective = intended * random_factor * (1.0 + variation);

            let action = Action {
                kind: ActionKind::AdjustPhase,
                value: effective,
                cost: 0.1 + effective.abs() * 0.5,
                benefit: 1.0 - phase_diff.abs() / std::f64::consts::PI,
                frequency_shift,
            };
            agent.apply_action(&action);
        }
    }

    // -- stochastic resonance ------------------------------------------------

    /// Kick a random subset of agents with uniform phase noise.
    fn inject_resonance(&self, coherence: f64) {
        let n = self.agents.len();
        if n == 0 {
            return;
        }
        let resonance = &self.config.resonance;

        let mut rng = self.rng.lock().expect("rng lock poisoned");
        if rng.gen::<f64>() >= resonance.activation_rate {
            return;
        }

        let count = ((n as f64 * resonance.affected_agents).ceil() as usize).clamp(1, n);
        let chosen = rand::seq::index::sample(&mut *rng, n, count);
        for index in chosen {
            let kick = (rng.gen::<f64>() - 0.5) * resonance.noise_magnitude;
            self.agents[index].shift_phase(kick);
        }

        debug!(affected = count, coherence, "stochastic resonance injected");
        self.events.publish(SwarmEvent::ResonanceInjected {
            affected: count,
            coherence,
            at: Utc::now(),
        });
    }
}

/// What one tick concluded.
struct TickOutcome {
    achieved: bool,
    coherence: f64,
}
