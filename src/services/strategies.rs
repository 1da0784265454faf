//! The synchronization strategy pool.
//!
//! Five named strategies ship by default, from gentle phase nudges to
//! periodic pulse kicks. The pool tracks a performance record per
//! strategy (attempts, successes, accumulated reward) and implements the
//! selection rule the goal-directed loop invokes when the monitor reports
//! no meaningful improvement: score each strategy by its success rate
//! plus a staleness bonus plus a small random exploration term, and take
//! the argmax.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::Rng;

use crate::domain::models::action::{Action, ActionKind};
use crate::domain::models::config::StrategyTimingConfig;
use crate::domain::models::pattern::Pattern;
use crate::domain::models::phase;
use crate::domain::ports::{StrategyContext, SyncStrategy};

// ---------------------------------------------------------------------------
// PhaseNudge
// ---------------------------------------------------------------------------

/// Adjust phase by `rate` of the shortest arc toward the target.
#[derive(Debug, Clone, Copy)]
pub struct PhaseNudge {
    rate: f64,
    name: &'static str,
}

impl PhaseNudge {
    /// The default gentle nudge.
    pub fn new(rate: f64) -> Self {
        Self {
            rate,
            name: "phase_nudge",
        }
    }

    /// The aggressive variant (rate ≈ 0.7) under its own pool name.
    pub fn aggressive() -> Self {
        Self {
            rate: 0.7,
            name: "phase_nudge_aggressive",
        }
    }
}

impl SyncStrategy for PhaseNudge {
    fn name(&self) -> &str {
        self.name
    }

    fn propose(
        &self,
        current: &Pattern,
        target: &Pattern,
        _ctx: &StrategyContext,
    ) -> (Action, f64) {
        let arc = phase::signed_diff(target.phase, current.phase);
        let value = arc * self.rate;
        let benefit = 1.0 - arc.abs() / std::f64::consts::PI;
        let action = Action::phase(
            ActionKind::PhaseNudge,
            value,
            0.1 + value.abs() * 1.5,
            benefit,
        );
        (action, benefit.clamp(0.0, 1.0))
    }
}

// ---------------------------------------------------------------------------
// FrequencyLock
// ---------------------------------------------------------------------------

/// Pull the oscillation period toward the target; phase untouched.
#[derive(Debug, Clone, Copy)]
pub struct FrequencyLock {
    rate: f64,
}

impl FrequencyLock {
    /// Lock at the given rate per proposal.
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }
}

impl SyncStrategy for FrequencyLock {
    fn name(&self) -> &str {
        "frequency_lock"
    }

    fn propose(
        &self,
        current: &Pattern,
        target: &Pattern,
        _ctx: &StrategyContext,
    ) -> (Action, f64) {
        let current_secs = current.frequency.as_secs_f64();
        let target_secs = target.frequency.as_secs_f64();
        let shift = (target_secs - current_secs) * self.rate;
        let relative_gap = if target_secs.max(current_secs) > 0.0 {
            (target_secs - current_secs).abs() / target_secs.max(current_secs)
        } else {
            0.0
        };
        let benefit = 1.0 - relative_gap;
        let action = Action {
            kind: ActionKind::FrequencyLock,
            value: 0.0,
            cost: 0.1 + relative_gap,
            benefit,
            frequency_shift: shift,
        };
        (action, benefit.clamp(0.0, 1.0))
    }
}

// ---------------------------------------------------------------------------
// EnergyAware
// ---------------------------------------------------------------------------

/// Conserve when the tank runs low; otherwise defer to a nudge.
#[derive(Debug, Clone, Copy)]
pub struct EnergyAware {
    threshold: f64,
    fallback: PhaseNudge,
}

impl EnergyAware {
    /// Conserve below `threshold` energy.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            fallback: PhaseNudge::new(0.3),
        }
    }
}

impl SyncStrategy for EnergyAware {
    fn name(&self) -> &str {
        "energy_aware"
    }

    fn propose(&self, current: &Pattern, target: &Pattern, ctx: &StrategyContext) -> (Action, f64) {
        if ctx.energy < self.threshold {
            let action = Action {
                kind: ActionKind::EnergySave,
                value: 0.0,
                cost: 0.05,
                benefit: 0.4,
                frequency_shift: 0.0,
            };
            return (action, 0.9);
        }
        self.fallback.propose(current, target, ctx)
    }
}

// ---------------------------------------------------------------------------
// PulseStrategy
// ---------------------------------------------------------------------------

/// Large-amplitude kicks on a fixed tick period; maintains in between.
#[derive(Debug, Clone, Copy)]
pub struct PulseStrategy {
    period: u64,
    strength: f64,
}

impl PulseStrategy {
    /// Kick every `period` ticks with the given strength multiplier.
    pub fn new(period: u64, strength: f64) -> Self {
        Self {
            period: period.max(1),
            strength,
        }
    }
}

impl SyncStrategy for PulseStrategy {
    fn name(&self) -> &str {
        "pulse"
    }

    fn propose(&self, current: &Pattern, target: &Pattern, ctx: &StrategyContext) -> (Action, f64) {
        if ctx.tick % self.period != 0 {
            return (Action::maintain(ctx.local_coherence), 0.3);
        }
        let arc = phase::signed_diff(target.phase, current.phase);
        let value = arc * self.strength;
        let action = Action::phase(ActionKind::Pulse, value, 0.2 + value.abs() * 2.0, 0.8);
        (action, 0.9)
    }
}

// ---------------------------------------------------------------------------
// StrategyPerformance
// ---------------------------------------------------------------------------

/// Per-strategy bookkeeping the selection rule reads.
#[derive(Debug, Clone, Default)]
pub struct StrategyPerformance {
    /// Times the strategy was put in charge.
    pub attempts: u64,
    /// Attempts that ended in the achievement test passing.
    pub successes: u64,
    /// Accumulated per-tick coherence gains while in charge.
    pub total_reward: f64,
    /// When the strategy last held the reins.
    pub last_used: Option<Instant>,
    /// Exponential moving average of coherence while in charge.
    pub avg_convergence: f64,
}

impl StrategyPerformance {
    /// Observed success rate; optimistic 0.5 prior before any attempts.
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.5
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}

// ---------------------------------------------------------------------------
// StrategyPool
// ---------------------------------------------------------------------------

/// The named strategy registry plus performance records.
pub struct StrategyPool {
    strategies: Vec<Arc<dyn SyncStrategy>>,
    by_name: HashMap<String, usize>,
    performance: HashMap<String, StrategyPerformance>,
    current: usize,
}

impl std::fmt::Debug for StrategyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyPool")
            .field("strategies", &self.names())
            .field("current", &self.current_name())
            .finish_non_exhaustive()
    }
}

impl StrategyPool {
    /// The default pool: both nudges, frequency lock, energy awareness,
    /// and the pulse. `phase_nudge` starts in charge.
    pub fn standard() -> Self {
        let mut pool = Self {
            strategies: Vec::new(),
            by_name: HashMap::new(),
            performance: HashMap::new(),
            current: 0,
        };
        pool.register(Arc::new(PhaseNudge::new(0.35)));
        pool.register(Arc::new(PhaseNudge::aggressive()));
        pool.register(Arc::new(FrequencyLock::new(0.5)));
        pool.register(Arc::new(EnergyAware::new(10.0)));
        pool.register(Arc::new(PulseStrategy::new(8, 1.1)));
        pool
    }

    /// Add a strategy (or replace one with the same name).
    pub fn register(&mut self, strategy: Arc<dyn SyncStrategy>) {
        let name = strategy.name().to_string();
        if let Some(&index) = self.by_name.get(&name) {
            self.strategies[index] = strategy;
        } else {
            self.by_name.insert(name.clone(), self.strategies.len());
            self.strategies.push(strategy);
        }
        self.performance.entry(name).or_default();
    }

    /// Registered strategy names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.strategies
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    /// The strategy currently in charge.
    pub fn current(&self) -> Arc<dyn SyncStrategy> {
        Arc::clone(&self.strategies[self.current])
    }

    /// Name of the strategy currently in charge.
    pub fn current_name(&self) -> String {
        self.strategies[self.current].name().to_string()
    }

    /// Put a named strategy in charge. Returns it if present.
    pub fn set_current(&mut self, name: &str) -> Option<Arc<dyn SyncStrategy>> {
        let index = *self.by_name.get(name)?;
        self.current = index;
        self.touch(name);
        Some(self.current())
    }

    /// Read-only view of a strategy's record.
    pub fn performance(&self, name: &str) -> Option<&StrategyPerformance> {
        self.performance.get(name)
    }

    /// Record that the named strategy was given a shot.
    pub fn record_attempt(&mut self, name: &str) {
        let record = self.performance.entry(name.to_string()).or_default();
        record.attempts += 1;
    }

    /// Record that the named strategy was in charge when the swarm
    /// converged.
    pub fn record_success(&mut self, name: &str) {
        let record = self.performance.entry(name.to_string()).or_default();
        record.successes += 1;
    }

    /// Feed the per-tick reward signal: positive coherence deltas
    /// accumulate, and the coherence EMA tracks what the strategy holds.
    pub fn record_reward(&mut self, name: &str, coherence_delta: f64, coherence: f64) {
        let record = self.performance.entry(name.to_string()).or_default();
        record.total_reward += coherence_delta.max(0.0);
        record.avg_convergence = if record.avg_convergence == 0.0 {
            coherence
        } else {
            record.avg_convergence * 0.9 + coherence * 0.1
        };
    }

    fn touch(&mut self, name: &str) {
        let record = self.performance.entry(name.to_string()).or_default();
        record.last_used = Some(Instant::now());
    }

    /// Select the next strategy when the monitor demands a switch.
    ///
    /// The outgoing strategy is charged an attempt. Each candidate scores
    /// `success_rate + staleness_bonus + U(0,1) · random_exploration`,
    /// where the staleness bonus is `min(idle / window, bonus_max)`; the
    /// argmax takes over. Returns the new current strategy.
    pub fn select_next(
        &mut self,
        timing: &StrategyTimingConfig,
        rng: &mut StdRng,
    ) -> Arc<dyn SyncStrategy> {
        let outgoing = self.current_name();
        self.record_attempt(&outgoing);

        let now = Instant::now();
        let window = timing.exploration_time_window().as_secs_f64();

        let mut best_index = self.current;
        let mut best_score = f64::NEG_INFINITY;
        for (index, strategy) in self.strategies.iter().enumerate() {
            let record = self
                .performance
                .get(strategy.name())
                .cloned()
                .unwrap_or_default();
            let staleness = record.last_used.map_or(f64::INFINITY, |used| {
                now.duration_since(used).as_secs_f64()
            });
            let bonus = if window > 0.0 {
                (staleness / window).min(timing.exploration_bonus_max)
            } else {
                timing.exploration_bonus_max
            };
            let score =
                record.success_rate() + bonus + rng.gen::<f64>() * timing.random_exploration;
            if score > best_score {
                best_score = score;
                best_index = index;
            }
        }

        self.current = best_index;
        let name = self.current_name();
        self.touch(&name);
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::f64::consts::PI;
    use std::time::Duration;

    fn ctx(tick: u64) -> StrategyContext {
        StrategyContext {
            phase: 0.0,
            frequency: Duration::from_millis(100),
            energy: 50.0,
            local_coherence: 0.5,
            density: 0.5,
            tick,
            jitter: 0.5,
        }
    }

    fn patterns(current_phase: f64, target_phase: f64) -> (Pattern, Pattern) {
        (
            Pattern::target(current_phase, Duration::from_millis(100), 0.5),
            Pattern::target(target_phase, Duration::from_millis(100), 0.8),
        )
    }

    #[test]
    fn test_phase_nudge_moves_toward_target() {
        let (current, target) = patterns(0.0, 1.0);
        let (action, confidence) = PhaseNudge::new(0.5).propose(&current, &target, &ctx(0));
        assert_eq!(action.kind, ActionKind::PhaseNudge);
        assert!((action.value - 0.5).abs() < 1e-9);
        assert!(confidence > 0.5);
    }

    #[test]
    fn test_phase_nudge_takes_short_way_around() {
        let (current, target) = patterns(0.2, phase::TAU - 0.2);
        let (action, _) = PhaseNudge::new(1.0).propose(&current, &target, &ctx(0));
        // Short way is backwards through zero, not +5.88 forward.
        assert!(action.value < 0.0);
        assert!(action.value.abs() < 1.0);
    }

    #[test]
    fn test_aggressive_nudge_is_larger() {
        let (current, target) = patterns(0.0, 2.0);
        let (gentle, _) = PhaseNudge::new(0.35).propose(&current, &target, &ctx(0));
        let (aggressive, _) = PhaseNudge::aggressive().propose(&current, &target, &ctx(0));
        assert!(aggressive.value.abs() > gentle.value.abs());
        assert_eq!(PhaseNudge::aggressive().name(), "phase_nudge_aggressive");
    }

    #[test]
    fn test_frequency_lock_leaves_phase_alone() {
        let current = Pattern::target(0.0, Duration::from_millis(200), 0.5);
        let target = Pattern::target(PI, Duration::from_millis(100), 0.8);
        let (action, _) = FrequencyLock::new(0.5).propose(&current, &target, &ctx(0));
        assert_eq!(action.kind, ActionKind::FrequencyLock);
        assert_eq!(action.value, 0.0);
        // Pulling 200ms toward 100ms at rate 0.5: shift of -50ms.
        assert!((action.frequency_shift + 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_energy_aware_conserves_when_low() {
        let (current, target) = patterns(0.0, 1.0);
        let strategy = EnergyAware::new(10.0);

        let mut starving = ctx(0);
        starving.energy = 3.0;
        let (action, confidence) = strategy.propose(&current, &target, &starving);
        assert_eq!(action.kind, ActionKind::EnergySave);
        assert_eq!(action.value, 0.0);
        assert!(confidence > 0.8);

        let (action, _) = strategy.propose(&current, &target, &ctx(0));
        assert_eq!(action.kind, ActionKind::PhaseNudge);
    }

    #[test]
    fn test_pulse_fires_on_period() {
        let (current, target) = patterns(0.0, 1.5);
        let strategy = PulseStrategy::new(4, 1.2);

        let (kick, _) = strategy.propose(&current, &target, &ctx(8));
        assert_eq!(kick.kind, ActionKind::Pulse);
        assert!(kick.value.abs() > 1.5);

        let (idle, confidence) = strategy.propose(&current, &target, &ctx(9));
        assert_eq!(idle.kind, ActionKind::Maintain);
        assert!(confidence < 0.5);
    }

    #[test]
    fn test_standard_pool_contents() {
        let pool = StrategyPool::standard();
        let names = pool.names();
        for expected in [
            "phase_nudge",
            "phase_nudge_aggressive",
            "frequency_lock",
            "energy_aware",
            "pulse",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
        assert_eq!(pool.current_name(), "phase_nudge");
    }

    #[test]
    fn test_register_replaces_by_name() {
        let mut pool = StrategyPool::standard();
        let count = pool.names().len();
        pool.register(Arc::new(PhaseNudge::new(0.9)));
        assert_eq!(pool.names().len(), count);
    }

    #[test]
    fn test_select_next_charges_outgoing_attempt() {
        let mut pool = StrategyPool::standard();
        let outgoing = pool.current_name();
        let mut rng = StdRng::seed_from_u64(11);
        pool.select_next(&StrategyTimingConfig::default(), &mut rng);
        assert_eq!(pool.performance(&outgoing).unwrap().attempts, 1);
    }

    #[test]
    fn test_select_next_prefers_proven_winner() {
        let mut pool = StrategyPool::standard();
        // Make one strategy overwhelmingly successful and everything else
        // a known failure, with no staleness advantage anywhere.
        for name in pool.names() {
            for _ in 0..20 {
                pool.record_attempt(&name);
            }
            pool.set_current(&name);
        }
        for _ in 0..20 {
            pool.record_success("frequency_lock");
        }
        let timing = StrategyTimingConfig {
            random_exploration: 0.01,
            exploration_bonus_max: 0.01,
            ..StrategyTimingConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(12);
        let chosen = pool.select_next(&timing, &mut rng);
        assert_eq!(chosen.name(), "frequency_lock");
    }

    #[test]
    fn test_success_rate_prior() {
        let record = StrategyPerformance::default();
        assert!((record.success_rate() - 0.5).abs() < 1e-12);
    }
}
