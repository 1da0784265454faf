//! Swarm configuration: pure data, one bundle per swarm.
//!
//! The bundle groups the tunables by the component that reads them:
//! convergence tolerances for the achievement test, coherence thresholds
//! for the adjustment ladder, variation bands for per-agent noise,
//! strategy timing for the selection loop, resonance parameters for
//! plateau escapes, recovery thresholds for continuous operation, plus
//! topology and energy settings for construction.
//!
//! Configuration is immutable once a swarm is built. [`SwarmConfig::validate`]
//! collects *every* violation rather than failing on the first, so a bad
//! config surfaces all of its problems in one constructor error.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ConvergenceConfig
// ---------------------------------------------------------------------------

/// Tolerances and scales for the achievement test and graded application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ConvergenceConfig {
    /// Coherence tolerance for swarms under 10 agents.
    pub tolerance_small: f64,
    /// Coherence tolerance for swarms under 50 agents.
    pub tolerance_medium: f64,
    /// Coherence tolerance for larger swarms.
    pub tolerance_large: f64,
    /// Required phase convergence when the target coherence is high.
    pub phase_convergence_goal: f64,
    /// Pattern distance below which the pattern dimension is satisfied.
    pub pattern_distance_threshold: f64,
    /// Base scale applied to per-agent phase corrections.
    pub base_adjustment_scale: f64,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            tolerance_small: 0.10,
            tolerance_medium: 0.07,
            tolerance_large: 0.05,
            phase_convergence_goal: 0.85,
            pattern_distance_threshold: 0.15,
            base_adjustment_scale: 0.65,
        }
    }
}

impl ConvergenceConfig {
    /// Size-banded coherence tolerance: small swarms fluctuate more and
    /// get a wider band.
    pub fn tolerance_for(&self, n: usize) -> f64 {
        if n < 10 {
            self.tolerance_small
        } else if n < 50 {
            self.tolerance_medium
        } else {
            self.tolerance_large
        }
    }
}

// ---------------------------------------------------------------------------
// ThresholdConfig
// ---------------------------------------------------------------------------

/// Coherence and variance thresholds that gate the adjustment ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ThresholdConfig {
    /// Circular variance above which a high-coherence swarm counts as
    /// synchronized to the wrong anchor.
    pub phase_variance: f64,
    /// Coherence above which perturbation random walks may fire.
    pub moderate_coherence: f64,
    /// Coherence above which the achievement test also demands phase
    /// convergence, and the wrong-anchor escape can trigger.
    pub high_coherence: f64,
    /// Coherence above which the over-synchronization guard throttles
    /// adjustments to every third agent.
    pub very_high_coherence: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            phase_variance: 0.10,
            moderate_coherence: 0.50,
            high_coherence: 0.80,
            very_high_coherence: 0.92,
        }
    }
}

// ---------------------------------------------------------------------------
// VariationConfig
// ---------------------------------------------------------------------------

/// Per-agent noise bands. The variation keeps the swarm off the
/// single-point attractor; without it high-coherence targets collapse
/// into lock-step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct VariationConfig {
    /// `[min, max]` band for the size-dependent variation amplitude.
    pub base_range: [f64; 2],
    /// How much current coherence widens the variation amplitude.
    pub coherence_factor: f64,
    /// Magnitude of the small random walk given to throttled agents.
    pub random_walk_magnitude: f64,
    /// Magnitude of the sub-threshold perturbation walk.
    pub perturbation_magnitude: f64,
    /// Chance a sub-threshold agent receives a perturbation walk instead
    /// of holding still (only above moderate coherence).
    pub perturbation_chance: f64,
}

impl Default for VariationConfig {
    fn default() -> Self {
        Self {
            base_range: [0.05, 0.25],
            coherence_factor: 0.15,
            random_walk_magnitude: 0.05,
            perturbation_magnitude: 0.25,
            perturbation_chance: 0.15,
        }
    }
}

// ---------------------------------------------------------------------------
// StrategyTimingConfig
// ---------------------------------------------------------------------------

/// Loop cadence and strategy-selection tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct StrategyTimingConfig {
    /// Multiplier on the convergence-time factor when sizing the
    /// iteration budget.
    pub max_iterations_factor: f64,
    /// Tick interval of the goal-directed loop, in milliseconds.
    pub update_interval_ms: u64,
    /// Cap on the staleness bonus added to unused strategies' scores.
    pub exploration_bonus_max: f64,
    /// Time for an unused strategy to accrue the full staleness bonus,
    /// in milliseconds.
    pub exploration_time_window_ms: u64,
    /// Weight of the uniform random term in strategy scores; breaks ties
    /// and keeps selection from ossifying.
    pub random_exploration: f64,
}

impl Default for StrategyTimingConfig {
    fn default() -> Self {
        Self {
            max_iterations_factor: 25.0,
            update_interval_ms: 20,
            exploration_bonus_max: 0.30,
            exploration_time_window_ms: 10_000,
            random_exploration: 0.10,
        }
    }
}

impl StrategyTimingConfig {
    /// Tick interval as a [`Duration`].
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms.max(1))
    }

    /// Exploration window as a [`Duration`].
    pub fn exploration_time_window(&self) -> Duration {
        Duration::from_millis(self.exploration_time_window_ms.max(1))
    }
}

// ---------------------------------------------------------------------------
// ResonanceConfig
// ---------------------------------------------------------------------------

/// Stochastic resonance parameters for escaping plateaus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ResonanceConfig {
    /// Width of the uniform phase kick, radians; each kicked agent draws
    /// from `[-magnitude/2, +magnitude/2]`.
    pub noise_magnitude: f64,
    /// Fraction of the population kicked per injection.
    pub affected_agents: f64,
    /// Probability an injection actually fires on a stuck tick.
    pub activation_rate: f64,
}

impl Default for ResonanceConfig {
    fn default() -> Self {
        Self {
            noise_magnitude: 0.80,
            affected_agents: 0.30,
            activation_rate: 0.80,
        }
    }
}

// ---------------------------------------------------------------------------
// RecoveryConfig
// ---------------------------------------------------------------------------

/// Thresholds for the continuous-operation recovery loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RecoveryConfig {
    /// Coherence below which the system counts as non-functional.
    pub minimum_viable_coherence: f64,
    /// Fraction of the target that must be held to stay in monitoring.
    pub target_margin_ratio: f64,
    /// Peak-relative drop that, combined with being below target,
    /// triggers a resync.
    pub small_drop_ratio: f64,
    /// Peak-relative drop that triggers a resync unconditionally.
    pub large_drop_ratio: f64,
    /// Consecutive flat checks (below margin) before a stuck resync.
    pub stuck_threshold: u32,
    /// Cadence of recovery checks, in milliseconds.
    pub check_interval_ms: u64,
    /// Minimum spacing between resync launches, in milliseconds.
    pub min_resync_interval_ms: u64,
    /// Coherence change that counts as measurable improvement and resets
    /// the stuck counter.
    pub improvement_threshold: f64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self::for_target(0.8)
    }
}

impl RecoveryConfig {
    /// Band the recovery thresholds by the target coherence. Ambitious
    /// targets get tight margins; lax targets tolerate wider swings.
    pub fn for_target(target_coherence: f64) -> Self {
        let (minimum_viable_coherence, target_margin_ratio, small_drop_ratio, large_drop_ratio) =
            if target_coherence >= 0.9 {
                (0.5, 0.98, 0.03, 0.08)
            } else if target_coherence >= 0.7 {
                (0.4, 0.95, 0.05, 0.12)
            } else if target_coherence >= 0.5 {
                (0.3, 0.92, 0.08, 0.15)
            } else {
                (0.2, 0.90, 0.10, 0.20)
            };
        Self {
            minimum_viable_coherence,
            target_margin_ratio,
            small_drop_ratio,
            large_drop_ratio,
            stuck_threshold: 5,
            check_interval_ms: 100,
            min_resync_interval_ms: 500,
            improvement_threshold: 0.005,
        }
    }

    /// Check cadence as a [`Duration`].
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms.max(1))
    }

    /// Resync spacing as a [`Duration`].
    pub fn min_resync_interval(&self) -> Duration {
        Duration::from_millis(self.min_resync_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// TopologyConfig
// ---------------------------------------------------------------------------

/// Neighbor-graph construction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct TopologyConfig {
    /// Pairwise connection probability for the probabilistic builder.
    pub connection_probability: f64,
    /// Degree floor enforced by the repair pass.
    pub min_neighbors: usize,
    /// Degree cap for the probabilistic builder.
    pub max_neighbors: usize,
    /// Edge rewiring probability for the small-world builder.
    pub rewire_probability: f64,
    /// Above `connection_optim_threshold` agents, fall back to the
    /// minimal random builder to keep construction linear.
    pub enable_connection_optim: bool,
    /// Population size at which connection optimization kicks in.
    pub connection_optim_threshold: usize,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            connection_probability: 0.15,
            min_neighbors: 2,
            max_neighbors: 12,
            rewire_probability: 0.1,
            enable_connection_optim: false,
            connection_optim_threshold: 10_000,
        }
    }
}

// ---------------------------------------------------------------------------
// EnergyConfig
// ---------------------------------------------------------------------------

/// Agent energy budget. Actions debit it; the trickle keeps long-running
/// continuous swarms from starving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct EnergyConfig {
    /// Energy capacity each agent starts with.
    pub capacity: f64,
    /// Energy replenished per loop tick.
    pub replenish_rate: f64,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            capacity: 100.0,
            replenish_rate: 0.5,
        }
    }
}

// ---------------------------------------------------------------------------
// SwarmConfig
// ---------------------------------------------------------------------------

/// The full per-swarm configuration bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SwarmConfig {
    /// Achievement-test tolerances and adjustment scales.
    pub convergence: ConvergenceConfig,
    /// Coherence/variance thresholds for the adjustment ladder.
    pub thresholds: ThresholdConfig,
    /// Per-agent noise bands.
    pub variation: VariationConfig,
    /// Loop cadence and strategy selection tuning.
    pub strategy: StrategyTimingConfig,
    /// Stochastic resonance parameters.
    pub resonance: ResonanceConfig,
    /// Recovery thresholds. `None` derives a band from the target
    /// coherence when continuous mode starts.
    pub recovery: Option<RecoveryConfig>,
    /// Neighbor-graph construction settings.
    pub topology: TopologyConfig,
    /// Agent energy budget.
    pub energy: EnergyConfig,
    /// Hard cap on constructible swarm size.
    pub max_swarm_size: usize,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            convergence: ConvergenceConfig::default(),
            thresholds: ThresholdConfig::default(),
            variation: VariationConfig::default(),
            strategy: StrategyTimingConfig::default(),
            resonance: ResonanceConfig::default(),
            recovery: None,
            topology: TopologyConfig::default(),
            energy: EnergyConfig::default(),
            max_swarm_size: Self::DEFAULT_MAX_SWARM_SIZE,
        }
    }
}

impl SwarmConfig {
    /// Default cap on swarm size.
    pub const DEFAULT_MAX_SWARM_SIZE: usize = 1_000_000;

    /// A configuration tuned to the population size.
    ///
    /// Small swarms widen the variation band (a handful of agents needs
    /// real scatter to avoid degenerate lock-step); large swarms slow the
    /// tick slightly and enable linear-time topology construction.
    pub fn auto_scale(size: usize) -> Self {
        let mut config = Self::default();
        if size < 10 {
            config.variation.base_range = [0.08, 0.30];
            config.resonance.affected_agents = 0.5;
        } else if size >= 1000 {
            config.strategy.update_interval_ms = 25;
            config.topology.enable_connection_optim = true;
            config.topology.min_neighbors = 3;
        }
        config
    }

    /// Validate every field range, returning **all** violations.
    ///
    /// An empty vector means the configuration is usable.
    #[allow(clippy::too_many_lines)]
    pub fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let mut check = |ok: bool, message: String| {
            if !ok {
                violations.push(message);
            }
        };

        let c = &self.convergence;
        for (name, value) in [
            ("convergence.tolerance_small", c.tolerance_small),
            ("convergence.tolerance_medium", c.tolerance_medium),
            ("convergence.tolerance_large", c.tolerance_large),
        ] {
            check(
                value > 0.0 && value < 1.0,
                format!("{name} must be in (0, 1), got {value}"),
            );
        }
        check(
            c.phase_convergence_goal > 0.0 && c.phase_convergence_goal <= 1.0,
            format!(
                "convergence.phase_convergence_goal must be in (0, 1], got {}",
                c.phase_convergence_goal
            ),
        );
        check(
            c.pattern_distance_threshold > 0.0 && c.pattern_distance_threshold <= 1.0,
            format!(
                "convergence.pattern_distance_threshold must be in (0, 1], got {}",
                c.pattern_distance_threshold
            ),
        );
        check(
            c.base_adjustment_scale > 0.0 && c.base_adjustment_scale <= 2.0,
            format!(
                "convergence.base_adjustment_scale must be in (0, 2], got {}",
                c.base_adjustment_scale
            ),
        );

        let t = &self.thresholds;
        for (name, value) in [
            ("thresholds.phase_variance", t.phase_variance),
            ("thresholds.moderate_coherence", t.moderate_coherence),
            ("thresholds.high_coherence", t.high_coherence),
            ("thresholds.very_high_coherence", t.very_high_coherence),
        ] {
            check(
                value > 0.0 && value < 1.0,
                format!("{name} must be in (0, 1), got {value}"),
            );
        }
        check(
            t.moderate_coherence < t.high_coherence && t.high_coherence < t.very_high_coherence,
            format!(
                "thresholds must order moderate < high < very_high, got {} / {} / {}",
                t.moderate_coherence, t.high_coherence, t.very_high_coherence
            ),
        );

        let v = &self.variation;
        check(
            v.base_range[0] >= 0.0 && v.base_range[1] <= 1.0 && v.base_range[0] <= v.base_range[1],
            format!(
                "variation.base_range must be an ordered pair within [0, 1], got [{}, {}]",
                v.base_range[0], v.base_range[1]
            ),
        );
        check(
            (0.0..=1.0).contains(&v.coherence_factor),
            format!(
                "variation.coherence_factor must be in [0, 1], got {}",
                v.coherence_factor
            ),
        );
        for (name, value) in [
            ("variation.random_walk_magnitude", v.random_walk_magnitude),
            ("variation.perturbation_magnitude", v.perturbation_magnitude),
        ] {
            check(
                (0.0..=std::f64::consts::PI).contains(&value),
                format!("{name} must be in [0, pi], got {value}"),
            );
        }
        check(
            (0.0..=1.0).contains(&v.perturbation_chance),
            format!(
                "variation.perturbation_chance must be in [0, 1], got {}",
                v.perturbation_chance
            ),
        );

        let s = &self.strategy;
        check(
            s.max_iterations_factor > 0.0,
            format!(
                "strategy.max_iterations_factor must be positive, got {}",
                s.max_iterations_factor
            ),
        );
        check(
            s.update_interval_ms >= 1,
            format!(
                "strategy.update_interval_ms must be at least 1, got {}",
                s.update_interval_ms
            ),
        );
        check(
            (0.0..=1.0).contains(&s.exploration_bonus_max),
            format!(
                "strategy.exploration_bonus_max must be in [0, 1], got {}",
                s.exploration_bonus_max
            ),
        );
        check(
            s.exploration_time_window_ms >= 1,
            format!(
                "strategy.exploration_time_window_ms must be at least 1, got {}",
                s.exploration_time_window_ms
            ),
        );
        check(
            (0.0..=1.0).contains(&s.random_exploration),
            format!(
                "strategy.random_exploration must be in [0, 1], got {}",
                s.random_exploration
            ),
        );

        let r = &self.resonance;
        check(
            r.noise_magnitude > 0.0 && r.noise_magnitude <= super::phase::TAU,
            format!(
                "resonance.noise_magnitude must be in (0, 2pi], got {}",
                r.noise_magnitude
            ),
        );
        check(
            r.affected_agents > 0.0 && r.affected_agents <= 1.0,
            format!(
                "resonance.affected_agents must be in (0, 1], got {}",
                r.affected_agents
            ),
        );
        check(
            r.activation_rate > 0.0 && r.activation_rate <= 1.0,
            format!(
                "resonance.activation_rate must be in (0, 1], got {}",
                r.activation_rate
            ),
        );

        if let Some(rec) = &self.recovery {
            for (name, value) in [
                (
                    "recovery.minimum_viable_coherence",
                    rec.minimum_viable_coherence,
                ),
                ("recovery.target_margin_ratio", rec.target_margin_ratio),
                ("recovery.small_drop_ratio", rec.small_drop_ratio),
                ("recovery.large_drop_ratio", rec.large_drop_ratio),
                ("recovery.improvement_threshold", rec.improvement_threshold),
            ] {
                check(
                    value > 0.0 && value <= 1.0,
                    format!("{name} must be in (0, 1], got {value}"),
                );
            }
            check(
                rec.small_drop_ratio <= rec.large_drop_ratio,
                format!(
                    "recovery.small_drop_ratio ({}) must not exceed large_drop_ratio ({})",
                    rec.small_drop_ratio, rec.large_drop_ratio
                ),
            );
            check(
                rec.stuck_threshold >= 1,
                format!(
                    "recovery.stuck_threshold must be at least 1, got {}",
                    rec.stuck_threshold
                ),
            );
            check(
                rec.check_interval_ms >= 1,
                format!(
                    "recovery.check_interval_ms must be at least 1, got {}",
                    rec.check_interval_ms
                ),
            );
        }

        let top = &self.topology;
        check(
            (0.0..=1.0).contains(&top.connection_probability),
            format!(
                "topology.connection_probability must be in [0, 1], got {}",
                top.connection_probability
            ),
        );
        check(
            top.min_neighbors >= 1,
            format!(
                "topology.min_neighbors must be at least 1, got {}",
                top.min_neighbors
            ),
        );
        check(
            top.min_neighbors <= top.max_neighbors,
            format!(
                "topology.min_neighbors ({}) must not exceed max_neighbors ({})",
                top.min_neighbors, top.max_neighbors
            ),
        );
        check(
            (0.0..=1.0).contains(&top.rewire_probability),
            format!(
                "topology.rewire_probability must be in [0, 1], got {}",
                top.rewire_probability
            ),
        );

        let e = &self.energy;
        check(
            e.capacity > 0.0,
            format!("energy.capacity must be positive, got {}", e.capacity),
        );
        check(
            e.replenish_rate >= 0.0,
            format!(
                "energy.replenish_rate must be non-negative, got {}",
                e.replenish_rate
            ),
        );

        check(
            self.max_swarm_size >= 1,
            format!(
                "max_swarm_size must be at least 1, got {}",
                self.max_swarm_size
            ),
        );

        violations
    }
}
