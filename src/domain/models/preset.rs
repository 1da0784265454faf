//! Goal presets: named configurations for common swarm missions.
//!
//! A preset is keyed by the triple `(Goal, Trait, ScaleSize)`. The goal
//! picks the coherence regime (consensus wants near-total alignment, load
//! distribution wants deliberate scatter), the trait biases the tuning
//! toward stability, speed, efficiency, or resilience, and the scale size
//! applies the same banding as [`SwarmConfig::auto_scale`].

use serde::{Deserialize, Serialize};

use super::config::{RecoveryConfig, SwarmConfig};

// ---------------------------------------------------------------------------
// Goal
// ---------------------------------------------------------------------------

/// What the swarm is synchronizing *for*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    /// Align agents so bursts collapse into shared batches.
    MinimizeApiCalls,
    /// Spread agents apart so work never clumps.
    DistributeLoad,
    /// Drive every agent onto one opinion anchor.
    ReachConsensus,
    /// Hold a steady collective rhythm.
    MaintainRhythm,
    /// Prioritize bouncing back from disruption.
    RecoverFromFailure,
    /// Track a shifting external rhythm.
    AdaptToTraffic,
}

impl Goal {
    /// Stable string name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MinimizeApiCalls => "minimize_api_calls",
            Self::DistributeLoad => "distribute_load",
            Self::ReachConsensus => "reach_consensus",
            Self::MaintainRhythm => "maintain_rhythm",
            Self::RecoverFromFailure => "recover_from_failure",
            Self::AdaptToTraffic => "adapt_to_traffic",
        }
    }

    /// The canonical coherence target for this goal.
    ///
    /// `DistributeLoad` is the only anti-synchronization goal: its low
    /// target engages the de-synchronizing short-circuit in the
    /// adjustment step.
    pub fn target_coherence(self) -> f64 {
        match self {
            Self::MinimizeApiCalls => 0.85,
            Self::DistributeLoad => 0.30,
            Self::ReachConsensus => 0.95,
            Self::MaintainRhythm => 0.75,
            Self::RecoverFromFailure => 0.70,
            Self::AdaptToTraffic => 0.60,
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// The quality the tuning should favor when trade-offs bite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trait {
    /// Favor smooth, low-noise convergence over speed.
    Stability,
    /// Favor fast convergence; accept extra jitter.
    Speed,
    /// Favor low energy spend; accept slower convergence.
    Efficiency,
    /// Favor disruption tolerance; keep recovery triggers eager.
    Resilience,
}

impl Trait {
    /// Stable string name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stability => "stability",
            Self::Speed => "speed",
            Self::Efficiency => "efficiency",
            Self::Resilience => "resilience",
        }
    }
}

// ---------------------------------------------------------------------------
// ScaleSize
// ---------------------------------------------------------------------------

/// Population scale band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleSize {
    /// Fewer than 10 agents.
    Tiny,
    /// 10 to 49 agents.
    Small,
    /// 50 to 249 agents.
    Medium,
    /// 250 to 999 agents.
    Large,
    /// 1000 agents and up.
    Huge,
}

impl ScaleSize {
    /// Band a concrete population size.
    pub fn from_size(n: usize) -> Self {
        match n {
            0..=9 => Self::Tiny,
            10..=49 => Self::Small,
            50..=249 => Self::Medium,
            250..=999 => Self::Large,
            _ => Self::Huge,
        }
    }

    /// A representative population size for the band, used when a preset
    /// is requested before the swarm exists.
    pub fn representative_size(self) -> usize {
        match self {
            Self::Tiny => 5,
            Self::Small => 20,
            Self::Medium => 100,
            Self::Large => 500,
            Self::Huge => 2000,
        }
    }
}

// ---------------------------------------------------------------------------
// preset
// ---------------------------------------------------------------------------

/// Build the fully populated configuration for a preset triple.
pub fn preset(goal: Goal, swarm_trait: Trait, scale: ScaleSize) -> SwarmConfig {
    let mut config = SwarmConfig::auto_scale(scale.representative_size());

    // Goal adjustments pick the coherence regime.
    match goal {
        Goal::MinimizeApiCalls => {
            config.convergence.phase_convergence_goal = 0.90;
        }
        Goal::DistributeLoad => {
            // Anti-synchronization: wider noise, laxer pattern matching.
            config.variation.perturbation_chance = 0.35;
            config.variation.perturbation_magnitude = 0.50;
            config.convergence.pattern_distance_threshold = 0.25;
        }
        Goal::ReachConsensus => {
            config.convergence.phase_convergence_goal = 0.92;
            config.variation.random_walk_magnitude = 0.03;
            config.variation.perturbation_chance = 0.08;
        }
        Goal::MaintainRhythm => {
            config.recovery = Some(RecoveryConfig::for_target(goal.target_coherence()));
        }
        Goal::RecoverFromFailure => {
            let mut recovery = RecoveryConfig::for_target(goal.target_coherence());
            recovery.check_interval_ms = 50;
            recovery.stuck_threshold = 3;
            config.recovery = Some(recovery);
        }
        Goal::AdaptToTraffic => {
            config.strategy.random_exploration = 0.20;
            config.strategy.exploration_bonus_max = 0.40;
        }
    }

    // Trait adjustments bias the trade-offs.
    match swarm_trait {
        Trait::Stability => {
            config.convergence.base_adjustment_scale =
                (config.convergence.base_adjustment_scale * 0.8).max(0.3);
            config.variation.base_range[1] = config.variation.base_range[1].min(0.20);
        }
        Trait::Speed => {
            config.strategy.update_interval_ms = config.strategy.update_interval_ms.max(10) - 5;
            config.convergence.base_adjustment_scale =
                (config.convergence.base_adjustment_scale * 1.2).min(1.0);
        }
        Trait::Efficiency => {
            config.energy.replenish_rate *= 0.5;
            config.strategy.update_interval_ms += 10;
        }
        Trait::Resilience => {
            let target = goal.target_coherence();
            let mut recovery = config
                .recovery
                .unwrap_or_else(|| RecoveryConfig::for_target(target));
            recovery.min_resync_interval_ms = recovery.min_resync_interval_ms.min(300);
            config.recovery = Some(recovery);
            config.resonance.activation_rate = 1.0;
        }
    }

    config
}
