//! Domain models
//!
//! Pure data and math: phases, patterns, actions, limits, configuration,
//! and presets. Nothing here spawns tasks or holds locks; the runtime
//! lives in `swarm` and `services`.

pub mod action;
pub mod config;
pub mod limits;
pub mod pattern;
pub mod phase;
pub mod preset;

pub use action::{Action, ActionKind, MAINTAIN_COST};
pub use config::{
    ConvergenceConfig, EnergyConfig, RecoveryConfig, ResonanceConfig, StrategyTimingConfig,
    SwarmConfig, ThresholdConfig, TopologyConfig, VariationConfig,
};
pub use limits::{
    coherence_limits, convergence_time_factor, validate_coherence_target, CoherenceLimits,
};
pub use pattern::{identify_gaps, pattern_distance, GapKind, Pattern, PatternGap};
pub use preset::{preset, Goal, ScaleSize, Trait};
