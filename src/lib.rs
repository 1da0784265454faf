//! Entrain - goal-directed swarm synchronization.
//!
//! A decentralized coordination engine in the style of the Kuramoto model
//! of coupled oscillators: a population of autonomous agents, each owning
//! its phase, energy, and local goal, converges on a shared phase target
//! through purely local interactions. Callers pick a population size, a
//! target (phase, frequency, coherence), optionally a goal preset, and
//! run the swarm — the global coherence metric emerges.
//!
//! ```no_run
//! use std::f64::consts::PI;
//! use std::time::Duration;
//!
//! use entrain::{Pattern, Swarm};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), entrain::SwarmError> {
//! let swarm = Swarm::new(50, Pattern::target(PI, Duration::from_millis(100), 0.7))?;
//! let token = CancellationToken::new();
//! swarm.run(&token).await?;
//! assert!(swarm.measure_coherence() >= 0.6);
//! # Ok(())
//! # }
//! ```
//!
//! Continuous operation (`Swarm::run_continuous`) keeps the target held
//! across disruptions: the recovery loop watches coherence, detects
//! drops, and relaunches synchronization until the caller cancels.

pub mod domain;
pub mod events;
pub mod infrastructure;
pub mod services;
pub mod swarm;

// Re-export the surface most callers touch.
pub use domain::errors::{SwarmError, SwarmResult};
pub use domain::models::{
    coherence_limits, identify_gaps, pattern_distance, preset, validate_coherence_target, GapKind,
    Goal, Pattern, PatternGap, RecoveryConfig, ScaleSize, SwarmConfig, Trait,
};
pub use events::{ResyncReason, SwarmEvent};
pub use services::{ConvergenceMonitor, GoalDirectedSync, RecoveryLoop, StrategyPool, Template};
pub use swarm::{
    Agent, AgentBuilder, AgentId, AgentSeed, ConvergenceOutcome, Swarm, SwarmOptions,
    TopologyBuilder,
};
