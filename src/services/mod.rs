//! Services for the entrain synchronization engine.
//!
//! The runtime half of the crate: the strategy pool, the completion
//! engine, the convergence monitor, the goal-directed loop, and the
//! recovery loop that keeps it running indefinitely.

pub mod completion;
pub mod goal_loop;
pub mod monitor;
pub mod recovery;
pub mod strategies;

pub use completion::{blend_waveforms, Adjustments, PatternCompletion, Template};
pub use goal_loop::{GoalDirectedSync, SyncReport};
pub use monitor::{ConvergenceMonitor, MonitorSample};
pub use recovery::{decide_resync, RecoveryLoop, RecoveryState};
pub use strategies::{
    EnergyAware, FrequencyLock, PhaseNudge, PulseStrategy, StrategyPerformance, StrategyPool,
};
