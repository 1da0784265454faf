//! Dispatch seams for swappable behavior.
//!
//! Each seam is a single-method trait so callers can inject alternatives
//! at runtime: synchronization strategies are looked up by name in the
//! strategy pool, decision policies rank candidate actions, and goal
//! blenders mix an agent's local preference with the global target.
//! Resource managers gate action energy. Defaults for the pure seams live
//! here; the stateful default energy store lives with the agent runtime.

use std::time::Duration;

use super::models::action::{Action, MAINTAIN_COST};
use super::models::pattern::Pattern;
use super::models::phase;

// ---------------------------------------------------------------------------
// SyncStrategy
// ---------------------------------------------------------------------------

/// Per-agent view handed to a strategy when it proposes an action.
#[derive(Debug, Clone)]
pub struct StrategyContext {
    /// The agent's current phase.
    pub phase: f64,
    /// The agent's current oscillation period.
    pub frequency: Duration,
    /// Energy the agent has available.
    pub energy: f64,
    /// Order parameter over the agent's neighborhood.
    pub local_coherence: f64,
    /// Neighbor count over the assumed maximum, `[0, 1]`.
    pub density: f64,
    /// Global loop tick, for periodic strategies.
    pub tick: u64,
    /// Uniform draw in `[0, 1)` supplied by the caller so strategies stay
    /// deterministic under an injected seed.
    pub jitter: f64,
}

/// A named rule translating (current, target, context) into a proposed
/// action with a confidence in `[0, 1]`.
pub trait SyncStrategy: Send + Sync {
    /// Stable name used for pool lookup and performance records.
    fn name(&self) -> &str;

    /// Propose an action for one agent.
    fn propose(&self, current: &Pattern, target: &Pattern, ctx: &StrategyContext)
        -> (Action, f64);
}

// ---------------------------------------------------------------------------
// DecisionMaker
// ---------------------------------------------------------------------------

/// Policy that picks among candidate actions and reports a confidence.
pub trait DecisionMaker: Send + Sync {
    /// Choose one of `candidates`. Implementations must handle an empty
    /// slice by returning a maintain action.
    fn decide(&self, candidates: &[Action]) -> (Action, f64);
}

/// Default decision policy: best benefit-to-cost ratio.
///
/// Costs below the maintenance floor are treated as the floor so
/// near-free actions can't win on ratio alone; negative-benefit
/// candidates rank by least-negative score. Confidence is the winning
/// score clamped to `[0, 1]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BestBenefitCost;

impl DecisionMaker for BestBenefitCost {
    fn decide(&self, candidates: &[Action]) -> (Action, f64) {
        let best = candidates.iter().max_by(|a, b| {
            a.score()
                .partial_cmp(&b.score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        match best {
            Some(action) => (action.clone(), action.score().clamp(0.0, 1.0)),
            None => (Action::maintain(0.0), 0.0),
        }
    }
}

// ---------------------------------------------------------------------------
// GoalBlender
// ---------------------------------------------------------------------------

/// Mixes an agent's local goal with the global target.
pub trait GoalBlender: Send + Sync {
    /// Blend `local` and `global` with `influence` weighting the local
    /// side (`influence = 1` ignores the global goal entirely).
    fn blend(&self, local: &Pattern, global: &Pattern, influence: f64) -> Pattern;
}

/// Default blender: phase along the shortest arc, coherence linearly,
/// frequency taken from the local state.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArcBlender;

impl GoalBlender for ArcBlender {
    fn blend(&self, local: &Pattern, global: &Pattern, influence: f64) -> Pattern {
        let influence = influence.clamp(0.0, 1.0);
        Pattern {
            phase: phase::lerp_arc(global.phase, local.phase, influence),
            frequency: local.frequency,
            coherence: global.coherence * (1.0 - influence) + local.coherence * influence,
            amplitude: global.amplitude,
            stability: global.stability,
        }
    }
}

// ---------------------------------------------------------------------------
// ResourceManager
// ---------------------------------------------------------------------------

/// Gates the energy an agent can spend on actions.
///
/// `request` may deliver less than asked; the agent treats anything under
/// 80% of an action's cost as a refusal and falls back to maintaining.
pub trait ResourceManager: Send + Sync {
    /// Reserve up to `amount` energy, returning what was delivered.
    fn request(&self, amount: f64) -> f64;

    /// Return previously reserved energy that was not committed.
    fn release(&self, amount: f64);

    /// Add energy from outside (tick trickle or explicit top-up), capped
    /// at capacity.
    fn replenish(&self, amount: f64);

    /// Energy currently available.
    fn available(&self) -> f64;
}

/// Fraction of an action's cost that must be delivered for the action to
/// proceed.
pub const MIN_FUNDING_RATIO: f64 = 0.8;

/// Floor applied when ranking actions by cost, re-exported beside the
/// decision policy that uses it.
pub const COST_FLOOR: f64 = MAINTAIN_COST;
