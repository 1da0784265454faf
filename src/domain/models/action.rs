//! Agent actions: the currency of the negotiation protocol.
//!
//! Strategies propose an [`Action`]; the agent's decision policy weighs it
//! against the always-available `Maintain` fallback; the resource manager
//! funds it; [`crate::swarm::Agent::apply_action`] commits it. Cost is
//! denominated in agent energy, benefit in the same dimensionless unit the
//! decision policy ranks by.

use serde::{Deserialize, Serialize};

/// Baseline cost attributed to any action when ranking benefit/cost
/// ratios, and the cost of holding position for a tick.
pub const MAINTAIN_COST: f64 = 0.1;

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

/// The kinds of action an agent can take on its own state.
///
/// All phase-acting kinds add the action's `value` (radians) to the
/// agent's phase. `Maintain` holds position for the maintenance cost.
/// `Custom` kinds exist so external strategies can label experiments; the
/// agent rejects them without spending energy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Direct graded phase correction from the goal-directed loop.
    AdjustPhase,
    /// Strategy-proposed phase step toward the blended goal.
    PhaseNudge,
    /// Phase step taken while pulling the oscillation period toward the
    /// target; the period change rides in the action's frequency shift.
    FrequencyLock,
    /// Low-cost, zero-magnitude step emitted when energy is scarce.
    EnergySave,
    /// Large periodic kick from the pulse strategy.
    Pulse,
    /// Hold position; consumes only the maintenance cost.
    Maintain,
    /// Unrecognized kind from an external strategy. Never applied.
    Custom(String),
}

impl ActionKind {
    /// Stable name for log fields and strategy bookkeeping.
    pub fn name(&self) -> &str {
        match self {
            Self::AdjustPhase => "adjust_phase",
            Self::PhaseNudge => "phase_nudge",
            Self::FrequencyLock => "frequency_lock",
            Self::EnergySave => "energy_save",
            Self::Pulse => "pulse",
            Self::Maintain => "maintain",
            Self::Custom(name) => name.as_str(),
        }
    }

    /// Whether applying this kind moves the agent's phase.
    pub fn acts_on_phase(&self) -> bool {
        matches!(
            self,
            Self::AdjustPhase
                | Self::PhaseNudge
                | Self::FrequencyLock
                | Self::EnergySave
                | Self::Pulse
        )
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// A concrete proposed adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// What the action does when applied.
    pub kind: ActionKind,
    /// Phase delta in radians for phase-acting kinds; ignored otherwise.
    pub value: f64,
    /// Energy the action costs to apply.
    pub cost: f64,
    /// Expected payoff used by the decision policy.
    pub benefit: f64,
    /// Signed oscillation-period shift in seconds. Only `FrequencyLock`
    /// proposals carry a non-zero shift.
    pub frequency_shift: f64,
}

impl Action {
    /// A hold-position action with the given local-stability benefit.
    pub fn maintain(benefit: f64) -> Self {
        Self {
            kind: ActionKind::Maintain,
            value: 0.0,
            cost: MAINTAIN_COST,
            benefit,
            frequency_shift: 0.0,
        }
    }

    /// A phase-acting action with zero frequency shift.
    pub fn phase(kind: ActionKind, value: f64, cost: f64, benefit: f64) -> Self {
        Self {
            kind,
            value,
            cost,
            benefit,
            frequency_shift: 0.0,
        }
    }

    /// Benefit per unit cost, flooring cost at [`MAINTAIN_COST`] so
    /// near-free actions don't dominate on ratio alone.
    pub fn score(&self) -> f64 {
        self.benefit / self.cost.max(MAINTAIN_COST)
    }
}
