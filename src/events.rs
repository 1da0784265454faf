//! Swarm lifecycle events.
//!
//! A best-effort broadcast stream for observability: the loops publish,
//! subscribers consume at their own pace, and laggards lose old events
//! rather than slowing the swarm down. Nothing in the engine reads these
//! back; they exist for callers, tests, and log pipelines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Buffered events per subscriber before the oldest are dropped.
const EVENT_CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// ResyncReason
// ---------------------------------------------------------------------------

/// Why the recovery loop relaunched synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResyncReason {
    /// Coherence fell below the minimum viable level.
    BelowViable,
    /// Coherence fell below the acceptable margin of the target.
    BelowMargin,
    /// A definite disruption: large drop from the tracked peak.
    LargeDrop,
    /// A small drop from the peak while already below target.
    SmallDropBelowTarget,
    /// Coherence sat flat below the margin for too many checks.
    Stuck,
    /// Rapid degradation between consecutive checks.
    RapidDegradation,
}

impl ResyncReason {
    /// Stable string name for log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BelowViable => "below_viable",
            Self::BelowMargin => "below_margin",
            Self::LargeDrop => "large_drop",
            Self::SmallDropBelowTarget => "small_drop_below_target",
            Self::Stuck => "stuck",
            Self::RapidDegradation => "rapid_degradation",
        }
    }
}

// ---------------------------------------------------------------------------
// SwarmEvent
// ---------------------------------------------------------------------------

/// A timestamped lifecycle event from one swarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SwarmEvent {
    /// The goal-directed loop started (or restarted) chasing a target.
    SyncStarted {
        /// Target coherence after any limit clamp.
        target_coherence: f64,
        /// Iteration budget for this attempt.
        max_iterations: u32,
        /// When the attempt began.
        at: DateTime<Utc>,
    },

    /// The loop switched synchronization strategies.
    StrategySwitched {
        /// Strategy being abandoned.
        from: String,
        /// Strategy taking over.
        to: String,
        /// Tick at which the switch happened.
        tick: u64,
        /// When the switch happened.
        at: DateTime<Utc>,
    },

    /// Stochastic resonance fired to escape a plateau.
    ResonanceInjected {
        /// Number of agents perturbed.
        affected: usize,
        /// Coherence at injection time.
        coherence: f64,
        /// When the injection happened.
        at: DateTime<Utc>,
    },

    /// The achievement test passed.
    Converged {
        /// Final coherence.
        coherence: f64,
        /// Ticks consumed.
        iterations: u32,
        /// When convergence was declared.
        at: DateTime<Utc>,
    },

    /// The iteration budget ran out without convergence.
    SyncFailed {
        /// Ticks consumed.
        iterations: u32,
        /// Coherence at give-up time.
        final_coherence: f64,
        /// When the attempt ended.
        at: DateTime<Utc>,
    },

    /// `disrupt_agents` randomized part of the population.
    Disrupted {
        /// Number of agents whose phase was randomized.
        affected: usize,
        /// When the disruption was applied.
        at: DateTime<Utc>,
    },

    /// The recovery loop relaunched synchronization.
    ResyncLaunched {
        /// Coherence that triggered the relaunch.
        coherence: f64,
        /// Which clause of the resync decision fired.
        reason: ResyncReason,
        /// When the relaunch happened.
        at: DateTime<Utc>,
    },
}

// ---------------------------------------------------------------------------
// SwarmEvents
// ---------------------------------------------------------------------------

/// Broadcast hub for one swarm's events.
#[derive(Debug)]
pub struct SwarmEvents {
    swarm_id: Uuid,
    sender: broadcast::Sender<SwarmEvent>,
}

impl SwarmEvents {
    /// Create a hub for the given swarm.
    pub fn new(swarm_id: Uuid) -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { swarm_id, sender }
    }

    /// The swarm this hub belongs to.
    pub fn swarm_id(&self) -> Uuid {
        self.swarm_id
    }

    /// Open a new subscription. Events published before this call are not
    /// replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<SwarmEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Dropped silently when nobody is listening.
    pub fn publish(&self, event: SwarmEvent) {
        let _ = self.sender.send(event);
    }
}
