//! The autonomous agent: phase, energy, local goal, neighbors, and the
//! negotiation protocol.
//!
//! Agents never dictate to each other. Each one owns its state in atomic
//! cells, watches its neighborhood through [`Agent::update_context`], and
//! negotiates proposed adjustments: a strategy proposes, the decision
//! policy ranks the proposal against holding position, the resource
//! manager funds it, and two random gates (stubbornness, confidence) can
//! still veto. A veto is not an error; it reports as `(maintain, false)`.
//!
//! Neighbor sets hold IDs rather than owning references: the swarm's
//! agent arena is the single owner, and the neighbor graph is free to
//! contain cycles.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::domain::models::action::{Action, ActionKind};
use crate::domain::models::config::SwarmConfig;
use crate::domain::models::pattern::Pattern;
use crate::domain::models::phase;
use crate::domain::ports::{
    ArcBlender, BestBenefitCost, DecisionMaker, GoalBlender, ResourceManager, StrategyContext,
    SyncStrategy, MIN_FUNDING_RATIO,
};

use super::cell::{AtomicDuration, AtomicF64, EnergyStore};

// ---------------------------------------------------------------------------
// AgentId
// ---------------------------------------------------------------------------

/// Opaque agent identifier, unique within a swarm.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(Arc<str>);

impl AgentId {
    /// Wrap an arbitrary identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into().into_boxed_str()))
    }

    /// The identifier the swarm constructor assigns to the agent at
    /// `index`.
    pub fn indexed(index: usize) -> Self {
        Self::new(format!("agent-{index}"))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// LocalContext
// ---------------------------------------------------------------------------

/// What an agent most recently saw in its neighborhood.
#[derive(Debug, Clone, Default)]
pub struct LocalContext {
    /// Order parameter over the neighbors' phases (1.0 for an isolated
    /// agent; a lone oscillator is trivially coherent).
    pub local_coherence: f64,
    /// Neighbor count over the assumed maximum, `[0, 1]`.
    pub density: f64,
    /// Number of neighbors seen at the last refresh.
    pub neighbor_count: usize,
}

// ---------------------------------------------------------------------------
// AgentSeed
// ---------------------------------------------------------------------------

/// Initial values for a new agent, produced by an [`AgentBuilder`].
#[derive(Debug, Clone)]
pub struct AgentSeed {
    /// Starting phase, wrapped on construction.
    pub phase: f64,
    /// Starting oscillation period.
    pub frequency: Duration,
    /// Preferred phase; tension against the global target.
    pub local_goal: f64,
    /// Local-vs-global weighting, `[0, 1]`.
    pub influence: f64,
    /// Rejection probability seed, `[0, 1]`.
    pub stubbornness: f64,
}

/// Builds agents for the swarm constructor. Injectable so tests and
/// callers can seed deliberate formations (opinion clusters, anti-phase
/// pairs).
pub trait AgentBuilder: Send + Sync {
    /// Produce the initial values for the agent at `index`.
    fn build(&self, index: usize, target: &Pattern, rng: &mut dyn RngCore) -> AgentSeed;
}

/// Default builder: uniform random phase and local goal, period jittered
/// ±20% around the target, influence in `[0.3, 0.7]`, stubbornness in
/// `[0, 0.2]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomizedAgentBuilder;

impl AgentBuilder for RandomizedAgentBuilder {
    fn build(&self, _index: usize, target: &Pattern, rng: &mut dyn RngCore) -> AgentSeed {
        let mut uniform = |lo: f64, hi: f64| {
            let draw = (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
            lo + draw * (hi - lo)
        };
        let base_secs = target.frequency.as_secs_f64().max(1e-3);
        AgentSeed {
            phase: uniform(0.0, phase::TAU),
            frequency: Duration::from_secs_f64(base_secs * uniform(0.8, 1.2)),
            local_goal: uniform(0.0, phase::TAU),
            influence: uniform(0.3, 0.7),
            stubbornness: uniform(0.0, 0.2),
        }
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// An autonomous oscillator in the swarm.
pub struct Agent {
    id: AgentId,
    phase: AtomicF64,
    frequency: AtomicDuration,
    local_goal: AtomicF64,
    influence: AtomicF64,
    stubbornness: AtomicF64,
    energy: EnergyStore,
    neighbors: RwLock<HashSet<AgentId>>,
    context: RwLock<LocalContext>,
    strategy: RwLock<Arc<dyn SyncStrategy>>,
    decision_maker: RwLock<Arc<dyn DecisionMaker>>,
    blender: Arc<dyn GoalBlender>,
    rng: Mutex<SmallRng>,
    assumed_max_neighbors: usize,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("phase", &self.phase.load())
            .field("frequency", &self.frequency.load())
            .field("energy", &self.energy.available())
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Assemble an agent from its seed values and collaborators.
    pub fn new(
        id: AgentId,
        seed: AgentSeed,
        config: &SwarmConfig,
        strategy: Arc<dyn SyncStrategy>,
        rng_seed: u64,
    ) -> Self {
        Self {
            id,
            phase: AtomicF64::new(phase::wrap(seed.phase)),
            frequency: AtomicDuration::new(seed.frequency),
            local_goal: AtomicF64::new(phase::wrap(seed.local_goal)),
            influence: AtomicF64::new(seed.influence.clamp(0.0, 1.0)),
            stubbornness: AtomicF64::new(seed.stubbornness.clamp(0.0, 1.0)),
            energy: EnergyStore::full(config.energy.capacity),
            neighbors: RwLock::new(HashSet::new()),
            context: RwLock::new(LocalContext::default()),
            strategy: RwLock::new(strategy),
            decision_maker: RwLock::new(Arc::new(BestBenefitCost)),
            blender: Arc::new(ArcBlender),
            rng: Mutex::new(SmallRng::seed_from_u64(rng_seed)),
            assumed_max_neighbors: config.topology.max_neighbors.max(1),
        }
    }

    // -- identity and state accessors ---------------------------------------

    /// The agent's identifier.
    pub fn id(&self) -> &AgentId {
        &self.id
    }

    /// Current phase, `[0, 2π)`.
    pub fn phase(&self) -> f64 {
        self.phase.load()
    }

    /// Current oscillation period.
    pub fn frequency(&self) -> Duration {
        self.frequency.load()
    }

    /// Energy currently available.
    pub fn energy(&self) -> f64 {
        self.energy.available()
    }

    /// Preferred phase.
    pub fn local_goal(&self) -> f64 {
        self.local_goal.load()
    }

    /// Local-vs-global weighting.
    pub fn influence(&self) -> f64 {
        self.influence.load()
    }

    /// Rejection probability seed.
    pub fn stubbornness(&self) -> f64 {
        self.stubbornness.load()
    }

    /// Snapshot of the last neighborhood observation.
    pub fn local_context(&self) -> LocalContext {
        self.context.read().expect("context lock poisoned").clone()
    }

    // -- mutation surface (loop, tests, chaos) -------------------------------

    /// Set the phase directly; wrapped into canonical range.
    pub fn set_phase(&self, value: f64) {
        self.phase.store(phase::wrap(value));
    }

    /// Shift the phase by `delta` radians; the result is wrapped.
    pub fn shift_phase(&self, delta: f64) {
        self.phase.update(|current| phase::wrap(current + delta));
    }

    /// Set the oscillation period. Non-positive periods are ignored.
    pub fn set_frequency(&self, value: Duration) {
        if !value.is_zero() {
            self.frequency.store(value);
        }
    }

    /// Force the energy balance, clamped into `[0, capacity]`.
    pub fn set_energy(&self, value: f64) {
        self.energy.set(value);
    }

    /// Top the energy reservoir up by `amount`.
    pub fn replenish_energy(&self, amount: f64) {
        self.energy.replenish(amount);
    }

    /// Set the local goal phase; wrapped.
    pub fn set_local_goal(&self, value: f64) {
        self.local_goal.store(phase::wrap(value));
    }

    /// Set the local-vs-global weighting, clamped to `[0, 1]`.
    pub fn set_influence(&self, value: f64) {
        self.influence.store(value.clamp(0.0, 1.0));
    }

    /// Set the rejection probability seed, clamped to `[0, 1]`.
    pub fn set_stubbornness(&self, value: f64) {
        self.stubbornness.store(value.clamp(0.0, 1.0));
    }

    /// Swap the synchronization strategy this agent consults.
    pub fn set_strategy(&self, strategy: Arc<dyn SyncStrategy>) {
        *self.strategy.write().expect("strategy lock poisoned") = strategy;
    }

    /// Swap the decision policy.
    pub fn set_decision_maker(&self, decider: Arc<dyn DecisionMaker>) {
        *self
            .decision_maker
            .write()
            .expect("decision lock poisoned") = decider;
    }

    // -- neighbors -----------------------------------------------------------

    /// Install a neighbor link. Idempotent; symmetry is the topology
    /// builder's responsibility.
    pub fn add_neighbor(&self, id: AgentId) {
        if id != self.id {
            self.neighbors
                .write()
                .expect("neighbor lock poisoned")
                .insert(id);
        }
    }

    /// Snapshot of the neighbor ID set.
    pub fn neighbors(&self) -> HashSet<AgentId> {
        self.neighbors
            .read()
            .expect("neighbor lock poisoned")
            .clone()
    }

    /// Number of neighbors currently linked.
    pub fn neighbor_count(&self) -> usize {
        self.neighbors.read().expect("neighbor lock poisoned").len()
    }

    /// Whether `id` is a neighbor.
    pub fn has_neighbor(&self, id: &AgentId) -> bool {
        self.neighbors
            .read()
            .expect("neighbor lock poisoned")
            .contains(id)
    }

    // -- context -------------------------------------------------------------

    /// Scan the neighborhood and refresh the local context.
    ///
    /// `lookup` resolves a neighbor ID to its current phase; IDs that no
    /// longer resolve are skipped.
    pub fn update_context<F>(&self, lookup: F) -> LocalContext
    where
        F: Fn(&AgentId) -> Option<f64>,
    {
        let neighbor_phases: Vec<f64> = {
            let neighbors = self.neighbors.read().expect("neighbor lock poisoned");
            neighbors.iter().filter_map(|id| lookup(id)).collect()
        };

        let fresh = LocalContext {
            local_coherence: phase::order_parameter(&neighbor_phases),
            density: (neighbor_phases.len() as f64 / self.assumed_max_neighbors as f64).min(1.0),
            neighbor_count: neighbor_phases.len(),
        };
        *self.context.write().expect("context lock poisoned") = fresh.clone();
        fresh
    }

    // -- negotiation ---------------------------------------------------------

    /// Negotiate a proposed adjustment toward `global_goal`.
    ///
    /// Deterministic given the agent's RNG seed. Energy reserved during
    /// negotiation is returned before the result is handed back;
    /// [`Agent::apply_action`] performs the actual debit.
    ///
    /// Returns `(action, accepted)`. Every veto path reports a maintain
    /// action with `accepted = false`: insufficient funding, the
    /// stubbornness gate, or the confidence gate.
    pub fn propose_adjustment<F>(
        &self,
        global_goal: &Pattern,
        tick: u64,
        lookup: F,
    ) -> (Action, bool)
    where
        F: Fn(&AgentId) -> Option<f64>,
    {
        let context = self.update_context(lookup);

        let local_view = Pattern {
            phase: self.local_goal.load(),
            frequency: self.frequency.load(),
            coherence: context.local_coherence,
            amplitude: 1.0,
            stability: context.local_coherence,
        };
        let blended = self
            .blender
            .blend(&local_view, global_goal, self.influence.load());

        let (jitter, stubborn_draw, accept_draw) = {
            let mut rng = self.rng.lock().expect("rng lock poisoned");
            (rng.gen::<f64>(), rng.gen::<f64>(), rng.gen::<f64>())
        };

        let strategy_ctx = StrategyContext {
            phase: self.phase.load(),
            frequency: self.frequency.load(),
            energy: self.energy.available(),
            local_coherence: context.local_coherence,
            density: context.density,
            tick,
            jitter,
        };

        let own_view = Pattern {
            phase: strategy_ctx.phase,
            frequency: strategy_ctx.frequency,
            coherence: context.local_coherence,
            amplitude: 1.0,
            stability: context.local_coherence,
        };

        let strategy = Arc::clone(&self.strategy.read().expect("strategy lock poisoned"));
        let (proposed, strategy_confidence) = strategy.propose(&own_view, &blended, &strategy_ctx);

        // Holding position is worth defending in proportion to how much
        // neighborhood there is to stay aligned with; an isolated agent
        // has nothing to maintain.
        let stability = context.local_coherence * context.density;
        let candidates = [proposed, Action::maintain(stability)];
        let decider = Arc::clone(
            &self
                .decision_maker
                .read()
                .expect("decision lock poisoned"),
        );
        let (chosen, decider_confidence) = decider.decide(&candidates);

        let rejection = Action::maintain(stability);

        // Funding gate: the action must be at least 80% funded.
        let delivered = self.energy.request(chosen.cost);
        self.energy.release(delivered);
        if delivered < chosen.cost * MIN_FUNDING_RATIO {
            return (rejection, false);
        }

        // Stubbornness gate.
        if stubborn_draw < self.stubbornness.load() {
            return (rejection, false);
        }

        // Confidence gate: accept with the better of the two confidences.
        let accept_probability = strategy_confidence.max(decider_confidence);
        if accept_draw >= accept_probability {
            return (rejection, false);
        }

        (chosen, true)
    }

    /// Apply an action to this agent's state.
    ///
    /// Phase-acting kinds add the action's value to the phase (wrapped)
    /// and commit the energy cost; `maintain` only pays the maintenance
    /// cost; unrecognized kinds fail without spending anything. Returns
    /// `(success, energy_consumed)`.
    pub fn apply_action(&self, action: &Action) -> (bool, f64) {
        match &action.kind {
            ActionKind::Maintain => {
                let consumed = self.energy.request(action.cost);
                (true, consumed)
            }
            kind if kind.acts_on_phase() => {
                self.shift_phase(action.value);
                if action.frequency_shift.abs() > 0.001 {
                    let next = self.frequency.load().as_secs_f64() + action.frequency_shift;
                    if next > 0.0 {
                        self.frequency.store(Duration::from_secs_f64(next));
                    }
                }
                let consumed = self.energy.request(action.cost);
                (true, consumed)
            }
            _ => (false, 0.0),
        }
    }
}
