//! The swarm container: agent arena, topology, and the public surface.
//!
//! A [`Swarm`] owns its agent population for life. Construction validates
//! everything up front (size, target, configuration — reporting *every*
//! offending field) and wires the neighbor graph; nothing is left half
//! built on failure. After construction the population is append-free and
//! the configuration immutable; all further change flows through the
//! goal-directed loop, the recovery loop, or the explicit mutation
//! surface (`disrupt_agents`, per-agent setters).

pub mod agent;
pub mod cell;
pub mod topology;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::domain::errors::{SwarmError, SwarmResult};
use crate::domain::models::config::{RecoveryConfig, SwarmConfig};
use crate::domain::models::limits::validate_coherence_target;
use crate::domain::models::pattern::Pattern;
use crate::domain::models::phase;
use crate::domain::ports::{DecisionMaker, SyncStrategy};
use crate::events::{SwarmEvent, SwarmEvents};
use crate::services::completion::Template;
use crate::services::goal_loop::GoalDirectedSync;
use crate::services::monitor::ConvergenceMonitor;
use crate::services::recovery::RecoveryLoop;
use crate::services::strategies::PhaseNudge;

pub use agent::{Agent, AgentBuilder, AgentId, AgentSeed, LocalContext, RandomizedAgentBuilder};
pub use cell::{AtomicDuration, AtomicF64, EnergyStore};
pub use topology::{
    auto as auto_topology, FullMeshTopology, MinimalRandomTopology, ProbabilisticTopology,
    SmallWorldTopology, TopologyBuilder,
};

// ---------------------------------------------------------------------------
// SwarmOptions
// ---------------------------------------------------------------------------

/// Optional replacements applied by the constructor before validation.
#[derive(Default)]
pub struct SwarmOptions {
    /// Replace the auto-scaled configuration.
    pub config: Option<SwarmConfig>,
    /// Replace the size-selected topology builder.
    pub topology: Option<Box<dyn TopologyBuilder>>,
    /// Replace the randomized agent builder.
    pub agent_builder: Option<Box<dyn AgentBuilder>>,
    /// Replace the default convergence monitor (window, thresholds).
    pub monitor: Option<ConvergenceMonitor>,
    /// Replace the target-banded recovery thresholds.
    pub recovery: Option<RecoveryConfig>,
    /// Fix the RNG seed for a fully deterministic swarm.
    pub seed: Option<u64>,
}

impl std::fmt::Debug for SwarmOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwarmOptions")
            .field("config", &self.config.is_some())
            .field("topology", &self.topology.is_some())
            .field("agent_builder", &self.agent_builder.is_some())
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ConvergenceOutcome
// ---------------------------------------------------------------------------

/// Snapshot of the most recent `run` attempt.
#[derive(Debug, Clone, Copy)]
pub struct ConvergenceOutcome {
    /// Whether the achievement test passed.
    pub converged: bool,
    /// Ticks consumed.
    pub iterations: u32,
    /// Coherence before the attempt.
    pub initial_coherence: f64,
    /// Coherence when the attempt ended.
    pub final_coherence: f64,
    /// Wall time from launch to completion.
    pub elapsed: Duration,
    /// When the attempt ended.
    pub finished_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Swarm
// ---------------------------------------------------------------------------

/// An agent population plus the machinery that drives it.
pub struct Swarm {
    id: Uuid,
    agents: Arc<[Arc<Agent>]>,
    by_id: Arc<HashMap<AgentId, usize>>,
    config: Arc<SwarmConfig>,
    engine: Arc<GoalDirectedSync>,
    events: Arc<SwarmEvents>,
    recovery_config: Option<RecoveryConfig>,
    outcome: RwLock<Option<ConvergenceOutcome>>,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for Swarm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Swarm")
            .field("id", &self.id)
            .field("size", &self.agents.len())
            .field("target", &self.engine.target())
            .finish_non_exhaustive()
    }
}

impl Swarm {
    /// Build a swarm of `size` agents chasing `target`, with defaults for
    /// everything else.
    pub fn new(size: usize, target: Pattern) -> SwarmResult<Self> {
        Self::with_options(size, target, SwarmOptions::default())
    }

    /// Build a swarm with caller-supplied replacements.
    ///
    /// Fails without side effects on the first *category* of invalid
    /// input, and within each category reports every offending field.
    pub fn with_options(size: usize, target: Pattern, options: SwarmOptions) -> SwarmResult<Self> {
        let config = options
            .config
            .unwrap_or_else(|| SwarmConfig::auto_scale(size));

        if size == 0 || size > config.max_swarm_size {
            return Err(SwarmError::InvalidSwarmSize {
                size,
                max: config.max_swarm_size,
            });
        }

        let target_violations = validate_target(&target);
        if !target_violations.is_empty() {
            return Err(SwarmError::InvalidGoalState {
                violations: target_violations,
            });
        }

        let config_violations = config.validate();
        if !config_violations.is_empty() {
            return Err(SwarmError::InvalidConfig {
                violations: config_violations,
            });
        }

        let target = Pattern {
            phase: phase::wrap(target.phase),
            ..target
        };

        let seed = options.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        let config = Arc::new(config);

        // Agents first, then the wiring over them.
        let builder: &dyn AgentBuilder = options
            .agent_builder
            .as_deref()
            .unwrap_or(&RandomizedAgentBuilder);
        let default_strategy: Arc<dyn SyncStrategy> = Arc::new(PhaseNudge::new(0.35));
        let agents: Vec<Arc<Agent>> = (0..size)
            .map(|index| {
                let agent_seed = builder.build(index, &target, &mut rng);
                Arc::new(Agent::new(
                    AgentId::indexed(index),
                    agent_seed,
                    &config,
                    Arc::clone(&default_strategy),
                    seed.wrapping_add(index as u64).wrapping_mul(0x9E37_79B9),
                ))
            })
            .collect();

        let topology = options
            .topology
            .unwrap_or_else(|| topology::auto(size, &config.topology));
        topology.wire(&agents, &config.topology, &mut rng);

        let by_id: HashMap<AgentId, usize> = agents
            .iter()
            .enumerate()
            .map(|(index, agent)| (agent.id().clone(), index))
            .collect();

        let id = Uuid::new_v4();
        let events = Arc::new(SwarmEvents::new(id));
        let agents: Arc<[Arc<Agent>]> = agents.into();
        let by_id = Arc::new(by_id);

        let engine = Arc::new(GoalDirectedSync::new(
            Arc::clone(&agents),
            Arc::clone(&by_id),
            Arc::clone(&config),
            options.monitor.unwrap_or_default(),
            Arc::clone(&events),
            target,
            seed,
        ));

        info!(
            swarm = %id,
            size,
            topology = topology.name(),
            seed,
            "swarm constructed"
        );

        let recovery_config = options.recovery.or_else(|| config.recovery.clone());
        Ok(Self {
            id,
            agents,
            by_id,
            config,
            engine,
            events,
            recovery_config,
            outcome: RwLock::new(None),
            rng: Mutex::new(StdRng::seed_from_u64(seed.wrapping_add(1))),
        })
    }

    // -- run surface ---------------------------------------------------------

    /// One-shot synchronization: drive toward the target until achieved,
    /// the iteration budget runs out, or `token` is cancelled.
    pub async fn run(&self, token: &CancellationToken) -> SwarmResult<()> {
        let initial_coherence = self.measure_coherence();
        let target = self.engine.target();
        let started = std::time::Instant::now();

        match self.engine.achieve(token, target).await {
            Ok(report) => {
                self.store_outcome(ConvergenceOutcome {
                    converged: true,
                    iterations: report.iterations,
                    initial_coherence,
                    final_coherence: report.final_coherence,
                    elapsed: report.elapsed,
                    finished_at: Utc::now(),
                });
                Ok(())
            }
            Err(SwarmError::FailedToConverge { iterations }) => {
                self.store_outcome(ConvergenceOutcome {
                    converged: false,
                    iterations,
                    initial_coherence,
                    final_coherence: self.measure_coherence(),
                    elapsed: started.elapsed(),
                    finished_at: Utc::now(),
                });
                Err(SwarmError::FailedToConverge { iterations })
            }
            Err(other) => Err(other),
        }
    }

    /// Maintain synchronization indefinitely, relaunching after
    /// disruptions. Returns only when `token` is cancelled.
    pub async fn run_continuous(&self, token: &CancellationToken) -> SwarmResult<()> {
        let target = self.engine.target();
        let recovery = self.recovery_config.clone().unwrap_or_else(|| {
            let (coherence, _) = validate_coherence_target(self.agents.len(), target.coherence);
            RecoveryConfig::for_target(coherence)
        });
        RecoveryLoop::new(Arc::clone(&self.engine), Arc::clone(&self.events))
            .run(token, target, recovery)
            .await
    }

    // -- observation surface -------------------------------------------------

    /// This swarm's identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of agents.
    pub fn size(&self) -> usize {
        self.agents.len()
    }

    /// The immutable configuration bundle.
    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    /// The target being chased (after any limit clamp).
    pub fn target(&self) -> Pattern {
        self.engine.target()
    }

    /// Kuramoto order parameter over all agent phases.
    pub fn measure_coherence(&self) -> f64 {
        self.engine.coherence()
    }

    /// Phase convergence toward `target_phase`:
    /// `1 − mean abs circular distance / π`.
    pub fn measure_phase_convergence(&self, target_phase: f64) -> f64 {
        phase::phase_convergence(&self.engine.phases(), target_phase)
    }

    /// Circular variance of the population's phases.
    pub fn measure_phase_variance(&self) -> f64 {
        self.engine.phase_variance()
    }

    /// Measure the full current pattern.
    pub fn measure_system_pattern(&self) -> Pattern {
        self.engine.measure_system_pattern()
    }

    /// All agents, in construction order.
    pub fn agents(&self) -> &[Arc<Agent>] {
        &self.agents
    }

    /// Look up one agent by its string identifier.
    pub fn agent(&self, id: &str) -> SwarmResult<Arc<Agent>> {
        let key = AgentId::new(id);
        self.by_id
            .get(&key)
            .map(|&index| Arc::clone(&self.agents[index]))
            .ok_or_else(|| SwarmError::AgentNotFound(id.to_string()))
    }

    /// Visit every agent.
    pub fn for_each_agent(&self, mut f: impl FnMut(&Agent)) {
        for agent in self.agents.iter() {
            f(agent);
        }
    }

    /// Snapshot the full neighbor relation.
    pub fn neighbors(&self) -> HashMap<AgentId, HashSet<AgentId>> {
        self.agents
            .iter()
            .map(|agent| (agent.id().clone(), agent.neighbors()))
            .collect()
    }

    /// Whether the most recent `run` achieved its target.
    pub fn is_converged(&self) -> bool {
        self.outcome
            .read()
            .expect("outcome lock poisoned")
            .map(|o| o.converged)
            .unwrap_or(false)
    }

    /// Wall time of the most recent successful `run`.
    pub fn convergence_time(&self) -> Option<Duration> {
        self.outcome
            .read()
            .expect("outcome lock poisoned")
            .filter(|o| o.converged)
            .map(|o| o.elapsed)
    }

    /// Full snapshot of the most recent `run` attempt.
    pub fn last_outcome(&self) -> Option<ConvergenceOutcome> {
        *self.outcome.read().expect("outcome lock poisoned")
    }

    /// Subscribe to this swarm's lifecycle events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SwarmEvent> {
        self.events.subscribe()
    }

    // -- mutation surface ----------------------------------------------------

    /// Randomize the phase of `floor(N · fraction)` agents, chosen
    /// uniformly without replacement. Does not touch energy or
    /// neighbors. Returns how many agents were disrupted.
    pub fn disrupt_agents(&self, fraction: f64) -> usize {
        let n = self.agents.len();
        let count = ((n as f64) * fraction.clamp(0.0, 1.0)).floor() as usize;
        if count == 0 {
            return 0;
        }

        {
            let mut rng = self.rng.lock().expect("rng lock poisoned");
            let chosen = rand::seq::index::sample(&mut *rng, n, count.min(n));
            for index in chosen {
                let new_phase = rng.gen::<f64>() * phase::TAU;
                self.agents[index].set_phase(new_phase);
            }
        }

        info!(swarm = %self.id, affected = count, "agents disrupted");
        self.events.publish(SwarmEvent::Disrupted {
            affected: count,
            at: Utc::now(),
        });
        count
    }

    /// Install a synchronization strategy pool-wide and on every agent.
    pub fn set_sync_strategy(&self, strategy: Arc<dyn SyncStrategy>) {
        self.engine.set_sync_strategy(strategy);
    }

    /// Install a decision policy on every agent.
    pub fn set_decision_maker(&self, decider: Arc<dyn DecisionMaker>) {
        self.engine.set_decision_maker(decider);
    }

    /// Store a completion template for the engine to steer by.
    pub fn load_template(&self, template: Template) {
        self.engine.completion().add_template(template);
    }

    fn store_outcome(&self, outcome: ConvergenceOutcome) {
        *self.outcome.write().expect("outcome lock poisoned") = Some(outcome);
    }
}

/// Collect every problem with a requested target pattern.
fn validate_target(target: &Pattern) -> Vec<String> {
    let mut violations = Vec::new();
    if !target.phase.is_finite() {
        violations.push(format!("phase must be finite, got {}", target.phase));
    }
    if target.frequency.is_zero() {
        violations.push("frequency must be positive".to_string());
    }
    if !target.coherence.is_finite() {
        violations.push(format!(
            "coherence must be a finite number, got {}",
            target.coherence
        ));
    } else if !(0.0..=1.0).contains(&target.coherence) {
        violations.push(format!(
            "coherence must be in [0, 1], got {}",
            target.coherence
        ));
    }
    if !(0.0..=1.0).contains(&target.amplitude) {
        violations.push(format!(
            "amplitude must be in [0, 1], got {}",
            target.amplitude
        ));
    }
    if !(0.0..=1.0).contains(&target.stability) {
        violations.push(format!(
            "stability must be in [0, 1], got {}",
            target.stability
        ));
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn target() -> Pattern {
        Pattern::target(PI, Duration::from_millis(100), 0.7)
    }

    fn seeded(size: usize) -> Swarm {
        Swarm::with_options(
            size,
            target(),
            SwarmOptions {
                seed: Some(1234),
                ..SwarmOptions::default()
            },
        )
        .expect("swarm builds")
    }

    #[test]
    fn test_zero_size_rejected() {
        let err = Swarm::new(0, target()).unwrap_err();
        assert!(matches!(err, SwarmError::InvalidSwarmSize { size: 0, .. }));
    }

    #[test]
    fn test_oversized_swarm_rejected() {
        let mut config = SwarmConfig::default();
        config.max_swarm_size = 10;
        let err = Swarm::with_options(
            11,
            target(),
            SwarmOptions {
                config: Some(config),
                ..SwarmOptions::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, SwarmError::InvalidSwarmSize { size: 11, max: 10 }));
    }

    #[test]
    fn test_invalid_target_lists_every_field() {
        let bad = Pattern {
            phase: f64::NAN,
            frequency: Duration::ZERO,
            coherence: 2.0,
            amplitude: 1.0,
            stability: 0.9,
        };
        let err = Swarm::new(10, bad).unwrap_err();
        match err {
            SwarmError::InvalidGoalState { violations } => {
                assert_eq!(violations.len(), 3, "{violations:?}");
            }
            other => panic!("expected InvalidGoalState, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = SwarmConfig::default();
        config.energy.capacity = -1.0;
        config.resonance.activation_rate = 7.0;
        let err = Swarm::with_options(
            5,
            target(),
            SwarmOptions {
                config: Some(config),
                ..SwarmOptions::default()
            },
        )
        .unwrap_err();
        match err {
            SwarmError::InvalidConfig { violations } => assert!(violations.len() >= 2),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn test_construction_assigns_unique_ids_and_symmetry() {
        let swarm = seeded(25);
        assert_eq!(swarm.size(), 25);

        let mut seen = HashSet::new();
        for agent in swarm.agents() {
            assert!(seen.insert(agent.id().clone()), "duplicate id {}", agent.id());
        }

        for (id, neighbor_ids) in swarm.neighbors() {
            for neighbor_id in neighbor_ids {
                let neighbor = swarm.agent(neighbor_id.as_str()).unwrap();
                assert!(neighbor.has_neighbor(&id), "asymmetric edge {id} - {neighbor_id}");
            }
        }
    }

    #[test]
    fn test_agent_lookup() {
        let swarm = seeded(5);
        assert!(swarm.agent("agent-0").is_ok());
        assert_eq!(
            swarm.agent("agent-99").unwrap_err(),
            SwarmError::AgentNotFound("agent-99".to_string())
        );
    }

    #[test]
    fn test_single_agent_swarm_is_fully_coherent() {
        let swarm = seeded(1);
        assert_eq!(swarm.measure_coherence(), 1.0);
        swarm.disrupt_agents(1.0);
        assert_eq!(swarm.measure_coherence(), 1.0);
    }

    #[test]
    fn test_disrupt_zero_fraction_changes_nothing() {
        let swarm = seeded(20);
        let before = swarm.engine.phases();
        assert_eq!(swarm.disrupt_agents(0.0), 0);
        assert_eq!(swarm.engine.phases(), before);
    }

    #[test]
    fn test_disrupt_full_fraction_touches_exactly_n() {
        let swarm = seeded(20);
        assert_eq!(swarm.disrupt_agents(1.0), 20);
        for agent in swarm.agents() {
            assert!((0.0..phase::TAU).contains(&agent.phase()));
        }
    }

    #[test]
    fn test_disrupt_half_counts_floor() {
        let swarm = seeded(21);
        assert_eq!(swarm.disrupt_agents(0.5), 10);
    }

    #[test]
    fn test_disrupt_leaves_energy_and_neighbors_alone() {
        let swarm = seeded(12);
        let energies: Vec<f64> = swarm.agents().iter().map(|a| a.energy()).collect();
        let degrees: Vec<usize> = swarm.agents().iter().map(|a| a.neighbor_count()).collect();
        swarm.disrupt_agents(1.0);
        let energies_after: Vec<f64> = swarm.agents().iter().map(|a| a.energy()).collect();
        let degrees_after: Vec<usize> =
            swarm.agents().iter().map(|a| a.neighbor_count()).collect();
        assert_eq!(energies, energies_after);
        assert_eq!(degrees, degrees_after);
    }

    #[test]
    fn test_seeded_swarms_are_reproducible() {
        let a = seeded(15);
        let b = seeded(15);
        let phases_a: Vec<f64> = a.agents().iter().map(|x| x.phase()).collect();
        let phases_b: Vec<f64> = b.agents().iter().map(|x| x.phase()).collect();
        assert_eq!(phases_a, phases_b);
    }

    #[test]
    fn test_no_outcome_before_first_run() {
        let swarm = seeded(5);
        assert!(!swarm.is_converged());
        assert!(swarm.convergence_time().is_none());
        assert!(swarm.last_outcome().is_none());
    }

    #[tokio::test]
    async fn test_run_records_outcome() {
        let swarm = seeded(10);
        let token = CancellationToken::new();
        let result = swarm.run(&token).await;
        assert!(result.is_ok(), "{result:?}");
        assert!(swarm.is_converged());
        let outcome = swarm.last_outcome().unwrap();
        assert!(outcome.iterations >= 1);
        assert!(swarm.convergence_time().is_some());
    }

    #[tokio::test]
    async fn test_run_continuous_exits_only_on_cancel() {
        let swarm = Arc::new(seeded(10));
        let token = CancellationToken::new();
        let runner = {
            let swarm = Arc::clone(&swarm);
            let token = token.clone();
            tokio::spawn(async move { swarm.run_continuous(&token).await })
        };
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!runner.is_finished(), "continuous mode must keep running");
        token.cancel();
        let result = runner.await.unwrap();
        assert_eq!(result.unwrap_err(), SwarmError::Canceled);
    }
}
