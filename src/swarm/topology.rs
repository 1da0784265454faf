//! Neighbor-graph construction.
//!
//! Topology is decided once, at swarm construction. Every builder
//! installs edges symmetrically (an edge exists in both endpoints'
//! neighbor sets or not at all) and installs are idempotent, so repair
//! passes can re-add edges freely.
//!
//! The default selection by population size: full mesh while a handful of
//! agents can afford to see everyone, probabilistic wiring in the mid
//! range, small-world ring-plus-shortcuts once information needs to hop,
//! and minimal random wiring when construction cost itself matters.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::Rng;

use crate::domain::models::config::TopologyConfig;

use super::agent::Agent;

// ---------------------------------------------------------------------------
// TopologyBuilder
// ---------------------------------------------------------------------------

/// Wires the neighbor relation over a freshly built agent population.
pub trait TopologyBuilder: Send + Sync {
    /// Builder name, for construction logs.
    fn name(&self) -> &str;

    /// Install neighbor edges. Must leave the relation symmetric.
    fn wire(&self, agents: &[Arc<Agent>], config: &TopologyConfig, rng: &mut StdRng);
}

/// Install the undirected edge `a ↔ b`.
fn link(agents: &[Arc<Agent>], a: usize, b: usize) {
    if a == b {
        return;
    }
    agents[a].add_neighbor(agents[b].id().clone());
    agents[b].add_neighbor(agents[a].id().clone());
}

/// Pick the builder for a population of `n` agents.
pub fn auto(n: usize, config: &TopologyConfig) -> Box<dyn TopologyBuilder> {
    if config.enable_connection_optim && n >= config.connection_optim_threshold {
        Box::new(MinimalRandomTopology)
    } else if n < 10 {
        Box::new(FullMeshTopology)
    } else if n < 100 {
        Box::new(ProbabilisticTopology)
    } else {
        Box::new(SmallWorldTopology)
    }
}

// ---------------------------------------------------------------------------
// FullMeshTopology
// ---------------------------------------------------------------------------

/// Everyone sees everyone. Only sensible for tiny populations.
#[derive(Debug, Default, Clone, Copy)]
pub struct FullMeshTopology;

impl TopologyBuilder for FullMeshTopology {
    fn name(&self) -> &str {
        "full_mesh"
    }

    fn wire(&self, agents: &[Arc<Agent>], _config: &TopologyConfig, _rng: &mut StdRng) {
        for a in 0..agents.len() {
            for b in (a + 1)..agents.len() {
                link(agents, a, b);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SmallWorldTopology
// ---------------------------------------------------------------------------

/// Watts-Strogatz style ring: each agent joins its `k` nearest ring
/// neighbors (`k ≈ min(6, n/10)`, at least 2), then each local edge is
/// rewired to a random long-range edge with the configured probability.
#[derive(Debug, Default, Clone, Copy)]
pub struct SmallWorldTopology;

impl TopologyBuilder for SmallWorldTopology {
    fn name(&self) -> &str {
        "small_world"
    }

    fn wire(&self, agents: &[Arc<Agent>], config: &TopologyConfig, rng: &mut StdRng) {
        let n = agents.len();
        if n < 2 {
            return;
        }
        let k = (n / 10).min(6).max(2);
        let half = (k / 2).max(1);

        for i in 0..n {
            for offset in 1..=half {
                let ring_neighbor = (i + offset) % n;
                if rng.gen_bool(config.rewire_probability.clamp(0.0, 1.0)) {
                    // Long-range shortcut instead of the local edge.
                    let shortcut = rng.gen_range(0..n);
                    if shortcut != i {
                        link(agents, i, shortcut);
                    } else {
                        link(agents, i, ring_neighbor);
                    }
                } else {
                    link(agents, i, ring_neighbor);
                }
            }
        }

        ensure_min_degree(agents, config.min_neighbors, rng);
    }
}

// ---------------------------------------------------------------------------
// ProbabilisticTopology
// ---------------------------------------------------------------------------

/// Erdős–Rényi style wiring: each pair connects with the configured
/// probability, capped at `max_neighbors` per agent, followed by a
/// deterministic repair pass that lifts everyone to `min_neighbors`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProbabilisticTopology;

impl TopologyBuilder for ProbabilisticTopology {
    fn name(&self) -> &str {
        "probabilistic"
    }

    fn wire(&self, agents: &[Arc<Agent>], config: &TopologyConfig, rng: &mut StdRng) {
        let n = agents.len();
        let p = config.connection_probability.clamp(0.0, 1.0);

        for a in 0..n {
            for b in (a + 1)..n {
                if agents[a].neighbor_count() >= config.max_neighbors
                    || agents[b].neighbor_count() >= config.max_neighbors
                {
                    continue;
                }
                if rng.gen_bool(p) {
                    link(agents, a, b);
                }
            }
        }

        ensure_min_degree(agents, config.min_neighbors, rng);
    }
}

// ---------------------------------------------------------------------------
// MinimalRandomTopology
// ---------------------------------------------------------------------------

/// Each agent force-connects to `min_neighbors` random others. Linear in
/// population size; used above the connection-optimization threshold.
#[derive(Debug, Default, Clone, Copy)]
pub struct MinimalRandomTopology;

impl TopologyBuilder for MinimalRandomTopology {
    fn name(&self) -> &str {
        "minimal_random"
    }

    fn wire(&self, agents: &[Arc<Agent>], config: &TopologyConfig, rng: &mut StdRng) {
        ensure_min_degree(agents, config.min_neighbors, rng);
    }
}

/// Repair pass: connect every agent with fewer than `min` neighbors to
/// random peers until the floor holds (or the population is too small to
/// ever reach it).
fn ensure_min_degree(agents: &[Arc<Agent>], min: usize, rng: &mut StdRng) {
    let n = agents.len();
    if n < 2 {
        return;
    }
    let reachable_min = min.min(n - 1);

    for i in 0..n {
        let mut guard = 0;
        while agents[i].neighbor_count() < reachable_min && guard < n * 4 {
            let j = rng.gen_range(0..n);
            link(agents, i, j);
            guard += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::SwarmConfig;
    use crate::domain::models::pattern::Pattern;
    use crate::domain::ports::SyncStrategy;
    use crate::swarm::agent::{AgentBuilder, AgentId, RandomizedAgentBuilder};
    use rand::SeedableRng;
    use std::time::Duration;

    struct NullStrategy;

    impl SyncStrategy for NullStrategy {
        fn name(&self) -> &str {
            "null"
        }

        fn propose(
            &self,
            _current: &Pattern,
            _target: &Pattern,
            _ctx: &crate::domain::ports::StrategyContext,
        ) -> (crate::domain::models::action::Action, f64) {
            (crate::domain::models::action::Action::maintain(0.0), 0.0)
        }
    }

    fn population(n: usize) -> Vec<Arc<Agent>> {
        let config = SwarmConfig::default();
        let target = Pattern::target(0.0, Duration::from_millis(100), 0.7);
        let mut rng = StdRng::seed_from_u64(7);
        (0..n)
            .map(|i| {
                let seed = RandomizedAgentBuilder.build(i, &target, &mut rng);
                Arc::new(Agent::new(
                    AgentId::indexed(i),
                    seed,
                    &config,
                    Arc::new(NullStrategy),
                    i as u64,
                ))
            })
            .collect()
    }

    fn assert_symmetric(agents: &[Arc<Agent>]) {
        for agent in agents {
            for neighbor_id in agent.neighbors() {
                let neighbor = agents
                    .iter()
                    .find(|a| *a.id() == neighbor_id)
                    .expect("neighbor id resolves");
                assert!(
                    neighbor.has_neighbor(agent.id()),
                    "edge {} -> {} not symmetric",
                    agent.id(),
                    neighbor_id
                );
            }
        }
    }

    #[test]
    fn test_full_mesh_connects_everyone() {
        let agents = population(6);
        let mut rng = StdRng::seed_from_u64(1);
        FullMeshTopology.wire(&agents, &TopologyConfig::default(), &mut rng);
        for agent in &agents {
            assert_eq!(agent.neighbor_count(), 5);
        }
        assert_symmetric(&agents);
    }

    #[test]
    fn test_small_world_symmetric_and_connected() {
        let agents = population(120);
        let mut rng = StdRng::seed_from_u64(2);
        SmallWorldTopology.wire(&agents, &TopologyConfig::default(), &mut rng);
        assert_symmetric(&agents);
        for agent in &agents {
            assert!(agent.neighbor_count() >= 1, "isolated agent {}", agent.id());
        }
    }

    #[test]
    fn test_probabilistic_respects_min_floor() {
        let agents = population(40);
        let config = TopologyConfig {
            connection_probability: 0.01,
            min_neighbors: 3,
            ..TopologyConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        ProbabilisticTopology.wire(&agents, &config, &mut rng);
        assert_symmetric(&agents);
        for agent in &agents {
            assert!(
                agent.neighbor_count() >= 3,
                "{} has {} neighbors",
                agent.id(),
                agent.neighbor_count()
            );
        }
    }

    #[test]
    fn test_minimal_random_hits_floor_exactly_enough() {
        let agents = population(200);
        let config = TopologyConfig {
            min_neighbors: 4,
            ..TopologyConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(4);
        MinimalRandomTopology.wire(&agents, &config, &mut rng);
        assert_symmetric(&agents);
        for agent in &agents {
            assert!(agent.neighbor_count() >= 4);
        }
    }

    #[test]
    fn test_duplicate_wire_is_idempotent() {
        let agents = population(10);
        let config = TopologyConfig::default();
        let mut rng = StdRng::seed_from_u64(5);
        FullMeshTopology.wire(&agents, &config, &mut rng);
        let degrees: Vec<usize> = agents.iter().map(|a| a.neighbor_count()).collect();
        FullMeshTopology.wire(&agents, &config, &mut rng);
        let degrees_after: Vec<usize> = agents.iter().map(|a| a.neighbor_count()).collect();
        assert_eq!(degrees, degrees_after);
    }

    #[test]
    fn test_auto_selection_by_size() {
        let config = TopologyConfig::default();
        assert_eq!(auto(5, &config).name(), "full_mesh");
        assert_eq!(auto(50, &config).name(), "probabilistic");
        assert_eq!(auto(500, &config).name(), "small_world");

        let optimized = TopologyConfig {
            enable_connection_optim: true,
            connection_optim_threshold: 100,
            ..TopologyConfig::default()
        };
        assert_eq!(auto(500, &optimized).name(), "minimal_random");
    }

    #[test]
    fn test_single_agent_swarm_stays_isolated() {
        let agents = population(1);
        let mut rng = StdRng::seed_from_u64(6);
        for builder in [
            Box::new(FullMeshTopology) as Box<dyn TopologyBuilder>,
            Box::new(SmallWorldTopology),
            Box::new(ProbabilisticTopology),
            Box::new(MinimalRandomTopology),
        ] {
            builder.wire(&agents, &TopologyConfig::default(), &mut rng);
            assert_eq!(agents[0].neighbor_count(), 0);
        }
    }
}
