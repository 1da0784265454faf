//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::time::Duration;

use entrain::swarm::{AgentBuilder, AgentSeed, RandomizedAgentBuilder};
use entrain::{Pattern, Swarm, SwarmConfig, SwarmOptions};

/// Build a deterministic swarm with the default configuration.
pub fn seeded_swarm(size: usize, target: Pattern, seed: u64) -> Swarm {
    Swarm::with_options(
        size,
        target,
        SwarmOptions {
            seed: Some(seed),
            ..SwarmOptions::default()
        },
    )
    .expect("test swarm builds")
}

/// Build a deterministic swarm with a custom configuration.
pub fn seeded_swarm_with_config(
    size: usize,
    target: Pattern,
    seed: u64,
    config: SwarmConfig,
) -> Swarm {
    Swarm::with_options(
        size,
        target,
        SwarmOptions {
            seed: Some(seed),
            config: Some(config),
            ..SwarmOptions::default()
        },
    )
    .expect("test swarm builds")
}

/// The standard test target: phase π, 100ms period, the given coherence.
pub fn target(coherence: f64) -> Pattern {
    Pattern::target(std::f64::consts::PI, Duration::from_millis(100), coherence)
}

/// Agent builder that pins every phase to a fixed formation, cycling
/// through the provided list. Everything else follows the randomized
/// defaults.
pub struct FormationBuilder {
    phases: Vec<f64>,
    inner: RandomizedAgentBuilder,
}

impl FormationBuilder {
    pub fn new(phases: Vec<f64>) -> Self {
        Self {
            phases,
            inner: RandomizedAgentBuilder,
        }
    }

    pub fn boxed(phases: Vec<f64>) -> Box<dyn AgentBuilder> {
        Box::new(Self::new(phases))
    }
}

impl AgentBuilder for FormationBuilder {
    fn build(&self, index: usize, target: &Pattern, rng: &mut dyn rand::RngCore) -> AgentSeed {
        let seed = self.inner.build(index, target, rng);
        AgentSeed {
            phase: self.phases[index % self.phases.len()],
            ..seed
        }
    }
}

/// Build a swarm whose agents start in the given phase formation.
pub fn formation_swarm(size: usize, target: Pattern, seed: u64, phases: Vec<f64>) -> Swarm {
    Swarm::with_options(
        size,
        target,
        SwarmOptions {
            seed: Some(seed),
            agent_builder: Some(FormationBuilder::boxed(phases)),
            ..SwarmOptions::default()
        },
    )
    .expect("test swarm builds")
}
