//! Plateau detection and stochastic resonance.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use common::formation_swarm;
use entrain::{Pattern, Swarm, SwarmConfig, SwarmEvent, SwarmOptions};

/// A swarm that cannot satisfy its over-tight phase goal plateaus, the
/// monitor reports stuck, and resonance injections fire.
#[tokio::test]
async fn stuck_swarm_triggers_resonance() {
    // Anti-phase halves, and a phase-convergence goal the configured
    // noise floor can never satisfy: the loop aligns quickly, then
    // plateaus short of achievement.
    let mut config = SwarmConfig::auto_scale(30);
    config.convergence.phase_convergence_goal = 0.995;
    config.variation.perturbation_magnitude = 0.6;
    config.variation.perturbation_chance = 0.5;
    config.strategy.update_interval_ms = 10;

    let swarm = Arc::new(
        Swarm::with_options(
            30,
            Pattern::target(0.0, Duration::from_millis(100), 0.9),
            SwarmOptions {
                seed: Some(808),
                config: Some(config),
                agent_builder: Some(common::FormationBuilder::boxed(vec![
                    0.0,
                    std::f64::consts::PI,
                ])),
                ..SwarmOptions::default()
            },
        )
        .unwrap(),
    );

    let mut events = swarm.subscribe();
    let token = CancellationToken::new();
    let runner = {
        let swarm = Arc::clone(&swarm);
        let token = token.clone();
        tokio::spawn(async move { swarm.run(&token).await })
    };

    let resonance = tokio::time::timeout(Duration::from_secs(4), async {
        loop {
            match events.recv().await {
                Ok(SwarmEvent::ResonanceInjected {
                    affected,
                    coherence,
                    ..
                }) => break (affected, coherence),
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(other) => panic!("event stream closed: {other:?}"),
            }
        }
    })
    .await;

    token.cancel();
    let _ = runner.await;

    let (affected, _) = resonance.expect("no resonance injection within 4s");
    // ceil(30 * affected fraction) agents get the kick.
    let expected = (30.0 * swarm.config().resonance.affected_agents).ceil() as usize;
    assert_eq!(affected, expected);
}

/// Anti-phase seeding itself is broken quickly by the anchor pull; the
/// population does not stay trapped at zero coherence.
#[tokio::test]
async fn anti_phase_formation_escapes() {
    let swarm = formation_swarm(
        30,
        Pattern::target(0.0, Duration::from_millis(100), 0.9),
        809,
        vec![0.0, std::f64::consts::PI],
    );
    assert!(swarm.measure_coherence() < 0.1, "anti-phase should cancel");

    let token = CancellationToken::new();
    let _ = swarm.run(&token).await;
    assert!(
        swarm.measure_coherence() > 0.5,
        "swarm stayed trapped at {}",
        swarm.measure_coherence()
    );
}
