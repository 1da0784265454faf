//! Coherence ceilings and convergence-time scaling for finite swarms.
//!
//! A finite, noisy population cannot hold the order parameter at exactly
//! 1.0: per-agent variation, perturbation random walks, and the
//! over-synchronization guard all leave residual phase scatter that
//! shrinks like `1/√N`. The limits here encode that reality so the
//! goal-directed loop can clamp impossible targets instead of grinding
//! against them, and so iteration budgets grow with both population size
//! and target ambition.

// ---------------------------------------------------------------------------
// CoherenceLimits
// ---------------------------------------------------------------------------

/// Ceilings on the order parameter for a population of a given size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoherenceLimits {
    /// Hard ceiling. Targets above this are clamped before the loop runs.
    pub theoretical: f64,
    /// What a default-configured swarm sustains in practice, accounting
    /// for the anti-lock-step noise floor.
    pub practical: f64,
}

/// Coherence ceilings for a population of `n` agents.
///
/// A lone oscillator is perfectly coherent. For `n > 1` the ceilings fall
/// off as `1/√n` finite-size fluctuation terms: `theoretical = 1 − 0.15/√n`,
/// `practical = 1 − 0.35/√n`, both floored at 0.5 so tiny populations
/// keep a meaningful band.
pub fn coherence_limits(n: usize) -> CoherenceLimits {
    if n <= 1 {
        return CoherenceLimits {
            theoretical: 1.0,
            practical: 1.0,
        };
    }
    let root = (n as f64).sqrt();
    CoherenceLimits {
        theoretical: (1.0 - 0.15 / root).max(0.5),
        practical: (1.0 - 0.35 / root).max(0.5),
    }
}

// ---------------------------------------------------------------------------
// Convergence time scaling
// ---------------------------------------------------------------------------

/// Dimensionless convergence-time factor for a swarm of `n` agents
/// chasing `target_coherence`.
///
/// Grows logarithmically with population (information must propagate
/// through a sparse neighbor graph) and quadratically with target
/// ambition (the last few points of coherence are the slowest). The
/// goal-directed loop multiplies this by the configured
/// `max_iterations_factor` to size its iteration budget.
pub fn convergence_time_factor(n: usize, target_coherence: f64) -> f64 {
    let size_term = ((n as f64) + 1.0).ln() + 1.0;
    let ambition = target_coherence.clamp(0.0, 1.0);
    size_term * (1.0 + 2.0 * ambition * ambition)
}

// ---------------------------------------------------------------------------
// Target advisory
// ---------------------------------------------------------------------------

/// Clamp a requested coherence target to what `n` agents can reach.
///
/// Returns the adjusted coherence and, when a clamp occurred, a
/// human-readable warning. The goal-directed loop applies the clamp
/// silently; callers who want to surface it to an operator call this
/// first.
pub fn validate_coherence_target(n: usize, requested: f64) -> (f64, Option<String>) {
    let limits = coherence_limits(n);
    if requested <= limits.theoretical {
        return (requested, None);
    }
    let warning = format!(
        "requested coherence {:.3} exceeds the theoretical limit {:.3} for {} agents; \
         the swarm will converge toward {:.3} (practical limit {:.3})",
        requested, limits.theoretical, n, limits.theoretical, limits.practical,
    );
    (limits.theoretical, Some(warning))
}
