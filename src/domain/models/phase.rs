//! Circular phase arithmetic and population-level coherence measures.
//!
//! Phases are plain `f64` radians interpreted modulo 2π, canonical range
//! `[0, 2π)`. Every mutation elsewhere in the crate wraps through this
//! module so the canonical-range invariant holds at all times.
//!
//! The central population measure is the Kuramoto order parameter
//! `R = |Σ e^{iφ}| / N`, which maps uniform phase scatter to 0.0 and
//! perfect alignment to 1.0. Circular means, variances, and distances are
//! all derived from the same resultant-vector construction.

use std::f64::consts::PI;

/// Full circle in radians. Phases live in `[0, TAU)`.
pub const TAU: f64 = 2.0 * PI;

// ---------------------------------------------------------------------------
// Scalar phase operations
// ---------------------------------------------------------------------------

/// Reduce a phase to the canonical range `[0, 2π)`.
///
/// Idempotent: `wrap(wrap(x)) == wrap(x)`, and periodic:
/// `wrap(x + 2πk) == wrap(x)` for any integer `k`. Non-finite inputs are
/// mapped to 0.0 so downstream trig never sees a NaN.
pub fn wrap(phase: f64) -> f64 {
    if !phase.is_finite() {
        return 0.0;
    }
    let reduced = phase.rem_euclid(TAU);
    // rem_euclid can return exactly TAU when the input is a hair below a
    // multiple of 2π and rounding lands on the boundary.
    if reduced >= TAU {
        0.0
    } else {
        reduced
    }
}

/// Shortest signed arc from `b` to `a`, in `(-π, π]`.
///
/// Positive results mean `a` leads `b` going counterclockwise.
pub fn signed_diff(a: f64, b: f64) -> f64 {
    let mut d = wrap(a) - wrap(b);
    if d > PI {
        d -= TAU;
    } else if d <= -PI {
        d += TAU;
    }
    d
}

/// Absolute circular distance between two phases, in `[0, π]`.
pub fn circular_distance(a: f64, b: f64) -> f64 {
    signed_diff(a, b).abs()
}

/// Interpolate from `from` toward `to` along the shortest arc.
///
/// `t = 0` returns `from`, `t = 1` returns `to`; the result is wrapped.
pub fn lerp_arc(from: f64, to: f64, t: f64) -> f64 {
    wrap(from + signed_diff(to, from) * t)
}

// ---------------------------------------------------------------------------
// Population measures
// ---------------------------------------------------------------------------

/// Kuramoto order parameter `R = sqrt((Σcos)² + (Σsin)²) / N`.
///
/// Returns 1.0 for an empty or single-element population (a lone
/// oscillator is trivially coherent with itself). Result is clamped to
/// `[0, 1]` against floating-point drift.
pub fn order_parameter(phases: &[f64]) -> f64 {
    if phases.len() <= 1 {
        return 1.0;
    }
    let (sum_cos, sum_sin) = resultant(phases);
    let n = phases.len() as f64;
    ((sum_cos * sum_cos + sum_sin * sum_sin).sqrt() / n).clamp(0.0, 1.0)
}

/// Circular mean phase via `atan2(Σsin, Σcos)`, wrapped to `[0, 2π)`.
///
/// For an empty population the mean is 0.0 by convention. When the
/// resultant vector is (numerically) zero the mean is undefined; atan2
/// then yields 0.0, which is as good an anchor as any.
pub fn circular_mean(phases: &[f64]) -> f64 {
    if phases.is_empty() {
        return 0.0;
    }
    let (sum_cos, sum_sin) = resultant(phases);
    wrap(sum_sin.atan2(sum_cos))
}

/// Circular variance `1 - R̄` around the circular mean, in `[0, 1]`.
///
/// 0.0 means every phase coincides; 1.0 means phases cancel completely.
pub fn circular_variance(phases: &[f64]) -> f64 {
    if phases.len() <= 1 {
        return 0.0;
    }
    (1.0 - order_parameter(phases)).clamp(0.0, 1.0)
}

/// Mean absolute circular distance from each phase to `anchor`, in `[0, π]`.
pub fn mean_abs_distance(phases: &[f64], anchor: f64) -> f64 {
    if phases.is_empty() {
        return 0.0;
    }
    let total: f64 = phases.iter().map(|&p| circular_distance(p, anchor)).sum();
    total / phases.len() as f64
}

/// Phase convergence toward `anchor`: `1 - mean_abs_distance / π`.
///
/// 1.0 when every phase sits exactly on the anchor, 0.0 when the
/// population averages a half-turn away.
pub fn phase_convergence(phases: &[f64], anchor: f64) -> f64 {
    (1.0 - mean_abs_distance(phases, anchor) / PI).clamp(0.0, 1.0)
}

/// Sum of unit vectors for the given phases: `(Σcos, Σsin)`.
fn resultant(phases: &[f64]) -> (f64, f64) {
    phases
        .iter()
        .fold((0.0, 0.0), |(c, s), &p| (c + p.cos(), s + p.sin()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_wrap_canonical_range() {
        assert!((wrap(0.0) - 0.0).abs() < EPS);
        assert!((wrap(TAU) - 0.0).abs() < EPS);
        assert!((wrap(-PI) - PI).abs() < EPS);
        assert!((wrap(3.0 * PI) - PI).abs() < EPS);
        assert!((wrap(-0.1) - (TAU - 0.1)).abs() < EPS);
    }

    #[test]
    fn test_wrap_non_finite() {
        assert_eq!(wrap(f64::NAN), 0.0);
        assert_eq!(wrap(f64::INFINITY), 0.0);
        assert_eq!(wrap(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_signed_diff_shortest_arc() {
        assert!((signed_diff(0.1, TAU - 0.1) - 0.2).abs() < EPS);
        assert!((signed_diff(TAU - 0.1, 0.1) + 0.2).abs() < EPS);
        // Antipodal points resolve to +π, not -π.
        assert!((signed_diff(PI, 0.0) - PI).abs() < EPS);
    }

    #[test]
    fn test_order_parameter_aligned() {
        let phases = vec![1.3; 50];
        assert!((order_parameter(&phases) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_order_parameter_antiphase() {
        let phases = vec![0.0, PI, 0.0, PI];
        assert!(order_parameter(&phases) < 1e-6);
    }

    #[test]
    fn test_order_parameter_uniform_spread() {
        let n = 360;
        let phases: Vec<f64> = (0..n).map(|i| TAU * i as f64 / n as f64).collect();
        assert!(order_parameter(&phases) < 1e-6);
    }

    #[test]
    fn test_order_parameter_singleton() {
        assert!((order_parameter(&[2.5]) - 1.0).abs() < EPS);
        assert!((order_parameter(&[]) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_circular_mean_straddles_zero() {
        // Mean of phases either side of 0 is 0, not π.
        let phases = vec![TAU - 0.2, 0.2];
        let mean = circular_mean(&phases);
        assert!(mean < 1e-6 || (TAU - mean) < 1e-6, "mean was {mean}");
    }

    #[test]
    fn test_circular_variance_bounds() {
        assert!((circular_variance(&[1.0, 1.0, 1.0]) - 0.0).abs() < EPS);
        let anti = vec![0.0, PI];
        assert!((circular_variance(&anti) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_phase_convergence_anchored() {
        let phases = vec![PI; 20];
        assert!((phase_convergence(&phases, PI) - 1.0).abs() < EPS);
        let opposed = vec![0.0; 20];
        assert!(phase_convergence(&opposed, PI) < 1e-6);
    }

    #[test]
    fn test_lerp_arc_endpoints() {
        assert!((lerp_arc(0.5, 2.5, 0.0) - 0.5).abs() < EPS);
        assert!((lerp_arc(0.5, 2.5, 1.0) - 2.5).abs() < EPS);
        // Interpolation crosses the 0/2π seam by the short way.
        let mid = lerp_arc(TAU - 0.2, 0.2, 0.5);
        assert!(mid < 1e-6 || (TAU - mid) < 1e-6, "mid was {mid}");
    }

    proptest! {
        #[test]
        fn prop_wrap_idempotent(x in -1e6f64..1e6f64) {
            let once = wrap(x);
            prop_assert!((wrap(once) - once).abs() < 1e-9);
            prop_assert!((0.0..TAU).contains(&once));
        }

        #[test]
        fn prop_wrap_periodic(x in -100.0f64..100.0f64, k in -50i32..50i32) {
            let shifted = wrap(x + TAU * f64::from(k));
            let base = wrap(x);
            let d = circular_distance(shifted, base);
            prop_assert!(d < 1e-6, "wrap not periodic: {shifted} vs {base}");
        }

        #[test]
        fn prop_signed_diff_range(a in -50.0f64..50.0, b in -50.0f64..50.0) {
            let d = signed_diff(a, b);
            prop_assert!(d > -PI - 1e-12 && d <= PI + 1e-12);
        }

        #[test]
        fn prop_order_parameter_unit_interval(
            phases in prop::collection::vec(-10.0f64..10.0, 0..64)
        ) {
            let r = order_parameter(&phases);
            prop_assert!((0.0..=1.0).contains(&r));
        }
    }
}
