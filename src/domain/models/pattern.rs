//! Rhythmic patterns, pattern distance, and gap identification.
//!
//! A [`Pattern`] is the five-field description of a population rhythm:
//! mean phase, oscillation period, coherence (Kuramoto order parameter),
//! plus the nominal amplitude and stability fields used by template
//! matching in the completion engine. The same shape describes both the
//! target a swarm is converging toward and the current state measured
//! each tick.
//!
//! [`pattern_distance`] collapses two patterns into a single `[0, 1]`
//! scalar; [`identify_gaps`] breaks the difference apart again into
//! per-dimension [`PatternGap`] entries that the completion engine can
//! act on.

use std::f64::consts::PI;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::phase;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Weight of the phase dimension in [`pattern_distance`].
const DISTANCE_WEIGHT_PHASE: f64 = 0.4;

/// Weight of the frequency dimension in [`pattern_distance`].
const DISTANCE_WEIGHT_FREQUENCY: f64 = 0.3;

/// Weight of the coherence dimension in [`pattern_distance`].
const DISTANCE_WEIGHT_COHERENCE: f64 = 0.3;

/// Normalized phase discrepancy above which a phase gap is reported.
const GAP_THRESHOLD_PHASE: f64 = 0.05;

/// Normalized frequency discrepancy above which a frequency gap is reported.
const GAP_THRESHOLD_FREQUENCY: f64 = 0.05;

/// Coherence discrepancy above which a coherence gap is reported.
const GAP_THRESHOLD_COHERENCE: f64 = 0.02;

// ---------------------------------------------------------------------------
// Pattern
// ---------------------------------------------------------------------------

/// A rhythmic pattern: the tuple a swarm converges toward, and the shape
/// of every per-tick measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    /// Mean phase in radians, canonical range `[0, 2π)`.
    pub phase: f64,

    /// Oscillation period. Must be positive for a valid target.
    pub frequency: Duration,

    /// Kuramoto order parameter, `[0, 1]`.
    pub coherence: f64,

    /// Oscillation amplitude, `[0, 1]`. Nominally 1.0; only template
    /// matching distinguishes amplitudes.
    pub amplitude: f64,

    /// Pattern stability, `[0, 1]`. Nominally 0.9 for targets; measured
    /// patterns report `1 - circular variance`.
    pub stability: f64,
}

impl Pattern {
    /// Build a target pattern from the caller-facing triple. The phase is
    /// wrapped; amplitude and stability take their nominal values.
    pub fn target(phase: f64, frequency: Duration, coherence: f64) -> Self {
        Self {
            phase: phase::wrap(phase),
            frequency,
            coherence,
            amplitude: 1.0,
            stability: 0.9,
        }
    }

    /// Frequency in seconds as a float, for ratio math.
    pub(crate) fn frequency_secs(&self) -> f64 {
        self.frequency.as_secs_f64()
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Self {
            phase: 0.0,
            frequency: Duration::from_millis(100),
            coherence: 0.0,
            amplitude: 1.0,
            stability: 0.9,
        }
    }
}

// ---------------------------------------------------------------------------
// PatternGap
// ---------------------------------------------------------------------------

/// The dimension a [`PatternGap`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    /// Mean phase disagrees with the target phase.
    Phase,
    /// Oscillation period disagrees with the target period.
    Frequency,
    /// Order parameter disagrees with the target coherence.
    Coherence,
    /// Waveform shape disagrees with a stored template. Only produced by
    /// explicit template comparisons, never by [`identify_gaps`].
    Waveform,
}

impl GapKind {
    /// Stable string name, suitable for log fields and map keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Phase => "phase",
            Self::Frequency => "frequency",
            Self::Coherence => "coherence",
            Self::Waveform => "waveform",
        }
    }
}

/// A single-dimension discrepancy between the current and target pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternGap {
    /// Which dimension this gap measures.
    pub kind: GapKind,
    /// Current value in that dimension (radians, seconds, or coherence).
    pub current: f64,
    /// Target value in that dimension.
    pub target: f64,
    /// Normalized discrepancy, `[0, 1]`. Doubles as the interpolation
    /// weight in the completion engine.
    pub severity: f64,
}

// ---------------------------------------------------------------------------
// pattern_distance
// ---------------------------------------------------------------------------

/// Weighted distance between two patterns, bounded in `[0, 1]`.
///
/// Combines the normalized circular phase distance, the relative
/// frequency difference, and the coherence difference. Symmetric, zero on
/// identical patterns, and clamped so floating-point error can never
/// produce a negative distance.
pub fn pattern_distance(p: &Pattern, q: &Pattern) -> f64 {
    let phase_term = phase::circular_distance(p.phase, q.phase) / PI;

    let pf = p.frequency_secs();
    let qf = q.frequency_secs();
    let freq_term = if pf <= 0.0 && qf <= 0.0 {
        0.0
    } else {
        ((pf - qf).abs() / pf.max(qf)).clamp(0.0, 1.0)
    };

    let coherence_term = (p.coherence - q.coherence).abs().clamp(0.0, 1.0);

    let distance = DISTANCE_WEIGHT_PHASE * phase_term
        + DISTANCE_WEIGHT_FREQUENCY * freq_term
        + DISTANCE_WEIGHT_COHERENCE * coherence_term;

    distance.clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// identify_gaps
// ---------------------------------------------------------------------------

/// Break the current-vs-target difference into per-dimension gaps.
///
/// A gap is reported for each dimension whose normalized discrepancy
/// exceeds that dimension's threshold; severity is the discrepancy
/// itself. `identify_gaps(p, p)` is always empty.
pub fn identify_gaps(current: &Pattern, target: &Pattern) -> Vec<PatternGap> {
    let mut gaps = Vec::with_capacity(3);

    let phase_severity = phase::circular_distance(current.phase, target.phase) / PI;
    if phase_severity > GAP_THRESHOLD_PHASE {
        gaps.push(PatternGap {
            kind: GapKind::Phase,
            current: current.phase,
            target: target.phase,
            severity: phase_severity.clamp(0.0, 1.0),
        });
    }

    let cf = current.frequency_secs();
    let tf = target.frequency_secs();
    let freq_severity = if cf <= 0.0 && tf <= 0.0 {
        0.0
    } else {
        ((cf - tf).abs() / cf.max(tf)).clamp(0.0, 1.0)
    };
    if freq_severity > GAP_THRESHOLD_FREQUENCY {
        gaps.push(PatternGap {
            kind: GapKind::Frequency,
            current: cf,
            target: tf,
            severity: freq_severity,
        });
    }

    let coherence_severity = (current.coherence - target.coherence).abs().clamp(0.0, 1.0);
    if coherence_severity > GAP_THRESHOLD_COHERENCE {
        gaps.push(PatternGap {
            kind: GapKind::Coherence,
            current: current.coherence,
            target: target.coherence,
            severity: coherence_severity,
        });
    }

    gaps
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
