//! Pattern completion: turning gaps into concrete nudges.
//!
//! A pure translation layer. Given the current pattern and the gaps
//! separating it from the target, completion proposes a phase shift and a
//! frequency shift — *desired* adjustments, not commands; the
//! goal-directed loop dampens and redistributes them per agent.
//!
//! When a stored template sits close enough to the target, the
//! interpolation aims at the template instead: templates are memories of
//! previously achieved patterns, and steering toward a known-good shape
//! beats steering toward an abstract tuple. Interpolation weight is
//! capped at 0.5 per tick in either mode so completion can never demand
//! a teleport.

use std::sync::RwLock;

use crate::domain::models::pattern::{pattern_distance, GapKind, Pattern, PatternGap};
use crate::domain::models::phase;

/// Per-tick cap on any single interpolation weight.
const MAX_STEP_WEIGHT: f64 = 0.5;

/// Default pattern distance within which a template counts as a match.
const DEFAULT_MATCH_THRESHOLD: f64 = 0.2;

// ---------------------------------------------------------------------------
// Adjustments
// ---------------------------------------------------------------------------

/// The completion engine's output for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Adjustments {
    /// Desired mean phase shift, radians.
    pub phase_shift: f64,
    /// Desired oscillation-period shift, seconds (signed).
    pub frequency_shift: f64,
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// A remembered pattern, optionally with a sampled waveform.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Template {
    /// The remembered pattern tuple.
    pub pattern: Pattern,
    /// Optional waveform samples for shape-level blending.
    pub waveform: Option<Vec<f64>>,
}

impl Template {
    /// A template with no waveform.
    pub fn from_pattern(pattern: Pattern) -> Self {
        Self {
            pattern,
            waveform: None,
        }
    }
}

// ---------------------------------------------------------------------------
// PatternCompletion
// ---------------------------------------------------------------------------

/// Gap-to-nudge translator with an optional template store.
///
/// Template reads vastly outnumber writes; the store sits behind a
/// reader-writer lock.
#[derive(Debug)]
pub struct PatternCompletion {
    templates: RwLock<Vec<Template>>,
    match_threshold: f64,
}

impl Default for PatternCompletion {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

impl PatternCompletion {
    /// A completion engine matching templates within `match_threshold`
    /// pattern distance.
    pub fn new(match_threshold: f64) -> Self {
        Self {
            templates: RwLock::new(Vec::new()),
            match_threshold: match_threshold.clamp(0.0, 1.0),
        }
    }

    /// Store a template for future guidance.
    pub fn add_template(&self, template: Template) {
        self.templates
            .write()
            .expect("template lock poisoned")
            .push(template);
    }

    /// Drop all stored templates.
    pub fn clear_templates(&self) {
        self.templates
            .write()
            .expect("template lock poisoned")
            .clear();
    }

    /// Number of stored templates.
    pub fn template_count(&self) -> usize {
        self.templates.read().expect("template lock poisoned").len()
    }

    /// The stored template closest to `target`, if any is within the
    /// match threshold.
    fn best_match(&self, target: &Pattern) -> Option<Pattern> {
        let templates = self.templates.read().expect("template lock poisoned");
        templates
            .iter()
            .map(|t| (pattern_distance(&t.pattern, target), &t.pattern))
            .filter(|(distance, _)| *distance <= self.match_threshold)
            .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(_, pattern)| pattern.clone())
    }

    /// Translate gaps into desired phase/frequency shifts.
    ///
    /// Each gap interpolates its dimension from `current` toward the
    /// guide (matched template, else the target) weighted by
    /// `min(severity, 0.5)`. Coherence gaps have no dimension of their
    /// own here; they lean on the phase shift at half weight, since
    /// coherence rises as phases collapse onto the anchor.
    pub fn complete(
        &self,
        current: &Pattern,
        target: &Pattern,
        gaps: &[PatternGap],
    ) -> Adjustments {
        let guide = self.best_match(target).unwrap_or_else(|| target.clone());
        let mut adjustments = Adjustments::default();

        for gap in gaps {
            let weight = gap.severity.min(MAX_STEP_WEIGHT);
            match gap.kind {
                GapKind::Phase => {
                    adjustments.phase_shift +=
                        phase::signed_diff(guide.phase, current.phase) * weight;
                }
                GapKind::Frequency => {
                    adjustments.frequency_shift +=
                        (guide.frequency_secs() - current.frequency_secs()) * weight;
                }
                GapKind::Coherence => {
                    adjustments.phase_shift +=
                        phase::signed_diff(guide.phase, current.phase) * weight * 0.5;
                }
                GapKind::Waveform => {
                    // Shape-level gaps only arise from explicit template
                    // comparisons; they carry no phase/frequency nudge.
                }
            }
        }

        adjustments
    }
}

// ---------------------------------------------------------------------------
// Waveform blending
// ---------------------------------------------------------------------------

/// Resample both waveforms to a common length and blend pointwise.
///
/// `weight` pulls toward `toward` (0.0 returns `base` resampled, 1.0
/// returns `toward` resampled). Empty inputs yield an empty result.
pub fn blend_waveforms(base: &[f64], toward: &[f64], weight: f64) -> Vec<f64> {
    if base.is_empty() || toward.is_empty() {
        return Vec::new();
    }
    let length = base.len().max(toward.len());
    let weight = weight.clamp(0.0, 1.0);
    (0..length)
        .map(|i| {
            let position = i as f64 / (length - 1).max(1) as f64;
            let a = sample_at(base, position);
            let b = sample_at(toward, position);
            a * (1.0 - weight) + b * weight
        })
        .collect()
}

/// Linear interpolation of `samples` at normalized `position` in [0, 1].
fn sample_at(samples: &[f64], position: f64) -> f64 {
    if samples.len() == 1 {
        return samples[0];
    }
    let scaled = position.clamp(0.0, 1.0) * (samples.len() - 1) as f64;
    let lower = scaled.floor() as usize;
    let upper = scaled.ceil() as usize;
    let fraction = scaled - lower as f64;
    samples[lower] * (1.0 - fraction) + samples[upper.min(samples.len() - 1)] * fraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::pattern::identify_gaps;
    use std::f64::consts::PI;
    use std::time::Duration;

    fn pattern(phase: f64, freq_ms: u64, coherence: f64) -> Pattern {
        Pattern {
            phase,
            frequency: Duration::from_millis(freq_ms),
            coherence,
            amplitude: 1.0,
            stability: 0.9,
        }
    }

    #[test]
    fn test_no_gaps_no_adjustment() {
        let completion = PatternCompletion::default();
        let p = pattern(1.0, 100, 0.7);
        let result = completion.complete(&p, &p, &identify_gaps(&p, &p));
        assert_eq!(result, Adjustments::default());
    }

    #[test]
    fn test_phase_gap_produces_capped_shift() {
        let completion = PatternCompletion::default();
        let current = pattern(0.0, 100, 0.7);
        let target = pattern(PI, 100, 0.7);
        let gaps = identify_gaps(&current, &target);
        let result = completion.complete(&current, &target, &gaps);
        // Severity 1.0 caps at weight 0.5: half of π.
        assert!((result.phase_shift - PI / 2.0).abs() < 1e-9);
        assert_eq!(result.frequency_shift, 0.0);
    }

    #[test]
    fn test_frequency_gap_direction() {
        let completion = PatternCompletion::default();
        let current = pattern(1.0, 200, 0.7);
        let target = pattern(1.0, 100, 0.7);
        let gaps = identify_gaps(&current, &target);
        let result = completion.complete(&current, &target, &gaps);
        assert!(result.frequency_shift < 0.0, "period should shrink");
    }

    #[test]
    fn test_template_match_redirects_interpolation() {
        let completion = PatternCompletion::default();
        // Template is near the target but offset in phase.
        let template_pattern = pattern(2.0, 100, 0.78);
        completion.add_template(Template::from_pattern(template_pattern));

        let current = pattern(0.0, 100, 0.3);
        let target = pattern(2.2, 100, 0.8);
        let gaps = identify_gaps(&current, &target);
        let guided = completion.complete(&current, &target, &gaps);

        let bare = PatternCompletion::default();
        let unguided = bare.complete(&current, &target, &gaps);

        // The guided shift aims at 2.0, the unguided at 2.2.
        assert!(guided.phase_shift < unguided.phase_shift);
        assert!(guided.phase_shift > 0.0);
    }

    #[test]
    fn test_distant_template_is_ignored() {
        let completion = PatternCompletion::new(0.05);
        completion.add_template(Template::from_pattern(pattern(PI, 1000, 0.1)));
        let current = pattern(0.0, 100, 0.3);
        let target = pattern(1.0, 100, 0.8);
        let gaps = identify_gaps(&current, &target);
        let guided = completion.complete(&current, &target, &gaps);
        let unguided = PatternCompletion::default().complete(&current, &target, &gaps);
        assert!((guided.phase_shift - unguided.phase_shift).abs() < 1e-12);
    }

    #[test]
    fn test_template_store_management() {
        let completion = PatternCompletion::default();
        assert_eq!(completion.template_count(), 0);
        completion.add_template(Template::from_pattern(pattern(1.0, 100, 0.5)));
        completion.add_template(Template::from_pattern(pattern(2.0, 100, 0.5)));
        assert_eq!(completion.template_count(), 2);
        completion.clear_templates();
        assert_eq!(completion.template_count(), 0);
    }

    #[test]
    fn test_blend_waveforms_endpoints() {
        let a = vec![0.0, 1.0, 0.0];
        let b = vec![1.0, 0.0, 1.0];
        let blended = blend_waveforms(&a, &b, 0.0);
        assert_eq!(blended, a);
        let blended = blend_waveforms(&a, &b, 1.0);
        assert_eq!(blended, b);
    }

    #[test]
    fn test_blend_waveforms_resamples_to_longer() {
        let short = vec![0.0, 1.0];
        let long = vec![0.0, 0.5, 1.0, 0.5];
        let blended = blend_waveforms(&short, &long, 0.5);
        assert_eq!(blended.len(), 4);
        for value in &blended {
            assert!(value.is_finite());
        }
    }

    #[test]
    fn test_blend_waveforms_empty() {
        assert!(blend_waveforms(&[], &[1.0], 0.5).is_empty());
        assert!(blend_waveforms(&[1.0], &[], 0.5).is_empty());
    }
}
