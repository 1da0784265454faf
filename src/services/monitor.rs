//! Convergence monitoring over a sliding sample window.
//!
//! The monitor watches distance-to-target over time and answers three
//! questions for the goal-directed loop: are we converging, are we stuck,
//! and should the current strategy be swapped out. All three derive from
//! the same ring buffer of samples; velocity and acceleration are finite
//! differences over the elapsed time between consecutive samples, and
//! the trend is a least-squares slope across the window.

use std::collections::VecDeque;
use std::time::Instant;

use crate::domain::models::pattern::Pattern;

/// Default sample window.
const DEFAULT_WINDOW: usize = 10;

/// Slope magnitude (distance units per second) below which the trajectory
/// counts as flat.
const SLOPE_EPSILON: f64 = 0.005;

/// Projected distance change across the whole window below which the
/// window counts as a plateau. Judging the window-level projection, not
/// the raw slope, keeps sample noise from masking a genuine plateau.
const FLAT_WINDOW_CHANGE: f64 = 0.02;

/// Velocity at or above which a sample shows no meaningful improvement.
const VELOCITY_EPSILON: f64 = 0.003;

/// Fraction of flat samples that demands a strategy switch.
const SWITCH_RATIO: f64 = 0.7;

/// Consecutive flat observations before the trajectory counts as stuck.
const STUCK_THRESHOLD: u32 = 5;

// ---------------------------------------------------------------------------
// MonitorSample
// ---------------------------------------------------------------------------

/// One observation of the swarm's distance to its target.
#[derive(Debug, Clone, Copy)]
pub struct MonitorSample {
    /// When the sample was taken.
    pub at: Instant,
    /// Pattern distance to the target, `[0, 1]`.
    pub distance: f64,
    /// Order parameter at sample time.
    pub coherence: f64,
    /// Finite-difference distance change per second (negative is
    /// improvement). Zero for the first sample.
    pub velocity: f64,
    /// Finite-difference velocity change per second. Zero for the first
    /// two samples.
    pub acceleration: f64,
}

// ---------------------------------------------------------------------------
// ConvergenceMonitor
// ---------------------------------------------------------------------------

/// Ring-buffered distance monitor.
#[derive(Debug)]
pub struct ConvergenceMonitor {
    window: usize,
    samples: VecDeque<MonitorSample>,
    initial_distance: Option<f64>,
    stable_count: u32,
    target: Option<Pattern>,
}

impl Default for ConvergenceMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl ConvergenceMonitor {
    /// A monitor keeping the most recent `window` samples.
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(2),
            samples: VecDeque::with_capacity(window.max(2)),
            initial_distance: None,
            stable_count: 0,
            target: None,
        }
    }

    /// Tell the monitor what it is measuring against.
    pub fn set_target(&mut self, target: Pattern) {
        self.target = Some(target);
    }

    /// The target currently being tracked.
    pub fn target(&self) -> Option<&Pattern> {
        self.target.as_ref()
    }

    /// Append a sample taken `at` with the given distance and coherence.
    pub fn record(&mut self, at: Instant, distance: f64, coherence: f64) {
        if self.initial_distance.is_none() {
            self.initial_distance = Some(distance);
        }

        let (velocity, acceleration) = match self.samples.back() {
            Some(previous) => {
                let dt = at.duration_since(previous.at).as_secs_f64().max(1e-6);
                let velocity = (distance - previous.distance) / dt;
                let acceleration = (velocity - previous.velocity) / dt;
                (velocity, acceleration)
            }
            None => (0.0, 0.0),
        };

        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(MonitorSample {
            at,
            distance,
            coherence,
            velocity,
            acceleration,
        });

        // The stable counter advances on every flat window and resets
        // only on clear improvement: a noisy plateau wobbles both ways,
        // and upward wobbles must not disguise it as progress.
        if self.samples.len() >= 3 {
            let projected = self.slope() * self.window_span();
            if projected < -FLAT_WINDOW_CHANGE {
                self.stable_count = 0;
            } else if projected.abs() < FLAT_WINDOW_CHANGE {
                self.stable_count += 1;
            }
        } else {
            self.stable_count = 0;
        }
    }

    /// Elapsed seconds between the oldest and newest held samples.
    fn window_span(&self) -> f64 {
        match (self.samples.front(), self.samples.back()) {
            (Some(first), Some(last)) => last.at.duration_since(first.at).as_secs_f64(),
            _ => 0.0,
        }
    }

    /// Least-squares slope of distance over time across the window, in
    /// distance units per second. Zero until two samples exist.
    pub fn slope(&self) -> f64 {
        let n = self.samples.len();
        if n < 2 {
            return 0.0;
        }
        let t0 = self.samples.front().map(|s| s.at).unwrap_or_else(Instant::now);
        let points: Vec<(f64, f64)> = self
            .samples
            .iter()
            .map(|s| (s.at.duration_since(t0).as_secs_f64(), s.distance))
            .collect();

        let count = points.len() as f64;
        let mean_t = points.iter().map(|(t, _)| t).sum::<f64>() / count;
        let mean_d = points.iter().map(|(_, d)| d).sum::<f64>() / count;
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for (t, d) in &points {
            numerator += (t - mean_t) * (d - mean_d);
            denominator += (t - mean_t) * (t - mean_t);
        }
        if denominator < 1e-12 {
            0.0
        } else {
            numerator / denominator
        }
    }

    /// Whether the distance trend is meaningfully downward.
    pub fn is_converging(&self) -> bool {
        self.samples.len() >= 3 && self.slope() < -SLOPE_EPSILON
    }

    /// Whether the trajectory has sat flat long enough to count as stuck.
    pub fn is_stuck(&self) -> bool {
        self.stable_count > STUCK_THRESHOLD
    }

    /// Whether the current strategy has earned a swap: most of the recent
    /// window shows no meaningful improvement.
    pub fn should_switch_strategy(&self) -> bool {
        if self.samples.len() < self.window.min(5) {
            return false;
        }
        let flat = self
            .samples
            .iter()
            .filter(|s| s.velocity >= -VELOCITY_EPSILON)
            .count();
        flat as f64 / self.samples.len() as f64 > SWITCH_RATIO
    }

    /// Progress from the first recorded distance toward zero, `[0, 1]`.
    pub fn progress(&self) -> f64 {
        match (self.initial_distance, self.samples.back()) {
            (Some(initial), Some(latest)) if initial > 1e-9 => {
                (1.0 - latest.distance / initial).clamp(0.0, 1.0)
            }
            (Some(_), Some(_)) => 1.0,
            _ => 0.0,
        }
    }

    /// The most recent sample, if any.
    pub fn latest(&self) -> Option<&MonitorSample> {
        self.samples.back()
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no samples have been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Clear samples and counters. The recovery loop calls this before
    /// relaunching synchronization so stale history cannot bias the new
    /// attempt.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.initial_distance = None;
        self.stable_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Feed a distance series at a fixed 50ms cadence starting at
    /// `start`; returns the timestamp the next series should start from
    /// so continuations stay monotonic.
    fn feed_at(monitor: &mut ConvergenceMonitor, start: Instant, distances: &[f64]) -> Instant {
        for (i, &distance) in distances.iter().enumerate() {
            let at = start + Duration::from_millis(50 * i as u64);
            monitor.record(at, distance, 1.0 - distance);
        }
        start + Duration::from_millis(50 * distances.len() as u64)
    }

    fn feed(monitor: &mut ConvergenceMonitor, distances: &[f64]) {
        feed_at(monitor, Instant::now(), distances);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut monitor = ConvergenceMonitor::new(5);
        feed(&mut monitor, &[0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3]);
        assert_eq!(monitor.len(), 5);
        assert!((monitor.latest().unwrap().distance - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_descending_series_is_converging() {
        let mut monitor = ConvergenceMonitor::default();
        feed(&mut monitor, &[0.9, 0.8, 0.7, 0.6, 0.5]);
        assert!(monitor.is_converging());
        assert!(monitor.slope() < 0.0);
        assert!(!monitor.is_stuck());
    }

    #[test]
    fn test_flat_series_goes_stuck() {
        let mut monitor = ConvergenceMonitor::default();
        feed(
            &mut monitor,
            &[0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5],
        );
        assert!(monitor.is_stuck());
        assert!(!monitor.is_converging());
    }

    #[test]
    fn test_improvement_resets_stable_counter() {
        let mut monitor = ConvergenceMonitor::default();
        let start = Instant::now();
        let next = feed_at(&mut monitor, start, &[0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5]);
        assert!(monitor.is_stuck());
        // A sharp improvement breaks the plateau.
        feed_at(&mut monitor, next, &[0.3, 0.1]);
        assert!(!monitor.is_stuck());
    }

    #[test]
    fn test_should_switch_on_flat_window() {
        let mut monitor = ConvergenceMonitor::default();
        feed(
            &mut monitor,
            &[0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5],
        );
        assert!(monitor.should_switch_strategy());
    }

    #[test]
    fn test_no_switch_while_improving() {
        let mut monitor = ConvergenceMonitor::default();
        feed(
            &mut monitor,
            &[1.0, 0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3, 0.2, 0.1],
        );
        assert!(!monitor.should_switch_strategy());
    }

    #[test]
    fn test_progress_tracks_initial_distance() {
        let mut monitor = ConvergenceMonitor::default();
        let start = Instant::now();
        let next = feed_at(&mut monitor, start, &[0.8, 0.6, 0.4]);
        assert!((monitor.progress() - 0.5).abs() < 1e-9);
        feed_at(&mut monitor, next, &[0.0]);
        assert!((monitor.progress() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_velocity_sign_convention() {
        let mut monitor = ConvergenceMonitor::default();
        feed(&mut monitor, &[0.8, 0.6]);
        // Improving distance means negative velocity.
        assert!(monitor.latest().unwrap().velocity < 0.0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut monitor = ConvergenceMonitor::default();
        feed(&mut monitor, &[0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5]);
        monitor.reset();
        assert!(monitor.is_empty());
        assert!(!monitor.is_stuck());
        assert_eq!(monitor.progress(), 0.0);
        assert_eq!(monitor.slope(), 0.0);
    }

    #[test]
    fn test_empty_monitor_answers_conservatively() {
        let monitor = ConvergenceMonitor::default();
        assert!(!monitor.is_converging());
        assert!(!monitor.is_stuck());
        assert!(!monitor.should_switch_strategy());
        assert_eq!(monitor.progress(), 0.0);
    }
}
