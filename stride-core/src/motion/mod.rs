//! Accelerometer samples and the threshold/debounce step detector.
//!
//! The detector consumes one sample at a time and emits at most one
//! [`StepEvent`] per debounce window. It deliberately uses a single global
//! magnitude threshold and a single global debounce timer: a burst of
//! above-threshold samples collapses into the first accepted step.

use core::{fmt, time::Duration};

/// Reference magnitude (in g) a sample must exceed to count as a step.
pub const DEFAULT_STEP_THRESHOLD_G: f32 = 1.2;

/// Reference minimum spacing between two accepted steps.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(350);

/// Milliseconds since an arbitrary, monotonic session epoch.
pub type TimestampMillis = u64;

/// Instantaneous tri-axial accelerometer reading in gravity units.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct MotionSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl MotionSample {
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// A device lying still: gravity only, on the z axis.
    #[must_use]
    pub const fn at_rest() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }

    /// Squared vector magnitude (`x² + y² + z²`).
    #[must_use]
    pub fn magnitude_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Returns `true` when `sqrt(x² + y² + z²) > threshold`.
    ///
    /// Both sides are non-negative, so comparing squares is exact enough and
    /// keeps `sqrt` out of `no_std` builds.
    #[must_use]
    pub fn exceeds(&self, threshold_g: f32) -> bool {
        self.magnitude_squared() > threshold_g * threshold_g
    }
}

/// A single detected footstep.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StepEvent {
    pub timestamp_ms: TimestampMillis,
}

/// The platform offers no accelerometer. Permanent for the session.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SensorUnavailable;

impl fmt::Display for SensorUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("motion sensor unavailable on this platform")
    }
}

impl core::error::Error for SensorUnavailable {}

/// Tunables for [`StepDetector`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DetectorConfig {
    /// Magnitude (g) a sample must strictly exceed.
    pub threshold_g: f32,
    /// Elapsed time since the previous step must strictly exceed this window.
    pub debounce: Duration,
}

impl DetectorConfig {
    #[must_use]
    pub const fn new(threshold_g: f32, debounce: Duration) -> Self {
        Self {
            threshold_g,
            debounce,
        }
    }

    fn debounce_ms(&self) -> u64 {
        u64::try_from(self.debounce.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_THRESHOLD_G, DEFAULT_DEBOUNCE)
    }
}

/// Why a sample did not produce a step.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SampleVerdict {
    /// Magnitude at or below the threshold.
    BelowThreshold,
    /// Above threshold but inside the debounce window of the previous step.
    Debounced,
    /// Accepted as a step.
    Step(StepEvent),
}

/// Magnitude-threshold step detector with a global debounce window.
#[derive(Clone, Debug)]
pub struct StepDetector {
    config: DetectorConfig,
    last_step_ms: Option<TimestampMillis>,
    accepted: u32,
    debounced: u32,
}

impl StepDetector {
    #[must_use]
    pub const fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            last_step_ms: None,
            accepted: 0,
            debounced: 0,
        }
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Timestamp of the most recently accepted step, if any.
    #[must_use]
    pub const fn last_step_ms(&self) -> Option<TimestampMillis> {
        self.last_step_ms
    }

    /// Number of steps accepted since construction or the last [`reset`](Self::reset).
    #[must_use]
    pub const fn accepted(&self) -> u32 {
        self.accepted
    }

    /// Number of above-threshold samples swallowed by the debounce window.
    #[must_use]
    pub const fn debounced(&self) -> u32 {
        self.debounced
    }

    /// Classifies a sample taken at `now_ms`, updating the debounce timer when
    /// the sample is accepted.
    pub fn classify(&mut self, sample: &MotionSample, now_ms: TimestampMillis) -> SampleVerdict {
        if !sample.exceeds(self.config.threshold_g) {
            return SampleVerdict::BelowThreshold;
        }

        if let Some(last) = self.last_step_ms {
            // A clock that steps backwards yields zero elapsed and stays debounced.
            let elapsed = now_ms.saturating_sub(last);
            if elapsed <= self.config.debounce_ms() {
                self.debounced = self.debounced.saturating_add(1);
                return SampleVerdict::Debounced;
            }
        }

        self.last_step_ms = Some(now_ms);
        self.accepted = self.accepted.saturating_add(1);
        SampleVerdict::Step(StepEvent { timestamp_ms: now_ms })
    }

    /// Processes a sample and returns the step it produced, if any.
    pub fn process(&mut self, sample: &MotionSample, now_ms: TimestampMillis) -> Option<StepEvent> {
        match self.classify(sample, now_ms) {
            SampleVerdict::Step(event) => Some(event),
            SampleVerdict::BelowThreshold | SampleVerdict::Debounced => None,
        }
    }

    /// Discards the debounce timer and diagnostics counters.
    pub fn reset(&mut self) {
        self.last_step_ms = None;
        self.accepted = 0;
        self.debounced = 0;
    }
}

impl Default for StepDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HARD: MotionSample = MotionSample::new(0.3, 0.4, 1.5);

    #[test]
    fn at_rest_sample_does_not_exceed_reference_threshold() {
        assert!(!MotionSample::at_rest().exceeds(DEFAULT_STEP_THRESHOLD_G));
        assert!(HARD.exceeds(DEFAULT_STEP_THRESHOLD_G));
    }

    #[test]
    fn sample_exactly_at_threshold_is_rejected() {
        let mut detector = StepDetector::default();
        let sample = MotionSample::new(0.0, 0.0, DEFAULT_STEP_THRESHOLD_G);

        assert_eq!(detector.classify(&sample, 0), SampleVerdict::BelowThreshold);
        assert_eq!(detector.last_step_ms(), None);
    }

    #[test]
    fn first_qualifying_sample_is_accepted_at_time_zero() {
        let mut detector = StepDetector::default();

        let event = detector.process(&HARD, 0).expect("first step accepted");
        assert_eq!(event.timestamp_ms, 0);
        assert_eq!(detector.last_step_ms(), Some(0));
    }

    #[test]
    fn elapsed_equal_to_window_is_still_debounced() {
        let mut detector = StepDetector::default();
        assert!(detector.process(&HARD, 1_000).is_some());

        assert_eq!(detector.classify(&HARD, 1_350), SampleVerdict::Debounced);
        assert!(detector.process(&HARD, 1_351).is_some());
        assert_eq!(detector.accepted(), 2);
        assert_eq!(detector.debounced(), 1);
    }

    #[test]
    fn debounced_samples_do_not_extend_the_window() {
        let mut detector = StepDetector::default();
        assert!(detector.process(&HARD, 0).is_some());
        for t in [100, 200, 300] {
            assert!(detector.process(&HARD, t).is_none());
        }

        // Window is measured from the accepted step, not the last rejected one.
        assert!(detector.process(&HARD, 351).is_some());
    }

    #[test]
    fn clock_going_backwards_is_treated_as_debounced() {
        let mut detector = StepDetector::default();
        assert!(detector.process(&HARD, 5_000).is_some());

        assert_eq!(detector.classify(&HARD, 10), SampleVerdict::Debounced);
    }

    #[test]
    fn reset_forgets_debounce_timer() {
        let mut detector = StepDetector::default();
        assert!(detector.process(&HARD, 1_000).is_some());

        detector.reset();

        assert_eq!(detector.last_step_ms(), None);
        assert_eq!(detector.accepted(), 0);
        assert!(detector.process(&HARD, 1_010).is_some());
    }

    #[test]
    fn custom_configuration_is_honoured() {
        let config = DetectorConfig::new(2.0, Duration::from_millis(100));
        let mut detector = StepDetector::new(config);

        assert!(detector.process(&HARD, 0).is_none(), "1.58g is below 2.0g");
        let strong = MotionSample::new(0.0, 0.0, 2.5);
        assert!(detector.process(&strong, 0).is_some());
        assert!(detector.process(&strong, 101).is_some());
    }
}
