//! Simulated accelerometer fed from console gait scripts.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use embassy_time::Timer;
use stride_agent::MotionSensor;
use stride_core::config::TrackerConfig;
use stride_core::motion::{MotionSample, SensorUnavailable};
use tracing::debug;

/// Peak of a heel strike, about 1.6 g.
const STRIDE_PEAK: MotionSample = MotionSample::new(0.25, 0.45, 1.5);

/// Alternating high-g samples used by `shake`.
const SHAKE_PATTERN: [MotionSample; 2] = [
    MotionSample::new(1.1, -0.8, 1.3),
    MotionSample::new(-0.9, 1.2, 0.7),
];

type Feed = Arc<Mutex<VecDeque<MotionSample>>>;

/// Accelerometer backed by a queue of scripted samples.
///
/// When the queue runs dry it reports rest (1 g straight down).
pub struct SimulatedAccelerometer {
    feed: Feed,
    available: bool,
    interval: Duration,
    started: bool,
}

impl SimulatedAccelerometer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            feed: Arc::default(),
            available: true,
            interval: Duration::from_millis(100),
            started: false,
        }
    }

    /// A platform without an accelerometer: `start` always fails.
    #[must_use]
    pub fn unsupported() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Handle for queueing motion while the sensor is owned by the runtime.
    #[must_use]
    pub fn gait(&self, config: &TrackerConfig) -> GaitControl {
        GaitControl {
            feed: Arc::clone(&self.feed),
            rest_per_stride: rest_samples_per_stride(config),
        }
    }
}

impl Default for SimulatedAccelerometer {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionSensor for SimulatedAccelerometer {
    fn start(&mut self, interval: Duration) -> Result<(), SensorUnavailable> {
        if !self.available {
            return Err(SensorUnavailable);
        }
        self.interval = interval;
        self.started = true;
        debug!(interval_ms = interval.as_millis(), "simulated accelerometer started");
        Ok(())
    }

    async fn next_sample(&mut self) -> MotionSample {
        let micros = u64::try_from(self.interval.as_micros()).unwrap_or(u64::MAX);
        Timer::after_micros(micros).await;
        lock(&self.feed)
            .pop_front()
            .unwrap_or_else(MotionSample::at_rest)
    }

    fn stop(&mut self) {
        if self.started {
            debug!("simulated accelerometer stopped");
        }
        self.started = false;
    }
}

/// Console side of the simulated sensor.
#[derive(Clone, Debug)]
pub struct GaitControl {
    feed: Feed,
    rest_per_stride: usize,
}

impl GaitControl {
    /// Queues `strides` heel strikes spaced just past the debounce window.
    pub fn walk(&self, strides: u32) -> usize {
        let mut feed = lock(&self.feed);
        for _ in 0..strides {
            feed.push_back(STRIDE_PEAK);
            feed.extend(std::iter::repeat_n(
                MotionSample::at_rest(),
                self.rest_per_stride,
            ));
        }
        feed.len()
    }

    /// Queues `samples` consecutive high-g samples.
    pub fn shake(&self, samples: u32) -> usize {
        let mut feed = lock(&self.feed);
        feed.extend(SHAKE_PATTERN.iter().copied().cycle().take(samples as usize));
        feed.len()
    }

    /// Drops everything still queued.
    pub fn idle(&self) -> usize {
        let mut feed = lock(&self.feed);
        let dropped = feed.len();
        feed.clear();
        dropped
    }

    /// Samples not yet delivered.
    #[must_use]
    pub fn queued(&self) -> usize {
        lock(&self.feed).len()
    }
}

/// Resting samples after each strike so consecutive strikes land outside
/// the debounce window.
fn rest_samples_per_stride(config: &TrackerConfig) -> usize {
    let interval = config.sample_interval.as_millis().max(1);
    let debounce = config.detector.debounce.as_millis();
    usize::try_from(debounce / interval + 1).unwrap_or(usize::MAX)
}

fn lock(feed: &Feed) -> std::sync::MutexGuard<'_, VecDeque<MotionSample>> {
    feed.lock().unwrap_or_else(PoisonError::into_inner)
}
