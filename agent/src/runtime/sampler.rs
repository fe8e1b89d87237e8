use core::convert::Infallible;

use embassy_sync::blocking_mutex::raw::RawMutex;
use stride_core::motion::MotionSample;

use super::Agent;
use crate::platform::MotionSensor;

impl<M: RawMutex> Agent<M> {
    /// Feeds sensor samples to the detector for the rest of the session.
    ///
    /// Parks forever when the sensor did not start.
    pub(super) async fn sample_loop<S: MotionSensor>(
        &self,
        sensor: &mut S,
        sensing: bool,
    ) -> Infallible {
        if !sensing {
            return core::future::pending().await;
        }

        loop {
            let sample = sensor.next_sample().await;
            self.process_sample(&sample);
        }
    }

    /// Runs one sample through the detector under the tracker lock.
    ///
    /// Returns `true` when it produced a step.
    pub fn process_sample(&self, sample: &MotionSample) -> bool {
        let now_ms = self.uptime_ms();
        let counters = self.with_tracker(|tracker| {
            tracker
                .record_sample(sample, now_ms)
                .map(|_| (tracker.display(), tracker.pending()))
        });

        let Some((display, pending)) = counters else {
            return false;
        };
        self.with_telemetry(|telemetry, now| {
            telemetry.record_step(display, pending, now);
        });
        true
    }
}
