//! Sliding-window duty-cycle accounting.
//!
//! Mirrors a bucketed ring rather than a literal sliding window: time is
//! divided into `bucket_count` buckets of `bucket_secs` each, covering a
//! total observation window of `bucket_count * bucket_secs`. Each call to
//! [`DutyCycleTracker::report`] folds on-air seconds into the current
//! bucket, first rotating the ring forward by however many whole buckets
//! have elapsed since the last report. `get_duty` then sums the last N
//! buckets and divides by their total duration.
use crate::error::GatewayError;

pub struct DutyCycleTracker {
    bucket_secs: f64,
    buckets: Vec<f64>,
    /// Index of the current (most recent) bucket.
    head: usize,
    /// Fractional seconds into the current bucket as of the last report.
    offset: f64,
}

impl DutyCycleTracker {
    /// `observed_max_secs` is the total window this tracker reports duty
    /// cycle over (e.g. 3600 for an hourly regulatory limit);
    /// `bucket_secs` is the granularity of each bucket (e.g. 60). Both
    /// must be positive and `bucket_secs` must not exceed
    /// `observed_max_secs`.
    pub fn new(observed_max_secs: f64, bucket_secs: f64) -> Result<Self, GatewayError> {
        if observed_max_secs <= 0.0 || bucket_secs <= 0.0 {
            return Err(GatewayError::precondition(
                "duty cycle window and bucket size must be positive",
            ));
        }
        if bucket_secs > observed_max_secs {
            return Err(GatewayError::precondition(
                "bucket size must not exceed the observation window",
            ));
        }
        let bucket_count = (observed_max_secs / bucket_secs).ceil() as usize;
        Ok(Self {
            bucket_secs,
            buckets: vec![0.0; bucket_count.max(1)],
            head: 0,
            offset: 0.0,
        })
    }

    /// Advances the ring by `elapsed_secs` of wall-clock time, then folds
    /// `on_air_secs` of transmit/receive time into the (now current)
    /// bucket. `on_air_secs` must not exceed `bucket_secs`: a single
    /// report can't describe more on-air time than fits in one bucket.
    pub fn report(&mut self, elapsed_secs: f64, on_air_secs: f64) -> Result<(), GatewayError> {
        if on_air_secs > self.bucket_secs {
            return Err(GatewayError::precondition(format!(
                "on-air time {on_air_secs} exceeds bucket duration {}",
                self.bucket_secs
            )));
        }
        self.advance(elapsed_secs);
        self.buckets[self.head] += on_air_secs;
        Ok(())
    }

    fn advance(&mut self, elapsed_secs: f64) {
        let total_offset = self.offset + elapsed_secs;
        let whole_buckets = (total_offset / self.bucket_secs).floor() as usize;
        let advance_by = whole_buckets.min(self.buckets.len());
        for _ in 0..advance_by {
            self.head = (self.head + 1) % self.buckets.len();
            self.buckets[self.head] = 0.0;
        }
        self.offset = total_offset % self.bucket_secs;
    }

    /// Fraction of on-air time over the trailing `window_secs`, which must
    /// be a positive multiple of `bucket_secs` no larger than the full
    /// observation window.
    pub fn duty(&self, window_secs: f64) -> Result<f64, GatewayError> {
        if window_secs < self.bucket_secs || window_secs > self.bucket_secs * self.buckets.len() as f64 {
            return Err(GatewayError::precondition(format!(
                "duty cycle query window {window_secs} out of range"
            )));
        }
        let n = (window_secs / self.bucket_secs).round() as usize;
        let n = n.clamp(1, self.buckets.len());
        let mut total = 0.0;
        for i in 0..n {
            let idx = (self.head + self.buckets.len() - i) % self.buckets.len();
            total += self.buckets[idx];
        }
        Ok(total / (n as f64 * self.bucket_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duty_grows_with_transmissions() {
        let mut tracker = DutyCycleTracker::new(3600.0, 60.0).unwrap();
        tracker.report(0.0, 0.5).unwrap();
        let duty = tracker.duty(60.0).unwrap();
        assert!((duty - 0.5 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_on_air_time_exceeding_bucket() {
        let mut tracker = DutyCycleTracker::new(3600.0, 60.0).unwrap();
        assert!(tracker.report(0.0, 61.0).is_err());
    }

    #[test]
    fn old_buckets_age_out() {
        let mut tracker = DutyCycleTracker::new(180.0, 60.0).unwrap();
        tracker.report(0.0, 10.0).unwrap();
        tracker.report(200.0, 0.0).unwrap();
        let duty = tracker.duty(180.0).unwrap();
        assert_eq!(duty, 0.0);
    }

    #[test]
    fn rejects_query_window_larger_than_observation() {
        let tracker = DutyCycleTracker::new(600.0, 60.0).unwrap();
        assert!(tracker.duty(700.0).is_err());
    }

    #[test]
    fn rejects_query_window_smaller_than_a_bucket() {
        let tracker = DutyCycleTracker::new(600.0, 60.0).unwrap();
        assert!(tracker.duty(30.0).is_err());
    }
}
