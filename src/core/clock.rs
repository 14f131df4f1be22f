//! Millisecond capture clock
//!
//! Notifications are stamped on arrival. Reading `chrono::Utc::now()` for every
//! notification costs a syscall, so the clock keeps a monotonic `Instant` and a
//! UTC base and only recalibrates every few minutes.

use std::time::Instant;

use parking_lot::Mutex;

/// Monotonic clock anchored to a UTC millisecond timestamp.
#[derive(Debug)]
pub struct CaptureClock {
    base_instant: Instant,
    base_timestamp_ms: i64,
    last_calibration: Instant,
    calibration_interval_secs: u64,
}

impl CaptureClock {
    pub fn new() -> Self {
        Self::new_with_calibration_interval(300)
    }

    pub fn new_with_calibration_interval(calibration_interval_secs: u64) -> Self {
        let now = Instant::now();
        Self {
            base_instant: now,
            base_timestamp_ms: chrono::Utc::now().timestamp_millis(),
            last_calibration: now,
            calibration_interval_secs,
        }
    }

    #[inline(always)]
    pub fn now_ms(&self) -> i64 {
        self.base_timestamp_ms + self.base_instant.elapsed().as_millis() as i64
    }

    /// Same as [`now_ms`](Self::now_ms) but re-anchors to wall time once the
    /// calibration interval has passed and drift exceeds 5ms.
    pub fn now_ms_calibrated(&mut self) -> i64 {
        if self.last_calibration.elapsed().as_secs() >= self.calibration_interval_secs {
            let monotonic = Instant::now();
            let wall = chrono::Utc::now().timestamp_millis();
            let expected = self.base_timestamp_ms
                + monotonic.duration_since(self.base_instant).as_millis() as i64;
            if (wall - expected).abs() > 5 {
                self.base_instant = monotonic;
                self.base_timestamp_ms = wall;
            }
            self.last_calibration = monotonic;
        }
        self.now_ms()
    }

    #[inline(always)]
    pub fn elapsed_ms_since(&self, start_ms: i64) -> i64 {
        self.now_ms() - start_ms
    }
}

impl Default for CaptureClock {
    fn default() -> Self {
        Self::new()
    }
}

static CAPTURE_CLOCK: once_cell::sync::Lazy<Mutex<CaptureClock>> =
    once_cell::sync::Lazy::new(|| Mutex::new(CaptureClock::new()));

/// Current UTC time in milliseconds from the process-wide capture clock.
#[inline]
pub fn now_ms() -> i64 {
    CAPTURE_CLOCK.lock().now_ms_calibrated()
}

#[inline]
pub fn elapsed_ms_since(start_ms: i64) -> i64 {
    now_ms() - start_ms
}
