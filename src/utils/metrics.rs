//! Timing utilities
//!
//! `TimeRecorder` logs named sections of a long operation (index build,
//! batch search); `Metrics` collects repeated timings for throughput reports.

use std::time::{Duration, Instant};

/// Timer for measuring elapsed time with minimal overhead
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Start a new timer
    #[inline]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time since timer creation
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed seconds as f64
    #[inline]
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }
}

/// Logs the time spent in consecutive sections of a named operation
#[derive(Debug)]
pub struct TimeRecorder {
    name: String,
    begin: Instant,
    last: Instant,
}

impl TimeRecorder {
    /// Start recording
    pub fn new(name: &str) -> Self {
        let now = Instant::now();
        Self {
            name: name.to_string(),
            begin: now,
            last: now,
        }
    }

    /// Log time since the previous section and start a new one
    pub fn record_section(&mut self, msg: &str) -> Duration {
        let now = Instant::now();
        let span = now - self.last;
        self.last = now;
        log::debug!("{}: {} [{:.3} s]", self.name, msg, span.as_secs_f64());
        span
    }

    /// Log time since the recorder was created
    pub fn elapse_from_begin(&self, msg: &str) -> Duration {
        let span = self.begin.elapsed();
        log::info!("{}: {} [{:.3} s]", self.name, msg, span.as_secs_f64());
        span
    }
}

/// Performance metrics collector
#[derive(Debug, Default)]
pub struct Metrics {
    samples: Vec<Duration>,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a timing sample
    pub fn add_sample(&mut self, duration: Duration) {
        self.samples.push(duration);
    }

    /// Measure a function execution time
    #[inline]
    pub fn measure<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let timer = Timer::new();
        let result = f();
        self.add_sample(timer.elapsed());
        result
    }

    /// Get statistics from collected samples
    pub fn stats(&self) -> Stats {
        if self.samples.is_empty() {
            return Stats::default();
        }

        let mut sorted = self.samples.clone();
        sorted.sort();

        let count = sorted.len();
        let sum: Duration = sorted.iter().sum();

        Stats {
            count,
            mean: sum / count as u32,
            min: sorted[0],
            max: sorted[count - 1],
            p50: sorted[count / 2],
        }
    }
}

/// Statistical summary of timing measurements
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Stats {
    /// Number of samples
    pub count: usize,
    /// Mean sample
    pub mean: Duration,
    /// Fastest sample
    pub min: Duration,
    /// Slowest sample
    pub max: Duration,
    /// Median sample
    pub p50: Duration,
}

impl Stats {
    /// Throughput when each sample processed `batch` items
    pub fn throughput(&self, batch: usize) -> f64 {
        let best = self.min.as_secs_f64();
        if best > 0.0 {
            batch as f64 / best
        } else {
            0.0
        }
    }
}
