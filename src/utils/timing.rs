use std::time::{Duration, Instant};
use log::debug;

/// Running totals for a repeated operation, e.g. slot uploads.
#[derive(Debug, Clone)]
pub struct TimingStats {
    pub name: String,
    pub total_time: Duration,
    pub max_time: Duration,
    pub count: u32,
}

impl TimingStats {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            total_time: Duration::ZERO,
            max_time: Duration::ZERO,
            count: 0,
        }
    }

    pub fn add_measurement(&mut self, duration: Duration) {
        self.total_time += duration;
        self.max_time = self.max_time.max(duration);
        self.count += 1;

        debug!("{} - Current: {:.2}ms, Avg: {:.2}ms, Count: {}",
            self.name,
            duration.as_secs_f64() * 1000.0,
            self.average_ms(),
            self.count
        );
    }

    pub fn average_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.total_time.as_secs_f64() * 1000.0) / self.count as f64
        }
    }

    pub fn summary(&self) -> String {
        format!("{}: {} runs, avg {:.2}ms, max {:.2}ms, total {:.2}ms",
            self.name,
            self.count,
            self.average_ms(),
            self.max_time.as_secs_f64() * 1000.0,
            self.total_time.as_secs_f64() * 1000.0
        )
    }
}

/// Adds the time between creation and drop to a [`TimingStats`].
pub struct ScopedTimer<'a> {
    start: Instant,
    stats: &'a mut TimingStats,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(stats: &'a mut TimingStats) -> Self {
        Self {
            start: Instant::now(),
            stats,
        }
    }
}

impl<'a> Drop for ScopedTimer<'a> {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        self.stats.add_measurement(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_and_max() {
        let mut stats = TimingStats::new("upload");
        assert_eq!(stats.average_ms(), 0.0);

        stats.add_measurement(Duration::from_millis(2));
        stats.add_measurement(Duration::from_millis(6));
        assert_eq!(stats.count, 2);
        assert!((stats.average_ms() - 4.0).abs() < 1e-9);
        assert_eq!(stats.max_time, Duration::from_millis(6));
        assert!(stats.summary().starts_with("upload: 2 runs"));
    }

    #[test]
    fn test_scoped_timer_records_on_drop() {
        let mut stats = TimingStats::new("scope");
        {
            let _timer = ScopedTimer::new(&mut stats);
        }
        assert_eq!(stats.count, 1);
    }
}
