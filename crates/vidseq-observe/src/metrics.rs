use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.inc_by(1);
    }

    pub fn inc_by(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    /// Raises the gauge to `value` if it is higher; used for high-water marks.
    pub fn max(&self, value: u64) {
        self.0.fetch_max(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Count, total and max of recorded durations, in microseconds.
#[derive(Debug, Default)]
pub struct DurationAgg {
    count: AtomicU64,
    total_us: AtomicU64,
    max_us: AtomicU64,
}

impl DurationAgg {
    pub fn record(&self, dur: Duration) {
        let us = dur.as_micros().min(u64::MAX as u128) as u64;
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_us.fetch_add(us, Ordering::Relaxed);
        self.max_us.fetch_max(us, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DurationSnapshot {
        DurationSnapshot {
            count: self.count.load(Ordering::Relaxed),
            total_us: self.total_us.load(Ordering::Relaxed),
            max_us: self.max_us.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationSnapshot {
    pub count: u64,
    pub total_us: u64,
    pub max_us: u64,
}

impl DurationSnapshot {
    pub fn avg_us(&self) -> u64 {
        self.total_us.checked_div(self.count).unwrap_or(0)
    }
}

/// Records the time between construction and drop into a [`DurationAgg`].
pub struct ScopedTimer<'a> {
    start: Instant,
    agg: &'a DurationAgg,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(agg: &'a DurationAgg) -> Self {
        Self {
            start: Instant::now(),
            agg,
        }
    }
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        self.agg.record(self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_max_only_raises() {
        let g = Gauge::default();
        g.max(5);
        g.max(3);
        assert_eq!(g.get(), 5);
        g.max(9);
        assert_eq!(g.get(), 9);
    }

    #[test]
    fn duration_agg_tracks_avg_and_max() {
        let agg = DurationAgg::default();
        agg.record(Duration::from_micros(10));
        agg.record(Duration::from_micros(30));
        let snap = agg.snapshot();
        assert_eq!(snap.count, 2);
        assert_eq!(snap.avg_us(), 20);
        assert_eq!(snap.max_us, 30);
    }

    #[test]
    fn empty_snapshot_avg_is_zero() {
        assert_eq!(DurationAgg::default().snapshot().avg_us(), 0);
    }

    #[test]
    fn scoped_timer_records_on_drop() {
        let agg = DurationAgg::default();
        {
            let _t = ScopedTimer::new(&agg);
        }
        assert_eq!(agg.snapshot().count, 1);
    }
}
