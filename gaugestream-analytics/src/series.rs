//! Bounded rolling time series.
//!
//! One [`RollingSeries`] per tracked symbol holds (timestamp, value) points,
//! bounded both by point capacity and a retention horizon. Timestamps are
//! non-decreasing; only the oldest points are ever evicted.

use std::collections::VecDeque;

/// One stored observation: `(timestamp seconds, value)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub timestamp: f64,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Capacity- and age-bounded buffer of [`SeriesPoint`]s in timestamp order.
#[derive(Debug, Clone)]
pub struct RollingSeries {
    points: VecDeque<SeriesPoint>,
    capacity: usize,
    /// Retention horizon in seconds relative to the latest timestamp.
    retention: f64,
}

impl RollingSeries {
    pub fn new(capacity: usize, retention_secs: f64) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity.min(4096)),
            capacity: capacity.max(1),
            retention: retention_secs.max(0.0),
        }
    }

    /// Append a point. The caller guarantees non-decreasing timestamps per
    /// symbol; a point older than the current latest is clamped forward so
    /// the ordering invariant holds even across provider clock skew.
    pub fn push(&mut self, mut point: SeriesPoint) {
        if let Some(last) = self.points.back() {
            if point.timestamp < last.timestamp {
                point.timestamp = last.timestamp;
            }
        }
        self.points.push_back(point);
        self.enforce();
    }

    /// Bulk-load a history, re-establishing every invariant.
    pub fn replace(&mut self, mut points: Vec<SeriesPoint>) {
        points.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        self.points = points.into();
        self.enforce();
    }

    /// All points with `timestamp >= latest - window_secs`, in order.
    pub fn snapshot(&self, window_secs: f64) -> Vec<SeriesPoint> {
        let Some(latest) = self.points.back() else {
            return Vec::new();
        };
        let cutoff = latest.timestamp - window_secs;
        let start = self.points.partition_point(|p| p.timestamp < cutoff);
        self.points.range(start..).copied().collect()
    }

    /// Adjust capacity at runtime; only oldest points are evicted.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.enforce();
    }

    /// Adjust the retention horizon at runtime.
    pub fn set_retention(&mut self, retention_secs: f64) {
        self.retention = retention_secs.max(0.0);
        self.enforce();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<SeriesPoint> {
        self.points.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SeriesPoint> {
        self.points.iter()
    }

    /// Values only, oldest first.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    fn enforce(&mut self) {
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
        if let Some(latest) = self.points.back().map(|p| p.timestamp) {
            let cutoff = latest - self.retention;
            while self
                .points
                .front()
                .is_some_and(|p| p.timestamp < cutoff)
            {
                self.points.pop_front();
            }
        }
    }
}

/// Per-symbol history: raw price series plus a derived ratio series (price
/// relative to the reference symbol's latest price).
#[derive(Debug, Clone)]
pub struct SymbolHistory {
    pub prices: RollingSeries,
    pub ratios: RollingSeries,
}

impl SymbolHistory {
    pub fn new(capacity: usize, retention_secs: f64) -> Self {
        Self {
            prices: RollingSeries::new(capacity, retention_secs),
            ratios: RollingSeries::new(capacity, retention_secs),
        }
    }

    /// Record one tick. The ratio series only grows while a reference price
    /// is known.
    pub fn push(&mut self, timestamp: f64, price: f64, reference_price: Option<f64>) {
        self.prices.push(SeriesPoint::new(timestamp, price));
        if let Some(reference) = reference_price.filter(|r| *r > 0.0) {
            self.ratios
                .push(SeriesPoint::new(timestamp, price / reference));
        }
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.prices.set_capacity(capacity);
        self.ratios.set_capacity(capacity);
    }

    pub fn set_retention(&mut self, retention_secs: f64) {
        self.prices.set_retention(retention_secs);
        self.ratios.set_retention(retention_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series_with(points: &[(f64, f64)], capacity: usize, retention: f64) -> RollingSeries {
        let mut series = RollingSeries::new(capacity, retention);
        for (ts, value) in points {
            series.push(SeriesPoint::new(*ts, *value));
        }
        series
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        // Capacity 3 receiving timestamps 1..=5 keeps exactly {3,4,5}.
        let series = series_with(
            &[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0), (4.0, 4.0), (5.0, 5.0)],
            3,
            1e9,
        );

        let kept: Vec<f64> = series.iter().map(|p| p.timestamp).collect();
        assert_eq!(kept, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_retention_evicts_aged_points() {
        let mut series = series_with(&[(100.0, 1.0), (150.0, 2.0)], 100, 60.0);
        series.push(SeriesPoint::new(200.0, 3.0));

        // 100.0 is older than 200 - 60.
        let kept: Vec<f64> = series.iter().map(|p| p.timestamp).collect();
        assert_eq!(kept, vec![150.0, 200.0]);
    }

    #[test]
    fn test_retention_invariant_holds_after_every_push() {
        let mut series = RollingSeries::new(50, 10.0);
        for i in 0..200 {
            series.push(SeriesPoint::new(i as f64 * 0.7, i as f64));
            assert!(series.len() <= 50);
            let latest = series.latest().unwrap().timestamp;
            assert!(series.iter().all(|p| p.timestamp >= latest - 10.0));
        }
    }

    #[test]
    fn test_snapshot_window() {
        let series = series_with(&[(10.0, 1.0), (20.0, 2.0), (30.0, 3.0), (40.0, 4.0)], 100, 1e9);

        let window = series.snapshot(15.0);
        let values: Vec<f64> = window.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![3.0, 4.0]);

        assert!(RollingSeries::new(10, 1e9).snapshot(60.0).is_empty());
    }

    #[test]
    fn test_replace_restores_invariants() {
        let mut series = RollingSeries::new(3, 100.0);
        series.replace(vec![
            SeriesPoint::new(5.0, 5.0),
            SeriesPoint::new(1.0, 1.0),
            SeriesPoint::new(3.0, 3.0),
            SeriesPoint::new(4.0, 4.0),
        ]);

        // Sorted, capacity-trimmed to the newest 3.
        let kept: Vec<f64> = series.iter().map(|p| p.timestamp).collect();
        assert_eq!(kept, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_shrinking_capacity_keeps_most_recent() {
        let mut series = series_with(&[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)], 10, 1e9);
        series.set_capacity(2);
        let kept: Vec<f64> = series.iter().map(|p| p.timestamp).collect();
        assert_eq!(kept, vec![2.0, 3.0]);
    }

    #[test]
    fn test_out_of_order_timestamp_is_clamped() {
        let mut series = series_with(&[(10.0, 1.0)], 10, 1e9);
        series.push(SeriesPoint::new(9.0, 2.0));

        let stamps: Vec<f64> = series.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![10.0, 10.0]);
    }

    #[test]
    fn test_ratio_series_needs_reference() {
        let mut history = SymbolHistory::new(10, 1e9);
        history.push(1.0, 50_000.0, None);
        history.push(2.0, 50_100.0, Some(50_000.0));

        assert_eq!(history.prices.len(), 2);
        assert_eq!(history.ratios.len(), 1);
        let ratio = history.ratios.latest().unwrap().value;
        assert!((ratio - 1.002).abs() < 1e-9);
    }
}
