//! Time-bucket aggregation for synthetic resolutions.
//!
//! A bar belongs to bucket `floor(time / width) * width`. One bucket is open
//! at a time; it is flushed into a single synthetic bar when a bar for a
//! different bucket arrives. The still-open bucket is never flushed
//! implicitly. Callers that want it must call [`Aggregator::flush_partial`].

use chartfeed_core::{Bar, Resolution};

/// Bars accumulated for one bucket window.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationBucket {
    pub start: i64,
    bars: Vec<Bar>,
}

impl AggregationBucket {
    fn new(start: i64, first: Bar) -> Self {
        Self {
            start,
            bars: vec![first],
        }
    }

    /// Add a bar. A bar with the same open time as the last one is a revision
    /// of that still-forming candle and replaces it.
    fn accumulate(&mut self, bar: Bar) {
        match self.bars.last_mut() {
            Some(last) if last.time == bar.time => *last = bar,
            _ => self.bars.push(bar),
        }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Synthesize the bucket's bar: first open, last close, extreme high and
    /// low, summed volume, stamped with the bucket start.
    pub fn synthesize(&self) -> Option<Bar> {
        let first = self.bars.first()?;
        let last = self.bars.last()?;
        let (high, low, volume) = self.bars.iter().fold(
            (f64::NEG_INFINITY, f64::INFINITY, 0.0),
            |(h, l, v), b| (h.max(b.high), l.min(b.low), v + b.volume),
        );
        Some(Bar::new(self.start, first.open, high, low, last.close, volume))
    }
}

/// Folds fine-grained bars into bars of a fixed width.
#[derive(Debug, Clone)]
pub struct Aggregator {
    width_ms: i64,
    bucket: Option<AggregationBucket>,
}

impl Aggregator {
    /// New aggregator. Widths below 1 ms are clamped to 1 ms.
    pub fn new(width_ms: i64) -> Self {
        Self {
            width_ms: width_ms.max(1),
            bucket: None,
        }
    }

    /// Aggregator for a synthetic resolution, `None` for native ones.
    pub fn for_resolution(resolution: Resolution) -> Option<Self> {
        resolution.bucket_width_ms().map(Self::new)
    }

    pub fn width_ms(&self) -> i64 {
        self.width_ms
    }

    /// Bucket start for a bar time.
    pub fn bucket_key(&self, time: i64) -> i64 {
        time.div_euclid(self.width_ms) * self.width_ms
    }

    /// Feed one bar. Returns the completed synthetic bar when `bar` opens a
    /// new bucket.
    pub fn push(&mut self, bar: Bar) -> Option<Bar> {
        let key = self.bucket_key(bar.time);

        if let Some(open) = self.bucket.as_mut() {
            if open.start == key {
                open.accumulate(bar);
                return None;
            }
        }

        self.bucket
            .replace(AggregationBucket::new(key, bar))
            .and_then(|done| done.synthesize())
    }

    /// Currently open bucket, if any.
    pub fn pending(&self) -> Option<&AggregationBucket> {
        self.bucket.as_ref()
    }

    /// Take the open bucket as a bar and reset.
    pub fn flush_partial(&mut self) -> Option<Bar> {
        self.bucket.take().and_then(|b| b.synthesize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(time: i64, o: f64, h: f64, l: f64, c: f64, v: f64) -> Bar {
        Bar::new(time, o, h, l, c, v)
    }

    #[test]
    fn test_folds_bucket_on_boundary() {
        let mut agg = Aggregator::new(5_000);
        assert_eq!(agg.push(bar(0, 1.0, 2.0, 0.5, 1.5, 10.0)), None);
        assert_eq!(agg.push(bar(1_000, 1.5, 3.0, 1.0, 2.0, 5.0)), None);

        let out = agg.push(bar(5_000, 2.0, 2.5, 1.8, 2.2, 1.0));
        assert_eq!(out, Some(bar(0, 1.0, 3.0, 0.5, 2.0, 15.0)));

        // The boundary bar seeds the next bucket.
        let pending = agg.pending().unwrap();
        assert_eq!(pending.start, 5_000);
        assert_eq!(pending.bars().len(), 1);
    }

    #[test]
    fn test_single_bar_bucket_is_degenerate() {
        let mut agg = Aggregator::new(10_000);
        let only = bar(12_000, 4.0, 5.0, 3.0, 4.5, 2.0);
        agg.push(only);
        let out = agg.push(bar(20_000, 1.0, 1.0, 1.0, 1.0, 1.0)).unwrap();
        assert_eq!(out, Bar { time: 10_000, ..only });
    }

    #[test]
    fn test_skipped_buckets_flush_once() {
        let mut agg = Aggregator::new(5_000);
        agg.push(bar(1_000, 1.0, 1.0, 1.0, 1.0, 1.0));
        let out = agg.push(bar(31_000, 2.0, 2.0, 2.0, 2.0, 2.0)).unwrap();
        assert_eq!(out.time, 0);
        assert_eq!(agg.pending().unwrap().start, 30_000);
    }

    #[test]
    fn test_revision_replaces_instead_of_appending() {
        let mut agg = Aggregator::new(5_000);
        agg.push(bar(0, 1.0, 1.2, 0.9, 1.1, 3.0));
        agg.push(bar(0, 1.0, 1.4, 0.8, 1.3, 4.0));
        agg.push(bar(1_000, 1.3, 1.5, 1.2, 1.4, 2.0));

        let out = agg.push(bar(5_000, 1.4, 1.4, 1.4, 1.4, 1.0)).unwrap();
        assert_eq!(out, bar(0, 1.0, 1.5, 0.8, 1.4, 6.0));
    }

    #[test]
    fn test_flush_partial() {
        let mut agg = Aggregator::new(5_000);
        assert_eq!(agg.flush_partial(), None);

        agg.push(bar(6_000, 1.0, 2.0, 0.5, 1.5, 1.0));
        agg.push(bar(7_000, 1.5, 2.5, 1.0, 2.0, 1.0));
        assert_eq!(agg.flush_partial(), Some(bar(5_000, 1.0, 2.5, 0.5, 2.0, 2.0)));
        assert!(agg.pending().is_none());
    }

    #[test]
    fn test_for_resolution() {
        assert_eq!(
            Aggregator::for_resolution(Resolution::Sec10).map(|a| a.width_ms()),
            Some(10_000)
        );
        assert!(Aggregator::for_resolution(Resolution::Min1).is_none());
    }

    #[test]
    fn test_bucket_key_negative_time() {
        let agg = Aggregator::new(5_000);
        assert_eq!(agg.bucket_key(-1), -5_000);
        assert_eq!(agg.bucket_key(4_999), 0);
    }
}
