use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// What happened to the sparks of one map call.
///
/// Every spark ends up in exactly one of the outcome buckets, so
/// `converted + overflowed + fizzled + discarded == created` once the call
/// has returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SparkStats {
    /// Sparks offered to the pool, one per unit.
    pub created: usize,
    /// Sparks a worker picked up and evaluated itself.
    pub converted: usize,
    /// Sparks rejected because the pool was at capacity. Their units were
    /// evaluated by the joining thread.
    pub overflowed: usize,
    /// Sparks a worker picked up after the unit had already been evaluated.
    pub fizzled: usize,
    /// Sparks dropped unrun because the call had already failed.
    pub discarded: usize,
}

impl Display for SparkStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SPARKS: {} ({} converted, {} overflowed, {} fizzled, {} discarded)",
            self.created, self.converted, self.overflowed, self.fizzled, self.discarded
        )
    }
}

/// Shared counters behind [`SparkStats`], bumped from worker threads.
#[derive(Debug, Default)]
pub(crate) struct SparkCounters {
    created: AtomicUsize,
    converted: AtomicUsize,
    overflowed: AtomicUsize,
    fizzled: AtomicUsize,
    discarded: AtomicUsize,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Outcome {
    Created,
    Converted,
    Overflowed,
    Fizzled,
    Discarded,
}

impl SparkCounters {
    pub(crate) fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Created => &self.created,
            Outcome::Converted => &self.converted,
            Outcome::Overflowed => &self.overflowed,
            Outcome::Fizzled => &self.fizzled,
            Outcome::Discarded => &self.discarded,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SparkStats {
        SparkStats {
            created: self.created.load(Ordering::Relaxed),
            converted: self.converted.load(Ordering::Relaxed),
            overflowed: self.overflowed.load(Ordering::Relaxed),
            fizzled: self.fizzled.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// Metrics of a single map call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Diagnostics {
    /// Units of work the input was split into.
    pub units: usize,
    pub sparks: SparkStats,
    /// Wall-clock time from the first spark to the last join.
    pub elapsed: Duration,
}

impl Display for Diagnostics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} units in {:.2?}, {}", self.units, self.elapsed, self.sparks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = SparkCounters::default();
        for outcome in [
            Outcome::Created,
            Outcome::Created,
            Outcome::Converted,
            Outcome::Overflowed,
        ] {
            counters.record(outcome);
        }

        let stats = counters.snapshot();
        assert_eq!(stats.created, 2);
        assert_eq!(stats.converted, 1);
        assert_eq!(stats.overflowed, 1);
        assert_eq!(
            stats.to_string(),
            "SPARKS: 2 (1 converted, 1 overflowed, 0 fizzled, 0 discarded)"
        );
    }
}
