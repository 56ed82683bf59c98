use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::diagnostics::{Outcome, SparkCounters};
use crate::error::ComputationFault;
use crate::force::{Force, ForcingDepth};
use crate::thunk::Suspension;

/// Forces `unit` to `depth`, returning whether this call ran its body.
fn force_unit<V: Force>(
    unit: &Suspension<'_, V>,
    depth: ForcingDepth,
) -> (Result<(), ComputationFault>, bool) {
    let (value, ran) = unit.evaluate();
    let forced = value.and_then(|value| {
        catch_unwind(AssertUnwindSafe(|| value.force(depth)))
            .unwrap_or_else(|panic| Err(ComputationFault::from_panic(panic)))
    });

    (forced, ran)
}

/// Gives a reserved spark slot back when dropped.
struct Release<'a>(&'a AtomicUsize);

impl Drop for Release<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Spark pool of one map call, living inside a rayon scope.
///
/// Sparks are hints: a spark may be rejected when the runtime is at capacity,
/// may run on any worker in any order, or may never run before its unit is
/// joined. None of this changes the result, only how much of the work
/// overlaps.
pub(crate) struct SparkPool<'p, 'scope> {
    pub(crate) scope: &'p rayon::Scope<'scope>,
    /// Upper bound of `in_flight`.
    pub(crate) capacity: usize,
    /// Sparks queued or running on the runtime, shared by all of its calls.
    pub(crate) in_flight: &'scope AtomicUsize,
    pub(crate) counters: &'scope SparkCounters,
    /// Raised once the call has failed, so that sparks still in the queue do
    /// not start work nobody will read.
    pub(crate) abandoned: &'scope AtomicBool,
}

/// Handle to a sparked unit.
pub(crate) struct Spark<'s, 'a, V> {
    unit: &'s Suspension<'a, V>,
}

impl<'p, 'scope> SparkPool<'p, 'scope> {
    /// Offers `unit` to the worker pool. Never blocks and never evaluates.
    pub(crate) fn spawn<'a, V>(
        &self,
        unit: &'scope Suspension<'a, V>,
        depth: ForcingDepth,
    ) -> Spark<'scope, 'a, V>
    where
        'a: 'scope,
        V: Force + Send + Sync + 'scope,
    {
        self.counters.record(Outcome::Created);

        let capacity = self.capacity;
        let reserved = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            })
            .is_ok();

        if !reserved {
            tracing::trace!(capacity, "spark pool full, spark overflowed");
            self.counters.record(Outcome::Overflowed);
            return Spark { unit };
        }

        let in_flight = self.in_flight;
        let counters = self.counters;
        let abandoned = self.abandoned;

        self.scope.spawn(move |_| {
            let _release = Release(in_flight);

            let outcome = if abandoned.load(Ordering::Acquire) {
                Outcome::Discarded
            } else if !unit.claim() {
                // Someone is evaluating it already, possibly this thread.
                Outcome::Fizzled
            } else {
                // Faults stay in the cell for the joiner to report.
                match force_unit(unit, depth) {
                    (_, true) => Outcome::Converted,
                    (_, false) => Outcome::Fizzled,
                }
            };

            counters.record(outcome);
        });

        Spark { unit }
    }
}

impl<V: Force> Spark<'_, '_, V> {
    /// Blocks until the unit is forced to `depth`, evaluating it on this
    /// thread if no worker has started it.
    pub(crate) fn join(&self, depth: ForcingDepth) -> Result<(), ComputationFault> {
        force_unit(self.unit, depth).0
    }
}
