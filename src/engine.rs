//! The parallel map engine.
//!
//! A map call turns its input into units of work, one per element or one per
//! chunk, and walks them the way a recursive map walks a list spine:
//!
//! 1. An empty input maps to an empty output.
//! 2. For a head `x` and tail `xs`, the unit `f(x)` is described and sparked,
//!    then the same procedure runs on `xs`, then the rest of the spine is
//!    joined, and only then `f(x)` is joined and prepended.
//!
//! Because every level sparks before it recurses and joins after the
//! recursion returns, all units are sparked before the first join, and the
//! joins run from the last unit back to the first. The walk is unrolled into
//! two loops here, so the stack does not grow with the input.

use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::Context;
use tracing::Level;
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::config::{JoinOrder, MapConfig, RuntimeConfig};
use crate::diagnostics::{Diagnostics, SparkCounters};
use crate::error::{ComputationFault, MapError};
use crate::force::{Force, ForcingDepth};
use crate::partition::{flatten, partition};
use crate::spark::SparkPool;
use crate::thunk::{Suspension, guarded};

static GLOBAL: LazyLock<Runtime> = LazyLock::new(|| Runtime {
    pool: Pool::Global,
    spark_capacity: RuntimeConfig::DEFAULT_SPARK_CAPACITY,
    in_flight: AtomicUsize::new(0),
});

enum Pool {
    /// rayon's global pool, configured by the embedding application.
    Global,
    Owned(rayon::ThreadPool),
}

impl Pool {
    fn scope<'scope, OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce(&rayon::Scope<'scope>) -> R + Send,
        R: Send,
    {
        match self {
            Pool::Global => rayon::scope(op),
            Pool::Owned(pool) => pool.scope(op),
        }
    }

    fn threads(&self) -> usize {
        match self {
            Pool::Global => rayon::current_num_threads(),
            Pool::Owned(pool) => pool.current_num_threads(),
        }
    }
}

/// The result of a map call together with its metrics.
#[derive(Debug)]
pub struct Mapped<U> {
    pub values: Vec<U>,
    pub diagnostics: Diagnostics,
}

/// A worker pool plus a bound on how many sparks it accepts at once.
///
/// Calls on the same runtime share its workers and its spark capacity.
/// Several calls may run concurrently from different threads.
pub struct Runtime {
    pool: Pool,
    spark_capacity: usize,
    in_flight: AtomicUsize,
}

impl Runtime {
    /// Builds a runtime with its own worker pool.
    pub fn new(config: RuntimeConfig) -> Result<Self, MapError> {
        let RuntimeConfig {
            threads,
            spark_capacity,
            thread_name,
        } = config;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.unwrap_or(0))
            .thread_name(move |index| format!("{thread_name}-{index}"))
            .build()?;

        tracing::debug!(
            threads = pool.current_num_threads(),
            spark_capacity,
            "built runtime"
        );

        Ok(Self {
            pool: Pool::Owned(pool),
            spark_capacity,
            in_flight: AtomicUsize::new(0),
        })
    }

    /// A runtime on which no spark is ever accepted, so every unit is
    /// evaluated by the thread that joins it.
    pub fn sequential() -> Result<Self, MapError> {
        Self::new(RuntimeConfig::sequential())
    }

    /// The runtime backed by rayon's global thread pool.
    pub fn global() -> &'static Runtime {
        &GLOBAL
    }

    pub fn threads(&self) -> usize {
        self.pool.threads()
    }

    pub fn spark_capacity(&self) -> usize {
        self.spark_capacity
    }

    /// Maps `f` over `input`, one spark per element, forcing every output to
    /// `depth` before it is returned.
    pub fn map_parallel<T, U, F>(
        &self,
        f: F,
        input: &[T],
        depth: ForcingDepth,
    ) -> Result<Vec<U>, MapError>
    where
        T: Sync,
        U: Force + Send + Sync,
        F: Fn(&T) -> U + Sync,
    {
        self.map(f, input, &MapConfig::new(depth))
            .map(|mapped| mapped.values)
    }

    /// Like [`map_parallel`](Self::map_parallel), with `chunk_size` elements
    /// mapped sequentially inside each spark.
    pub fn map_parallel_chunked<T, U, F>(
        &self,
        f: F,
        input: &[T],
        depth: ForcingDepth,
        chunk_size: usize,
    ) -> Result<Vec<U>, MapError>
    where
        T: Sync,
        U: Force + Send + Sync,
        F: Fn(&T) -> U + Sync,
    {
        let config = MapConfig::new(depth).with_chunk_size(chunk_size);
        self.map(f, input, &config).map(|mapped| mapped.values)
    }

    /// Maps an infallible function. Panics inside `f` are reported as
    /// computation faults.
    pub fn map<T, U, F>(
        &self,
        f: F,
        input: &[T],
        config: &MapConfig,
    ) -> Result<Mapped<U>, MapError>
    where
        T: Sync,
        U: Force + Send + Sync,
        F: Fn(&T) -> U + Sync,
    {
        self.try_map(|x| Ok::<_, anyhow::Error>(f(x)), input, config)
    }

    /// Maps a fallible function.
    ///
    /// Either every output is returned, in input order and forced to
    /// `config.depth`, or exactly one fault is: the first one met while
    /// joining along the spine, which starts from the end of the input.
    pub fn try_map<T, U, E, F>(
        &self,
        f: F,
        input: &[T],
        config: &MapConfig,
    ) -> Result<Mapped<U>, MapError>
    where
        T: Sync,
        U: Force + Send + Sync,
        E: Into<anyhow::Error>,
        F: Fn(&T) -> Result<U, E> + Sync,
    {
        config.validate()?;

        let f = &f;
        let depth = config.depth;
        // Each element reaches `depth` inside its unit, chunked or not.
        let apply = move |index: usize, x: &T| {
            guarded(|| {
                let value = f(x).map_err(Into::<anyhow::Error>::into)?;
                value.force(depth)?;
                Ok(value)
            })
            .with_context(|| format!("element {index}"))
        };

        if config.chunk_size == 1 {
            let units = input
                .iter()
                .enumerate()
                .map(|(index, x)| Suspension::new(move || apply(index, x)))
                .collect();

            return self.run(units, config);
        }

        let size = config.chunk_size;
        let units = partition(input, size)?
            .into_iter()
            .enumerate()
            .map(|(n, chunk)| {
                Suspension::new(move || {
                    chunk
                        .iter()
                        .enumerate()
                        .map(|(offset, x)| apply(n * size + offset, x))
                        .collect::<anyhow::Result<Vec<U>>>()
                })
            })
            .collect();

        let Mapped {
            values,
            diagnostics,
        } = self.run(units, config)?;

        Ok(Mapped {
            values: flatten(values),
            diagnostics,
        })
    }

    /// Sparks and joins `units`, then moves their values out in order.
    fn run<V>(
        &self,
        units: Vec<Suspension<'_, V>>,
        config: &MapConfig,
    ) -> Result<Mapped<V>, MapError>
    where
        V: Force + Send + Sync,
    {
        let MapConfig {
            depth,
            chunk_size,
            join_order,
        } = *config;

        let span = tracing::span!(
            Level::DEBUG,
            "map_parallel",
            units = units.len(),
            %depth,
            chunk_size,
            ?join_order
        );
        span.pb_set_length(units.len() as u64);
        span.pb_set_style(&crate::utils::get_style_map());
        let _enter = span.enter();

        let counters = SparkCounters::default();
        let abandoned = AtomicBool::new(false);
        let start = Instant::now();

        let joined = self.pool.scope(|scope| {
            let sparks = SparkPool {
                scope,
                capacity: self.spark_capacity,
                in_flight: &self.in_flight,
                counters: &counters,
                abandoned: &abandoned,
            };

            let result = match join_order {
                JoinOrder::Spine => join_spine(&sparks, &units, depth, &span),
                JoinOrder::Eager => join_eager(&sparks, &units, depth, &span),
            };

            if result.is_err() {
                abandoned.store(true, Ordering::Release);
            }

            result
        });

        let diagnostics = Diagnostics {
            units: units.len(),
            sparks: counters.snapshot(),
            elapsed: start.elapsed(),
        };

        if let Err(fault) = joined {
            tracing::warn!(%fault, "map call abandoned");
            return Err(fault.into());
        }

        tracing::debug!(%diagnostics, "map call complete");

        let values = units
            .into_iter()
            .map(|unit| {
                unit.into_result().unwrap_or_else(|| {
                    Err(ComputationFault::new(anyhow::anyhow!(
                        "unit was never evaluated"
                    )))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Mapped {
            values,
            diagnostics,
        })
    }
}

/// Sparks every unit, then joins from the last unit back to the first.
fn join_spine<'scope, 'a, V>(
    sparks: &SparkPool<'_, 'scope>,
    units: &'scope [Suspension<'a, V>],
    depth: ForcingDepth,
    span: &tracing::Span,
) -> Result<(), ComputationFault>
where
    'a: 'scope,
    V: Force + Send + Sync + 'scope,
{
    let handles: Vec<_> = units.iter().map(|unit| sparks.spawn(unit, depth)).collect();

    for handle in handles.iter().rev() {
        handle.join(depth)?;
        span.pb_inc(1);
    }

    Ok(())
}

/// Joins each unit right after sparking it.
fn join_eager<'scope, 'a, V>(
    sparks: &SparkPool<'_, 'scope>,
    units: &'scope [Suspension<'a, V>],
    depth: ForcingDepth,
    span: &tracing::Span,
) -> Result<(), ComputationFault>
where
    'a: 'scope,
    V: Force + Send + Sync + 'scope,
{
    for unit in units {
        sparks.spawn(unit, depth).join(depth)?;
        span.pb_inc(1);
    }

    Ok(())
}
