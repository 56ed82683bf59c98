#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod config;
mod diagnostics;
mod engine;
mod error;
mod force;
mod partition;
mod spark;
mod thunk;
mod utils;

pub use crate::config::{JoinOrder, MapConfig, RuntimeConfig, Strategy};
pub use crate::diagnostics::{Diagnostics, SparkStats};
pub use crate::engine::{Mapped, Runtime};
pub use crate::error::*;
pub use crate::force::{Force, ForcingDepth};
#[cfg(feature = "logging")]
pub use crate::utils::init_logging;
pub use crate::partition::{flatten, partition};
pub use crate::thunk::Thunk;

/// Maps `f` over `input` on the global runtime, one spark per element.
///
/// The output has the same length and order as the input, and every element
/// is forced to `depth` before the call returns.
///
/// ```
/// use sparkmap::{ForcingDepth, map_parallel};
///
/// let squares = map_parallel(|n: &u64| n * n, &[0, 1, 2, 3, 4, 5], ForcingDepth::Shallow)?;
/// assert_eq!(squares, [0, 1, 4, 9, 16, 25]);
/// # Ok::<(), sparkmap::MapError>(())
/// ```
pub fn map_parallel<T, U, F>(f: F, input: &[T], depth: ForcingDepth) -> Result<Vec<U>, MapError>
where
    T: Sync,
    U: Force + Send + Sync,
    F: Fn(&T) -> U + Sync,
{
    Runtime::global().map_parallel(f, input, depth)
}

/// Like [`map_parallel`], with `chunk_size` consecutive elements mapped
/// sequentially inside each spark. A `chunk_size` of zero is rejected before
/// any element is mapped.
pub fn map_parallel_chunked<T, U, F>(
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
    Runtime::global().map_parallel_chunked(f, input, depth, chunk_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collatz(n: &u64) -> u32 {
        let mut n = *n;
        let mut steps = 0;
        while n > 1 {
            n = if n % 2 == 0 { n / 2 } else { 3 * n + 1 };
            steps += 1;
        }
        steps
    }

    #[test]
    fn test_matches_sequential_map() {
        let xs: Vec<u64> = (1..500).collect();
        let expected: Vec<u32> = xs.iter().map(collatz).collect();

        for depth in [ForcingDepth::Shallow, ForcingDepth::Deep] {
            assert_eq!(map_parallel(collatz, &xs, depth).unwrap(), expected);
            for chunk_size in [1, 2, 7, 64, 499, 1000] {
                assert_eq!(
                    map_parallel_chunked(collatz, &xs, depth, chunk_size).unwrap(),
                    expected,
                );
            }
        }
    }

    #[test]
    fn test_depths_agree_on_values() {
        let xs: Vec<u64> = (0..40).collect();
        let f = |&n: &u64| (n, Thunk::new(move || n * 3));

        let shallow = map_parallel(f, &xs, ForcingDepth::Shallow).unwrap();
        let deep = map_parallel(f, &xs, ForcingDepth::Deep).unwrap();

        for ((a, x), (b, y)) in shallow.iter().zip(&deep) {
            assert_eq!(a, b);
            assert_eq!(x.force().unwrap(), y.force().unwrap());
        }
    }

    #[test]
    fn test_zero_chunk_size() {
        let err = map_parallel_chunked(collatz, &[1, 2, 3], ForcingDepth::Shallow, 0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: chunk size must be a positive integer, got 0"
        );
    }

    #[test]
    fn test_config_from_json() {
        let config: MapConfig =
            serde_json::from_str(r#"{ "depth": "deep", "chunk_size": 8 }"#).unwrap();
        let xs: Vec<u64> = (1..20).collect();

        let mapped = Runtime::global().map(collatz, &xs, &config).unwrap();
        assert_eq!(mapped.values, xs.iter().map(collatz).collect::<Vec<_>>());
        assert_eq!(mapped.diagnostics.units, 3);
    }
}
