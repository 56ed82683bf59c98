use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::force::ForcingDepth;

/// Order in which sparked units are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinOrder {
    /// Spark every unit first, then join the rest of the spine before each
    /// head (last unit first). This is what lets sparks overlap.
    #[default]
    Spine,
    /// Join each unit right after sparking it. Nothing overlaps and the spark
    /// overhead is paid for nothing; kept as a baseline.
    Eager,
}

/// Per-call settings of a parallel map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawMapConfig")]
pub struct MapConfig {
    pub depth: ForcingDepth,
    /// Number of input elements mapped by one unit of work. `1` sparks one
    /// unit per element.
    pub chunk_size: usize,
    pub join_order: JoinOrder,
}

impl MapConfig {
    pub fn new(depth: ForcingDepth) -> Self {
        Self {
            depth,
            chunk_size: 1,
            join_order: JoinOrder::Spine,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_join_order(mut self, join_order: JoinOrder) -> Self {
        self.join_order = join_order;
        self
    }

    /// Checks the settings before any work is spawned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ChunkSize(0));
        }

        Ok(())
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self::new(ForcingDepth::default())
    }
}

/// Wire form of [`MapConfig`]. The chunk size is signed so that negative
/// values are reported as configuration errors instead of parse errors.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMapConfig {
    depth: ForcingDepth,
    #[serde(default = "default_chunk_size")]
    chunk_size: i64,
    #[serde(default)]
    join_order: JoinOrder,
}

fn default_chunk_size() -> i64 {
    1
}

impl TryFrom<RawMapConfig> for MapConfig {
    type Error = ConfigError;

    fn try_from(raw: RawMapConfig) -> Result<Self, Self::Error> {
        let chunk_size = usize::try_from(raw.chunk_size)
            .ok()
            .filter(|&size| size > 0)
            .ok_or(ConfigError::ChunkSize(raw.chunk_size))?;

        Ok(Self {
            depth: raw.depth,
            chunk_size,
            join_order: raw.join_order,
        })
    }
}

/// The four evaluation strategies a parallel map is usually compared across.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Each unit is joined as soon as it is sparked.
    Naive,
    /// Sparks pipelined along the spine, outputs forced shallowly.
    Pipelined,
    /// Sparks pipelined along the spine, outputs forced deeply.
    Forced,
    /// Deep forcing with the given number of elements per unit.
    Chunked(usize),
}

impl From<Strategy> for MapConfig {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Naive => {
                MapConfig::new(ForcingDepth::Shallow).with_join_order(JoinOrder::Eager)
            }
            Strategy::Pipelined => MapConfig::new(ForcingDepth::Shallow),
            Strategy::Forced => MapConfig::new(ForcingDepth::Deep),
            Strategy::Chunked(size) => MapConfig::new(ForcingDepth::Deep).with_chunk_size(size),
        }
    }
}

/// Settings of a [`Runtime`](crate::Runtime), fixed for its whole life.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Worker threads. `None` lets rayon pick (usually one per CPU).
    pub threads: Option<usize>,
    /// Maximum number of sparks queued or running at once. Sparks beyond it
    /// overflow and their units are evaluated by the joining thread.
    pub spark_capacity: usize,
    /// Prefix of worker thread names.
    pub thread_name: String,
}

impl RuntimeConfig {
    pub const DEFAULT_SPARK_CAPACITY: usize = 4096;

    /// One worker and no spark capacity: every unit runs at its join.
    pub fn sequential() -> Self {
        Self {
            threads: Some(1),
            spark_capacity: 0,
            ..Self::default()
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            threads: None,
            spark_capacity: Self::DEFAULT_SPARK_CAPACITY,
            thread_name: String::from("sparkmap"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_map_config() {
        let config: MapConfig = serde_json::from_str(r#"{"depth":"deep","chunk_size":8}"#).unwrap();
        assert_eq!(config.depth, ForcingDepth::Deep);
        assert_eq!(config.chunk_size, 8);
        assert_eq!(config.join_order, JoinOrder::Spine);
    }

    #[test]
    fn test_parse_map_config_defaults() {
        let config: MapConfig = serde_json::from_str(r#"{"depth":"shallow"}"#).unwrap();
        assert_eq!(config, MapConfig::new(ForcingDepth::Shallow));
    }

    #[test]
    fn test_reject_non_positive_chunk_size() {
        for raw in ["0", "-3"] {
            let json = format!(r#"{{"depth":"deep","chunk_size":{raw}}}"#);
            let err = serde_json::from_str::<MapConfig>(&json).unwrap_err();
            assert!(
                err.to_string().contains("chunk size must be a positive integer"),
                "{err}"
            );
        }
    }

    #[test]
    fn test_reject_unknown_depth() {
        let err = serde_json::from_str::<MapConfig>(r#"{"depth":"lazy"}"#).unwrap_err();
        assert!(err.to_string().contains("unsupported forcing depth 'lazy'"), "{err}");
    }

    #[test]
    fn test_validate() {
        assert!(MapConfig::default().validate().is_ok());
        assert_eq!(
            MapConfig::default().with_chunk_size(0).validate(),
            Err(ConfigError::ChunkSize(0))
        );
    }

    #[test]
    fn test_strategies() {
        assert_eq!(MapConfig::from(Strategy::Naive).join_order, JoinOrder::Eager);
        assert_eq!(MapConfig::from(Strategy::Pipelined).depth, ForcingDepth::Shallow);
        assert_eq!(MapConfig::from(Strategy::Forced).depth, ForcingDepth::Deep);

        let chunked = MapConfig::from(Strategy::Chunked(16));
        assert_eq!(chunked.depth, ForcingDepth::Deep);
        assert_eq!(chunked.chunk_size, 16);
    }

    #[test]
    fn test_runtime_config() {
        let config: RuntimeConfig = serde_json::from_str(r#"{"threads":2}"#).unwrap();
        assert_eq!(config.threads, Some(2));
        assert_eq!(config.spark_capacity, RuntimeConfig::DEFAULT_SPARK_CAPACITY);
        assert_eq!(RuntimeConfig::sequential().spark_capacity, 0);
    }
}
