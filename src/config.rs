//! Runtime configuration for the converter and the per-partition store.

use std::path::Path;

use serde::Deserialize;

use crate::error::{GraphError, Result};

/// Knobs shared by the translator, the writer, and the graph store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Total number of graph partitions; must equal the writer fleet size.
    pub partitions: u32,
    /// Machine id used in blob-schema registry keys.
    pub machine: u32,
    /// Partition owned by this process.
    pub partition: u32,
    /// Epoch boundary every N accepted change messages.
    pub logs_per_epoch: u64,
    /// Namespace prefix for metadata-registry keys.
    pub meta_prefix: String,
    /// Slot capacity of each per-label vertex table.
    pub vertex_capacity: usize,
    /// Rows per page in updatable property columns.
    pub rows_per_page: usize,
    /// Fixed byte width of string-typed property cells.
    pub string_vlen: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            partitions: 1,
            machine: 0,
            partition: 0,
            logs_per_epoch: 1024,
            meta_prefix: String::new(),
            vertex_capacity: 1 << 20,
            rows_per_page: 1024,
            string_vlen: 64,
        }
    }
}

impl Config {
    /// Loads a config from a TOML file; unset keys keep their defaults.
    pub fn from_toml_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&raw).map_err(|e| GraphError::Parse(format!("config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the rest of the system assumes.
    pub fn validate(&self) -> Result<()> {
        if self.partitions == 0 {
            return Err(GraphError::Invalid("partitions must be positive"));
        }
        if self.partition >= self.partitions {
            return Err(GraphError::Invalid("partition id exceeds partition count"));
        }
        if self.logs_per_epoch == 0 {
            return Err(GraphError::Invalid("logs_per_epoch must be positive"));
        }
        if self.rows_per_page == 0 {
            return Err(GraphError::Invalid("rows_per_page must be positive"));
        }
        if self.vertex_capacity == 0 {
            return Err(GraphError::Invalid("vertex_capacity must be positive"));
        }
        if self.string_vlen == 0 {
            return Err(GraphError::Invalid("string_vlen must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn toml_overrides_subset_of_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "partitions = 4\nlogs_per_epoch = 2\nmeta_prefix = \"test_\"").unwrap();
        let config = Config::from_toml_path(file.path()).unwrap();
        assert_eq!(config.partitions, 4);
        assert_eq!(config.logs_per_epoch, 2);
        assert_eq!(config.meta_prefix, "test_");
        assert_eq!(config.rows_per_page, Config::default().rows_per_page);
    }

    #[test]
    fn rejects_zero_epoch_stride() {
        let config = Config {
            logs_per_epoch: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_partition_outside_fleet() {
        let config = Config {
            partitions: 2,
            partition: 2,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
