//! Configuration for PrismKV
//!
//! Centralized configuration with sensible defaults. Every knob is passed
//! at construction; nothing is read from global state.

use std::path::PathBuf;

use crate::error::{PrismError, Result};

/// Main configuration for a PrismKV engine
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for table files and their plaintext dumps
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── sstable_000001.sst   (table built from a memtable)
    ///     └── sstable_000001.txt   (plaintext dump, when enabled)
    pub data_dir: PathBuf,

    /// Write a plaintext dump next to every table that gets built
    pub dump_tables: bool,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Arena usage (in bytes) after which the memtable reports it should be flushed
    pub write_buffer_size: usize,

    /// Maintain the user key -> node hash index for point lookups
    pub point_lookup_accelerator: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./prismkv_data"),
            dump_tables: false,
            write_buffer_size: 4 * 1024 * 1024, // 4 MB
            point_lookup_accelerator: false,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.write_buffer_size == 0 {
            return Err(PrismError::Config(
                "write_buffer_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for table files)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Enable or disable the plaintext table dump
    pub fn dump_tables(mut self, enabled: bool) -> Self {
        self.config.dump_tables = enabled;
        self
    }

    /// Set the memtable flush threshold (in bytes)
    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.config.write_buffer_size = size;
        self
    }

    /// Enable or disable the point lookup accelerator
    pub fn point_lookup_accelerator(mut self, enabled: bool) -> Self {
        self.config.point_lookup_accelerator = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
