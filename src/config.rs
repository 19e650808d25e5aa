//! Index build configuration

use serde::Deserialize;
use thiserror::Error;

/// Default number of index entries per replicated write
pub const DEFAULT_BULK_NUMBER_PER_INDEX_CREATION: usize = 1000;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("bulk_number_per_index_creation must be at least 1")]
    ZeroBatchSize,
}

/// Configuration for index builds
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IndexBuildConfig {
    /// Index entries accumulated before a batch is flushed
    pub bulk_number_per_index_creation: usize,

    /// Partitions scanned at the same time (0 = unbounded)
    pub max_concurrent_partitions: usize,

    /// Require index-building privileges on the target space
    pub security_authorization_enable: bool,
}

impl Default for IndexBuildConfig {
    fn default() -> Self {
        Self {
            bulk_number_per_index_creation: DEFAULT_BULK_NUMBER_PER_INDEX_CREATION,
            max_concurrent_partitions: 0, // unbounded
            security_authorization_enable: false,
        }
    }
}

impl IndexBuildConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the batch size
    pub fn with_bulk_number(mut self, n: usize) -> Self {
        self.bulk_number_per_index_creation = n;
        self
    }

    /// Set the partition concurrency cap
    pub fn with_max_concurrent_partitions(mut self, n: usize) -> Self {
        self.max_concurrent_partitions = n;
        self
    }

    /// Enable or disable authorization checks
    pub fn with_authorization(mut self, enable: bool) -> Self {
        self.security_authorization_enable = enable;
        self
    }

    /// Check the config is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bulk_number_per_index_creation == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        Ok(())
    }
}
