//! Configuration for region file handles
//!
//! Centralized open options with sensible defaults.

/// Options controlling how a [`RegionFile`](crate::storage::RegionFile) is opened
#[derive(Debug, Clone)]
pub struct RegionConfig {
    /// Open the file without write access. Every mutation fails with
    /// `ReadOnlyViolation` and the file is never touched.
    pub read_only: bool,

    /// Create the file on open if it does not exist (writable handles only)
    pub create_if_missing: bool,

    /// Compact the file during `close()`, before the header is flushed
    pub optimize_on_close: bool,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            read_only: false,
            create_if_missing: true,
            optimize_on_close: false,
        }
    }
}

impl RegionConfig {
    /// Create a new config builder
    pub fn builder() -> RegionConfigBuilder {
        RegionConfigBuilder::default()
    }

    /// Shorthand for a read-only config
    pub fn read_only() -> Self {
        Self::builder().read_only(true).create_if_missing(false).build()
    }
}

/// Builder for RegionConfig
#[derive(Default)]
pub struct RegionConfigBuilder {
    config: RegionConfig,
}

impl RegionConfigBuilder {
    /// Open without write access
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.config.read_only = read_only;
        self
    }

    /// Create the file if it is missing
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.config.create_if_missing = create;
        self
    }

    /// Run `optimize()` as part of `close()`
    pub fn optimize_on_close(mut self, optimize: bool) -> Self {
        self.config.optimize_on_close = optimize;
        self
    }

    pub fn build(self) -> RegionConfig {
        self.config
    }
}
