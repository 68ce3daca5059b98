//! Assembly engine configuration.

/// Default number of tile fetches allowed in flight at once.
pub const DEFAULT_PARALLEL_FETCHES: usize = 8;

/// Default number of retry attempts after a failed tile fetch.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default per-request network timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration for page assembly.
///
/// Groups the knobs of the concurrent dispatcher, providing sensible
/// defaults while allowing customization.
///
/// # Example
///
/// ```
/// use iiifolio::config::AssemblyConfig;
///
/// let config = AssemblyConfig::default();
/// assert_eq!(config.parallel_fetches(), 8);
///
/// let config = AssemblyConfig::new()
///     .with_parallel_fetches(6)
///     .with_max_retries(0);
/// assert_eq!(config.parallel_fetches(), 6);
/// assert_eq!(config.max_retries(), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblyConfig {
    /// Maximum number of concurrent tile fetches
    parallel_fetches: usize,
    /// Retry attempts per failed tile
    max_retries: u32,
    /// Per-request network timeout in seconds
    request_timeout_secs: u64,
}

impl AssemblyConfig {
    /// Create a new assembly configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of concurrent tile fetches.
    ///
    /// Tile tasks beyond this limit wait for a permit before issuing their
    /// request. Default: 8.
    pub fn with_parallel_fetches(mut self, parallel: usize) -> Self {
        self.parallel_fetches = parallel.max(1);
        self
    }

    /// Set the number of retry attempts per failed tile.
    ///
    /// A tile is fetched once plus up to this many retries before being
    /// recorded as failed. Default: 2.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the per-request network timeout in seconds. Default: 30.
    pub fn with_request_timeout_secs(mut self, timeout: u64) -> Self {
        self.request_timeout_secs = timeout;
        self
    }

    /// Get the maximum number of concurrent tile fetches.
    pub fn parallel_fetches(&self) -> usize {
        self.parallel_fetches
    }

    /// Get the retry attempts per failed tile.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Get the per-request network timeout in seconds.
    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs
    }
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            parallel_fetches: DEFAULT_PARALLEL_FETCHES,
            max_retries: DEFAULT_MAX_RETRIES,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}
