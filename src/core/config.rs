use crate::persist::ErrorSink;
use std::time::Duration;

/// Collection configuration
///
/// Controls how often a collection writes its snapshot to disk and where
/// failed background saves are reported.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Quiet period after the last exclusive unlock before a save fires
    pub debounce: Duration,

    /// Upper bound between the first mutation of a burst and its save
    pub max_delay: Duration,

    /// Whether exclusive unlocks schedule saves at all
    pub autosave: bool,

    /// Permission bits for directories created on first load (Unix only)
    pub dir_mode: u32,

    /// Destination for background save failures
    pub error_sink: ErrorSink,
}

impl StoreConfig {
    /// Create a configuration with the default timings (2s debounce, 10s max delay)
    pub fn new() -> Self {
        Self {
            debounce: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            autosave: true,
            dir_mode: 0o740,
            error_sink: ErrorSink::log(),
        }
    }

    /// Set the debounce period
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the maximum delay of a burst
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Enable or disable autosave
    pub fn autosave(mut self, enabled: bool) -> Self {
        self.autosave = enabled;
        self
    }

    /// Set the mode of bootstrapped directories
    pub fn dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = mode;
        self
    }

    /// Set the error sink
    pub fn error_sink(mut self, sink: ErrorSink) -> Self {
        self.error_sink = sink;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.debounce.is_zero() {
            return Err("debounce must be greater than 0".to_string());
        }

        if self.max_delay < self.debounce {
            return Err(format!(
                "max_delay ({:?}) must not be shorter than debounce ({:?})",
                self.max_delay, self.debounce
            ));
        }

        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}
