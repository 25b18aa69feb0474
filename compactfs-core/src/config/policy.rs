//! Init policy

/// Default number of table magic re-reads before the chip is reformatted
pub const DEFAULT_MAX_MAGIC_RETRIES: u32 = 1000;

/// Default pause between table magic re-reads (µs)
pub const DEFAULT_MAGIC_RETRY_DELAY_US: u32 = 1000;

/// Runtime policy for the engine
///
/// A bad table magic is re-read `max_magic_retries` times before the
/// chip is treated as corrupt and reformatted, which rides out transient
/// read glitches at power-up without losing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FsConfig {
    /// Re-reads of a mismatching table magic before reformatting
    pub max_magic_retries: u32,
    /// Delay between re-reads (µs)
    pub magic_retry_delay_us: u32,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl FsConfig {
    /// Create the default policy
    pub const fn new() -> Self {
        Self {
            max_magic_retries: DEFAULT_MAX_MAGIC_RETRIES,
            magic_retry_delay_us: DEFAULT_MAGIC_RETRY_DELAY_US,
        }
    }

    /// Override the magic retry budget
    pub const fn with_magic_retries(mut self, retries: u32, delay_us: u32) -> Self {
        self.max_magic_retries = retries;
        self.magic_retry_delay_us = delay_us;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let config = FsConfig::default();
        assert_eq!(config.max_magic_retries, 1000);
        assert_eq!(config.magic_retry_delay_us, 1000);

        let fast = config.with_magic_retries(3, 0);
        assert_eq!(fast.max_magic_retries, 3);
        assert_eq!(fast.magic_retry_delay_us, 0);
    }
}
