use std::time::Duration;

/// Expiration time for orphan transactions.
pub const ORPHAN_TX_EXPIRE_TIME: Duration = Duration::from_secs(20 * 60);

/// Minimum time between orphan expiration sweeps.
pub const ORPHAN_TX_EXPIRE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// The maximum serialized size of a standard transaction in bytes.
pub const MAX_STANDARD_TX_SIZE: usize = 100_000;

/// Configuration options for the orphan transaction pool.
#[derive(Clone, Debug)]
pub struct OrphanageOptions {
    /// How long an orphan may stay resident before a sweep evicts it.
    pub expire_after: Duration,

    /// Minimum delay between two expiration sweeps.
    ///
    /// Sweeps are linear in the pool size; the interval batches them.
    pub sweep_interval: Duration,

    /// Maximum serialized size of an admissible orphan in bytes.
    pub max_orphan_tx_size: usize,
}

impl Default for OrphanageOptions {
    fn default() -> Self {
        Self {
            expire_after: ORPHAN_TX_EXPIRE_TIME,
            sweep_interval: ORPHAN_TX_EXPIRE_INTERVAL,
            max_orphan_tx_size: MAX_STANDARD_TX_SIZE,
        }
    }
}

impl OrphanageOptions {
    /// Create a builder for configuring orphanage options.
    pub fn builder() -> OrphanageOptionsBuilder {
        OrphanageOptionsBuilder::default()
    }
}

/// Builder pattern for [`OrphanageOptions`].
#[derive(Default)]
pub struct OrphanageOptionsBuilder {
    options: OrphanageOptions,
}

impl OrphanageOptionsBuilder {
    /// Set how long orphans stay resident before expiring.
    pub fn expire_after(mut self, expire_after: Duration) -> Self {
        self.options.expire_after = expire_after;
        self
    }

    /// Set the minimum delay between expiration sweeps.
    pub fn sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.options.sweep_interval = sweep_interval;
        self
    }

    /// Set the maximum serialized size of an admissible orphan.
    pub fn max_orphan_tx_size(mut self, max_orphan_tx_size: usize) -> Self {
        self.options.max_orphan_tx_size = max_orphan_tx_size;
        self
    }

    /// Build the final [`OrphanageOptions`].
    pub fn build(self) -> OrphanageOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orphanage_options_builder() {
        let options = OrphanageOptions::builder()
            .expire_after(Duration::from_secs(600))
            .sweep_interval(Duration::from_secs(60))
            .max_orphan_tx_size(50_000)
            .build();

        assert_eq!(options.expire_after, Duration::from_secs(600));
        assert_eq!(options.sweep_interval, Duration::from_secs(60));
        assert_eq!(options.max_orphan_tx_size, 50_000);
    }

    #[test]
    fn test_orphanage_options_defaults() {
        let options = OrphanageOptions::default();

        assert_eq!(options.expire_after, Duration::from_secs(1200));
        assert_eq!(options.sweep_interval, Duration::from_secs(300));
        assert_eq!(options.max_orphan_tx_size, 100_000);
    }
}
