//! As-of balance caching using Moka.
//!
//! Balances are keyed by the store version at the time of the read, so any
//! commit makes earlier entries unreachable and they age out on their own.

use std::time::Duration;

use chrono::NaiveDate;
use moka::sync::Cache;
use rust_decimal::Decimal;
use tally_shared::config::CacheConfig;
use tally_shared::types::AccountId;

/// Cache key: account, as-of date, store version.
type BalanceKey = (AccountId, NaiveDate, u64);

/// Cache for as-of balance reads. Thread-safe.
#[derive(Clone)]
pub struct BalanceCache {
    cache: Cache<BalanceKey, Decimal>,
}

impl BalanceCache {
    /// Creates a cache sized from configuration.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_config(config.balance_cache_capacity, config.balance_cache_ttl_secs)
    }

    /// Creates a cache with an explicit capacity and TTL.
    #[must_use]
    pub fn with_config(max_capacity: u64, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { cache }
    }

    /// Returns the cached balance or computes and caches it.
    ///
    /// Errors from `compute` are returned as-is and nothing is cached.
    pub fn get_or_try_compute<E>(
        &self,
        account_id: AccountId,
        as_of: NaiveDate,
        version: u64,
        compute: impl FnOnce() -> Result<Decimal, E>,
    ) -> Result<Decimal, E> {
        let key = (account_id, as_of, version);
        if let Some(balance) = self.cache.get(&key) {
            return Ok(balance);
        }
        let balance = compute()?;
        self.cache.insert(key, balance);
        Ok(balance)
    }

    /// Drops every entry.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}

impl Default for BalanceCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
