//! Versioned, TTL-bounded judgment cache
//!
//! Entries live under `"cache:" + hash_string(url)`. An entry counts only
//! while its `cacheVersion` matches the running schema and its age is
//! within the TTL; anything else reads as absent and is removed by the
//! startup sweep once it ages out.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use slopscan_core::{JudgmentRecord, CACHE_SCHEMA_VERSION, MIN_CACHE_TTL_HOURS};

use crate::{KeyValueStore, StoreError};

/// Prefix shared by every cache key
pub const CACHE_KEY_PREFIX: &str = "cache:";

const MILLIS_PER_HOUR: i64 = 3_600_000;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// DJB2-family string hash (`h * 33 ^ unit`, seed 5381) over UTF-16 code
/// units, rendered in base 36. Not collision resistant.
pub fn hash_string(s: &str) -> String {
    let hash = s
        .encode_utf16()
        .fold(5381u32, |h, unit| h.wrapping_mul(33) ^ u32::from(unit));
    to_base36(hash)
}

fn to_base36(mut n: u32) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// Store key for a result URL
pub fn cache_key(url: &str) -> String {
    format!("{}{}", CACHE_KEY_PREFIX, hash_string(url))
}

fn ttl_millis(ttl_hours: u32) -> i64 {
    i64::from(ttl_hours.max(MIN_CACHE_TTL_HOURS)) * MILLIS_PER_HOUR
}

/// Judgment cache over a [`KeyValueStore`]. Sole owner of `cache:` keys.
pub struct ResultCache {
    store: Arc<dyn KeyValueStore>,
    ttl_hours: AtomicU32,
    version: u32,
}

impl ResultCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl_hours: u32) -> Self {
        Self {
            store,
            ttl_hours: AtomicU32::new(ttl_hours.max(MIN_CACHE_TTL_HOURS)),
            version: CACHE_SCHEMA_VERSION,
        }
    }

    /// Override the expected schema version
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn ttl_hours(&self) -> u32 {
        self.ttl_hours.load(Ordering::Relaxed)
    }

    /// Change the TTL applied by later reads
    pub fn set_ttl_hours(&self, ttl_hours: u32) {
        self.ttl_hours
            .store(ttl_hours.max(MIN_CACHE_TTL_HOURS), Ordering::Relaxed);
    }

    /// Whether `record` is usable at `now`
    pub fn is_fresh(&self, record: &JudgmentRecord, now: DateTime<Utc>) -> bool {
        record.cache_version == self.version && record.age_ms(now) <= ttl_millis(self.ttl_hours())
    }

    pub async fn get(&self, url: &str) -> Result<Option<JudgmentRecord>, StoreError> {
        self.get_at(url, Utc::now()).await
    }

    /// Look up `url` as of `now`
    pub async fn get_at(
        &self,
        url: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<JudgmentRecord>, StoreError> {
        let key = cache_key(url);
        let Some(value) = self.store.get_one(&key).await? else {
            debug!("Cache miss for {}", url);
            return Ok(None);
        };

        let record: JudgmentRecord = match serde_json::from_value(value) {
            Ok(record) => record,
            Err(e) => {
                warn!("Ignoring malformed cache entry {}: {}", key, e);
                return Ok(None);
            }
        };

        if !self.is_fresh(&record, now) {
            debug!(
                "Stale cache entry for {} (version {}, age {} ms)",
                url,
                record.cache_version,
                record.age_ms(now)
            );
            return Ok(None);
        }

        debug!("Cache hit for {}", url);
        Ok(Some(record))
    }

    /// Upsert the judgment for `url`
    pub async fn put(&self, url: &str, record: &JudgmentRecord) -> Result<(), StoreError> {
        let value = serde_json::to_value(record)?;
        self.store
            .set(HashMap::from([(cache_key(url), value)]))
            .await
    }

    /// Delete every cache entry older than `ttl_hours` or lacking `updatedAt`.
    /// Returns the number of entries removed.
    pub async fn sweep_expired(&self, ttl_hours: u32) -> Result<usize, StoreError> {
        self.sweep_expired_at(ttl_hours, Utc::now()).await
    }

    pub async fn sweep_expired_at(
        &self,
        ttl_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let ttl = ttl_millis(ttl_hours);
        let now_ms = now.timestamp_millis();
        let entries = self.store.get(None).await?;

        let expired: Vec<String> = entries
            .into_iter()
            .filter(|(key, _)| key.starts_with(CACHE_KEY_PREFIX))
            .filter(|(_, value)| match updated_at(value) {
                Some(updated) => now_ms - updated > ttl,
                None => true,
            })
            .map(|(key, _)| key)
            .collect();

        if !expired.is_empty() {
            self.store.remove(&expired).await?;
        }

        info!("Cache sweep removed {} expired entries", expired.len());
        Ok(expired.len())
    }
}

fn updated_at(value: &Value) -> Option<i64> {
    let raw = value.get("updatedAt")?;
    raw.as_i64().or_else(|| raw.as_f64().map(|f| f as i64))
}
