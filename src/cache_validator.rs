use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Integrity-checked cache of raw provider responses.
///
/// Entries are stored as serialized [`ValidatedCacheEntry`] values keyed by
/// the SHA-256 of the prompt. An entry whose checksum no longer matches its
/// data is dropped and the provider is asked again.
pub type ResponseCache = Cache<String, String>;

const RESPONSE_CACHE_CAPACITY: u64 = 10_000;

pub fn build_response_cache(ttl: Duration) -> ResponseCache {
    Cache::builder()
        .time_to_live(ttl)
        .max_capacity(RESPONSE_CACHE_CAPACITY)
        .build()
}

fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cache key for a prompt.
pub fn prompt_key(prompt: &str) -> String {
    format!("prompt:{}", sha256_hex(prompt))
}

/// A cached payload with its SHA-256 checksum (hex encoded).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ValidatedCacheEntry {
    pub data: String,
    pub checksum: String,
}

impl ValidatedCacheEntry {
    pub fn new(data: String) -> Self {
        let checksum = sha256_hex(&data);
        Self { data, checksum }
    }

    pub fn is_valid(&self) -> bool {
        sha256_hex(&self.data) == self.checksum
    }

    pub fn serialize(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Returns the payload when the entry parses and its checksum matches.
    pub fn deserialize_and_validate(serialized: &str) -> Option<String> {
        let entry: ValidatedCacheEntry = serde_json::from_str(serialized).ok()?;

        if entry.is_valid() {
            Some(entry.data)
        } else {
            tracing::warn!(
                "Cache validation failed: checksum mismatch. Expected: {}, Data length: {}",
                entry.checksum,
                entry.data.len()
            );
            None
        }
    }
}

/// Looks up a cached provider response, evicting it when tampered.
pub async fn get_validated(cache: &ResponseCache, key: &str) -> Option<String> {
    let cached = cache.get(key).await?;
    match ValidatedCacheEntry::deserialize_and_validate(&cached) {
        Some(data) => {
            tracing::debug!("Provider response cache HIT (validated): {}", key);
            Some(data)
        }
        None => {
            tracing::warn!("Discarding invalid provider cache entry {}", key);
            cache.invalidate(key).await;
            None
        }
    }
}

pub async fn insert_validated(cache: &ResponseCache, key: String, data: String) {
    let entry = ValidatedCacheEntry::new(data);
    cache.insert(key, entry.serialize()).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tampered_entry_rejected() {
        let entry = ValidatedCacheEntry::new(r#"{"overallScore": 40}"#.to_string());
        let tampered = entry.serialize().replace("40", "90");

        assert_eq!(ValidatedCacheEntry::deserialize_and_validate(&tampered), None);
    }

    #[test]
    fn test_prompt_key_is_stable() {
        assert_eq!(prompt_key("assess v-1"), prompt_key("assess v-1"));
        assert_ne!(prompt_key("assess v-1"), prompt_key("assess v-2"));
        assert!(prompt_key("x").starts_with("prompt:"));
    }

    #[tokio::test]
    async fn test_round_trip_through_cache() {
        let cache = build_response_cache(Duration::from_secs(60));
        let key = prompt_key("compare item-1");

        insert_validated(&cache, key.clone(), "raw text".to_string()).await;

        assert_eq!(get_validated(&cache, &key).await.as_deref(), Some("raw text"));
    }

    #[tokio::test]
    async fn test_poisoned_entry_evicted() {
        let cache = build_response_cache(Duration::from_secs(60));
        let key = prompt_key("assess v-9");
        let poisoned = ValidatedCacheEntry {
            data: "forged".to_string(),
            checksum: "00".to_string(),
        };
        cache.insert(key.clone(), poisoned.serialize()).await;

        assert_eq!(get_validated(&cache, &key).await, None);
        assert!(cache.get(&key).await.is_none());
    }
}
