//! Content-addressed cache for synthesized speech
//!
//! Maps a digest of (normalized text, voice, language) to previously
//! synthesized audio so repeated replies never hit the synthesis service
//! twice. Entries are backed by files in a cache-owned temporary directory
//! that lives exactly as long as the process; eviction and shutdown delete
//! the backing files. Bounded by `max_entries` with least-recently-used
//! eviction, matching the recency-ordered cache of the original assistant.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lru::LruCache;
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tokio::sync::{Mutex, watch};

use crate::{Error, Result};

/// Default cache bound
pub const DEFAULT_MAX_ENTRIES: usize = 20;

/// Length of a cache key in bytes (128 bits of a SHA-256 digest)
const KEY_LENGTH: usize = 16;

/// Separator between hashed fields, so ("ab", "c") never collides with ("a", "bc")
const FIELD_SEPARATOR: u8 = 0x1f;

/// Fixed-length digest identifying a (normalized text, voice, language) triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; KEY_LENGTH]);

impl CacheKey {
    /// Derive a key from normalized text plus voice and language identifiers
    ///
    /// Callers must pass text through [`crate::text::normalize`] first; the
    /// cache does not re-normalize. Identical inputs always produce the same
    /// key; a different voice or language always produces a different key.
    #[must_use]
    pub fn derive(normalized_text: &str, voice: &str, language: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalized_text.as_bytes());
        hasher.update([FIELD_SEPARATOR]);
        hasher.update(voice.as_bytes());
        hasher.update([FIELD_SEPARATOR]);
        hasher.update(language.as_bytes());
        let hash = hasher.finalize();

        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(&hash[..KEY_LENGTH]);
        Self(key)
    }

    /// Hex form of the key, used for backing file names
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// A cached audio artifact and its bookkeeping
struct CacheEntry {
    audio: Arc<Vec<u8>>,
    path: PathBuf,
    size: u64,
    created_at: DateTime<Utc>,
    last_access: DateTime<Utc>,
}

/// Result broadcast to callers awaiting an in-flight synthesis
type InflightResult = std::result::Result<Arc<Vec<u8>>, String>;

/// Index and in-flight table, guarded together by one mutex
struct CacheState {
    entries: LruCache<CacheKey, CacheEntry>,
    inflight: HashMap<CacheKey, watch::Receiver<Option<InflightResult>>>,
}

/// Size-bounded response cache backing text-to-speech
pub struct ResponseCache {
    dir: TempDir,
    state: Mutex<CacheState>,
}

impl ResponseCache {
    /// Create a cache bounded at `max_entries`
    ///
    /// # Errors
    ///
    /// Returns error if the backing temporary directory cannot be created
    pub fn new(max_entries: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(max_entries)
            .ok_or_else(|| Error::Config("cache size must be at least 1".to_string()))?;
        let dir = tempfile::Builder::new()
            .prefix("lyra-tts-")
            .tempdir()
            .map_err(|e| Error::Cache(format!("failed to create cache dir: {e}")))?;

        tracing::debug!(dir = %dir.path().display(), max_entries, "response cache initialized");

        Ok(Self {
            dir,
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                inflight: HashMap::new(),
            }),
        })
    }

    /// Look up a previously synthesized artifact
    ///
    /// A hit refreshes the entry's recency. If the entry's backing file has
    /// gone missing or unreadable, the entry is evicted and the lookup
    /// reported as a miss so the caller re-synthesizes.
    pub async fn get(&self, key: CacheKey) -> Option<Arc<Vec<u8>>> {
        let mut state = self.state.lock().await;
        Self::lookup(&mut state, key)
    }

    /// Insert or replace an artifact
    ///
    /// If insertion would exceed the bound, the least-recently-used entry is
    /// evicted first and its backing file deleted. Returns the cached,
    /// shareable copy of the audio.
    ///
    /// # Errors
    ///
    /// Returns error if the backing file cannot be written
    pub async fn put(&self, key: CacheKey, audio: Vec<u8>) -> Result<Arc<Vec<u8>>> {
        let entry = self.write_entry(key, audio)?;
        let mut state = self.state.lock().await;
        Ok(Self::insert(&mut state, key, entry))
    }

    /// Get the artifact for `key`, synthesizing it on a miss
    ///
    /// At most one synthesis runs per key at a time: if another caller is
    /// already synthesizing this key, this call awaits that result instead
    /// of invoking `synthesize` again.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails or the backing file cannot be written
    pub async fn fetch<F, Fut>(&self, key: CacheKey, synthesize: F) -> Result<Arc<Vec<u8>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        let tx = {
            let mut state = self.state.lock().await;

            if let Some(audio) = Self::lookup(&mut state, key) {
                return Ok(audio);
            }

            if let Some(rx) = state.inflight.get(&key) {
                let mut rx = rx.clone();
                drop(state);
                return Self::await_inflight(&mut rx).await;
            }

            let (tx, rx) = watch::channel(None);
            state.inflight.insert(key, rx);
            tx
        };

        // This caller won the race and owns the synthesis.
        let result = match synthesize().await {
            Ok(audio) => self.write_entry(key, audio),
            Err(e) => Err(e),
        };

        let mut state = self.state.lock().await;
        state.inflight.remove(&key);

        match result {
            Ok(entry) => {
                let audio = Self::insert(&mut state, key, entry);
                let _ = tx.send(Some(Ok(Arc::clone(&audio))));
                Ok(audio)
            }
            Err(e) => {
                let _ = tx.send(Some(Err(e.to_string())));
                Err(e)
            }
        }
    }

    /// Evict all entries and delete their backing files
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        let mut removed = 0usize;
        while let Some((_, entry)) = state.entries.pop_lru() {
            Self::remove_backing_file(&entry);
            removed += 1;
        }
        if removed > 0 {
            tracing::debug!(removed, "response cache cleared");
        }
    }

    /// Number of cached entries
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Whether the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    /// Look up an entry, verifying its backing file is still readable
    fn lookup(state: &mut CacheState, key: CacheKey) -> Option<Arc<Vec<u8>>> {
        let entry = state.entries.get_mut(&key)?;

        if std::fs::metadata(&entry.path).is_err() {
            tracing::warn!(key = %key.to_hex(), "cache backing file unreadable, evicting entry");
            state.entries.pop(&key);
            return None;
        }

        entry.last_access = Utc::now();
        Some(Arc::clone(&entry.audio))
    }

    /// Insert an entry, evicting the least-recently-used one on overflow
    fn insert(state: &mut CacheState, key: CacheKey, entry: CacheEntry) -> Arc<Vec<u8>> {
        let audio = Arc::clone(&entry.audio);
        let new_path = entry.path.clone();

        if let Some((evicted_key, evicted)) = state.entries.push(key, entry) {
            // Same-key replacement returns the old entry under the same key;
            // only delete its file if it isn't the one we just wrote.
            if evicted.path != new_path {
                let age_secs = (Utc::now() - evicted.created_at).num_seconds();
                tracing::debug!(
                    key = %evicted_key.to_hex(),
                    size = evicted.size,
                    age_secs,
                    idle_secs = (Utc::now() - evicted.last_access).num_seconds(),
                    "evicting cache entry"
                );
                Self::remove_backing_file(&evicted);
            }
        }

        audio
    }

    /// Write audio to the entry's backing file
    fn write_entry(&self, key: CacheKey, audio: Vec<u8>) -> Result<CacheEntry> {
        let path = self.dir.path().join(format!("{}.mp3", key.to_hex()));
        std::fs::write(&path, &audio)
            .map_err(|e| Error::Cache(format!("failed to write {}: {e}", path.display())))?;

        let now = Utc::now();
        Ok(CacheEntry {
            size: audio.len() as u64,
            audio: Arc::new(audio),
            path,
            created_at: now,
            last_access: now,
        })
    }

    /// Delete an evicted entry's backing file; failure is logged, not fatal
    fn remove_backing_file(entry: &CacheEntry) {
        if let Err(e) = std::fs::remove_file(&entry.path) {
            tracing::warn!(
                path = %entry.path.display(),
                error = %e,
                "failed to delete evicted cache file"
            );
        }
    }

    /// Await the result of another caller's in-flight synthesis
    async fn await_inflight(rx: &mut watch::Receiver<Option<InflightResult>>) -> Result<Arc<Vec<u8>>> {
        let value = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| Error::Tts("in-flight synthesis abandoned".to_string()))?;

        match value.as_ref().cloned() {
            Some(Ok(audio)) => Ok(audio),
            Some(Err(msg)) => Err(Error::Tts(msg)),
            None => unreachable!("wait_for guarantees a value"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn key(text: &str) -> CacheKey {
        CacheKey::derive(text, "default", "en")
    }

    #[test]
    fn key_derivation_is_stable() {
        let a = CacheKey::derive("hello there", "default", "en");
        let b = CacheKey::derive("hello there", "default", "en");
        assert_eq!(a, b);
        assert_eq!(a.to_hex(), b.to_hex());
        assert_eq!(a.to_hex().len(), 32);
    }

    #[test]
    fn key_varies_with_each_field() {
        let base = CacheKey::derive("hello", "default", "en");
        assert_ne!(base, CacheKey::derive("goodbye", "default", "en"));
        assert_ne!(base, CacheKey::derive("hello", "alto", "en"));
        assert_ne!(base, CacheKey::derive("hello", "default", "th"));
    }

    #[test]
    fn key_fields_do_not_bleed_together() {
        // Without separators these would hash the same bytes
        let a = CacheKey::derive("ab", "c", "en");
        let b = CacheKey::derive("a", "bc", "en");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache = ResponseCache::new(4).unwrap();
        let k = key("hello");

        assert!(cache.get(k).await.is_none());
        cache.put(k, vec![1, 2, 3]).await.unwrap();
        assert_eq!(cache.get(k).await.unwrap().as_slice(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn lru_eviction_prefers_stale_entries() {
        let cache = ResponseCache::new(2).unwrap();
        let (a, b, c) = (key("a"), key("b"), key("c"));

        cache.put(a, vec![1]).await.unwrap();
        cache.put(b, vec![2]).await.unwrap();

        // Touch A so B becomes least recently used
        assert!(cache.get(a).await.is_some());

        cache.put(c, vec![3]).await.unwrap();

        assert_eq!(cache.len().await, 2);
        assert!(cache.get(a).await.is_some());
        assert!(cache.get(c).await.is_some());
        assert!(cache.get(b).await.is_none());
    }

    #[tokio::test]
    async fn size_never_exceeds_bound() {
        let cache = ResponseCache::new(3).unwrap();
        for i in 0..10u8 {
            cache.put(key(&format!("entry {i}")), vec![i]).await.unwrap();
            assert!(cache.len().await <= 3);
        }
        assert_eq!(cache.len().await, 3);
    }

    #[tokio::test]
    async fn eviction_deletes_backing_file() {
        let cache = ResponseCache::new(1).unwrap();
        let first = key("first");
        cache.put(first, vec![1]).await.unwrap();

        let backing = cache.dir.path().join(format!("{}.mp3", first.to_hex()));
        assert!(backing.exists());

        cache.put(key("second"), vec![2]).await.unwrap();
        assert!(!backing.exists());
    }

    #[tokio::test]
    async fn clear_removes_entries_and_files() {
        let cache = ResponseCache::new(4).unwrap();
        cache.put(key("x"), vec![1]).await.unwrap();
        cache.put(key("y"), vec![2]).await.unwrap();

        cache.clear().await;

        assert!(cache.is_empty().await);
        let remaining = std::fs::read_dir(cache.dir.path()).unwrap().count();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn unreadable_backing_file_is_treated_as_miss() {
        let cache = ResponseCache::new(4).unwrap();
        let k = key("fragile");
        cache.put(k, vec![9]).await.unwrap();

        let backing = cache.dir.path().join(format!("{}.mp3", k.to_hex()));
        std::fs::remove_file(&backing).unwrap();

        assert!(cache.get(k).await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn replacing_same_key_keeps_backing_file() {
        let cache = ResponseCache::new(2).unwrap();
        let k = key("again");
        cache.put(k, vec![1]).await.unwrap();
        cache.put(k, vec![2]).await.unwrap();

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get(k).await.unwrap().as_slice(), &[2]);
        let backing = cache.dir.path().join(format!("{}.mp3", k.to_hex()));
        assert!(backing.exists());
    }

    #[tokio::test]
    async fn fetch_synthesizes_once_per_key() {
        let cache = ResponseCache::new(4).unwrap();
        let calls = AtomicUsize::new(0);
        let k = key("dedup me");

        let synth = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            // Yield so a concurrent caller can observe the in-flight entry
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            Ok(vec![42])
        };

        let (a, b) = tokio::join!(cache.fetch(k, synth), cache.fetch(k, synth));

        assert_eq!(a.unwrap().as_slice(), &[42]);
        assert_eq!(b.unwrap().as_slice(), &[42]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_propagates_synthesis_failure_to_all_callers() {
        let cache = ResponseCache::new(4).unwrap();
        let k = key("doomed");

        let synth = || async {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            Err(Error::Tts("backend down".to_string()))
        };

        let (a, b) = tokio::join!(cache.fetch(k, synth), cache.fetch(k, synth));
        assert!(a.is_err());
        assert!(b.is_err());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn fetch_after_failure_retries_synthesis() {
        let cache = ResponseCache::new(4).unwrap();
        let k = key("flaky");

        let failed: Result<Arc<Vec<u8>>> =
            cache.fetch(k, || async { Err(Error::Tts("transient".to_string())) }).await;
        assert!(failed.is_err());

        let ok = cache.fetch(k, || async { Ok(vec![7]) }).await.unwrap();
        assert_eq!(ok.as_slice(), &[7]);
    }
}
