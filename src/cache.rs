//! Content-addressed get-or-compute cache.
//!
//! Expensive derived artifacts (chunk summaries, document summaries, embedded
//! corpora) are memoized under deterministic digest keys with a per-record
//! TTL. A miss is indistinguishable from "never computed": expired records,
//! unreadable records, and records that fail to deserialize all silently
//! trigger recomputation.
//!
//! Backends implement [`CacheBackend`] — a plain key→bytes store with
//! per-key expiry. [`MemoryBackend`] keeps records in a `RwLock<HashMap>`;
//! [`FsBackend`] writes one file per key under a cache directory so records
//! survive process restarts.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::ChatError;

// ============ Cache keys ============

/// Deterministic cache-key constructor.
///
/// A key is the SHA-256 digest of an operation identity plus its ordered,
/// length-prefixed arguments. Length prefixes make the encoding unambiguous:
/// `("ab", "c")` and `("a", "bc")` hash differently.
pub struct CacheKey {
    hasher: Sha256,
}

impl CacheKey {
    /// Start a key for the named operation (e.g. `"summary.chunk"`).
    pub fn new(operation: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((operation.len() as u64).to_le_bytes());
        hasher.update(operation.as_bytes());
        Self { hasher }
    }

    /// Append one argument.
    pub fn arg(mut self, value: impl AsRef<[u8]>) -> Self {
        let bytes = value.as_ref();
        self.hasher.update((bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
        self
    }

    /// Finish the key as a hex digest.
    pub fn digest(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

// ============ Backends ============

/// Durable key→bytes store with per-key expiry.
///
/// Implementations must treat every failure as a miss: `load` returns `None`
/// rather than erroring, and a failed `store` is silently dropped. The cache
/// layer stays correct with an empty or broken backend, only slower.
pub trait CacheBackend: Send + Sync {
    /// Fetch the live (non-expired) record for `key`, if any.
    fn load(&self, key: &str) -> Option<Vec<u8>>;
    /// Store `value` under `key` for `ttl`. Overwrites any existing record.
    fn store(&self, key: &str, value: &[u8], ttl: Duration);
}

/// In-memory backend. Records live until they expire or the process exits.
pub struct MemoryBackend {
    records: RwLock<HashMap<String, (Vec<u8>, Instant)>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBackend for MemoryBackend {
    fn load(&self, key: &str) -> Option<Vec<u8>> {
        let records = self.records.read().ok()?;
        let (value, expires_at) = records.get(key)?;
        if Instant::now() >= *expires_at {
            return None;
        }
        Some(value.clone())
    }

    fn store(&self, key: &str, value: &[u8], ttl: Duration) {
        if let Ok(mut records) = self.records.write() {
            // Expired entries are dropped opportunistically on write.
            let now = Instant::now();
            records.retain(|_, (_, expires_at)| *expires_at > now);
            records.insert(key.to_string(), (value.to_vec(), now + ttl));
        }
    }
}

/// On-disk record format for [`FsBackend`].
#[derive(Serialize, Deserialize)]
struct FsRecord {
    /// Unix timestamp (seconds) after which the record is dead.
    expires_at: i64,
    /// Base64 of the serialized payload.
    payload: String,
}

/// Filesystem backend: one JSON record file per key under a cache directory.
///
/// Keys are hex digests, so they are safe to use as file names directly.
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    /// Create a backend rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        if let Err(e) = std::fs::create_dir_all(&root) {
            debug!(dir = %root.display(), error = %e, "could not create cache dir");
        }
        Self { root }
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }
}

impl CacheBackend for FsBackend {
    fn load(&self, key: &str) -> Option<Vec<u8>> {
        let raw = std::fs::read(self.record_path(key)).ok()?;
        let record: FsRecord = serde_json::from_slice(&raw).ok()?;
        if chrono::Utc::now().timestamp() >= record.expires_at {
            return None;
        }
        base64::engine::general_purpose::STANDARD
            .decode(record.payload)
            .ok()
    }

    fn store(&self, key: &str, value: &[u8], ttl: Duration) {
        let record = FsRecord {
            expires_at: chrono::Utc::now().timestamp() + ttl.as_secs() as i64,
            payload: base64::engine::general_purpose::STANDARD.encode(value),
        };
        let bytes = match serde_json::to_vec(&record) {
            Ok(b) => b,
            Err(_) => return,
        };
        if let Err(e) = std::fs::write(self.record_path(key), bytes) {
            debug!(key, error = %e, "cache store failed");
        }
    }
}

// ============ Cache ============

/// Get-or-compute memoization over a [`CacheBackend`].
///
/// Values are serialized as JSON. Concurrent callers computing the same key
/// are collapsed to a single computation: the first caller runs `compute`
/// while the rest wait on a per-key lock and then read the stored result.
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn CacheBackend>,
    inflight: Arc<tokio::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl Cache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            inflight: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
        }
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<T, ChatError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ChatError>>,
    {
        self.get_or_compute_with(key, ttl, false, compute).await
    }

    /// Like [`Cache::get_or_compute`], but `force_recompute` bypasses any
    /// live record and always runs `compute`.
    pub async fn get_or_compute_with<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        force_recompute: bool,
        compute: F,
    ) -> Result<T, ChatError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ChatError>>,
    {
        let lock = self.key_lock(key).await;
        let result = {
            let _guard = lock.lock().await;
            self.load_or_compute(key, ttl, force_recompute, compute).await
        };
        self.release_key_lock(key, lock).await;
        result
    }

    async fn load_or_compute<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        force_recompute: bool,
        compute: F,
    ) -> Result<T, ChatError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ChatError>>,
    {
        if !force_recompute {
            if let Some(bytes) = self.backend.load(key) {
                match serde_json::from_slice(&bytes) {
                    Ok(value) => {
                        debug!(key, "cache hit");
                        return Ok(value);
                    }
                    Err(e) => {
                        // Corrupt record: treat as a miss and recompute.
                        debug!(key, error = %e, "cache record failed to deserialize");
                    }
                }
            } else {
                debug!(key, "cache miss");
            }
        }

        let value = compute().await?;
        match serde_json::to_vec(&value) {
            Ok(bytes) => self.backend.store(key, &bytes, ttl),
            Err(e) => debug!(key, error = %e, "cache value failed to serialize"),
        }
        Ok(value)
    }

    async fn key_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut inflight = self.inflight.lock().await;
        inflight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    async fn release_key_lock(&self, key: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        drop(lock);
        let mut inflight = self.inflight.lock().await;
        // Only drop the entry when no other caller still holds a clone.
        if inflight
            .get(key)
            .is_some_and(|l| Arc::strong_count(l) == 1)
        {
            inflight.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache() -> Cache {
        Cache::new(Arc::new(MemoryBackend::new()))
    }

    #[tokio::test]
    async fn test_second_call_is_a_hit() {
        let cache = cache();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let v: u32 = cache
                .get_or_compute("k", Duration::from_secs(60), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await
                .unwrap();
            assert_eq!(v, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_force_recompute_always_computes() {
        let cache = cache();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let _: u32 = cache
                .get_or_compute_with("k", Duration::from_secs(60), true, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_record_recomputes() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let run = || {
            cache.get_or_compute("k", Duration::from_millis(20), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("value".to_string())
            })
        };

        run().await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        run().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_compute_error_propagates_and_stores_nothing() {
        let cache = cache();
        let err: Result<u32, _> = cache
            .get_or_compute("k", Duration::from_secs(60), || async {
                Err(ChatError::Upstream("boom".to_string()))
            })
            .await;
        assert!(matches!(err, Err(ChatError::Upstream(_))));

        let v: u32 = cache
            .get_or_compute("k", Duration::from_secs(60), || async { Ok(5) })
            .await
            .unwrap();
        assert_eq!(v, 5);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_a_miss() {
        let backend = Arc::new(MemoryBackend::new());
        backend.store("k", b"not json at all", Duration::from_secs(60));
        let cache = Cache::new(backend);

        let v: u32 = cache
            .get_or_compute("k", Duration::from_secs(60), || async { Ok(9) })
            .await
            .unwrap();
        assert_eq!(v, 9);
    }

    #[tokio::test]
    async fn test_fs_backend_roundtrip_and_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path());

        backend.store("deadbeef", b"payload", Duration::from_secs(60));
        assert_eq!(backend.load("deadbeef").as_deref(), Some(&b"payload"[..]));

        backend.store("expired", b"old", Duration::from_secs(0));
        assert_eq!(backend.load("expired"), None);
        assert_eq!(backend.load("never-stored"), None);
    }

    #[tokio::test]
    async fn test_concurrent_callers_compute_once() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_compute("shared", Duration::from_secs(60), || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok(1u32)
                        })
                        .await
                        .unwrap()
                })
            })
            .collect();

        for t in tasks {
            assert_eq!(t.await.unwrap(), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cache_key_is_deterministic_and_unambiguous() {
        let a = CacheKey::new("op").arg("ab").arg("c").digest();
        let b = CacheKey::new("op").arg("ab").arg("c").digest();
        let c = CacheKey::new("op").arg("a").arg("bc").digest();
        let d = CacheKey::new("other").arg("ab").arg("c").digest();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.len(), 64);
    }
}
