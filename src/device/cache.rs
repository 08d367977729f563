use std::fs;
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{ConfigFetcher, Device};
use crate::error::Result;

/// Default freshness window of a cached document: 1 day
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default number of documents kept in memory
pub const DEFAULT_CACHE_SIZE: usize = 64;

/// Caches documents of another fetcher, keyed by management address.
///
/// Documents live in an in-memory LRU and, when a directory is set, on
/// disk as well, so a restart within the TTL skips the remote call.
pub struct CachedFetcher<F> {
    inner: F,
    ttl: Duration,
    memory: Mutex<LruCache<String, (Instant, String)>>,
    disk_dir: Option<PathBuf>,
}

impl<F: ConfigFetcher> CachedFetcher<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            ttl: DEFAULT_CACHE_TTL,
            memory: Mutex::new(LruCache::new(capacity(DEFAULT_CACHE_SIZE))),
            disk_dir: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the number of documents kept in memory
    pub fn with_capacity(mut self, size: usize) -> Self {
        self.memory = Mutex::new(LruCache::new(capacity(size)));
        self
    }

    pub fn with_disk_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.disk_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// Drop every cached document, in memory and on disk.
    pub fn clear_cache(&self) -> Result<()> {
        self.memory.lock().clear();

        let Some(dir) = self.disk_dir.as_ref() else {
            return Ok(());
        };
        if !dir.exists() {
            return Ok(());
        }
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "xml") {
                fs::remove_file(&path)?;
            }
        }
        debug!(dir = %dir.display(), "configuration cache cleared");
        Ok(())
    }

    fn disk_path(&self, device: &Device) -> Option<PathBuf> {
        let file_name = device.management_address.replace([':', '/', '\\'], "_");
        self.disk_dir
            .as_ref()
            .map(|dir| dir.join(format!("{file_name}.xml")))
    }

    /// Check if a cached file is still within the TTL
    fn is_fresh(&self, path: &Path) -> bool {
        match fs::metadata(path) {
            Ok(meta) => {
                if meta.len() == 0 {
                    return false;
                }
                match meta.modified() {
                    Ok(mtime) => SystemTime::now()
                        .duration_since(mtime)
                        .map(|age| age < self.ttl)
                        .unwrap_or(false),
                    Err(_) => false,
                }
            }
            Err(_) => false,
        }
    }

    fn store(&self, path: &Path, text: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(text.as_bytes())?;
        file.flush()?;
        drop(file);

        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    fn remember(&self, key: String, text: String) {
        self.memory.lock().put(key, (Instant::now(), text));
    }
}

impl<F: ConfigFetcher> ConfigFetcher for CachedFetcher<F> {
    fn fetch(&self, device: &Device) -> Result<String> {
        let key = device.management_address.clone();

        {
            let mut memory = self.memory.lock();
            if let Some((stored, text)) = memory.get(&key) {
                if stored.elapsed() < self.ttl {
                    debug!(device = %device.name, "configuration served from memory cache");
                    return Ok(text.clone());
                }
            }
            memory.pop(&key);
        }

        let disk_path = self.disk_path(device);
        if let Some(path) = disk_path.as_ref().filter(|path| self.is_fresh(path)) {
            match fs::read_to_string(path) {
                Ok(text) => {
                    debug!(device = %device.name, path = %path.display(), "configuration served from disk cache");
                    self.remember(key, text.clone());
                    return Ok(text);
                }
                Err(e) => debug!(path = %path.display(), error = %e, "unreadable cache file"),
            }
        }

        let text = self.inner.fetch(device)?;

        if let Some(path) = disk_path.as_ref() {
            if let Err(e) = self.store(path, &text) {
                warn!(path = %path.display(), error = %e, "failed to write configuration cache");
            }
        }
        self.remember(key, text.clone());
        Ok(text)
    }
}

fn capacity(size: usize) -> NonZeroUsize {
    NonZeroUsize::new(size).unwrap_or(NonZeroUsize::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::error::{FetchErrorKind, TrackerError};

    #[derive(Default)]
    struct CountingFetcher {
        calls: Arc<AtomicUsize>,
    }

    impl ConfigFetcher for CountingFetcher {
        fn fetch(&self, device: &Device) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("<pfsense><!-- {} #{} --></pfsense>", device.name, n))
        }
    }

    struct FailingFetcher;

    impl ConfigFetcher for FailingFetcher {
        fn fetch(&self, device: &Device) -> Result<String> {
            Err(TrackerError::fetch(FetchErrorKind::Transport, &device.name, "unreachable"))
        }
    }

    fn device() -> Device {
        Device::new("fw-edge", "192.0.2.1")
    }

    #[test]
    fn test_memory_cache_hit() {
        let fetcher = CachedFetcher::new(CountingFetcher::default());
        let first = fetcher.fetch(&device()).unwrap();
        let second = fetcher.fetch(&device()).unwrap();
        assert_eq!(first, second);
        assert_eq!(fetcher.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_ttl_always_refetches() {
        let fetcher = CachedFetcher::new(CountingFetcher::default()).with_ttl(Duration::ZERO);
        fetcher.fetch(&device()).unwrap();
        fetcher.fetch(&device()).unwrap();
        assert_eq!(fetcher.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_keyed_by_management_address() {
        let fetcher = CachedFetcher::new(CountingFetcher::default());
        fetcher.fetch(&device()).unwrap();
        fetcher.fetch(&Device::new("fw-edge", "192.0.2.9")).unwrap();
        assert_eq!(fetcher.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_disk_cache_survives_new_instance() {
        let dir = std::env::temp_dir().join("pf_rule_tracker_test_disk_cache");
        let _ = fs::remove_dir_all(&dir);

        let first = CachedFetcher::new(CountingFetcher::default()).with_disk_dir(&dir);
        let text = first.fetch(&device()).unwrap();
        assert!(dir.join("192.0.2.1.xml").exists());

        let second = CachedFetcher::new(CountingFetcher::default()).with_disk_dir(&dir);
        assert_eq!(second.fetch(&device()).unwrap(), text);
        assert_eq!(second.inner().calls.load(Ordering::SeqCst), 0);

        second.clear_cache().unwrap();
        assert!(!dir.join("192.0.2.1.xml").exists());
        second.fetch(&device()).unwrap();
        assert_eq!(second.inner().calls.load(Ordering::SeqCst), 1);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_failure_is_not_cached() {
        let fetcher = CachedFetcher::new(FailingFetcher);
        assert!(fetcher.fetch(&device()).is_err());
        assert!(fetcher.memory.lock().is_empty());
    }

    #[test]
    fn test_ipv6_address_file_name() {
        let fetcher = CachedFetcher::new(FailingFetcher).with_disk_dir("/tmp/cache");
        let path = fetcher.disk_path(&Device::new("fw6", "2001:db8::1")).unwrap();
        assert_eq!(path.file_name().unwrap(), "2001_db8__1.xml");
    }
}
