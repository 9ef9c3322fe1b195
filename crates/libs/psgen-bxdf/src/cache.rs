use crate::merl::{MerlBrdfTable, MerlLayout};
use base::{utils::normalise_path, Error};
use std::{
    collections::{HashMap, VecDeque},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError, RwLock,
    },
};

/// Loaded tables keyed by canonical path, with their insertion order.
#[derive(Debug, Default)]
pub struct RawBrdfCache {
    tables: HashMap<PathBuf, Arc<MerlBrdfTable>>,
    order: VecDeque<PathBuf>,
}

impl RawBrdfCache {
    /// Returns the table loaded from `path`, if any.
    pub fn get(&self, path: &Path) -> Option<Arc<MerlBrdfTable>> { self.tables.get(path).cloned() }

    /// Number of cached tables.
    pub fn len(&self) -> usize { self.tables.len() }

    /// Whether the cache holds no table.
    pub fn is_empty(&self) -> bool { self.tables.is_empty() }

    /// Whether a table loaded from `path` is cached.
    pub fn contains(&self, path: &Path) -> bool { self.tables.contains_key(path) }

    fn insert(&mut self, path: PathBuf, table: Arc<MerlBrdfTable>, capacity: Option<usize>) {
        if let Some(capacity) = capacity {
            while self.order.len() >= capacity.max(1) {
                match self.order.pop_front() {
                    Some(oldest) => {
                        log::debug!("BRDF cache full, evicting {}", oldest.display());
                        self.tables.remove(&oldest);
                    },
                    None => break,
                }
            }
        }
        self.order.push_back(path.clone());
        self.tables.insert(path, table);
    }
}

#[derive(Debug)]
struct Shared {
    raw: RwLock<RawBrdfCache>,
    /// One lock per file being read from disk.
    loading: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Cache of loaded MERL tables shared between dataset workers.
///
/// Cloning the cache yields another handle to the same storage. Readers
/// only take a shared lock. A miss is resolved while holding a lock owned by
/// its file, so a file is never read twice concurrently while different
/// files load in parallel. When a capacity is set, the oldest inserted
/// table is dropped first.
#[derive(Debug, Clone)]
pub struct BrdfCache {
    shared: Arc<Shared>,
    capacity: Option<usize>,
    layout: MerlLayout,
}

impl BrdfCache {
    /// Creates a cache retaining at most `capacity` tables (`None` for no
    /// limit).
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            shared: Arc::new(Shared {
                raw: RwLock::new(RawBrdfCache::default()),
                loading: Mutex::new(HashMap::new()),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
            capacity,
            layout: MerlLayout::default(),
        }
    }

    /// Sets the sample layout used for files loaded from now on.
    pub fn with_layout(mut self, layout: MerlLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Maximum number of retained tables.
    pub fn capacity(&self) -> Option<usize> { self.capacity }

    /// Runs `reader` with shared access to the cached tables.
    pub fn read<R>(&self, reader: impl FnOnce(&RawBrdfCache) -> R) -> R {
        let cache = self
            .shared
            .raw
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        reader(&cache)
    }

    fn write<R>(&self, writer: impl FnOnce(&mut RawBrdfCache) -> R) -> R {
        let mut cache = self
            .shared
            .raw
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        writer(&mut cache)
    }

    /// Returns the table stored at `path`, reading it on first use.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Arc<MerlBrdfTable>, Error> {
        let key = cache_key(path.as_ref());
        if let Some(table) = self.read(|cache| cache.get(&key)) {
            self.shared.hits.fetch_add(1, Ordering::Relaxed);
            log::debug!("BRDF {} already loaded", key.display());
            return Ok(table);
        }

        let slot = self.loading_slot(&key);
        let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have loaded it while we were waiting.
        if let Some(table) = self.read(|cache| cache.get(&key)) {
            self.shared.hits.fetch_add(1, Ordering::Relaxed);
            log::debug!("BRDF {} loaded by another worker", key.display());
            return Ok(table);
        }

        self.shared.misses.fetch_add(1, Ordering::Relaxed);
        let loaded = MerlBrdfTable::load_with_layout(&key, self.layout).map(Arc::new);
        if let Ok(table) = &loaded {
            self.write(|cache| cache.insert(key.clone(), table.clone(), self.capacity));
        }
        self.release_slot(&key, &slot);
        loaded
    }

    /// Lock serialising the reads of the file at `key`.
    fn loading_slot(&self, key: &Path) -> Arc<Mutex<()>> {
        let mut loading = self
            .shared
            .loading
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loading.entry(key.to_path_buf()).or_default().clone()
    }

    /// Forgets the lock of `key` unless a newer one replaced it.
    fn release_slot(&self, key: &Path, slot: &Arc<Mutex<()>>) {
        let mut loading = self
            .shared
            .loading
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if loading.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            loading.remove(key);
        }
    }

    /// Number of lookups answered from memory.
    pub fn hits(&self) -> u64 { self.shared.hits.load(Ordering::Relaxed) }

    /// Number of lookups that read a file.
    pub fn misses(&self) -> u64 { self.shared.misses.load(Ordering::Relaxed) }

    /// Number of tables currently held.
    pub fn len(&self) -> usize { self.read(|cache| cache.len()) }

    /// Whether no table is held.
    pub fn is_empty(&self) -> bool { self.read(|cache| cache.is_empty()) }
}

impl Default for BrdfCache {
    fn default() -> Self { Self::new(None) }
}

/// Canonical absolute path for existing files; a lexically normalised
/// absolute path otherwise.
fn cache_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        };
        normalise_path(&absolute)
    })
}
