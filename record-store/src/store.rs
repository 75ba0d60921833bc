use crate::error::StoreError;
use crate::storage::Storage;
use dns::DomainName;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::SystemTime;
use tokio::sync::Mutex;

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub name: DomainName,
    /// Never empty; first inserted first.
    pub addresses: Vec<Ipv4Addr>,
    pub last_updated: SystemTime,
}

impl CacheEntry {
    fn new(name: DomainName) -> Self {
        Self {
            name,
            addresses: vec![],
            last_updated: SystemTime::now(),
        }
    }

    fn add(&mut self, address: Ipv4Addr) -> bool {
        if self.addresses.contains(&address) {
            return false;
        }

        self.addresses.push(address);
        self.last_updated = SystemTime::now();
        true
    }
}

#[derive(Default)]
struct Inner {
    // DomainName hashes and compares ignoring ASCII case
    entries: HashMap<DomainName, CacheEntry>,
    // in memory, but the last write to storage failed
    unpersisted: Vec<(DomainName, Ipv4Addr)>,
}

impl Inner {
    fn add(&mut self, name: &DomainName, address: Ipv4Addr) -> bool {
        self.entries
            .entry(name.clone())
            .or_insert_with(|| CacheEntry::new(name.clone()))
            .add(address)
    }

    fn is_unpersisted(&self, name: &DomainName, address: Ipv4Addr) -> bool {
        self.unpersisted
            .iter()
            .any(|(n, a)| n == name && *a == address)
    }
}

/// The cache. The lock is held across the storage write, so writes reach
/// storage in the order they were applied in memory.
pub struct RecordStore<S> {
    storage: S,
    inner: Mutex<Inner>,
}

impl<S: Storage> RecordStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Fills the cache from storage. Returns the number of distinct pairs loaded.
    pub async fn load_from_storage(&self) -> Result<usize, StoreError> {
        let pairs = self.storage.load_all().await?;
        let total = pairs.len();

        let mut inner = self.inner.lock().await;
        let loaded = pairs
            .into_iter()
            .filter(|(name, address)| inner.add(name, *address))
            .count();

        tracing::info!(
            "loaded {} records for {} names ({} duplicates)",
            loaded,
            inner.entries.len(),
            total - loaded
        );

        Ok(loaded)
    }

    /// `None` when the name has never been cached.
    pub async fn lookup(&self, name: &DomainName) -> Option<Vec<Ipv4Addr>> {
        let inner = self.inner.lock().await;
        inner
            .entries
            .get(name)
            .map(|entry| entry.addresses.clone())
    }

    pub async fn entry(&self, name: &DomainName) -> Option<CacheEntry> {
        let inner = self.inner.lock().await;
        inner.entries.get(name).cloned()
    }

    /// Adds the address to the name and persists it before returning.
    ///
    /// Returns whether the pair was new. On a storage error the pair stays
    /// cached in memory and is written again by the next `insert` of the same
    /// pair or by [`RecordStore::flush_unpersisted`].
    pub async fn insert(&self, name: &DomainName, address: Ipv4Addr) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;

        let added = inner.add(name, address);
        let retry = !added && inner.is_unpersisted(name, address);
        if !added && !retry {
            return Ok(false);
        }

        match self.storage.append_or_update(name, address).await {
            Ok(()) => {
                if retry {
                    inner
                        .unpersisted
                        .retain(|(n, a)| !(n == name && *a == address));
                }
                tracing::debug!("cached {} -> {}", name, address);
                Ok(added)
            }
            Err(e) => {
                if !retry {
                    inner.unpersisted.push((name.clone(), address));
                }
                Err(e)
            }
        }
    }

    /// Writes pairs whose earlier write failed, oldest first. Stops at the
    /// first failure.
    pub async fn flush_unpersisted(&self) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock().await;

        let mut flushed = 0;
        while let Some((name, address)) = inner.unpersisted.first().cloned() {
            self.storage.append_or_update(&name, address).await?;
            inner.unpersisted.remove(0);
            flushed += 1;
        }

        Ok(flushed)
    }

    pub async fn unpersisted_len(&self) -> usize {
        self.inner.lock().await.unpersisted.len()
    }

    /// Number of cached names.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
