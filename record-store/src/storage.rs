use crate::error::StoreError;
use async_trait::async_trait;
use dns::DomainName;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Durable home of the `name -> address` pairs.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Every stored pair, in the order it was written. Duplicates are allowed.
    async fn load_all(&self) -> Result<Vec<(DomainName, Ipv4Addr)>, StoreError>;

    /// Returns once the pair is durable.
    async fn append_or_update(&self, name: &DomainName, address: Ipv4Addr)
        -> Result<(), StoreError>;
}

/// One `name address` pair per line, the name in its escaped canonical
/// form so a line never holds more than two fields. Lines in hosts-file order
/// (`address name`) are read as well. Blank lines and `#` comments are skipped.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn load_all(&self) -> Result<Vec<(DomainName, Ipv4Addr)>, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("storage file {} does not exist yet", self.path.display());
                return Ok(vec![]);
            }
            Err(e) => return Err(e.into()),
        };

        let mut pairs = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match parse_line(line) {
                Some(pair) => pairs.push(pair),
                None => {
                    tracing::warn!(
                        "skipping unreadable line {} of {}: {:?}",
                        index + 1,
                        self.path.display(),
                        line
                    );
                }
            }
        }

        Ok(pairs)
    }

    async fn append_or_update(
        &self,
        name: &DomainName,
        address: Ipv4Addr,
    ) -> Result<(), StoreError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        let line = format!("{} {}\n", name.canonical(), address);
        file.write_all(line.as_bytes()).await?;
        file.sync_data().await?;

        Ok(())
    }
}

fn parse_line(line: &str) -> Option<(DomainName, Ipv4Addr)> {
    let mut fields = line.split_whitespace();
    let first = fields.next()?;
    let second = fields.next()?;
    if fields.next().is_some() {
        return None;
    }

    let (name, address) = match (first.parse::<Ipv4Addr>(), second.parse::<Ipv4Addr>()) {
        (Err(_), Ok(address)) => (first, address),
        (Ok(address), Err(_)) => (second, address),
        _ => return None,
    };

    let name: DomainName = name.parse().ok()?;
    if name.is_root() {
        return None;
    }

    Some((name, address))
}

/// Keeps pairs in process memory. Writes can be made to fail on demand.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Mutex<Vec<(DomainName, Ipv4Addr)>>,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<(DomainName, Ipv4Addr)>) -> Self {
        Self {
            records: Mutex::new(records),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<(DomainName, Ipv4Addr)> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn load_all(&self) -> Result<Vec<(DomainName, Ipv4Addr)>, StoreError> {
        Ok(self.records())
    }

    async fn append_or_update(
        &self,
        name: &DomainName,
        address: Ipv4Addr,
    ) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "writes disabled").into());
        }

        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((name.clone(), address));

        Ok(())
    }
}
