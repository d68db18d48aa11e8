//! Monotonic invoice numbering.
//!
//! [`FileCounter`] keeps the next number as a single line of text. Each call
//! takes an advisory lock file, reads, writes the increment through a temp
//! file + rename, and returns the pre-increment value.

use crate::error::{GenerateError, Result};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// First invoice number when no state exists.
pub const SEED: u64 = 1000;

pub const DEFAULT_COUNTER_FILE: &str = "invoice_counter.txt";

const LOCK_RETRY: Duration = Duration::from_millis(10);

/// Source of invoice numbers.
pub trait InvoiceCounter {
    /// Return the current number and advance the stored value by one.
    fn next(&self) -> Result<u64>;
}

impl<C: InvoiceCounter + ?Sized> InvoiceCounter for &C {
    fn next(&self) -> Result<u64> {
        (**self).next()
    }
}

/// Counter persisted in a plain-text file.
#[derive(Debug, Clone)]
pub struct FileCounter {
    path: PathBuf,
    lock_timeout: Duration,
}

/// Removes the lock file when dropped.
struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!("Failed to release counter lock {}: {}", self.path.display(), e);
        }
    }
}

impl FileCounter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: Duration::from_secs(2),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    fn acquire(&self) -> Result<LockGuard> {
        let lock_path = self.lock_path();
        let start = Instant::now();
        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(_) => return Ok(LockGuard { path: lock_path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if start.elapsed() >= self.lock_timeout {
                        return Err(GenerateError::Counter(std::io::Error::new(
                            ErrorKind::TimedOut,
                            format!("lock {} is held by another process", lock_path.display()),
                        )));
                    }
                    std::thread::sleep(LOCK_RETRY);
                }
                Err(e) => return Err(GenerateError::Counter(e)),
            }
        }
    }

    /// Stored value: `None` when the file does not exist,
    /// `CounterCorruption` when it holds something other than an integer.
    pub fn read_state(&self) -> Result<Option<u64>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(GenerateError::Counter(e)),
        };
        content
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| GenerateError::CounterCorruption {
                path: self.path.clone(),
                content: content.trim().to_string(),
            })
    }

    fn write_state(&self, value: u64) -> Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(self.dir()).map_err(GenerateError::Counter)?;
        write!(tmp, "{}", value).map_err(GenerateError::Counter)?;
        tmp.persist(&self.path)
            .map_err(|e| GenerateError::Counter(e.error))?;
        Ok(())
    }
}

impl InvoiceCounter for FileCounter {
    fn next(&self) -> Result<u64> {
        let _lock = self.acquire()?;
        let current = match self.read_state() {
            Ok(Some(value)) => value,
            Ok(None) => {
                log::info!(
                    "No invoice counter at {}, starting at {}",
                    self.path.display(),
                    SEED
                );
                SEED
            }
            Err(err @ GenerateError::CounterCorruption { .. }) => {
                log::warn!("{}; resetting to {}", err, SEED);
                SEED
            }
            Err(err) => return Err(err),
        };
        self.write_state(current + 1)?;
        log::debug!("Invoice number {} issued", current);
        Ok(current)
    }
}

/// In-process counter for tests and dry runs.
#[derive(Debug)]
pub struct MemoryCounter {
    next: AtomicU64,
}

impl MemoryCounter {
    pub fn new(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }

    /// Value the next call will return.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

impl Default for MemoryCounter {
    fn default() -> Self {
        Self::new(SEED)
    }
}

impl InvoiceCounter for MemoryCounter {
    fn next(&self) -> Result<u64> {
        Ok(self.next.fetch_add(1, Ordering::SeqCst))
    }
}
