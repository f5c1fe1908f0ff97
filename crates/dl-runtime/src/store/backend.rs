use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use dl_core::{DicelangError, StoreImage, STORE_SCHEMA_V1};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Durable medium behind a [`super::VariableStore`].
pub trait StoreBackend: Send + Sync {
    /// Returns `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<StoreImage>, DicelangError>;
    fn save(&self, image: &StoreImage) -> Result<(), DicelangError>;
    fn backup(&self, image: &StoreImage) -> Result<(), DicelangError>;
}

fn map_storage(context: &str, error: impl Display) -> DicelangError {
    DicelangError::storage(format!("{}: {}", context, error))
}

pub const DEFAULT_BACKUPS_KEPT: usize = 5;

/// Stores the image as a JSON file, replaced atomically on every save.
/// Backups are timestamped copies in a sibling directory.
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
    backup_dir: PathBuf,
    keep_backups: usize,
    sequence: AtomicU64,
    /// One writer at a time through the staging file.
    writes: Mutex<()>,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let backup_dir = path.with_extension("backups");
        Self {
            path,
            backup_dir,
            keep_backups: DEFAULT_BACKUPS_KEPT,
            sequence: AtomicU64::new(0),
            writes: Mutex::new(()),
        }
    }

    pub fn with_backup_dir(mut self, backup_dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = backup_dir.into();
        self
    }

    pub fn keep_backups(mut self, count: usize) -> Self {
        self.keep_backups = count.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    fn write_atomically(&self, path: &Path, image: &StoreImage) -> Result<(), DicelangError> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|e| map_storage("Cannot create store directory", e))?;

        let payload = serde_json::to_string_pretty(image)
            .map_err(|e| map_storage("Cannot encode store image", e))?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, payload).map_err(|e| map_storage("Cannot write store image", e))?;
        fs::rename(&staging, path).map_err(|e| map_storage("Cannot replace store image", e))
    }

    fn prune_backups(&self) -> Result<(), DicelangError> {
        let mut backups = fs::read_dir(&self.backup_dir)
            .map_err(|e| map_storage("Cannot list backups", e))?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect::<Vec<_>>();
        backups.sort();
        while backups.len() > self.keep_backups {
            let oldest = backups.remove(0);
            if let Err(error) = fs::remove_file(&oldest) {
                warn!(path = %oldest.display(), %error, "failed to remove old backup");
            }
        }
        Ok(())
    }
}

impl StoreBackend for JsonFileBackend {
    fn load(&self) -> Result<Option<StoreImage>, DicelangError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| map_storage("Cannot read store image", e))?;
        let image: StoreImage = serde_json::from_str(&raw)
            .map_err(|e| map_storage("Store image is corrupt", e))?;
        if image.schema_version != STORE_SCHEMA_V1 {
            return Err(DicelangError::storage(format!(
                "Unsupported store schema \"{}\".",
                image.schema_version
            )));
        }
        debug!(path = %self.path.display(), "store image loaded");
        Ok(Some(image))
    }

    fn save(&self, image: &StoreImage) -> Result<(), DicelangError> {
        let _writes = self.writes.lock();
        self.write_atomically(&self.path, image)
    }

    fn backup(&self, image: &StoreImage) -> Result<(), DicelangError> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let target = self
            .backup_dir
            .join(format!("store-{:020}-{:06}.json", millis, sequence));
        let _writes = self.writes.lock();
        self.write_atomically(&target, image)?;
        debug!(path = %target.display(), "store backup written");
        self.prune_backups()
    }
}

/// In-memory medium, mostly for tests and ephemeral sessions.
#[derive(Debug)]
pub struct MemoryBackend {
    saved: Mutex<Option<StoreImage>>,
    backups: Mutex<Vec<StoreImage>>,
    available: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            saved: Mutex::new(None),
            backups: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulates the medium going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn saved_image(&self) -> Option<StoreImage> {
        self.saved.lock().clone()
    }

    pub fn backup_count(&self) -> usize {
        self.backups.lock().len()
    }

    fn check_available(&self) -> Result<(), DicelangError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DicelangError::storage("Storage medium is unavailable."))
        }
    }
}

impl StoreBackend for MemoryBackend {
    fn load(&self) -> Result<Option<StoreImage>, DicelangError> {
        self.check_available()?;
        Ok(self.saved.lock().clone())
    }

    fn save(&self, image: &StoreImage) -> Result<(), DicelangError> {
        self.check_available()?;
        *self.saved.lock() = Some(image.clone());
        Ok(())
    }

    fn backup(&self, image: &StoreImage) -> Result<(), DicelangError> {
        self.check_available()?;
        self.backups.lock().push(image.clone());
        Ok(())
    }
}
