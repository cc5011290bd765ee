use std::collections::BTreeMap;
use std::env;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::domain::{GridData, TaskList};

pub const GRID_KEY: &str = "timegrid";
pub const TASKS_KEY: &str = "tasks";

const RECENT_STORES_FILE: &str = "recent_stores.txt";
const MAX_RECENT_STORES: usize = 50;

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    TomlDecode(toml::de::Error),
    TomlEncode(toml::ser::Error),
    JsonDecode(serde_json::Error),
    JsonEncode(serde_json::Error),
    NoStoreSelected,
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "io error: {err}"),
            StorageError::TomlDecode(err) => write!(f, "failed to parse store file: {err}"),
            StorageError::TomlEncode(err) => write!(f, "failed to encode store file: {err}"),
            StorageError::JsonDecode(err) => write!(f, "failed to parse stored entry: {err}"),
            StorageError::JsonEncode(err) => write!(f, "failed to encode stored entry: {err}"),
            StorageError::NoStoreSelected => write!(
                f,
                "no store selected: pass --store <path>, set TIMEGRID_STORE, or pick one from `stores`"
            ),
        }
    }
}

impl std::error::Error for StorageError {}

/// The injected key-value primitive the grid persists through: flat string
/// entries, no transactionality across keys.
pub trait KvStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError>;
}

/// File-backed store: one TOML table of string entries. Every `set`
/// rewrites the whole file (write-through, no batching).
#[derive(Debug)]
pub struct FileKvStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileKvStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let raw = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Ok(Self {
                    path: path.to_path_buf(),
                    entries: BTreeMap::new(),
                });
            }
            Err(err) => return Err(StorageError::Io(err)),
        };

        let entries = if raw.trim().is_empty() {
            BTreeMap::new()
        } else {
            toml::from_str(&raw).map_err(StorageError::TomlDecode)?
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(StorageError::Io)?;
            }
        }

        let blob = toml::to_string_pretty(&self.entries).map_err(StorageError::TomlEncode)?;
        fs::write(&self.path, blob).map_err(StorageError::Io)
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }
}

#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: BTreeMap<String, String>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

pub fn load_grid(store: &dyn KvStore) -> Result<GridData, StorageError> {
    match store.get(GRID_KEY) {
        Some(raw) => serde_json::from_str(&raw).map_err(StorageError::JsonDecode),
        None => Ok(GridData::new()),
    }
}

pub fn save_grid(store: &mut dyn KvStore, grid: &GridData) -> Result<(), StorageError> {
    let blob = serde_json::to_string(grid).map_err(StorageError::JsonEncode)?;
    store.set(GRID_KEY, blob)
}

pub fn load_tasks(store: &dyn KvStore) -> Result<TaskList, StorageError> {
    match store.get(TASKS_KEY) {
        Some(raw) => serde_json::from_str(&raw).map_err(StorageError::JsonDecode),
        None => Ok(TaskList::new()),
    }
}

pub fn save_tasks(store: &mut dyn KvStore, tasks: &TaskList) -> Result<(), StorageError> {
    let blob = serde_json::to_string(tasks).map_err(StorageError::JsonEncode)?;
    store.set(TASKS_KEY, blob)
}

/// Picks the store file to operate on: the `--store` flag wins, then the
/// `TIMEGRID_STORE` environment variable, then the most recent usable entry
/// from the recents list.
pub fn resolve_store_path(cli_path: Option<PathBuf>) -> Result<PathBuf, StorageError> {
    if let Some(path) = cli_path {
        return Ok(absolutize(path));
    }

    if let Some(path) = env::var_os("TIMEGRID_STORE") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return Ok(absolutize(path));
        }
    }

    for candidate in recent_stores(MAX_RECENT_STORES)? {
        if store_file_usable(&candidate) {
            return Ok(candidate);
        }
    }

    Err(StorageError::NoStoreSelected)
}

// A recents entry can go stale: the file may have been deleted, or replaced
// with something that no longer parses as a store. Skip those instead of
// resolving to a store that would fail to open.
fn store_file_usable(path: &Path) -> bool {
    path.is_file() && FileKvStore::open(path).is_ok()
}

pub fn remember_store(path: &Path) -> Result<(), StorageError> {
    remember_store_in(&state_dir(), path)
}

pub fn recent_stores(limit: usize) -> Result<Vec<PathBuf>, StorageError> {
    recent_stores_in(&state_dir(), limit)
}

fn remember_store_in(state_dir: &Path, path: &Path) -> Result<(), StorageError> {
    let path = absolutize(path.to_path_buf());
    let mut entries = recent_stores_in(state_dir, MAX_RECENT_STORES)?;
    entries.retain(|entry| entry != &path);
    entries.insert(0, path);
    entries.truncate(MAX_RECENT_STORES);
    save_recent_stores_in(state_dir, &entries)
}

fn recent_stores_in(state_dir: &Path, limit: usize) -> Result<Vec<PathBuf>, StorageError> {
    let raw = match fs::read_to_string(state_dir.join(RECENT_STORES_FILE)) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(StorageError::Io(err)),
    };

    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(limit)
        .map(PathBuf::from)
        .collect())
}

fn save_recent_stores_in(state_dir: &Path, entries: &[PathBuf]) -> Result<(), StorageError> {
    fs::create_dir_all(state_dir).map_err(StorageError::Io)?;

    let mut file =
        fs::File::create(state_dir.join(RECENT_STORES_FILE)).map_err(StorageError::Io)?;
    for path in entries {
        writeln!(file, "{}", path.display()).map_err(StorageError::Io)?;
    }

    Ok(())
}

fn state_dir() -> PathBuf {
    if let Some(path) = env::var_os("TIMEGRID_STATE_DIR") {
        return PathBuf::from(path);
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(path) = env::var_os("LOCALAPPDATA") {
            return PathBuf::from(path).join("timegrid");
        }
    }

    if let Some(path) = env::var_os("XDG_STATE_HOME") {
        return PathBuf::from(path).join("timegrid");
    }

    if let Some(path) = env::var_os("HOME") {
        return PathBuf::from(path)
            .join(".local")
            .join("state")
            .join("timegrid");
    }

    PathBuf::from(".timegrid")
}

fn absolutize(path: PathBuf) -> PathBuf {
    let path = if path.is_absolute() {
        path
    } else if let Ok(cwd) = env::current_dir() {
        cwd.join(path)
    } else {
        path
    };

    if path.exists() {
        fs::canonicalize(&path).unwrap_or(path)
    } else {
        path
    }
}
