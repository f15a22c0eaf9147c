//! Append-only, forward-iterable persistence for interaction records.
//!
//! Backends are registered by name; reading is streaming so memory stays
//! bounded by the largest single record, not by cassette size.

mod blackhole;
mod json;
mod yaml;

pub use blackhole::BlackholeStorage;
pub use json::JsonStorage;
pub use yaml::YamlStorage;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Persistence contract for one cassette's interaction records.
///
/// Iteration is a forward-only, resettable stream: `rewind` restarts it and
/// `next_record` yields one record per call until `None`. Records are plain
/// key-value data (`serde_json::Value`) regardless of the on-disk encoding.
pub trait Storage: Send {
    /// Append one record. Durable on return.
    fn store_recording(&mut self, record: &Value) -> Result<()>;

    /// Restart iteration from the first record.
    fn rewind(&mut self) -> Result<()>;

    /// Yield the next record, or `None` past the end.
    fn next_record(&mut self) -> Result<Option<Value>>;

    /// Whether the backing resource did not exist before this session.
    fn is_new(&self) -> bool;
}

/// On-disk encoding selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Json,
    Yaml,
    Blackhole,
}

impl StorageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageKind::Json => "json",
            StorageKind::Yaml => "yaml",
            StorageKind::Blackhole => "blackhole",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(StorageKind::Json),
            "yaml" => Ok(StorageKind::Yaml),
            "blackhole" => Ok(StorageKind::Blackhole),
            other => Err(Error::UnknownStorage(other.to_string())),
        }
    }
}

type StorageFactory = fn(PathBuf) -> Result<Box<dyn Storage>>;

/// Name-keyed backend registry.
static REGISTRY: Lazy<BTreeMap<&'static str, StorageFactory>> = Lazy::new(|| {
    let mut map: BTreeMap<&'static str, StorageFactory> = BTreeMap::new();
    map.insert("json", |path| Ok(Box::new(JsonStorage::new(path)?)));
    map.insert("yaml", |path| Ok(Box::new(YamlStorage::new(path)?)));
    map.insert("blackhole", |_| Ok(Box::new(BlackholeStorage::new())));
    map
});

/// Open a storage backend by name for the given cassette.
///
/// The cassette name maps verbatim to a file under `dir`.
pub fn create(name: &str, dir: &Path, cassette_name: &str) -> Result<Box<dyn Storage>> {
    let factory = REGISTRY
        .get(name)
        .ok_or_else(|| Error::UnknownStorage(name.to_string()))?;
    factory(dir.join(cassette_name))
}

/// Fatal setup error when the cassette's parent directory is missing.
pub(crate) fn ensure_parent_exists(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() || parent.is_dir() => Ok(()),
        Some(parent) => Err(Error::CassettePathNotFound(parent.display().to_string())),
        None => Err(Error::CassettePathNotFound(path.display().to_string())),
    }
}
