// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The Carpocratian Church of Commonality and Equality, Inc.

//! Key/value backends for the token store.

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info};

/// String key/value storage.
///
/// `write_batch` must apply all of its entries or none of them; the token
/// store relies on that to keep a token array and its count in step.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn write_batch(&self, entries: &[(String, String)]) -> Result<()>;

    /// Removes `keys`; absent keys are ignored.
    fn remove(&self, keys: &[String]) -> Result<()>;
}

//
// ─── IN-MEMORY BACKEND ───────────────────────────────────────────────
//
#[derive(Default)]
pub struct MemoryStorage {
    map: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.map.read().map_err(|_| anyhow!("memory storage lock poisoned"))?;
        Ok(map.get(key).cloned())
    }

    fn write_batch(&self, entries: &[(String, String)]) -> Result<()> {
        let mut map = self.map.write().map_err(|_| anyhow!("memory storage lock poisoned"))?;
        for (k, v) in entries {
            map.insert(k.clone(), v.clone());
        }
        Ok(())
    }

    fn remove(&self, keys: &[String]) -> Result<()> {
        let mut map = self.map.write().map_err(|_| anyhow!("memory storage lock poisoned"))?;
        for k in keys {
            map.remove(k);
        }
        Ok(())
    }
}

//
// ─── FILE BACKEND ────────────────────────────────────────────────────
//
/// Whole map kept in memory and persisted as one JSON object. Every write
/// replaces the file through a temp file and a rename, so a crash leaves
/// either the old or the new contents.
pub struct FileStorage {
    path: PathBuf,
    map: RwLock<HashMap<String, String>>,
}

impl FileStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create storage dir {}", parent.display()))?;
            }
        }

        let map = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("read storage file {}", path.display()))?;
            let map: HashMap<String, String> = serde_json::from_str(&raw)
                .with_context(|| format!("parse storage file {}", path.display()))?;
            info!(path = %path.display(), keys = map.len(), "loaded token storage");
            map
        } else {
            debug!(path = %path.display(), "storage file absent, starting empty");
            HashMap::new()
        };

        Ok(Self {
            path,
            map: RwLock::new(map),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `next` and only then make it visible.
    fn commit(&self, map: &mut HashMap<String, String>, next: HashMap<String, String>) -> Result<()> {
        let data = serde_json::to_vec_pretty(&next).context("serialize storage")?;
        atomic_write_secure(&self.path, &data)
            .with_context(|| format!("write storage file {}", self.path.display()))?;
        *map = next;
        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.map.read().map_err(|_| anyhow!("file storage lock poisoned"))?;
        Ok(map.get(key).cloned())
    }

    fn write_batch(&self, entries: &[(String, String)]) -> Result<()> {
        let mut map = self.map.write().map_err(|_| anyhow!("file storage lock poisoned"))?;
        let mut next = map.clone();
        for (k, v) in entries {
            next.insert(k.clone(), v.clone());
        }
        self.commit(&mut map, next)
    }

    fn remove(&self, keys: &[String]) -> Result<()> {
        let mut map = self.map.write().map_err(|_| anyhow!("file storage lock poisoned"))?;
        if !keys.iter().any(|k| map.contains_key(k)) {
            return Ok(());
        }
        let mut next = map.clone();
        for k in keys {
            next.remove(k);
        }
        self.commit(&mut map, next)
    }
}

/// Owner-only temp file, fsync, rename over `path`.
fn atomic_write_secure(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        let mut f = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&tmp)?;
        f.write_all(data)?;
        f.sync_all()?;
    }

    #[cfg(not(unix))]
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(data)?;
        f.sync_all()?;
    }

    fs::rename(&tmp, path)?;
    Ok(())
}
