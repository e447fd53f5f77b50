//! Content-addressed response cache owned by the gateway.
//!
//! Entries live as JSON files in a directory keyed by a blake3 hex digest of
//! the canonicalized prompt, fronted by a bounded in-memory LRU. Concurrent
//! writers to the same key race benignly (last-write-wins): a given key
//! always maps to content-identical entries.

use lru::LruCache;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::prompts::Technique;
use crate::sanitize::StructuredResponse;

pub struct ResponseCache {
    dir: PathBuf,
    memory: Mutex<LruCache<String, StructuredResponse>>,
}

/// Deterministic cache key: blake3 over the sorted-key JSON of the prompt
/// identity. BTreeMap guarantees key order regardless of insertion.
pub fn cache_key(question: &str, technique: Technique, model: &str) -> String {
    let mut canonical = BTreeMap::new();
    canonical.insert("model", model);
    canonical.insert("question", question);
    canonical.insert("technique", technique.as_str());
    // Serialization of a string map cannot fail
    let json = serde_json::to_string(&canonical).unwrap_or_default();
    blake3::hash(json.as_bytes()).to_hex().to_string()
}

impl ResponseCache {
    pub fn new(dir: PathBuf, capacity: usize) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            dir,
            memory: Mutex::new(LruCache::new(capacity)),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Look up a key, memory first, then disk. Disk hits are promoted back
    /// into the in-memory LRU.
    pub fn get(&self, key: &str) -> Option<StructuredResponse> {
        if let Ok(mut memory) = self.memory.lock()
            && let Some(hit) = memory.get(key)
        {
            debug!("cache hit (memory) for {key}");
            return Some(hit.clone());
        }

        let path = self.path_for(key);
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<StructuredResponse>(&content) {
            Ok(response) => {
                debug!("cache hit (disk) for {key}");
                if let Ok(mut memory) = self.memory.lock() {
                    memory.put(key.to_string(), response.clone());
                }
                Some(response)
            }
            Err(e) => {
                warn!("discarding unreadable cache entry {}: {}", path.display(), e);
                let _ = std::fs::remove_file(&path);
                None
            }
        }
    }

    pub fn put(&self, key: &str, response: &StructuredResponse) -> Result<()> {
        let json = serde_json::to_string_pretty(response)?;
        std::fs::write(self.path_for(key), json)?;
        if let Ok(mut memory) = self.memory.lock() {
            memory.put(key.to_string(), response.clone());
        }
        Ok(())
    }

    pub fn evict(&self, key: &str) {
        if let Ok(mut memory) = self.memory.lock() {
            memory.pop(key);
        }
        let _ = std::fs::remove_file(self.path_for(key));
    }

    /// Drop every entry, on disk and in memory.
    pub fn clear(&self) -> Result<()> {
        if let Ok(mut memory) = self.memory.lock() {
            memory.clear();
        }
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.path().extension().is_some_and(|e| e == "json") {
                let _ = std::fs::remove_file(entry.path());
            }
        }
        Ok(())
    }
}
