//! Verification cache, keyed by normalized city + state.
//!
//! An explicitly owned object: the service that uses it is handed one at
//! construction. Optionally persisted as JSON; entries expire after a TTL.

use super::Verification;
use crate::normalize::normalize;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const MS_PER_DAY: i64 = 24 * 3600 * 1000;

#[derive(Serialize, Deserialize, Clone)]
struct CacheEntry {
    verification: Verification,
    timestamp: i64,
}

pub struct VerificationCache {
    path: Option<PathBuf>,
    ttl_ms: i64,
    entries: HashMap<String, CacheEntry>,
}

impl VerificationCache {
    /// A cache that lives only as long as this value.
    pub fn in_memory(ttl_days: i64) -> Self {
        Self {
            path: None,
            ttl_ms: ttl_days * MS_PER_DAY,
            entries: HashMap::new(),
        }
    }

    /// Load a persisted cache; a missing or unreadable file starts empty.
    pub fn load_from(path: PathBuf, ttl_days: i64) -> Self {
        let entries = Self::read_file(&path).unwrap_or_default();
        Self {
            path: Some(path),
            ttl_ms: ttl_days * MS_PER_DAY,
            entries,
        }
    }

    fn read_file(path: &Path) -> Option<HashMap<String, CacheEntry>> {
        let data = fs::read_to_string(path).ok()?;
        serde_json::from_str(&data).ok()
    }

    /// `normalize(city)|STATE`
    pub fn key(city: &str, state: &str) -> String {
        format!("{}|{}", normalize(city), state.trim().to_uppercase())
    }

    /// Cached verification, or None if missing or expired.
    pub fn get(&self, city: &str, state: &str) -> Option<Verification> {
        let entry = self.entries.get(&Self::key(city, state))?;
        let now = chrono::Utc::now().timestamp_millis();
        if now - entry.timestamp > self.ttl_ms {
            return None;
        }
        Some(entry.verification.clone())
    }

    pub fn put(&mut self, city: &str, state: &str, verification: &Verification) {
        self.put_at(city, state, verification, chrono::Utc::now().timestamp_millis());
    }

    fn put_at(&mut self, city: &str, state: &str, verification: &Verification, timestamp: i64) {
        let entry = CacheEntry {
            verification: verification.clone(),
            timestamp,
        };
        self.entries.insert(Self::key(city, state), entry);
        self.persist();
    }

    /// Drop every entry, including the persisted copy.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.persist();
    }

    fn persist(&self) {
        let Some(path) = &self.path else { return };
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(&self.entries) {
            if let Err(e) = fs::write(path, json) {
                tracing::warn!(path = %path.display(), error = %e, "cannot persist verification cache");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
