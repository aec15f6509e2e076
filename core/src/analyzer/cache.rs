//! Bounded memo of analysis reports
//!
//! Keyed by a SHA-256 over the serialized script, host symbol snapshot and
//! analyzer configuration. When full, the oldest entry is evicted.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::symbols::HostSymbols;
use crate::config::AnalyzerConfig;
use crate::diagnostics::SemanticReport;
use crate::parser::ast::Script;

pub type CacheKey = [u8; 32];

/// Fingerprint of one analysis input. `None` when something failed to
/// serialize, in which case the caller simply skips the cache.
pub fn fingerprint(
    script: &Script,
    symbols: &HostSymbols,
    config: &AnalyzerConfig,
) -> Option<CacheKey> {
    let mut hasher = Sha256::new();
    feed(&mut hasher, script)?;
    feed(&mut hasher, symbols)?;
    feed(&mut hasher, config)?;
    Some(hasher.finalize().into())
}

fn feed<T: Serialize>(hasher: &mut Sha256, value: &T) -> Option<()> {
    let bytes = serde_json::to_vec(value).ok()?;
    // Length prefix keeps adjacent sections from running together
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(&bytes);
    Some(())
}

#[derive(Default)]
struct Entries {
    reports: HashMap<CacheKey, SemanticReport>,
    order: VecDeque<CacheKey>,
}

pub struct AnalysisCache {
    capacity: usize,
    entries: Mutex<Entries>,
}

impl AnalysisCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(Entries::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, key: &CacheKey) -> Option<SemanticReport> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.reports.get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, report: SemanticReport) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.reports.insert(key, report).is_some() {
            return;
        }
        entries.order.push_back(key);
        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.reports.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reports
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.reports.clear();
        entries.order.clear();
    }
}
