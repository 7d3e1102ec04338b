/*!
 * Translation caching functionality.
 *
 * This module provides a content-addressed cache of accepted translations so
 * that identical segments (after whitespace and case normalization) are only
 * sent to the translation role once per language pair. The cache can be
 * persisted as JSON between runs.
 */

use anyhow::{Context, Result};
use log::{debug, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::translation::pipeline::state::Candidate;

/// Cache key combining normalized source text and the language pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Normalized source text
    pub text: String,

    /// Normalized source language
    pub source_language: String,

    /// Normalized target language
    pub target_language: String,
}

impl CacheKey {
    /// Create a new cache key, normalizing whitespace and casing
    pub fn new(source_text: &str, source_language: &str, target_language: &str) -> Self {
        Self {
            text: normalize(source_text),
            source_language: normalize(source_language),
            target_language: normalize(target_language),
        }
    }

    /// Stable hex digest of the key, used to index the persisted file
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source_language.as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.target_language.as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.text.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

/// Collapse whitespace runs, trim and lowercase
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Persisted form of one cache entry
#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry {
    key: CacheKey,
    translation: String,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups that returned an entry
    pub hits: usize,
    /// Lookups that found nothing usable
    pub misses: usize,
    /// Number of stored entries
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups that hit
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

/// Translation cache for storing and retrieving accepted translations.
///
/// Clones share the same storage and counters.
#[derive(Debug, Clone)]
pub struct TranslationCache {
    /// Internal cache storage
    cache: Arc<RwLock<HashMap<CacheKey, String>>>,

    /// Cache hit counter
    hits: Arc<AtomicUsize>,

    /// Cache miss counter
    misses: Arc<AtomicUsize>,

    /// Whether caching is enabled
    enabled: bool,
}

impl TranslationCache {
    /// Create a new translation cache
    pub fn new(enabled: bool) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            hits: Arc::new(AtomicUsize::new(0)),
            misses: Arc::new(AtomicUsize::new(0)),
            enabled,
        }
    }

    /// Look up an accepted translation.
    ///
    /// Entries that merely repeat their own source text are treated as misses.
    pub fn lookup(&self, key: &CacheKey) -> Option<Candidate> {
        if !self.enabled {
            return None;
        }

        let found = {
            let cache = self.cache.read();
            cache
                .get(key)
                .filter(|translation| normalize(translation) != key.text)
                .cloned()
        };

        match found {
            Some(translation) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Cache hit for '{}' ({} -> {})",
                    truncate_text(&key.text, 30),
                    key.source_language,
                    key.target_language
                );
                Some(Candidate::cached(translation))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Cache miss for '{}' ({} -> {})",
                    truncate_text(&key.text, 30),
                    key.source_language,
                    key.target_language
                );
                None
            }
        }
    }

    /// Store an accepted translation, returning whether it was written
    pub fn store(&self, key: CacheKey, translation: &str) -> bool {
        if !self.enabled {
            return false;
        }
        if translation.trim().is_empty() || normalize(translation) == key.text {
            debug!("Not caching no-op translation for '{}'", truncate_text(&key.text, 30));
            return false;
        }

        debug!(
            "Cached translation for '{}' ({} -> {})",
            truncate_text(&key.text, 30),
            key.source_language,
            key.target_language
        );
        self.cache.write().insert(key, translation.to_string());
        true
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    /// Get the number of entries in the cache
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    /// Check if the cache is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Load a persisted cache; a missing file yields an empty cache
    pub fn load(path: &Path, enabled: bool) -> Result<Self> {
        let cache = Self::new(enabled);
        if !path.exists() {
            debug!("No cache file at {}, starting empty", path.display());
            return Ok(cache);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cache file: {}", path.display()))?;
        let persisted: HashMap<String, PersistedEntry> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse cache file: {}", path.display()))?;

        {
            let mut entries = cache.cache.write();
            for (fingerprint, entry) in persisted {
                if fingerprint != entry.key.fingerprint() {
                    warn!("Skipping cache entry with mismatched fingerprint {}", fingerprint);
                    continue;
                }
                entries.insert(entry.key, entry.translation);
            }
        }

        debug!("Loaded {} cached translations from {}", cache.len(), path.display());
        Ok(cache)
    }

    /// Persist the cache as JSON, replacing the file atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let persisted: HashMap<String, PersistedEntry> = self
            .cache
            .read()
            .iter()
            .map(|(key, translation)| {
                (
                    key.fingerprint(),
                    PersistedEntry {
                        key: key.clone(),
                        translation: translation.clone(),
                    },
                )
            })
            .collect();

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create cache directory: {}", dir.display()))?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        let json = serde_json::to_string_pretty(&persisted).context("Failed to serialize cache")?;
        temp.write_all(json.as_bytes())
            .context("Failed to write cache contents")?;
        temp.persist(path)
            .with_context(|| format!("Failed to write cache file: {}", path.display()))?;

        debug!("Saved {} cached translations to {}", persisted.len(), path.display());
        Ok(())
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Truncate text to a maximum number of characters with ellipsis
fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::pipeline::state::CandidateSource;

    #[test]
    fn test_cacheKey_new_shouldNormalizeWhitespaceAndCase() {
        let a = CacheKey::new("The  bridge\n spans 500 meters. ", "English", "Chinese");
        let b = CacheKey::new("the bridge spans 500 METERS.", "english", " chinese");
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_cacheKey_differentLanguagePair_shouldDiffer() {
        let a = CacheKey::new("Bridge", "English", "Chinese");
        let b = CacheKey::new("Bridge", "English", "Russian");
        assert_ne!(a, b);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_cache_lookup_afterStore_shouldReturnCachedCandidate() {
        let cache = TranslationCache::new(true);
        let key = CacheKey::new("The bridge spans 500 meters.", "auto", "Chinese");

        assert!(cache.lookup(&key).is_none());
        assert!(cache.store(key.clone(), "桥长500米。"));

        let candidate = cache.lookup(&key).unwrap();
        assert_eq!(candidate.text, "桥长500米。");
        assert_eq!(candidate.source, CandidateSource::Cache);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cache_store_noOpTranslation_shouldBeRejected() {
        let cache = TranslationCache::new(true);
        let key = CacheKey::new("Hello world", "English", "Chinese");
        assert!(!cache.store(key.clone(), "  hello   WORLD "));
        assert!(cache.is_empty());
        assert!(cache.lookup(&key).is_none());
    }

    #[test]
    fn test_cache_disabled_shouldNeverStoreOrHit() {
        let cache = TranslationCache::new(false);
        let key = CacheKey::new("Hello", "English", "Chinese");
        assert!(!cache.store(key.clone(), "你好"));
        assert!(cache.lookup(&key).is_none());
        assert_eq!(cache.stats().misses, 0);
    }

    #[test]
    fn test_cache_clone_shouldShareEntries() {
        let cache = TranslationCache::new(true);
        let shared = cache.clone();
        shared.store(CacheKey::new("Hello", "en", "zh"), "你好");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_saveAndLoad_shouldPersistEntries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("translation_cache.json");

        let cache = TranslationCache::new(true);
        cache.store(CacheKey::new("Hello", "English", "Chinese"), "你好");
        cache.store(CacheKey::new("Bridge", "English", "Russian"), "Мост");
        cache.save(&path).unwrap();

        let loaded = TranslationCache::load(&path, true).unwrap();
        assert_eq!(loaded.len(), 2);
        let hit = loaded.lookup(&CacheKey::new("hello", "english", "chinese")).unwrap();
        assert_eq!(hit.text, "你好");
    }

    #[test]
    fn test_cache_load_missingFile_shouldBeEmpty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TranslationCache::load(&dir.path().join("absent.json"), true).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_truncateText_multibyte_shouldNotPanic() {
        assert_eq!(truncate_text("大桥全长五百米", 2), "大桥...");
        assert_eq!(truncate_text("short", 30), "short");
    }
}
