/*!
 * Tests for translation cache persistence and keying
 */

use docufluent::translation::cache::{CacheKey, TranslationCache};

use crate::common::{create_temp_dir, create_test_file};

#[test]
fn test_cacheKey_new_shouldNormalizeWhitespaceAndCase() {
    let a = CacheKey::new("  The Bridge\n is  long. ", "English", "Chinese");
    let b = CacheKey::new("the bridge is long.", "english", "chinese");
    assert_eq!(a, b);
    assert_eq!(a.fingerprint(), b.fingerprint());
}

#[test]
fn test_cacheKey_differentTarget_shouldNotCollide() {
    let zh = CacheKey::new("Hello", "English", "Chinese");
    let ru = CacheKey::new("Hello", "English", "Russian");
    assert_ne!(zh.fingerprint(), ru.fingerprint());
}

#[test]
fn test_cache_saveThenLoad_shouldRestoreEntries() {
    let dir = create_temp_dir().unwrap();
    let path = dir.path().join("nested").join("cache.json");

    let cache = TranslationCache::new(true);
    assert!(cache.store(CacheKey::new("The bridge is 500 meters long.", "en", "zh"), "桥长500米。"));
    cache.save(&path).unwrap();

    let restored = TranslationCache::load(&path, true).unwrap();
    assert_eq!(restored.len(), 1);
    let hit = restored
        .lookup(&CacheKey::new("The bridge is 500 meters long.", "en", "zh"))
        .unwrap();
    assert_eq!(hit.text, "桥长500米。");
}

#[test]
fn test_cache_load_missingFile_shouldBeEmpty() {
    let dir = create_temp_dir().unwrap();
    let cache = TranslationCache::load(&dir.path().join("absent.json"), true).unwrap();
    assert!(cache.is_empty());
}

#[test]
fn test_cache_load_corruptFile_shouldFail() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "cache.json", "{not json").unwrap();
    assert!(TranslationCache::load(&path, true).is_err());
}

#[test]
fn test_cache_store_noOp_shouldBeRejected() {
    let cache = TranslationCache::new(true);
    assert!(!cache.store(CacheKey::new("Hello world", "en", "zh"), "Hello world"));
    assert!(cache.is_empty());
}

#[test]
fn test_cache_disabled_shouldNeverHit() {
    let cache = TranslationCache::new(false);
    cache.store(CacheKey::new("Hello", "en", "zh"), "你好");
    assert!(cache.lookup(&CacheKey::new("Hello", "en", "zh")).is_none());
}

#[test]
fn test_cache_stats_shouldCountHitsAndMisses() {
    let cache = TranslationCache::new(true);
    let key = CacheKey::new("Hello", "en", "zh");
    assert!(cache.lookup(&key).is_none());
    cache.store(key.clone(), "你好");
    assert!(cache.lookup(&key).is_some());

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.entries, 1);
    assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
}
