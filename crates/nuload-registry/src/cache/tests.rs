//! Unit tests for the registration cache

use super::*;
use crate::api::RegistrationPage;

fn create_test_index() -> RegistrationIndex {
    RegistrationIndex {
        count: 1,
        items: vec![RegistrationPage {
            id: "https://example.test/reg/serilog/index.json#page/1.0.0/2.0.0".to_string(),
            items: Some(Vec::new()),
            lower: Some("1.0.0".to_string()),
            upper: Some("2.0.0".to_string()),
        }],
    }
}

#[test]
fn test_cache_entry_creation() {
    let entry = CacheEntry::new(create_test_index());

    assert_eq!(entry.index.count, 1);
    assert_eq!(entry.ttl, DEFAULT_TTL);
    assert!(entry.is_fresh());
}

#[test]
fn test_cache_entry_age() {
    let entry = CacheEntry::with_ttl(create_test_index(), Duration::from_secs(300));

    let age = entry.age().unwrap();
    assert!(age < Duration::from_secs(5));
}

#[test]
fn test_insert_and_get_is_case_insensitive() {
    let cache = MetadataCache::new();
    cache.insert("Serilog", create_test_index());

    let retrieved = cache.get("serilog").unwrap();
    assert_eq!(retrieved.items.len(), 1);
    assert!(cache.contains_fresh("SERILOG"));
    assert!(cache.get("Newtonsoft.Json").is_none());
}

#[test]
fn test_stale_entry_is_dropped_on_get() {
    let cache = MetadataCache::new();
    cache.insert_with_ttl("Serilog", create_test_index(), Duration::from_nanos(1));
    std::thread::sleep(Duration::from_millis(2));

    assert!(cache.get("Serilog").is_none());
    assert_eq!(cache.stats().total_entries, 0);
}

#[test]
fn test_cache_stats_and_cleanup() {
    let cache = MetadataCache::new();
    assert_eq!(
        cache.stats(),
        CacheStats {
            total_entries: 0,
            fresh_entries: 0,
            stale_entries: 0,
        }
    );

    cache.insert("Fresh", create_test_index());
    cache.insert_with_ttl("Stale", create_test_index(), Duration::from_nanos(1));
    std::thread::sleep(Duration::from_millis(2));

    let stats = cache.stats();
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.fresh_entries, 1);
    assert_eq!(stats.stale_entries, 1);

    assert_eq!(cache.cleanup(), 1);
    assert!(cache.contains_fresh("Fresh"));

    cache.clear();
    assert_eq!(cache.stats().total_entries, 0);
}
