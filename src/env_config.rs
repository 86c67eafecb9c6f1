//! Shared environment configuration for the wordchain binaries.
//!
//! Consolidates the `WORDCHAIN_*` variable reads so every binary resolves
//! the same defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::service::ServiceConfig;

/// Read `WORDCHAIN_DATA_DIR` (default `data/words`): the word-document
/// directory of [`crate::store::FsDocumentStore`].
pub fn data_dir() -> PathBuf {
    PathBuf::from(
        std::env::var("WORDCHAIN_DATA_DIR").unwrap_or_else(|_| "data/words".to_string()),
    )
}

/// Read `WORDCHAIN_MAX_CONCURRENT_BUILDS` (default 4).
pub fn max_concurrent_builds() -> usize {
    std::env::var("WORDCHAIN_MAX_CONCURRENT_BUILDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(4)
}

/// Read `WORDCHAIN_MODEL_TIMEOUT_MS` (default 30000).
pub fn model_timeout() -> Duration {
    let millis = std::env::var("WORDCHAIN_MODEL_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30_000);
    Duration::from_millis(millis)
}

/// Read `WORDCHAIN_CACHE_CAPACITY` (default 256 trees).
pub fn cache_capacity() -> usize {
    std::env::var("WORDCHAIN_CACHE_CAPACITY")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(256)
}

/// Resolve the full service configuration from the environment and print
/// the effective values.
pub fn service_config_from_env() -> ServiceConfig {
    let config = ServiceConfig {
        max_concurrent_builds: max_concurrent_builds(),
        model_timeout: model_timeout(),
        cache_capacity: cache_capacity(),
    };
    println!(
        "WORDCHAIN_MAX_CONCURRENT_BUILDS={}",
        config.max_concurrent_builds
    );
    println!(
        "WORDCHAIN_MODEL_TIMEOUT_MS={}",
        config.model_timeout.as_millis()
    );
    println!("WORDCHAIN_CACHE_CAPACITY={}", config.cache_capacity);
    config
}
