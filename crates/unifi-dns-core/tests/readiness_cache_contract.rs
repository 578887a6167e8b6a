//! Behavioural Contract Test: Readiness Cache
//!
//! Constraints verified:
//! - A fresh result is served without probing
//! - A stale result triggers exactly one probe
//! - Concurrent callers during a stale window share a single probe
//! - Concurrent callers after the TTL expires share a single fresh listing
//! - Every caller that finds the cache stale counts as a miss
//! - Failed probes are cached for the TTL like successful ones
//! - Readiness through the real engine tracks the record listing
//!
//! If this test fails, readiness polling can stampede the controller.

mod common;

use common::*;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use unifi_dns_core::{
    CancellationToken, DomainFilter, ReadinessCache, ReconciliationEngine, DEFAULT_READINESS_TTL,
};

#[tokio::test(start_paused = true)]
async fn fresh_result_is_reused() {
    let provider = Arc::new(CountingProvider::new(Duration::ZERO));
    let metrics = Arc::new(RecordingMetrics::default());
    let cache = ReadinessCache::new(provider.clone(), DEFAULT_READINESS_TTL).with_metrics(metrics.clone());
    let token = CancellationToken::new();

    assert!(cache.check(&token).await);
    tokio::time::advance(Duration::from_secs(29)).await;
    assert!(cache.check(&token).await);

    assert_eq!(provider.probes(), 1);
    assert_eq!(metrics.cache_misses.load(Ordering::SeqCst), 1);
    assert_eq!(metrics.cache_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn stale_result_probes_again() {
    let provider = Arc::new(CountingProvider::new(Duration::ZERO));
    let cache = ReadinessCache::new(provider.clone(), Duration::from_secs(30));
    let token = CancellationToken::new();

    assert!(cache.check(&token).await);
    tokio::time::advance(Duration::from_secs(31)).await;
    provider.set_failing(true);
    assert!(!cache.check(&token).await);

    assert_eq!(provider.probes(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_checks_share_one_probe() {
    let provider = Arc::new(CountingProvider::new(Duration::from_millis(200)));
    let cache = Arc::new(ReadinessCache::new(provider.clone(), Duration::from_secs(30)));
    let token = CancellationToken::new();

    let mut checks = tokio::task::JoinSet::new();
    for _ in 0..25 {
        let cache = Arc::clone(&cache);
        let token = token.clone();
        checks.spawn(async move { cache.check(&token).await });
    }

    let mut results = Vec::new();
    while let Some(result) = checks.join_next().await {
        results.push(result.unwrap());
    }

    assert_eq!(results.len(), 25);
    assert!(results.iter().all(|ready| *ready));
    assert_eq!(provider.probes(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_checks_after_expiry_share_one_listing() {
    let provider = Arc::new(CountingProvider::new(Duration::from_millis(200)));
    let metrics = Arc::new(RecordingMetrics::default());
    let cache = Arc::new(
        ReadinessCache::new(provider.clone(), Duration::from_secs(30)).with_metrics(metrics.clone()),
    );
    let token = CancellationToken::new();

    assert!(cache.check(&token).await);
    assert_eq!(provider.probes(), 1);

    tokio::time::advance(Duration::from_secs(31)).await;

    let mut checks = tokio::task::JoinSet::new();
    for _ in 0..25 {
        let cache = Arc::clone(&cache);
        let token = token.clone();
        checks.spawn(async move { cache.check(&token).await });
    }

    while let Some(result) = checks.join_next().await {
        assert!(result.unwrap());
    }

    assert_eq!(provider.probes(), 2);
    // One cold miss, then one per stale caller
    assert_eq!(metrics.cache_misses.load(Ordering::SeqCst), 26);
    assert_eq!(metrics.cache_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_probe_is_cached() {
    let provider = Arc::new(CountingProvider::new(Duration::ZERO));
    provider.set_failing(true);
    let cache = ReadinessCache::new(provider.clone(), Duration::from_secs(30));
    let token = CancellationToken::new();

    assert!(!cache.check(&token).await);
    provider.set_failing(false);
    assert!(!cache.check(&token).await);
    assert_eq!(provider.probes(), 1);

    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(cache.check(&token).await);
    assert_eq!(provider.probes(), 2);
}

#[tokio::test]
async fn engine_readiness_follows_listing() {
    let api = Arc::new(RecordingApi::new());
    let engine = Arc::new(ReconciliationEngine::new(
        api.clone(),
        "default",
        DomainFilter::default(),
    ));
    let token = CancellationToken::new();

    let healthy = ReadinessCache::new(engine.clone(), Duration::ZERO);
    assert!(healthy.check(&token).await);

    api.fail_listing();
    assert!(!healthy.check(&token).await);
    assert_eq!(api.list_count(), 2);
}
