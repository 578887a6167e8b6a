//! Behavioural Contract Test: Record Listing
//!
//! Constraints verified:
//! - Only names passing the domain filter are returned
//! - Unmanaged record types are skipped silently
//! - Missing remote TTLs come back as the default TTL
//! - Listing failures are annotated and returned, never partial results
//! - What an apply creates is what a subsequent listing returns
//! - The per-type managed-record gauge reflects the last listing
//!
//! If this test fails, external-dns will compute wrong plans.

mod common;

use common::*;
use std::sync::Arc;
use unifi_dns_core::{
    CancellationToken, ChangeSet, DEFAULT_TTL, DomainFilter, RecordType, ReconciliationEngine,
};

#[tokio::test]
async fn filter_and_type_rules_apply() {
    let api = Arc::new(RecordingApi::new());
    api.seed("www.example.com", "A", "10.0.0.1");
    api.seed("mail.example.com", "MX", "10 mx.example.com");
    api.seed("printer.lan", "A", "192.168.1.20");
    api.seed("db.internal.example.com", "A", "10.0.0.9");
    api.seed("1.0.0.10.in-addr.arpa", "PTR", "www.example.com");
    api.seed("legacy.example.com", "SPF", "v=spf1 -all");

    let filter = DomainFilter::new(["example.com"], ["internal.example.com"]);
    let engine = ReconciliationEngine::new(api.clone(), "default", filter);

    let endpoints = engine.records(&CancellationToken::new()).await.unwrap();

    let listed: Vec<_> = endpoints
        .iter()
        .map(|e| (e.name.as_str(), e.record_type.clone()))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("www.example.com", RecordType::A),
            ("mail.example.com", RecordType::Mx),
        ]
    );
    assert!(endpoints.iter().all(|e| e.ttl == Some(DEFAULT_TTL)));
}

#[tokio::test]
async fn listing_failure_is_annotated() {
    let api = Arc::new(RecordingApi::new());
    api.seed("www.example.com", "A", "10.0.0.1");
    api.fail_listing();

    let engine = ReconciliationEngine::new(api.clone(), "default", DomainFilter::default());
    let err = engine.records(&CancellationToken::new()).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "failed to list DNS records: HTTP error: connection refused"
    );
}

#[tokio::test]
async fn created_records_list_back() {
    let api = Arc::new(RecordingApi::new());
    let engine = ReconciliationEngine::new(api.clone(), "default", DomainFilter::default());
    let token = CancellationToken::new();

    let changes = ChangeSet {
        create: vec![
            endpoint("rr.example.com", "A", &["10.0.0.1", "10.0.0.2"]).with_ttl(120),
            endpoint("txt.example.com", "TXT", &["heritage=external-dns"]).with_ttl(120),
        ],
        ..Default::default()
    };
    engine.apply_changes(&token, changes).await.unwrap();

    let mut endpoints = engine.records(&token).await.unwrap();
    endpoints.sort_by(|a, b| (&a.name, &a.targets).cmp(&(&b.name, &b.targets)));

    let summary: Vec<_> = endpoints
        .iter()
        .map(|e| (e.name.as_str(), e.targets[0].as_str(), e.ttl))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("rr.example.com", "10.0.0.1", Some(120)),
            ("rr.example.com", "10.0.0.2", Some(120)),
            // TXT is stored without a TTL and reads back with the default
            ("txt.example.com", "heritage=external-dns", Some(DEFAULT_TTL)),
        ]
    );
}

#[tokio::test]
async fn managed_gauge_counts_per_type() {
    let api = Arc::new(RecordingApi::new());
    api.seed("a.example.com", "A", "10.0.0.1");
    api.seed("b.example.com", "A", "10.0.0.2");
    api.seed("c.example.com", "CNAME", "a.example.com");
    api.seed("x.example.com", "PTR", "a.example.com");
    let metrics = Arc::new(RecordingMetrics::default());

    ReconciliationEngine::new(api.clone(), "default", DomainFilter::default())
        .with_metrics(metrics.clone())
        .records(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(metrics.managed("A"), Some(2));
    assert_eq!(metrics.managed("CNAME"), Some(1));
    assert_eq!(metrics.managed("TXT"), Some(0));
    assert_eq!(metrics.managed("PTR"), None);
}
