// # UniFi Static-DNS Client
//
// This crate provides the `RecordApi` implementation for UniFi Network
// controllers (UniFi OS consoles, UDM/UDR/UCG gateways).
//
// ## Behaviour
//
// - One HTTP request per trait call
// - Full error propagation; no retry, no backoff (external-dns re-runs
//   the reconciliation)
// - HTTP timeout configured (30 seconds)
// - Status codes mapped to specific errors (401/403, 404, 429, 5xx)
// - Self-signed controller certificates accepted only when configured
//
// ## Security Requirements
//
// - API key NEVER appears in logs or `Debug` output
// - Construction fails fast if the key or host is empty
//
// ## API Reference
//
// All calls are relative to `{host}/proxy/network/v2/api/site/{site}/static-dns`
// and authenticate with the `X-API-KEY` header.
//
// - List records: GET `/`
// - Create record: POST `/` with `{key, record_type, value, ttl?, enabled}`
// - Delete record: DELETE `/{id}`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use unifi_dns_core::config::UnifiConfig;
use unifi_dns_core::{Error, RecordApi, RecordType, RemoteRecord, RemoteRecordInput, Result};

/// Name reported in API errors
const API_NAME: &str = "unifi";

/// Header carrying the controller API key
const API_KEY_HEADER: &str = "X-API-KEY";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Record as the controller serialises it
#[derive(Debug, Deserialize)]
struct WireRecord {
    #[serde(rename = "_id")]
    id: String,
    key: String,
    value: String,
    record_type: RecordType,
    #[serde(default)]
    ttl: Option<u32>,
    #[serde(default)]
    #[allow(dead_code)]
    enabled: Option<bool>,
}

impl From<WireRecord> for RemoteRecord {
    fn from(wire: WireRecord) -> Self {
        Self {
            id: wire.id,
            name: wire.key,
            record_type: wire.record_type,
            value: wire.value,
            // The controller reports 0 for "no TTL set"
            ttl: wire.ttl.filter(|ttl| *ttl > 0),
        }
    }
}

/// Creation body
#[derive(Debug, Serialize)]
struct WireRecordInput<'a> {
    key: &'a str,
    record_type: &'a RecordType,
    value: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl: Option<u32>,
    enabled: bool,
}

impl<'a> From<&'a RemoteRecordInput> for WireRecordInput<'a> {
    fn from(input: &'a RemoteRecordInput) -> Self {
        Self {
            key: &input.name,
            record_type: &input.record_type,
            value: &input.value,
            ttl: input.ttl,
            enabled: input.enabled,
        }
    }
}

/// UniFi Network static-DNS client
///
/// Stateless apart from the pooled HTTP client; safe to share across the
/// engine's workers.
pub struct UnifiClient {
    /// Controller base URL without trailing slash
    host: String,

    /// Controller API key
    /// ⚠️ NEVER log this value
    api_key: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for UnifiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnifiClient")
            .field("host", &self.host)
            .field("api_key", &"<REDACTED>")
            .finish()
    }
}

impl UnifiClient {
    /// Create a new client
    ///
    /// # Parameters
    ///
    /// - `host`: Controller base URL (e.g. `https://192.168.1.1`)
    /// - `api_key`: Controller API key
    /// - `skip_tls_verify`: Accept invalid TLS certificates
    ///
    /// # Errors
    ///
    /// `Error::Config` when the host or API key is empty or the HTTP client
    /// cannot be built.
    pub fn new(host: impl Into<String>, api_key: impl Into<String>, skip_tls_verify: bool) -> Result<Self> {
        let host = host.into().trim_end_matches('/').to_string();
        let api_key = api_key.into();

        if host.is_empty() {
            return Err(Error::config("UniFi host cannot be empty"));
        }
        if api_key.is_empty() {
            return Err(Error::config("UniFi API key cannot be empty"));
        }

        if skip_tls_verify {
            tracing::warn!("TLS certificate verification disabled for UniFi controller");
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .danger_accept_invalid_certs(skip_tls_verify)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            host,
            api_key,
            client,
        })
    }

    /// Create a client from the `unifi` configuration section
    pub fn from_config(config: &UnifiConfig) -> Result<Self> {
        Self::new(&config.host, &config.api_key, config.skip_tls_verify)
    }

    fn records_url(&self, site: &str) -> String {
        format!("{}/proxy/network/v2/api/site/{}/static-dns", self.host, site)
    }

    /// Send a request and turn non-2xx statuses into errors
    async fn send(&self, request: reqwest::RequestBuilder, action: &str) -> Result<reqwest::Response> {
        let response = request
            .header(API_KEY_HEADER, &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::http(format!("{action}: HTTP request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        Err(status_error(status, action, &error_text))
    }
}

/// Map a failed HTTP status to an error
fn status_error(status: reqwest::StatusCode, action: &str, body: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{action}: invalid API key or insufficient permissions. Status: {status}"
        )),
        404 => Error::not_found(format!("{action}: {status} - {body}")),
        429 => Error::rate_limited(format!("{action}: please retry later. Status: {status}")),
        500..=599 => Error::api(
            API_NAME,
            format!("{action}: controller error (transient): {status} - {body}"),
        ),
        _ => Error::api(API_NAME, format!("{action}: {status} - {body}")),
    }
}

#[async_trait]
impl RecordApi for UnifiClient {
    async fn list_records(&self, site: &str) -> Result<Vec<RemoteRecord>> {
        let url = self.records_url(site);
        debug!(site, "listing static DNS records");

        let response = self.send(self.client.get(&url), "list records").await?;

        let records: Vec<WireRecord> = response
            .json()
            .await
            .map_err(|e| Error::api(API_NAME, format!("Failed to parse response: {e}")))?;

        debug!(count = records.len(), "listed static DNS records");
        Ok(records.into_iter().map(RemoteRecord::from).collect())
    }

    async fn create_record(&self, site: &str, record: &RemoteRecordInput) -> Result<RemoteRecord> {
        let url = self.records_url(site);
        let body = WireRecordInput::from(record);

        let response = self
            .send(self.client.post(&url).json(&body), "create record")
            .await?;

        let created: WireRecord = response
            .json()
            .await
            .map_err(|e| Error::api(API_NAME, format!("Failed to parse response: {e}")))?;

        debug!(name = %created.key, id = %created.id, "created static DNS record");
        Ok(created.into())
    }

    async fn delete_record(&self, site: &str, record_id: &str) -> Result<()> {
        let url = format!("{}/{}", self.records_url(site), record_id);

        self.send(self.client.delete(&url), "delete record").await?;

        debug!(id = record_id, "deleted static DNS record");
        Ok(())
    }

    fn api_name(&self) -> &'static str {
        API_NAME
    }
}
