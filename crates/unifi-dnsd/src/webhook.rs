//! external-dns webhook protocol server
//!
//! Translates the webhook JSON schema to and from the core's
//! [`Endpoint`]/[`ChangeSet`] types and forwards every call to a
//! [`DnsProvider`]. No reconciliation logic lives here.

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State, rejection::BytesRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use unifi_dns_core::{ChangeSet, DnsProvider, Endpoint, ProviderSpecificProperty};

/// Content type of every successful webhook response
pub const MEDIA_TYPE: &str = "application/external.dns.webhook+json;version=1";

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 1 << 20;

/// Endpoint as it appears on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEndpoint {
    #[serde(default, deserialize_with = "nullable")]
    pub dns_name: String,

    #[serde(default, deserialize_with = "nullable")]
    pub targets: Vec<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub record_type: String,

    #[serde(
        rename = "recordTTL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub record_ttl: Option<i64>,

    #[serde(default, deserialize_with = "nullable")]
    pub set_identifier: String,

    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub labels: BTreeMap<String, String>,

    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub provider_specific: Vec<ProviderSpecificProperty>,
}

impl From<WireEndpoint> for Endpoint {
    fn from(wire: WireEndpoint) -> Self {
        let mut endpoint = Endpoint::new(wire.dns_name, wire.record_type, wire.targets);
        // Negative or oversized TTLs fall back to the default
        endpoint.ttl = wire.record_ttl.and_then(|ttl| u32::try_from(ttl).ok());
        endpoint.set_identifier = wire.set_identifier;
        endpoint.labels = wire.labels;
        endpoint.provider_specific = wire.provider_specific;
        endpoint
    }
}

impl From<Endpoint> for WireEndpoint {
    fn from(endpoint: Endpoint) -> Self {
        Self {
            dns_name: endpoint.name,
            targets: endpoint.targets,
            record_type: endpoint.record_type.into(),
            record_ttl: endpoint.ttl.map(i64::from),
            set_identifier: endpoint.set_identifier,
            labels: endpoint.labels,
            provider_specific: endpoint.provider_specific,
        }
    }
}

/// Body of `POST /records`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct WireChanges {
    #[serde(default, deserialize_with = "nullable")]
    pub create: Vec<WireEndpoint>,

    #[serde(default, deserialize_with = "nullable")]
    pub update_old: Vec<WireEndpoint>,

    #[serde(default, deserialize_with = "nullable")]
    pub update_new: Vec<WireEndpoint>,

    #[serde(default, deserialize_with = "nullable")]
    pub delete: Vec<WireEndpoint>,
}

impl From<WireChanges> for ChangeSet {
    fn from(wire: WireChanges) -> Self {
        fn convert(endpoints: Vec<WireEndpoint>) -> Vec<Endpoint> {
            endpoints.into_iter().map(Endpoint::from).collect()
        }

        Self {
            create: convert(wire.create),
            update_old: convert(wire.update_old),
            update_new: convert(wire.update_new),
            delete: convert(wire.delete),
        }
    }
}

/// Negotiation response
#[derive(Debug, Serialize)]
struct Filters<'a> {
    filters: &'a [String],
}

/// Treat an explicit JSON `null` like a missing field
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Clone)]
struct WebhookState {
    provider: Arc<dyn DnsProvider>,
    cancel: CancellationToken,
}

/// Build the webhook router
///
/// `cancel` is the process-wide shutdown signal; every request works under a
/// child of it.
pub fn router(provider: Arc<dyn DnsProvider>, cancel: CancellationToken) -> Router {
    let routes = Router::new()
        .route("/", get(negotiate))
        .route("/records", get(get_records).post(set_records))
        .route("/adjustendpoints", post(adjust_endpoints))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    crate::http_layers(routes).with_state(WebhookState { provider, cancel })
}

async fn negotiate(State(state): State<WebhookState>) -> Response {
    info!("negotiate called");
    webhook_json(
        StatusCode::OK,
        &Filters {
            filters: state.provider.domain_filter().filters(),
        },
    )
}

async fn get_records(State(state): State<WebhookState>) -> Response {
    info!("get records called");

    let cancel = state.cancel.child_token();
    match state.provider.records(&cancel).await {
        Ok(endpoints) => {
            let wire: Vec<WireEndpoint> = endpoints.into_iter().map(WireEndpoint::from).collect();
            webhook_json(StatusCode::OK, &wire)
        }
        Err(e) => {
            error!(error = %e, "failed to get records");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

async fn set_records(
    State(state): State<WebhookState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    info!("set records called");

    let body = match body {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            warn!(limit_bytes = MAX_BODY_BYTES, "request body too large");
            return error_json(StatusCode::PAYLOAD_TOO_LARGE, "request body too large");
        }
        Err(rejection) => {
            error!(error = %rejection, "failed to read request body");
            return error_json(StatusCode::BAD_REQUEST, "invalid request body");
        }
    };

    let changes: WireChanges = match serde_json::from_slice(&body) {
        Ok(changes) => changes,
        Err(e) => {
            error!(error = %e, "failed to decode changes");
            return error_json(StatusCode::BAD_REQUEST, "invalid request body");
        }
    };

    debug!(
        create_count = changes.create.len(),
        update_count = changes.update_new.len(),
        delete_count = changes.delete.len(),
        "decoded changes"
    );

    let cancel = state.cancel.child_token();
    match state.provider.apply_changes(&cancel, changes.into()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!(error = %e, "failed to apply changes");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

async fn adjust_endpoints(
    State(state): State<WebhookState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    info!("adjust endpoints called");

    let endpoints: Vec<WireEndpoint> = match body
        .map_err(|e| e.to_string())
        .and_then(|body| serde_json::from_slice(&body).map_err(|e| e.to_string()))
    {
        Ok(endpoints) => endpoints,
        Err(e) => {
            error!(error = %e, "failed to decode endpoints");
            return error_json(StatusCode::BAD_REQUEST, "invalid request body");
        }
    };

    let endpoints = endpoints.into_iter().map(Endpoint::from).collect();
    match state.provider.adjust_endpoints(endpoints) {
        Ok(adjusted) => {
            let wire: Vec<WireEndpoint> = adjusted.into_iter().map(WireEndpoint::from).collect();
            webhook_json(StatusCode::OK, &wire)
        }
        Err(e) => {
            error!(error = %e, "failed to adjust endpoints");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

fn webhook_json<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => (status, [(header::CONTENT_TYPE, MEDIA_TYPE)], bytes).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode response");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "failed to encode response")
        }
    }
}

fn error_json(status: StatusCode, message: &str) -> Response {
    (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
}
