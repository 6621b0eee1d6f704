//! Rows rendered by a view on a remote catalog
//!
//! `mica+https://host[:port]/<view name>?<options>` asks the remote catalog
//! to render the named view and yields each row of the result. Options:
//!
//! - `parameters.<name>=<value>`: render parameter forwarded to the remote
//!   (values that parse as JSON are sent as JSON, others as strings)
//! - `secretRef=<name>`: send the configured secret as a bearer token
//! - `insecure=true`: accept invalid TLS certificates
//!
//! The remote answers with one rendered document. Its body is read whole,
//! up to [`DEFAULT_MAX_RESPONSE_BYTES`] unless configured otherwise, and the
//! rows are then yielded one at a time.

use crate::error::{FetchError, Result};
use crate::fetcher::{Cursor, EntityFetcher, FetchedEntity};
use crate::request::FetchRequest;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use mica_entity::{EntityData, PartialEntity};
use reqwest::{Client, StatusCode};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const REMOTE_HTTP_SCHEME: &str = "mica+http";
pub const REMOTE_HTTPS_SCHEME: &str = "mica+https";

/// Path of the render endpoint on a remote catalog
pub const RENDER_PATH: &str = "/api/v1/render";

/// Kind given to rows when the request names none
pub const REMOTE_ROW_KIND: &str = "/mica/remote-row/v1";

pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest remote render body accepted, in bytes
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;

const PARAMETER_PREFIX: &str = "parameters.";

#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    client: Client,
    insecure_client: Client,
    secrets: HashMap<String, String>,
    max_response_bytes: usize,
}

impl RemoteFetcher {
    pub fn new(timeout: Duration, secrets: HashMap<String, String>) -> Result<Self> {
        let build = |insecure: bool| {
            Client::builder()
                .timeout(timeout)
                .user_agent(concat!("mica/", env!("CARGO_PKG_VERSION")))
                .danger_accept_invalid_certs(insecure)
                .build()
                .map_err(|e| FetchError::unavailable("remote catalog", e.to_string()))
        };
        Ok(Self {
            client: build(false)?,
            insecure_client: build(true)?,
            secrets,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        })
    }

    pub fn with_max_response_bytes(mut self, max: usize) -> Self {
        self.max_response_bytes = max;
        self
    }

    /// The HTTP endpoint and render request body for a `mica+http(s)` URI
    fn plan(&self, request: &FetchRequest) -> Result<(Url, Value, Option<String>, bool)> {
        let uri = request
            .uri
            .as_ref()
            .ok_or_else(|| FetchError::bad_request("remote fetch needs a mica+http(s) URI"))?;
        let scheme = match uri.scheme() {
            REMOTE_HTTP_SCHEME => "http",
            REMOTE_HTTPS_SCHEME => "https",
            other => {
                return Err(FetchError::UnsupportedScheme {
                    scheme: other.to_string(),
                })
            }
        };
        let host = uri
            .host_str()
            .ok_or_else(|| FetchError::bad_request(format!("'{}' names no host", uri)))?;
        let view_name = uri.path();
        if view_name.len() <= 1 {
            return Err(FetchError::bad_request(format!("'{}' names no view", uri)));
        }

        let mut endpoint = Url::parse(&format!("{}://{}{}", scheme, host, RENDER_PATH))
            .map_err(|e| FetchError::bad_request(e.to_string()))?;
        endpoint
            .set_port(uri.port())
            .map_err(|_| FetchError::bad_request(format!("'{}' has an invalid port", uri)))?;

        let mut parameters: Map<String, Value> = request.parameters.clone();
        let mut secret = None;
        let mut insecure = false;
        for (key, value) in uri.query_pairs() {
            if let Some(name) = key.strip_prefix(PARAMETER_PREFIX) {
                let value = serde_json::from_str(&value).unwrap_or(Value::String(value.into_owned()));
                parameters.insert(name.to_string(), value);
            } else if key == "secretRef" {
                let token = self.secrets.get(&*value).ok_or_else(|| {
                    FetchError::bad_request(format!("unknown secretRef '{}'", value))
                })?;
                secret = Some(token.clone());
            } else if key == "insecure" {
                insecure = value == "true";
            }
        }

        let body = json!({
            "viewName": view_name,
            "parameters": parameters,
            "strict": request.strict,
        });
        Ok((endpoint, body, secret, insecure))
    }
}

#[async_trait]
impl EntityFetcher for RemoteFetcher {
    fn name(&self) -> &str {
        "remote"
    }

    fn schemes(&self) -> &[&'static str] {
        &[REMOTE_HTTP_SCHEME, REMOTE_HTTPS_SCHEME]
    }

    fn is_supported(&self, request: &FetchRequest) -> bool {
        matches!(
            request.scheme(),
            Some(REMOTE_HTTP_SCHEME) | Some(REMOTE_HTTPS_SCHEME)
        )
    }

    async fn fetch(&self, request: FetchRequest) -> Result<Cursor> {
        let (endpoint, body, secret, insecure) = self.plan(&request)?;
        let view_name = body["viewName"].as_str().unwrap_or_default().to_string();
        let client = if insecure {
            &self.insecure_client
        } else {
            &self.client
        };

        debug!(endpoint = %endpoint, view = %view_name, insecure, "requesting remote render");
        let mut call = client.post(endpoint.clone()).json(&body);
        if let Some(token) = secret {
            call = call.bearer_auth(token);
        }
        let response = call
            .send()
            .await
            .map_err(|e| FetchError::unavailable("remote catalog", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &endpoint, &detail));
        }
        let body = read_capped(response, self.max_response_bytes).await?;
        let mut rendered: Value = serde_json::from_slice(&body)
            .map_err(|e| FetchError::unavailable("remote catalog", format!("bad response: {}", e)))?;

        let rows = match rendered.get_mut("document").map(Value::take) {
            Some(Value::Array(rows)) => rows,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other],
        };
        info!(view = %view_name, rows = rows.len(), "remote render complete");

        let kind = request
            .kind
            .clone()
            .unwrap_or_else(|| REMOTE_ROW_KIND.to_string());
        let source = request.uri.clone();
        let base = view_name.trim_end_matches('/').to_string();
        let items = rows.into_iter().enumerate().map(move |(i, row)| {
            let entity =
                PartialEntity::new(format!("{}/{}", base, i), kind.clone()).with_data(row_data(row));
            let fetched = FetchedEntity::new(entity);
            Ok::<_, FetchError>(match &source {
                Some(uri) => fetched.with_source(uri.clone()),
                None => fetched,
            })
        });
        Ok(stream::iter(items).boxed())
    }
}

/// Collect the response body, failing as soon as it grows past `max` bytes
async fn read_capped(response: reqwest::Response, max: usize) -> Result<Vec<u8>> {
    let too_large = || {
        FetchError::unavailable(
            "remote catalog",
            format!("response exceeds {} bytes", max),
        )
    };
    if response
        .content_length()
        .is_some_and(|length| length > max as u64)
    {
        return Err(too_large());
    }

    let mut body = Vec::new();
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        let chunk =
            chunk.map_err(|e| FetchError::unavailable("remote catalog", e.to_string()))?;
        if body.len() + chunk.len() > max {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn row_data(row: Value) -> EntityData {
    match row {
        Value::Object(map) => map,
        other => {
            let mut data = EntityData::new();
            data.insert("value".to_string(), other);
            data
        }
    }
}

fn classify_status(status: StatusCode, endpoint: &Url, detail: &str) -> FetchError {
    let message = format!("{} returned {}: {}", endpoint, status, detail.trim());
    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        FetchError::bad_request(message)
    } else {
        FetchError::unavailable("remote catalog", message)
    }
}
