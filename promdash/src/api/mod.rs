//! Clients for the Prometheus and Grafana HTTP APIs
use std::time::Duration;

use bytes::Bytes;
use futures::{
    future::BoxFuture,
    stream::{BoxStream, TryStreamExt},
};
use http::{
    header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE},
    Method, Request, Response,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::promdash_types::model::alert::AlertGroup;

pub use self::error::{ApiError, IoError};
pub use self::grafana::{BasicAuth, GrafanaClient};
pub use self::prometheus::{MetricsPayload, PrometheusClient};

pub mod dispatch_http_request;
mod error;
mod grafana;
mod prometheus;

pub type ApiFuture<'a, T> = BoxFuture<'a, Result<T, ApiError>>;
pub type BytesStream = BoxStream<'static, Result<Bytes, IoError>>;

/// Reads alerting rules
pub trait RulesApi {
    /// Returns all rule groups with their alerting rules.
    ///
    /// Recording rules are not returned.
    ///
    /// See also [Prometheus HTTP API](https://prometheus.io/docs/prometheus/latest/querying/api/#rules)
    fn rules(&self) -> ApiFuture<Vec<AlertGroup>>;
}

/// Reads a metrics exposition endpoint
pub trait MetricsApi {
    /// Fetches the payload of `endpoint`.
    ///
    /// Fails if no complete response arrived within `timeout`.
    fn fetch_metrics(&self, endpoint: &Url, timeout: Duration) -> ApiFuture<MetricsPayload>;
}

/// Publishes dashboards
pub trait DashboardsApi {
    /// Creates or overwrites a dashboard.
    ///
    /// The dashboard is put into the folder with the title `folder` which
    /// must exist. Without a folder the dashboard goes into the general
    /// folder.
    ///
    /// See also [Grafana HTTP API](https://grafana.com/docs/grafana/latest/http_api/dashboard/)
    fn create_dashboard(&self, dashboard: &Value, folder: Option<&str>) -> ApiFuture<()>;
}

fn create_request<B: Into<Bytes>>(
    url: &Url,
    method: Method,
    body_bytes: B,
) -> Result<Request<Bytes>, ApiError> {
    let body_bytes = body_bytes.into();
    let content_length = body_bytes.len();
    let mut request = Request::new(body_bytes);
    *request.method_mut() = method;

    if content_length > 0 {
        request
            .headers_mut()
            .append(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    request
        .headers_mut()
        .append(CONTENT_LENGTH, content_length.into());

    *request.uri_mut() = url.as_str().parse()?;

    Ok(request)
}

async fn collect_bytes(mut stream: BytesStream) -> Result<Vec<u8>, IoError> {
    let mut bytes = Vec::new();
    while let Some(next) = stream.try_next().await? {
        bytes.extend(next);
    }
    Ok(bytes)
}

async fn deserialize_stream<T: DeserializeOwned>(stream: BytesStream) -> Result<T, ApiError> {
    let bytes = collect_bytes(stream).await?;

    let deserialized = serde_json::from_slice(&bytes)?;

    Ok(deserialized)
}

/// Longest part of an error body carried into the error message
const MAX_ERROR_BODY_CHARS: usize = 200;

async fn evaluate_error(service: &'static str, response: Response<BytesStream>) -> ApiError {
    let (parts, body) = response.into_parts();

    let err = ApiError::http(parts.status);

    match collect_bytes(body).await {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            let text = text.trim();
            if text.is_empty() {
                err.with_context(format!("{} returned status {}", service, parts.status))
            } else {
                let excerpt: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
                err.with_context(format!(
                    "{} returned status {}: {}",
                    service, parts.status, excerpt
                ))
            }
        }
        Err(io_err) => err
            .with_context(format!(
                "{} returned status {} and the body could not be read",
                service, parts.status
            ))
            .caused_by(io_err),
    }
}
