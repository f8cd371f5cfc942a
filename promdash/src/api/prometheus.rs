use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::FutureExt;
use http::{header::CONTENT_TYPE, Method};
use url::Url;

use crate::promdash_types::model::alert::{AlertGroup, RulesResponse};
use crate::promdash_types::BaseUrl;

use super::dispatch_http_request::{DispatchHttpRequest, RemoteCallError, ResponseFuture};
use super::*;

const SERVICE: &str = "Prometheus";

/// The body of a metrics endpoint together with its declared format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsPayload {
    pub body: String,
    /// Empty if the endpoint did not send a content type
    pub content_type: String,
}

/// Talks to a Prometheus server and to metrics endpoints
#[derive(Clone)]
pub struct PrometheusClient {
    inner: Arc<Inner>,
}

struct Inner {
    base_url: BaseUrl,
    dispatch_http_request: Box<dyn DispatchHttpRequest + Send + Sync + 'static>,
}

impl PrometheusClient {
    pub fn new<D>(base_url: BaseUrl, dispatch_http_request: D) -> Self
    where
        D: DispatchHttpRequest + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                base_url,
                dispatch_http_request: Box::new(dispatch_http_request),
            }),
        }
    }

    #[cfg(feature = "reqwest")]
    pub fn with_default_dispatcher(base_url: BaseUrl) -> Self {
        Self::new(
            base_url,
            super::dispatch_http_request::ReqwestDispatchHttpRequest::default(),
        )
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.inner.base_url
    }

    fn dispatch(&self, req: Request<Bytes>) -> ResponseFuture {
        self.inner.dispatch_http_request.dispatch(req)
    }

    async fn get_rules(&self) -> Result<Vec<AlertGroup>, ApiError> {
        let url = self.inner.base_url.join("api/v1/rules")?;
        let request = create_request(&url, Method::GET, Bytes::default())?;

        let response = self.dispatch(request).await?;

        if !response.status().is_success() {
            return Err(evaluate_error(SERVICE, response).await);
        }

        let rules: RulesResponse = deserialize_stream(response.into_body()).await?;
        if !rules.is_success() {
            return Err(ApiError::other().with_context(format!(
                "{} rules API answered with status '{}': {} {}",
                SERVICE,
                rules.status,
                rules.error_type.as_deref().unwrap_or(""),
                rules.error.as_deref().unwrap_or(""),
            )));
        }

        Ok(rules.into_alert_groups())
    }

    async fn get_metrics(&self, endpoint: Url, timeout: Duration) -> Result<MetricsPayload, ApiError> {
        let request = create_request(&endpoint, Method::GET, Bytes::default())?;

        let fetch = async {
            let response = self.dispatch(request).await?;

            if !response.status().is_success() {
                return Err(evaluate_error("metrics endpoint", response).await);
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();

            let bytes = collect_bytes(response.into_body()).await?;
            let body = String::from_utf8(bytes).map_err(|err| {
                ApiError::other()
                    .with_context(format!("metrics of {} are not valid UTF-8", endpoint))
                    .caused_by(err)
            })?;

            Ok(MetricsPayload { body, content_type })
        };

        match tokio::time::timeout(timeout, fetch).await {
            Ok(result) => result,
            Err(elapsed) => Err(ApiError::from(RemoteCallError::from(elapsed))
                .with_context(format!("fetching metrics from {} timed out after {:?}", endpoint, timeout))),
        }
    }
}

impl RulesApi for PrometheusClient {
    fn rules(&self) -> ApiFuture<Vec<AlertGroup>> {
        self.get_rules().boxed()
    }
}

impl MetricsApi for PrometheusClient {
    fn fetch_metrics(&self, endpoint: &Url, timeout: Duration) -> ApiFuture<MetricsPayload> {
        self.get_metrics(endpoint.clone(), timeout).boxed()
    }
}

impl fmt::Debug for PrometheusClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrometheusClient({})", self.inner.base_url)
    }
}
