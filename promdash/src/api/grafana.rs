use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use bytes::Bytes;
use futures::FutureExt;
use http::{
    header::{HeaderValue, AUTHORIZATION},
    Method,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::promdash_types::BaseUrl;

use super::dispatch_http_request::{DispatchHttpRequest, ResponseFuture};
use super::*;

const SERVICE: &str = "Grafana";
const UPDATE_MESSAGE: &str = "Updated by promdash";
const GENERAL_FOLDER_ID: i64 = 0;

/// Credentials sent with every request
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl BasicAuth {
    /// Returns `None` if neither a username nor a password is given.
    pub fn from_parts(username: Option<String>, password: Option<String>) -> Option<Self> {
        if username.is_none() && password.is_none() {
            return None;
        }

        Some(Self {
            username: username.unwrap_or_default(),
            password: password.unwrap_or_default(),
        })
    }

    fn header_value(&self) -> Result<HeaderValue, ApiError> {
        let encoded = B64.encode(format!("{}:{}", self.username, self.password));
        let mut value = HeaderValue::from_str(&format!("Basic {}", encoded))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BasicAuth({}, <secret>)", self.username)
    }
}

#[derive(Debug, Serialize)]
struct CreateDashboardRequest<'a> {
    dashboard: &'a Value,
    #[serde(rename = "folderId")]
    folder_id: i64,
    message: &'a str,
    overwrite: bool,
}

#[derive(Debug, Deserialize)]
struct Folder {
    id: i64,
    title: String,
}

/// Publishes dashboards to Grafana
#[derive(Clone)]
pub struct GrafanaClient {
    inner: Arc<Inner>,
}

struct Inner {
    base_url: BaseUrl,
    auth: Option<BasicAuth>,
    dispatch_http_request: Box<dyn DispatchHttpRequest + Send + Sync + 'static>,
}

impl GrafanaClient {
    pub fn new<D>(base_url: BaseUrl, auth: Option<BasicAuth>, dispatch_http_request: D) -> Self
    where
        D: DispatchHttpRequest + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                base_url,
                auth,
                dispatch_http_request: Box::new(dispatch_http_request),
            }),
        }
    }

    #[cfg(feature = "reqwest")]
    pub fn with_default_dispatcher(base_url: BaseUrl, auth: Option<BasicAuth>) -> Self {
        Self::new(
            base_url,
            auth,
            super::dispatch_http_request::ReqwestDispatchHttpRequest::default(),
        )
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.inner.base_url
    }

    fn dispatch(&self, req: Request<Bytes>) -> ResponseFuture {
        self.inner.dispatch_http_request.dispatch(req)
    }

    fn request<B: Into<Bytes>>(&self, path: &str, method: Method, body: B) -> Result<Request<Bytes>, ApiError> {
        let url = self.inner.base_url.join(path)?;
        let mut request = create_request(&url, method, body)?;
        if let Some(ref auth) = self.inner.auth {
            request.headers_mut().append(AUTHORIZATION, auth.header_value()?);
        }
        Ok(request)
    }

    async fn find_folder_id(&self, title: &str) -> Result<i64, ApiError> {
        let request = self.request("api/folders?limit=10000", Method::GET, Bytes::default())?;
        let response = self.dispatch(request).await?;

        if !response.status().is_success() {
            return Err(evaluate_error(SERVICE, response).await);
        }

        let folders: Vec<Folder> = deserialize_stream(response.into_body()).await?;

        folders
            .into_iter()
            .find(|folder| folder.title == title)
            .map(|folder| folder.id)
            .ok_or_else(|| ApiError::other().with_context(format!("folder '{}' not found in Grafana", title)))
    }

    async fn post_dashboard(&self, dashboard: Value, folder: Option<String>) -> Result<(), ApiError> {
        let folder_id = match folder {
            Some(ref title) => self.find_folder_id(title).await?,
            None => GENERAL_FOLDER_ID,
        };

        let payload = serde_json::to_vec(&CreateDashboardRequest {
            dashboard: &dashboard,
            folder_id,
            message: UPDATE_MESSAGE,
            overwrite: true,
        })?;

        let request = self.request("api/dashboards/db", Method::POST, payload)?;
        let response = self.dispatch(request).await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(evaluate_error(SERVICE, response).await)
        }
    }
}

impl DashboardsApi for GrafanaClient {
    fn create_dashboard(&self, dashboard: &Value, folder: Option<&str>) -> ApiFuture<()> {
        self.post_dashboard(dashboard.clone(), folder.map(str::to_string))
            .boxed()
    }
}

impl fmt::Debug for GrafanaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GrafanaClient({})", self.inner.base_url)
    }
}
