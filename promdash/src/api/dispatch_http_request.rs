//! Pluggable HTTP transport
//!
//! The clients only build `http::Request`s and evaluate `http::Response`s.
//! Sending them is delegated to a `DispatchHttpRequest` so that the HTTP
//! stack can be swapped, e.g. for an in-memory fake in tests.
use std::error::Error as StdError;
use std::fmt;

use bytes::Bytes;
use futures::future::BoxFuture;
use http::{Request, Response};

#[cfg(feature = "reqwest")]
pub use reqwest_dispatch_http_request::ReqwestDispatchHttpRequest;

use super::{BytesStream, IoError};

pub type ResponseFuture<'a> = BoxFuture<'a, Result<Response<BytesStream>, RemoteCallError>>;

/// Sends a request and returns the response with a streaming body.
pub trait DispatchHttpRequest {
    fn dispatch<'a>(&'a self, req: Request<Bytes>) -> ResponseFuture<'a>;
}

/// A request did not produce a response.
///
/// This is a low level error. The clients turn it into an `ApiError`.
#[derive(Debug)]
pub struct RemoteCallError {
    message: Option<String>,
    cause: Option<Box<dyn StdError + Send + Sync + 'static>>,
    detail: RemoteCallErrorDetail,
}

impl RemoteCallError {
    pub fn new_io() -> Self {
        Self::create(RemoteCallErrorDetail::Io)
    }

    pub fn new_timeout() -> Self {
        Self::create(RemoteCallErrorDetail::Timeout)
    }

    pub fn new_other() -> Self {
        Self::create(RemoteCallErrorDetail::Other)
    }

    fn create(detail: RemoteCallErrorDetail) -> Self {
        Self {
            message: None,
            cause: None,
            detail,
        }
    }

    pub fn with_message<M: Into<String>>(mut self, message: M) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_cause<E: StdError + Send + Sync + 'static>(mut self, cause: E) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Timeouts count as IO errors
    pub fn is_io(&self) -> bool {
        matches!(
            self.detail,
            RemoteCallErrorDetail::Io | RemoteCallErrorDetail::Timeout
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.detail, RemoteCallErrorDetail::Timeout)
    }

    pub fn is_other(&self) -> bool {
        matches!(self.detail, RemoteCallErrorDetail::Other)
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for RemoteCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail {
            RemoteCallErrorDetail::Io => write!(f, "io error")?,
            RemoteCallErrorDetail::Timeout => write!(f, "timeout")?,
            RemoteCallErrorDetail::Other => write!(f, "other error")?,
        }

        if let Some(ref message) = self.message {
            write!(f, " - message: {}", message)?;
        }

        Ok(())
    }
}

impl StdError for RemoteCallError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_ref().map(|e| &**e as &dyn StdError)
    }
}

impl From<IoError> for RemoteCallError {
    fn from(err: IoError) -> Self {
        Self::new_io().with_message(err.0)
    }
}

impl From<http::uri::InvalidUri> for RemoteCallError {
    fn from(err: http::uri::InvalidUri) -> Self {
        RemoteCallError::new_other()
            .with_message("invalid URI")
            .with_cause(err)
    }
}

impl From<tokio::time::error::Elapsed> for RemoteCallError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        RemoteCallError::new_timeout()
            .with_message("a timeout occurred")
            .with_cause(err)
    }
}

#[derive(Debug, Clone, Copy)]
enum RemoteCallErrorDetail {
    Io,
    Timeout,
    Other,
}

#[cfg(feature = "reqwest")]
mod reqwest_dispatch_http_request {
    use futures::{stream::TryStreamExt, FutureExt, StreamExt};
    use http::{Request, Response};
    use reqwest::{Client, Request as RRequest};

    use super::*;

    /// Sends requests with a shared `reqwest::Client`
    #[derive(Clone)]
    pub struct ReqwestDispatchHttpRequest {
        client: Client,
    }

    impl ReqwestDispatchHttpRequest {
        pub fn new(client: Client) -> Self {
            Self { client }
        }
    }

    impl DispatchHttpRequest for ReqwestDispatchHttpRequest {
        fn dispatch(&self, req: Request<Bytes>) -> ResponseFuture {
            async move {
                let (parts, body) = req.into_parts();

                let url = parts.uri.to_string().parse().map_err(|err| {
                    RemoteCallError::new_other()
                        .with_message("invalid url")
                        .with_cause(err)
                })?;

                let mut request = RRequest::new(parts.method, url);

                for (k, v) in parts.headers {
                    if let Some(k) = k {
                        request.headers_mut().append(k, v);
                    }
                }

                *request.body_mut() = Some(body.into());

                let reqwest_response = self.client.execute(request).await?;

                let status = reqwest_response.status();
                let headers = reqwest_response.headers().clone();
                let version = reqwest_response.version();

                let bytes_stream = reqwest_response
                    .bytes_stream()
                    .map_err(|err| IoError(err.to_string()))
                    .boxed();
                let mut response = Response::new(bytes_stream);

                *response.status_mut() = status;
                *response.headers_mut() = headers;
                *response.version_mut() = version;

                Ok(response)
            }
            .boxed()
        }
    }

    impl Default for ReqwestDispatchHttpRequest {
        fn default() -> Self {
            Self::new(Client::new())
        }
    }

    impl From<reqwest::Error> for RemoteCallError {
        fn from(err: reqwest::Error) -> Self {
            if err.is_timeout() {
                return RemoteCallError::new_timeout()
                    .with_message("request timeout")
                    .with_cause(err);
            }

            if err.is_connect() {
                return RemoteCallError::new_io()
                    .with_message("could not connect")
                    .with_cause(err);
            }

            RemoteCallError::new_other()
                .with_message(err.to_string())
                .with_cause(err)
        }
    }
}
