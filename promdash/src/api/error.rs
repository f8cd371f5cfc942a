use std::error::Error as StdError;
use std::fmt;

use http::StatusCode;

/// An error returned by one of the HTTP clients
#[derive(Debug)]
pub struct ApiError {
    context: Option<String>,
    cause: Option<Box<dyn StdError + Send + Sync + 'static>>,
    kind: ApiErrorKind,
}

impl ApiError {
    pub fn http<T: Into<StatusCode>>(status: T) -> Self {
        Self::create(status.into())
    }

    pub fn io() -> Self {
        Self::create(ApiErrorKind::Io)
    }

    pub fn other() -> Self {
        Self::create(ApiErrorKind::Other(None))
    }

    fn create<T: Into<ApiErrorKind>>(kind: T) -> Self {
        Self {
            context: None,
            cause: None,
            kind: kind.into(),
        }
    }

    pub fn caused_by<E>(mut self, err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Box::new(err));
        self
    }

    pub fn with_context<T: Into<String>>(mut self, context: T) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.kind.status()
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self.kind, ApiErrorKind::ClientError(_))
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(
            self.kind,
            ApiErrorKind::ClientError(StatusCode::FORBIDDEN)
                | ApiErrorKind::ClientError(StatusCode::UNAUTHORIZED)
        )
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self.kind, ApiErrorKind::ServerError(_))
    }

    pub fn is_io_error(&self) -> bool {
        matches!(self.kind, ApiErrorKind::Io)
    }

    pub fn is_other_error(&self) -> bool {
        matches!(self.kind, ApiErrorKind::Other(_))
    }
}

impl StdError for ApiError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_ref().map(|p| &**p as &dyn StdError)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = self.context.as_ref() {
            write!(f, "{}", context)?;
            if let Some(source) = self.source() {
                add_causes(source, f)?;
            } else {
                write!(f, " - {}", self.kind)?;
            }
        } else {
            write!(f, "{}", self.kind)?;
            if let Some(source) = self.source() {
                add_causes(source, f)?;
            }
        }

        Ok(())
    }
}

pub(crate) fn add_causes(err: &dyn StdError, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, " - Caused by: {}", err)?;
    if let Some(source) = err.source() {
        add_causes(source, f)?
    }
    Ok(())
}

impl From<ApiErrorKind> for ApiError {
    fn from(kind: ApiErrorKind) -> Self {
        Self::create(kind)
    }
}

impl From<IoError> for ApiError {
    fn from(err: IoError) -> Self {
        Self::io().with_context(err.0)
    }
}

impl From<http::header::InvalidHeaderValue> for ApiError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        ApiError::other()
            .with_context("invalid header value")
            .caused_by(err)
    }
}

impl From<http::uri::InvalidUri> for ApiError {
    fn from(err: http::uri::InvalidUri) -> Self {
        ApiError::other().with_context("invalid URI").caused_by(err)
    }
}

impl From<crate::Error> for ApiError {
    fn from(err: crate::Error) -> Self {
        ApiError::other().with_context(err.message().to_string())
    }
}

impl From<crate::api::dispatch_http_request::RemoteCallError> for ApiError {
    fn from(err: crate::api::dispatch_http_request::RemoteCallError) -> Self {
        let api_err = if err.is_io() {
            ApiError::io()
        } else {
            ApiError::other()
        };

        let context = if let Some(msg) = err.message() {
            msg.to_string()
        } else {
            "remote call error".to_string()
        };

        api_err.with_context(context).caused_by(err)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Self::io().with_context("JSON de-/serialization IO error")
        } else if err.is_eof() {
            Self::other().with_context("unexpected EOF in JSON deserialization")
        } else if err.is_syntax() {
            Self::other().with_context("invalid JSON syntax on deserialization")
        } else if err.is_data() {
            Self::other().with_context("unexpected JSON data type on deserialization")
        } else {
            Self::other().with_context("JSON de-/serialization error")
        }
        .caused_by(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApiErrorKind {
    ClientError(StatusCode),
    ServerError(StatusCode),
    Io,
    Other(Option<StatusCode>),
}

impl ApiErrorKind {
    pub fn status(&self) -> Option<StatusCode> {
        match *self {
            ApiErrorKind::ClientError(status) => Some(status),
            ApiErrorKind::ServerError(status) => Some(status),
            ApiErrorKind::Io => None,
            ApiErrorKind::Other(status) => status,
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::ClientError(status) | ApiErrorKind::ServerError(status) => {
                write!(f, "{}", status)?;
            }
            ApiErrorKind::Io => {
                write!(f, "io error")?;
            }
            ApiErrorKind::Other(Some(status)) => {
                write!(f, "{}", status)?;
            }
            ApiErrorKind::Other(None) => {
                write!(f, "other error")?;
            }
        }

        Ok(())
    }
}

impl From<StatusCode> for ApiErrorKind {
    fn from(status: StatusCode) -> Self {
        if status.is_client_error() {
            ApiErrorKind::ClientError(status)
        } else if status.is_server_error() {
            ApiErrorKind::ServerError(status)
        } else {
            ApiErrorKind::Other(Some(status))
        }
    }
}

/// Reading a response body failed
#[derive(Debug)]
pub struct IoError(pub String);

impl IoError {
    pub fn new<T: Into<String>>(s: T) -> Self {
        Self(s.into())
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;

        Ok(())
    }
}

impl StdError for IoError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_selects_the_kind() {
        assert!(ApiError::http(StatusCode::NOT_FOUND).is_client_error());
        assert!(ApiError::http(StatusCode::UNAUTHORIZED).is_auth_error());
        assert!(ApiError::http(StatusCode::BAD_GATEWAY).is_server_error());
        assert!(ApiError::http(StatusCode::MOVED_PERMANENTLY).is_other_error());
        assert_eq!(
            ApiError::http(StatusCode::BAD_GATEWAY).status(),
            Some(StatusCode::BAD_GATEWAY)
        );
    }

    #[test]
    fn display_chains_causes() {
        let err = ApiError::io()
            .with_context("fetching metrics failed")
            .caused_by(IoError::new("connection reset"));
        assert_eq!(
            err.to_string(),
            "fetching metrics failed - Caused by: connection reset"
        );

        let err = ApiError::http(StatusCode::NOT_FOUND).with_context("folder lookup failed");
        assert_eq!(err.to_string(), "folder lookup failed - 404 Not Found");
    }
}
