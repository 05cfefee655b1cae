use std::error::Error as StdError;
use std::fmt::{Debug, Display, Formatter};
use std::string::FromUtf8Error;

use http::header::{InvalidHeaderName, InvalidHeaderValue};
use http::uri::InvalidUri;
use http::StatusCode;

use crate::api::ValidationError;
use crate::auth::RefreshError;
use crate::{Body, InMemoryBody, Response};

pub type Result<T, E = Error> = std::result::Result<T, E>;
pub type InMemoryError = Error<InMemoryBody>;
pub type InMemoryResult<T> = Result<T, InMemoryError>;

/// Failures while reading a body off the wire.
#[derive(Debug)]
pub enum ProtocolError {
    HttpProtocol(hyper::Error),
    JsonEncoding(serde_json::Error),
}

impl StdError for ProtocolError {}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::HttpProtocol(e) => write!(f, "HttpProtocolError: {}", e),
            ProtocolError::JsonEncoding(e) => write!(f, "JsonEncodingError: {}", e),
        }
    }
}

pub enum Error<T = Body> {
    Custom(String),
    Transport(hyper_util::client::legacy::Error),
    HttpProtocol(hyper::Error),
    InvalidRequest(http::Error),
    InvalidUri(InvalidUri),
    InvalidHeaderName(InvalidHeaderName),
    InvalidHeaderValue(InvalidHeaderValue),
    Utf8Error(FromUtf8Error),
    JsonEncoding(serde_json::Error),
    QueryEncoding(serde_qs::Error),
    IoError(std::io::Error),
    /// The access token was rejected and it could not be refreshed. The session has been ended.
    Refresh(RefreshError),
    Validation(ValidationError),
    /// The server answered with a 4xx or 5xx status.
    HttpError(Response<T>),
}

impl<T> Error<T> {
    /// Split off the error response, converting every other variant to a different body type.
    fn into_response<U>(self) -> std::result::Result<Response<T>, Error<U>> {
        Err(match self {
            Error::HttpError(r) => return Ok(r),
            Error::Custom(e) => Error::Custom(e),
            Error::Transport(e) => Error::Transport(e),
            Error::HttpProtocol(e) => Error::HttpProtocol(e),
            Error::InvalidRequest(e) => Error::InvalidRequest(e),
            Error::InvalidUri(e) => Error::InvalidUri(e),
            Error::InvalidHeaderName(e) => Error::InvalidHeaderName(e),
            Error::InvalidHeaderValue(e) => Error::InvalidHeaderValue(e),
            Error::Utf8Error(e) => Error::Utf8Error(e),
            Error::JsonEncoding(e) => Error::JsonEncoding(e),
            Error::QueryEncoding(e) => Error::QueryEncoding(e),
            Error::IoError(e) => Error::IoError(e),
            Error::Refresh(e) => Error::Refresh(e),
            Error::Validation(e) => Error::Validation(e),
        })
    }

    /// Get the error status code.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpError(r) => Some(r.status()),
            _ => None,
        }
    }
}

impl Error {
    pub fn custom(msg: &str) -> Self {
        Error::Custom(msg.to_string())
    }

    pub async fn into_memory(self) -> InMemoryError {
        match self.into_response() {
            Ok(response) => match response.into_memory().await {
                Ok(response) => Error::HttpError(response),
                Err(e) => e.into(),
            },
            Err(e) => e,
        }
    }
}

impl From<InMemoryError> for Error {
    fn from(value: InMemoryError) -> Self {
        match value.into_response() {
            Ok(response) => Error::HttpError(response.into()),
            Err(e) => e,
        }
    }
}

impl<T: Debug> Debug for Error<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::HttpError(r) => {
                write!(
                    f,
                    "HttpError {{ status: {}, headers: {:?}, body: {:?} }}",
                    r.parts.status, r.parts.headers, r.body
                )
            }
            other => Display::fmt(other, f),
        }
    }
}

impl<T: Debug> Display for Error<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Custom(msg) => write!(f, "{}", msg),
            Error::Transport(e) => write!(f, "TransportError: {}", e),
            Error::HttpProtocol(e) => write!(f, "HttpProtocolError: {}", e),
            Error::InvalidRequest(e) => write!(f, "InvalidRequest: {}", e),
            Error::InvalidUri(e) => write!(f, "InvalidUri: {}", e),
            Error::InvalidHeaderName(e) => write!(f, "InvalidHeaderName: {}", e),
            Error::InvalidHeaderValue(e) => write!(f, "InvalidHeaderValue: {}", e),
            Error::Utf8Error(e) => write!(f, "Utf8Error: {}", e),
            Error::JsonEncoding(e) => write!(f, "JsonEncodingError: {}", e),
            Error::QueryEncoding(e) => write!(f, "QueryEncodingError: {}", e),
            Error::IoError(e) => write!(f, "IoError: {}", e),
            Error::Refresh(e) => write!(f, "RefreshError: {}", e),
            Error::Validation(e) => write!(f, "ValidationError: {}", e),
            Error::HttpError(r) => write!(f, "HttpError {{ status: {}, body: {:?} }}", r.parts.status, r.body),
        }
    }
}

impl<T: Debug> StdError for Error<T> {}

impl<T> From<serde_json::Error> for Error<T> {
    fn from(value: serde_json::Error) -> Self {
        Error::JsonEncoding(value)
    }
}

impl<T> From<std::io::Error> for Error<T> {
    fn from(value: std::io::Error) -> Self {
        Error::IoError(value)
    }
}

impl<T> From<hyper::Error> for Error<T> {
    fn from(value: hyper::Error) -> Self {
        Error::HttpProtocol(value)
    }
}

impl<T> From<hyper_util::client::legacy::Error> for Error<T> {
    fn from(value: hyper_util::client::legacy::Error) -> Self {
        Error::Transport(value)
    }
}

impl<T> From<http::Error> for Error<T> {
    fn from(value: http::Error) -> Self {
        Error::InvalidRequest(value)
    }
}

impl<T> From<InvalidUri> for Error<T> {
    fn from(value: InvalidUri) -> Self {
        Error::InvalidUri(value)
    }
}

impl<T> From<InvalidHeaderName> for Error<T> {
    fn from(value: InvalidHeaderName) -> Self {
        Error::InvalidHeaderName(value)
    }
}

impl<T> From<InvalidHeaderValue> for Error<T> {
    fn from(value: InvalidHeaderValue) -> Self {
        Error::InvalidHeaderValue(value)
    }
}

impl<T> From<FromUtf8Error> for Error<T> {
    fn from(value: FromUtf8Error) -> Self {
        Error::Utf8Error(value)
    }
}

impl<T> From<serde_qs::Error> for Error<T> {
    fn from(value: serde_qs::Error) -> Self {
        Error::QueryEncoding(value)
    }
}

impl<T> From<RefreshError> for Error<T> {
    fn from(value: RefreshError) -> Self {
        Error::Refresh(value)
    }
}

impl<T> From<ValidationError> for Error<T> {
    fn from(value: ValidationError) -> Self {
        Error::Validation(value)
    }
}

impl<T> From<ProtocolError> for Error<T> {
    fn from(value: ProtocolError) -> Self {
        match value {
            ProtocolError::HttpProtocol(e) => Error::HttpProtocol(e),
            ProtocolError::JsonEncoding(e) => Error::JsonEncoding(e),
        }
    }
}

impl From<hyper::Error> for ProtocolError {
    fn from(value: hyper::Error) -> Self {
        Self::HttpProtocol(value)
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(value: serde_json::Error) -> Self {
        Self::JsonEncoding(value)
    }
}
