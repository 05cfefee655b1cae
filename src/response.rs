use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode, Version};
use hyper::body::Incoming;
use serde::de::DeserializeOwned;

pub use memory::*;

use crate::body::Body;
use crate::error::ProtocolError;
use crate::{InMemoryResult, Result};

mod memory;

#[derive(Debug, Clone)]
pub struct ResponseParts {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub version: Version,
}

#[derive(Debug, Clone)]
pub struct Response<T = Body> {
    pub(crate) parts: ResponseParts,
    pub(crate) body: T,
}

impl<T> Response<T> {
    pub fn from_parts(parts: ResponseParts, body: T) -> Self {
        Self { parts, body }
    }

    pub fn into_parts(self) -> (ResponseParts, T) {
        (self.parts, self.body)
    }

    pub fn status(&self) -> StatusCode {
        self.parts.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn version(&self) -> Version {
        self.parts.version
    }

    pub fn body(&self) -> &T {
        &self.body
    }
}

impl Response {
    pub async fn into_memory(self) -> std::result::Result<InMemoryResponse, ProtocolError> {
        let content_type = self.parts.headers.get(http::header::CONTENT_TYPE).cloned();
        let body = self.body.into_memory(content_type.as_ref()).await?;
        Ok(Response::from_parts(self.parts, body))
    }
}

impl From<http::Response<Incoming>> for Response {
    fn from(value: http::Response<Incoming>) -> Self {
        let (parts, body) = value.into_parts();
        Response::from_parts(
            ResponseParts {
                status: parts.status,
                headers: parts.headers,
                version: parts.version,
            },
            body.into(),
        )
    }
}

impl From<InMemoryResponse> for Response {
    fn from(value: InMemoryResponse) -> Self {
        let (parts, body) = value.into_parts();
        Response::from_parts(parts, body.into())
    }
}

#[async_trait]
pub trait ResponseExt
where
    Self: Sized,
{
    fn error_for_status(self) -> Result<Self>;
    async fn text(self) -> InMemoryResult<String>;
    async fn json<U: DeserializeOwned>(self) -> InMemoryResult<U>;
    /// Get body as bytes.
    async fn bytes(self) -> InMemoryResult<Bytes>;
}

#[async_trait]
impl ResponseExt for Response<Body> {
    fn error_for_status(self) -> Result<Self> {
        let status = self.status();
        if status.is_server_error() || status.is_client_error() {
            Err(crate::Error::HttpError(self))
        } else {
            Ok(self)
        }
    }

    async fn text(self) -> InMemoryResult<String> {
        self.into_memory().await?.text()
    }

    async fn json<U: DeserializeOwned>(self) -> InMemoryResult<U> {
        self.into_memory().await?.json()
    }

    async fn bytes(self) -> InMemoryResult<Bytes> {
        self.into_memory().await?.bytes()
    }
}
