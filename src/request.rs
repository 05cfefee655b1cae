use std::str::FromStr;

use bytes::Bytes;
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue, Method, Uri, Version};
use http_body_util::Full;

pub use builder::RequestBuilder;

use crate::{InMemoryBody, Result};

mod builder;

#[derive(Debug, Clone)]
pub struct Request<B = InMemoryBody> {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: B,
}

pub type InMemoryRequest = Request<InMemoryBody>;

impl<B> Request<B> {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Uri {
        &self.uri
    }

    pub fn host(&self) -> &str {
        self.uri.host().unwrap_or("")
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &B {
        &self.body
    }

    /// The raw `Authorization` header, if one is set and is valid ASCII.
    pub fn authorization(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION)?.to_str().ok()
    }
}

impl InMemoryRequest {
    /// A bare request, mostly useful in tests.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            version: Version::default(),
            headers: HeaderMap::new(),
            body: InMemoryBody::Empty,
        }
    }

    pub fn test(method: &str, url: &str) -> Result<Self> {
        let method = Method::from_str(&method.to_uppercase()).map_err(|e| crate::Error::custom(&e.to_string()))?;
        Ok(Self::new(method, Uri::from_str(url)?))
    }

    /// Replace the `Authorization` header with a bearer credential.
    pub fn bearer_auth(mut self, token: &str) -> Result<Self> {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))?;
        self.headers.insert(AUTHORIZATION, value);
        Ok(self)
    }

    pub fn set_body(mut self, body: InMemoryBody) -> Self {
        self.body = body;
        self
    }

    pub(crate) fn into_hyper(self) -> Result<http::Request<Full<Bytes>>> {
        let body = self.body.bytes()?;
        let mut request = http::Request::builder()
            .method(self.method)
            .uri(self.uri)
            .version(self.version)
            .body(Full::new(body))?;
        *request.headers_mut() = self.headers;
        Ok(request)
    }
}
