use std::future::IntoFuture;
use std::str::FromStr;

use futures::future::BoxFuture;
use http::header::{HeaderName, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::uri::PathAndQuery;
use http::{HeaderMap, HeaderValue, Method, Uri, Version};
use serde::Serialize;
use serde_json::Value;

use crate::middleware::Next;
use crate::{Client, Error, InMemoryBody, InMemoryResponse, InMemoryResult, Request, Response, Result};

/// Builds a request against a [`Client`]. Builder steps never panic: the first failure is kept
/// and returned when the request is built or sent.
#[derive(Debug)]
pub struct RequestBuilder<'a> {
    client: &'a Client,

    pub version: Version,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Option<InMemoryBody>,
    error: Option<Error>,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(client: &'a Client, method: Method, uri: Uri) -> Self {
        RequestBuilder {
            client,
            version: Default::default(),
            method,
            uri,
            headers: Default::default(),
            body: Default::default(),
            error: None,
        }
    }

    /// Record a failure. Only the first one is kept.
    pub(crate) fn fail(mut self, err: impl Into<Error>) -> Self {
        if self.error.is_none() {
            self.error = Some(err.into());
        }
        self
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        let name = match HeaderName::from_str(key) {
            Ok(name) => name,
            Err(e) => return self.fail(e),
        };
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
                self
            }
            Err(e) => self.fail(e),
        }
    }

    pub fn headers<S: AsRef<str>, I: Iterator<Item = (S, S)>>(mut self, headers: I) -> Self {
        for (k, v) in headers {
            self = self.header(k.as_ref(), v.as_ref());
        }
        self
    }

    pub fn bearer_auth(self, token: &str) -> Self {
        self.header(AUTHORIZATION.as_str(), &format!("Bearer {token}"))
    }

    pub fn content_type(self, content_type: &str) -> Self {
        self.header(CONTENT_TYPE.as_str(), content_type)
    }

    /// Overwrite the current body with the provided JSON object.
    pub fn set_json<S: Serialize>(mut self, obj: S) -> Self {
        match serde_json::to_value(obj) {
            Ok(value) => self.body = Some(InMemoryBody::Json(value)),
            Err(e) => return self.fail(e),
        }
        self.headers.entry(CONTENT_TYPE).or_insert(HeaderValue::from_static("application/json; charset=utf-8"));
        self.headers.entry(ACCEPT).or_insert(HeaderValue::from_static("application/json"));
        self
    }

    /// Add the provided JSON object to the current body.
    pub fn json<S: Serialize>(mut self, obj: S) -> Self {
        if self.body.is_none() {
            return self.set_json(obj);
        }
        let value = match serde_json::to_value(obj) {
            Ok(value) => value,
            Err(e) => return self.fail(e),
        };
        let merged = match (self.body.as_mut(), value) {
            (Some(InMemoryBody::Json(Value::Object(body))), Value::Object(obj)) => {
                body.extend(obj);
                Ok(())
            }
            (Some(InMemoryBody::Json(Value::Object(_))), _) => Err("Tried to push a non-object to a json body."),
            _ => Err("Tried to call .json() on a non-json body. Use .set_json if you need to force a json body."),
        };
        match merged {
            Ok(()) => self,
            Err(msg) => self.fail(Error::custom(msg)),
        }
    }

    /// Sets content-type to `application/octet-stream` and the body to the supplied bytes.
    pub fn bytes(mut self, bytes: Vec<u8>) -> Self {
        self.body = Some(InMemoryBody::Bytes(bytes));
        self.headers.entry(CONTENT_TYPE).or_insert(HeaderValue::from_static("application/octet-stream"));
        self
    }

    /// Sets content-type to `text/plain` and the body to the supplied text.
    pub fn text(mut self, text: String) -> Self {
        self.body = Some(InMemoryBody::Text(text));
        self.headers.entry(CONTENT_TYPE).or_insert(HeaderValue::from_static("text/plain"));
        self
    }

    /// Warning: Does not set content-type!
    pub fn body(mut self, body: InMemoryBody) -> Self {
        self.body = Some(body);
        self
    }

    fn with_query(mut self, query: String) -> Self {
        let mut parts = std::mem::take(&mut self.uri).into_parts();
        let path = parts.path_and_query.as_ref().map(PathAndQuery::path).unwrap_or("/");
        let pq = match PathAndQuery::from_str(&format!("{path}?{query}")) {
            Ok(pq) => pq,
            Err(e) => return self.fail(e),
        };
        parts.path_and_query = Some(pq);
        match Uri::from_parts(parts) {
            Ok(uri) => self.uri = uri,
            Err(e) => return self.fail(Error::custom(&e.to_string())),
        }
        self
    }

    /// Overwrite the query with the provided value.
    pub fn set_query<S: Serialize>(self, obj: S) -> Self {
        match serde_qs::to_string(&obj) {
            Ok(query) => self.with_query(query),
            Err(e) => self.fail(e),
        }
    }

    /// Add a url query parameter, but keep existing parameters.
    pub fn query(self, k: &str, v: &str) -> Self {
        let pair = format!("{}={}", urlencoding::encode(k), urlencoding::encode(v));
        let query = match self.uri.query() {
            Some(q) if !q.is_empty() => format!("{q}&{pair}"),
            _ => pair,
        };
        self.with_query(query)
    }

    pub fn build(self) -> Result<Request> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(Request {
            method: self.method,
            uri: self.uri,
            version: self.version,
            headers: self.headers,
            body: self.body.unwrap_or_default(),
        })
    }

    pub async fn send(self) -> Result<Response> {
        let client = self.client;
        let request = self.build()?;
        let next = Next {
            client,
            middlewares: client.middlewares.as_slice(),
        };
        next.run(request).await
    }

    /// Send the request, buffer the body, and turn 4xx/5xx statuses into [`Error::HttpError`].
    pub fn send_awaiting_body(self) -> BoxFuture<'a, InMemoryResult<InMemoryResponse>> {
        Box::pin(async move {
            let res = match self.send().await {
                Ok(res) => res,
                Err(e) => return Err(e.into_memory().await),
            };
            let res = res.into_memory().await?;
            res.error_for_status()
        })
    }
}

impl<'a> IntoFuture for RequestBuilder<'a> {
    type Output = Result<Response>;
    type IntoFuture = BoxFuture<'a, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.send())
    }
}
