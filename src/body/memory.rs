use bytes::Bytes;
use serde::de::{DeserializeOwned, Error};
use serde::Serialize;
use serde_json::Value;

use crate::sanitize::sanitize_value;
use crate::InMemoryResult;

/// A fully buffered body. Requests are always in memory so middleware can clone and replay them.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum InMemoryBody {
    #[default]
    Empty,
    Bytes(Vec<u8>),
    Text(String),
    Json(Value),
}

impl InMemoryBody {
    pub fn new_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        InMemoryBody::Bytes(bytes.into())
    }

    pub fn new_text(text: impl Into<String>) -> Self {
        InMemoryBody::Text(text.into())
    }

    pub fn new_json(value: impl Serialize) -> serde_json::Result<Self> {
        Ok(InMemoryBody::Json(serde_json::to_value(value)?))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        use InMemoryBody::{Bytes, Empty, Json, Text};
        match self {
            Empty => true,
            Bytes(b) => b.is_empty(),
            Text(s) => s.is_empty(),
            Json(_) => false,
        }
    }

    pub fn text(self) -> InMemoryResult<String> {
        match self {
            InMemoryBody::Empty => Ok(String::new()),
            InMemoryBody::Bytes(b) => Ok(String::from_utf8(b)?),
            InMemoryBody::Text(s) => Ok(s),
            InMemoryBody::Json(val) => Ok(serde_json::to_string(&val)?),
        }
    }

    pub fn json<T: DeserializeOwned>(self) -> serde_json::Result<T> {
        match self {
            InMemoryBody::Empty => Err(serde_json::Error::custom("Empty body")),
            InMemoryBody::Bytes(b) => serde_json::from_slice(&b),
            InMemoryBody::Text(t) => serde_json::from_str(&t),
            InMemoryBody::Json(v) => serde_json::from_value(v),
        }
    }

    pub fn bytes(self) -> serde_json::Result<Bytes> {
        match self {
            InMemoryBody::Empty => Ok(Bytes::new()),
            InMemoryBody::Bytes(b) => Ok(Bytes::from(b)),
            InMemoryBody::Text(s) => Ok(Bytes::from(s)),
            InMemoryBody::Json(val) => Ok(Bytes::from(serde_json::to_vec(&val)?)),
        }
    }

    /// Redact secrets from JSON bodies before they are logged.
    pub fn sanitize(&mut self) {
        if let InMemoryBody::Json(value) = self {
            sanitize_value(value);
        }
    }
}
