use bytes::Bytes;
use http::HeaderValue;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use serde_json::Value;

pub use memory::InMemoryBody;

use crate::error::ProtocolError;

mod memory;

#[derive(Debug)]
pub enum Body {
    InMemory(InMemoryBody),
    Hyper(Incoming),
}

impl Body {
    pub fn empty() -> Self {
        Body::InMemory(InMemoryBody::Empty)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Body::Hyper(b) => http_body::Body::size_hint(b).exact() == Some(0),
            Body::InMemory(m) => m.is_empty(),
        }
    }

    /// Buffer the body. JSON content types are decoded into [`InMemoryBody::Json`], other
    /// content becomes text when it is valid UTF-8 and raw bytes otherwise.
    pub async fn into_memory(self, content_type: Option<&HeaderValue>) -> Result<InMemoryBody, ProtocolError> {
        let bytes: Bytes = match self {
            Body::InMemory(m) => return Ok(m),
            Body::Hyper(incoming) => incoming.collect().await?.to_bytes(),
        };
        if bytes.is_empty() {
            return Ok(InMemoryBody::Empty);
        }
        if content_type.is_some_and(is_json) {
            return Ok(InMemoryBody::Json(serde_json::from_slice::<Value>(&bytes)?));
        }
        match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Ok(InMemoryBody::Text(text)),
            Err(e) => Ok(InMemoryBody::Bytes(e.into_bytes())),
        }
    }
}

impl From<InMemoryBody> for Body {
    fn from(value: InMemoryBody) -> Self {
        Body::InMemory(value)
    }
}

impl From<Incoming> for Body {
    fn from(value: Incoming) -> Self {
        Body::Hyper(value)
    }
}

fn is_json(content_type: &HeaderValue) -> bool {
    let Ok(content_type) = content_type.to_str() else {
        return false;
    };
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    mime == "application/json" || mime.ends_with("+json")
}
