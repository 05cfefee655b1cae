use bytes::Bytes;
use http::{HeaderMap, StatusCode, Version};
use serde::de::DeserializeOwned;

use crate::response::ResponseParts;
use crate::{InMemoryBody, InMemoryResult, Response};

pub type InMemoryResponse = Response<InMemoryBody>;

impl InMemoryResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: InMemoryBody) -> Self {
        Self::from_parts(
            ResponseParts {
                status,
                headers,
                version: Version::default(),
            },
            body,
        )
    }

    pub fn text(self) -> InMemoryResult<String> {
        self.body.text()
    }

    pub fn json<U: DeserializeOwned>(self) -> InMemoryResult<U> {
        Ok(self.body.json()?)
    }

    pub fn bytes(self) -> InMemoryResult<Bytes> {
        Ok(self.body.bytes()?)
    }

    pub fn error_for_status(self) -> InMemoryResult<Self> {
        let status = self.status();
        if status.is_client_error() || status.is_server_error() {
            Err(crate::Error::HttpError(self))
        } else {
            Ok(self)
        }
    }
}
