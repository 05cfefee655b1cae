use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, trace, warn};

#[cfg(any(test, feature = "mock"))]
pub use mock::Mock;

use crate::client::Client;
use crate::sanitize::sanitize_headers;
use crate::{Error, InMemoryRequest, Response, Result};

#[cfg(any(test, feature = "mock"))]
mod mock;

pub type MiddlewareStack = Vec<Arc<dyn Middleware>>;

#[derive(Debug, Copy, Clone)]
pub struct Next<'a> {
    pub client: &'a Client,
    pub(crate) middlewares: &'a [Arc<dyn Middleware>],
}

impl Next<'_> {
    pub async fn run(self, request: InMemoryRequest) -> Result<Response> {
        if let Some((middleware, rest)) = self.middlewares.split_first() {
            let next = Next {
                client: self.client,
                middlewares: rest,
            };
            middleware.handle(request, next).await
        } else {
            self.client.send_transport(request).await
        }
    }
}

#[async_trait]
pub trait Middleware: Send + Sync + Debug {
    async fn handle(&self, request: InMemoryRequest, next: Next<'_>) -> Result<Response> {
        next.run(request).await
    }
}

/// Logs every request and its outcome through `tracing`. Credentials are redacted.
#[derive(Debug, Default, Clone, Copy)]
pub struct Logger;

#[async_trait]
impl Middleware for Logger {
    async fn handle(&self, request: InMemoryRequest, next: Next<'_>) -> Result<Response> {
        let method = request.method.clone();
        let url = request.uri.to_string();
        let mut headers = request.headers.clone();
        sanitize_headers(&mut headers);
        debug!(%method, %url, ?headers, "sending request");
        if !request.body.is_empty() {
            let mut body = request.body.clone();
            body.sanitize();
            trace!(%method, %url, ?body, "request body");
        }
        let started = Instant::now();
        let res = next.run(request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &res {
            Ok(r) | Err(Error::HttpError(r)) => {
                debug!(%method, %url, status = r.status().as_u16(), elapsed_ms, "received response");
            }
            Err(e) => warn!(%method, %url, elapsed_ms, error = %e, "request failed"),
        }
        res
    }
}
