use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::future::BoxFuture;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::middleware::{Middleware, Next};
use crate::{InMemoryBody, InMemoryRequest, InMemoryResponse, Response, Result};

type Handler = Arc<dyn Fn(InMemoryRequest) -> BoxFuture<'static, InMemoryResponse> + Send + Sync>;

#[derive(Clone)]
struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

/// A terminal middleware that answers requests from registered handlers instead of the network.
///
/// Routes match on method and path (the query string is ignored). Unmatched requests get a 404.
/// Every request that reaches the mock is recorded, and clones share the record.
#[derive(Clone, Default)]
pub struct Mock {
    routes: Vec<Route>,
    requests: Arc<Mutex<Vec<InMemoryRequest>>>,
}

impl Debug for Mock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mock")
            .field("routes", &self.routes.iter().map(|r| format!("{} {}", r.method, r.path)).collect::<Vec<_>>())
            .finish()
    }
}

impl Mock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F, Fut>(mut self, method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(InMemoryRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = InMemoryResponse> + Send + 'static,
    {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            handler: Arc::new(move |req| Box::pin(handler(req))),
        });
        self
    }

    pub fn json(status: StatusCode, value: Value) -> InMemoryResponse {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        InMemoryResponse::new(status, headers, InMemoryBody::Json(value))
    }

    pub fn status(status: StatusCode) -> InMemoryResponse {
        InMemoryResponse::new(status, HeaderMap::new(), InMemoryBody::Empty)
    }

    /// Every request served so far, in arrival order.
    pub fn requests(&self) -> Vec<InMemoryRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of requests served for a method and path.
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.method == method && r.path() == path)
            .count()
    }
}

#[async_trait]
impl Middleware for Mock {
    async fn handle(&self, request: InMemoryRequest, _next: Next<'_>) -> Result<Response> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(request.clone());
        let route = self.routes.iter().find(|r| r.method == request.method && r.path == request.path());
        let response = match route {
            Some(route) => (route.handler)(request).await,
            None => {
                debug!(method = %request.method, url = %request.uri, "no mock route");
                Mock::status(StatusCode::NOT_FOUND)
            }
        };
        Ok(response.into())
    }
}
