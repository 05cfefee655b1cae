use std::fmt::Formatter;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use http::uri::InvalidUri;
use http::{Method, Uri};
use http_body_util::Full;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tracing::warn;

use crate::middleware::{Middleware, MiddlewareStack};
use crate::{InMemoryRequest, RequestBuilder, Response, Result};

type Transport = hyper_util::client::legacy::Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

static HTTPS_CONNECTOR: OnceLock<HttpsConnector<HttpConnector>> = OnceLock::new();

fn https_connector() -> &'static HttpsConnector<HttpConnector> {
    HTTPS_CONNECTOR.get_or_init(|| {
        let builder = match hyper_rustls::HttpsConnectorBuilder::new().with_native_roots() {
            Ok(builder) => builder,
            Err(e) => {
                warn!(error = %e, "Unable to load native root certificates, https requests will fail verification");
                let config = rustls::ClientConfig::builder()
                    .with_root_certificates(rustls::RootCertStore::empty())
                    .with_no_client_auth();
                hyper_rustls::HttpsConnectorBuilder::new().with_tls_config(config)
            }
        };
        builder.https_or_http().enable_http1().build()
    })
}

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

pub struct Client {
    base_url: Option<String>,
    default_headers: Vec<(String, String)>,
    pub(crate) middlewares: MiddlewareStack,
    transport: OnceLock<Transport>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Client {{ base_url: {:?}, middlewares: {:?} }}", self.base_url, self.middlewares)
    }
}

impl Client {
    pub fn new() -> Self {
        Client {
            base_url: None,
            default_headers: vec![("User-Agent".to_string(), APP_USER_AGENT.to_string())],
            middlewares: Vec::new(),
            transport: OnceLock::new(),
        }
    }

    /// Set a `base_url` so you can pass relative paths instead of full URLs.
    pub fn base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    pub fn with_middleware<T: Middleware + 'static>(self, middleware: T) -> Self {
        self.with_shared_middleware(Arc::new(middleware))
    }

    /// Add a middleware that is also held elsewhere, e.g. by a second client.
    pub fn with_shared_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn no_default_headers(mut self) -> Self {
        self.default_headers = Vec::new();
        self
    }

    pub fn default_header<S: AsRef<str>>(mut self, key: S, value: S) -> Self {
        self.default_headers.push((key.as_ref().to_string(), value.as_ref().to_string()));
        self
    }

    pub(crate) fn build_uri(&self, uri_or_path: &str) -> std::result::Result<Uri, InvalidUri> {
        if let Ok(uri) = Uri::from_str(uri_or_path) {
            if uri.scheme().is_some() && uri.host().is_some() {
                return Ok(uri);
            }
        }
        match &self.base_url {
            Some(base) => Uri::from_str(&format!("{base}{uri_or_path}")),
            None => Uri::from_str(uri_or_path),
        }
    }

    pub fn request(&self, method: Method, uri_or_path: &str) -> RequestBuilder {
        let builder = match self.build_uri(uri_or_path) {
            Ok(uri) => RequestBuilder::new(self, method, uri),
            Err(e) => RequestBuilder::new(self, method, Uri::default()).fail(e),
        };
        builder.headers(self.default_headers.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn get(&self, uri_or_path: &str) -> RequestBuilder {
        self.request(Method::GET, uri_or_path)
    }

    pub fn post(&self, uri_or_path: &str) -> RequestBuilder {
        self.request(Method::POST, uri_or_path)
    }

    pub fn put(&self, uri_or_path: &str) -> RequestBuilder {
        self.request(Method::PUT, uri_or_path)
    }

    pub fn patch(&self, uri_or_path: &str) -> RequestBuilder {
        self.request(Method::PATCH, uri_or_path)
    }

    pub fn delete(&self, uri_or_path: &str) -> RequestBuilder {
        self.request(Method::DELETE, uri_or_path)
    }

    /// Send a request over the network. Middlewares are not run; this is the end of the stack.
    pub(crate) async fn send_transport(&self, request: InMemoryRequest) -> Result<Response> {
        let transport = self
            .transport
            .get_or_init(|| hyper_util::client::legacy::Client::builder(TokioExecutor::new()).build(https_connector().clone()));
        let res = transport.request(request.into_hyper()?).await?;
        Ok(res.into())
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}
