//! Client for the Koink personal-finance API.
//!
//! Requests go through an ordered stack of [`Middleware`] before reaching the network. The
//! [`auth::BearerAuth`] middleware attaches the access token and, when it expires, coordinates a
//! single refresh for every request that ran into the 401. [`api::ApiClient`] wraps the backend's
//! endpoints with typed models.
pub use http::Method;

pub use body::{Body, InMemoryBody};
pub use client::Client;
pub use error::{Error, InMemoryError, InMemoryResult, ProtocolError, Result};
pub use middleware::{Logger, Middleware, Next};
pub use request::{InMemoryRequest, Request, RequestBuilder};
pub use response::{InMemoryResponse, Response, ResponseExt, ResponseParts};

pub mod api;
pub mod auth;
mod body;
mod client;
mod error;
pub mod middleware;
mod request;
mod response;
pub mod sanitize;
