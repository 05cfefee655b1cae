use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use tracing::{debug, info, warn};

use super::coordinator::{RefreshCoordinator, RefreshOutcome, Ticket};
use super::refresh::{LoginRedirect, RefreshConfig, RefreshError, RefreshRequest, RefreshResponse};
use super::store::{TokenSlot, TokenStore};
use crate::middleware::{Middleware, Next};
use crate::{Error, InMemoryRequest, Response, Result};

pub type SessionEndCallback = Arc<dyn Fn(LoginRedirect) + Send + Sync>;

/// Attaches the stored access token to every request. When the server answers 401, refreshes the
/// token once (however many requests are waiting for it) and retries the request with the new one.
///
/// If the refresh fails, both tokens are purged, the session-end callback is told where to send the
/// user, and every waiting request fails with [`Error::Refresh`].
pub struct BearerAuth {
    store: Arc<dyn TokenStore>,
    config: RefreshConfig,
    coordinator: Arc<RefreshCoordinator>,
    on_session_end: Option<SessionEndCallback>,
}

impl Debug for BearerAuth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuth")
            .field("store", &self.store)
            .field("config", &self.config)
            .field("state", &self.coordinator.state())
            .finish()
    }
}

fn authorize(request: InMemoryRequest, token: Option<&str>) -> Result<InMemoryRequest> {
    match token {
        Some(token) => request.bearer_auth(token),
        None => Ok(request),
    }
}

fn is_unauthorized(res: &Result<Response>) -> bool {
    match res {
        Ok(r) | Err(Error::HttpError(r)) => r.status() == StatusCode::UNAUTHORIZED,
        Err(_) => false,
    }
}

impl BearerAuth {
    pub fn new(store: Arc<dyn TokenStore>, config: RefreshConfig) -> Self {
        Self {
            store,
            config,
            coordinator: RefreshCoordinator::new(),
            on_session_end: None,
        }
    }

    pub fn on_session_end(mut self, callback: impl Fn(LoginRedirect) + Send + Sync + 'static) -> Self {
        self.on_session_end = Some(Arc::new(callback));
        self
    }

    pub fn coordinator(&self) -> Arc<RefreshCoordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Either perform the refresh or wait for the one in flight. A refresh abandoned by its leader
    /// (the leading caller dropped its future) is taken over by a waiter.
    async fn recover(&self, next: Next<'_>) -> RefreshOutcome {
        loop {
            match self.coordinator.begin() {
                Ticket::Leader(leader) => {
                    info!(endpoint = %self.config.refresh_endpoint, "refreshing access token");
                    let outcome = self.refresh(next).await;
                    if let Err(e) = &outcome {
                        self.end_session(e);
                    }
                    let settled = leader.settle(&outcome);
                    info!(success = outcome.is_ok(), settled, "refresh settled");
                    return outcome;
                }
                Ticket::Pending(pending) => {
                    debug!("refresh in flight, waiting");
                    match pending.wait().await {
                        Err(RefreshError::Abandoned) => debug!("refresh abandoned, taking over"),
                        outcome => return outcome,
                    }
                }
            }
        }
    }

    async fn refresh(&self, next: Next<'_>) -> RefreshOutcome {
        let refresh_token = self.store.get(TokenSlot::Refresh).ok_or(RefreshError::MissingRefreshToken)?;
        let call = self.call_refresh_endpoint(next, &refresh_token);
        let data = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| RefreshError::Timeout(limit))??,
            None => call.await?,
        };
        if let Err(e) = self.store.set(TokenSlot::Access, &data.access_token) {
            warn!(error = %e, "unable to persist refreshed access token");
        }
        if let Some(rotated) = &data.refresh_token {
            if let Err(e) = self.store.set(TokenSlot::Refresh, rotated) {
                warn!(error = %e, "unable to persist rotated refresh token");
            }
        }
        Ok(data.access_token)
    }

    /// The refresh goes through the rest of the stack, never back through this middleware.
    async fn call_refresh_endpoint(&self, next: Next<'_>, refresh_token: &str) -> Result<RefreshResponse, RefreshError> {
        let transport = |e: Error| RefreshError::Transport(e.to_string());
        let request = next
            .client
            .post(&self.config.refresh_endpoint)
            .json(RefreshRequest { refresh_token })
            .build()
            .map_err(transport)?;
        let res = match next.run(request).await {
            Ok(res) | Err(Error::HttpError(res)) => res,
            Err(e) => return Err(transport(e)),
        };
        let res = res.into_memory().await.map_err(|e| RefreshError::Transport(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().unwrap_or_default();
            return Err(RefreshError::Rejected { status, body });
        }
        res.json().map_err(|e| RefreshError::Malformed(e.to_string()))
    }

    fn end_session(&self, cause: &RefreshError) {
        warn!(error = %cause, redirect = %self.config.login_redirect, "session ended");
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "unable to clear token store");
        }
        if let Some(callback) = &self.on_session_end {
            callback(LoginRedirect {
                location: self.config.login_redirect.clone(),
            });
        }
    }
}

#[async_trait]
impl Middleware for BearerAuth {
    async fn handle(&self, request: InMemoryRequest, next: Next<'_>) -> Result<Response> {
        let token = self.store.get(TokenSlot::Access);
        let res = next.run(authorize(request.clone(), token.as_deref())?).await;
        if !is_unauthorized(&res) {
            return res;
        }
        debug!(method = %request.method, url = %request.uri, "access token rejected");
        drop(res);
        let token = self.recover(next).await?;
        // Second attempt. Whatever comes back, 401 included, goes to the caller.
        next.run(request.bearer_auth(&token)?).await
    }
}
