//! Bearer authentication with a coordinated refresh-token retry.
//!
//! [`BearerAuth`] is a middleware. It reads tokens from a [`TokenStore`] and uses a
//! [`RefreshCoordinator`] so that concurrent 401s trigger exactly one refresh call.
pub use coordinator::{PendingRequest, RefreshCoordinator, RefreshLeader, RefreshOutcome, RefreshState, Ticket};
pub use middleware::{BearerAuth, SessionEndCallback};
pub use refresh::{LoginRedirect, RefreshConfig, RefreshError, RefreshRequest, RefreshResponse, DEFAULT_LOGIN_REDIRECT, DEFAULT_REFRESH_ENDPOINT};
pub use store::{FileTokenStore, MemoryTokenStore, TokenSlot, TokenStore};

mod coordinator;
mod middleware;
mod refresh;
mod store;
