//! Typed client for the personal-finance backend.
//!
//! [`ApiClient`] keeps two middleware stacks. Login and registration go through a public stack
//! with no credentials, everything else goes through [`BearerAuth`], so a rejected password never
//! starts a token refresh.
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

pub use models::*;
pub use redirect::{OAuthRedirect, RedirectTarget};
pub use validate::{Validate, ValidationError};

use models::{LoginPayload, ReportQuery};

use crate::auth::{BearerAuth, LoginRedirect, MemoryTokenStore, RefreshConfig, RefreshCoordinator, TokenSlot, TokenStore};
use crate::auth::{DEFAULT_LOGIN_REDIRECT, DEFAULT_REFRESH_ENDPOINT};
use crate::middleware::{Logger, Middleware};
use crate::{Client, Error, RequestBuilder, ResponseExt, Result};

mod models;
mod redirect;
mod validate;

pub const DEFAULT_BASE_URL: &str = "https://koink-backend-production.up.railway.app";

#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    pub refresh_path: String,
    pub login_redirect: String,
    pub refresh_timeout: Option<Duration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            refresh_path: DEFAULT_REFRESH_ENDPOINT.to_string(),
            login_redirect: DEFAULT_LOGIN_REDIRECT.to_string(),
            refresh_timeout: None,
        }
    }
}

impl ApiConfig {
    /// Defaults, overridden by `BUDGET_API_URL` and `BUDGET_REFRESH_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup("BUDGET_API_URL").filter(|u| !u.is_empty()) {
            config = config.base_url(&url);
        }
        if let Some(secs) = lookup("BUDGET_REFRESH_TIMEOUT_SECS") {
            match secs.trim().parse::<u64>() {
                Ok(secs) => config.refresh_timeout = Some(Duration::from_secs(secs)),
                Err(e) => warn!(value = %secs, error = %e, "ignoring BUDGET_REFRESH_TIMEOUT_SECS"),
            }
        }
        config
    }

    pub fn base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = Some(timeout);
        self
    }

    fn refresh_config(&self) -> RefreshConfig {
        let config = RefreshConfig::new(&self.refresh_path).login_redirect(&self.login_redirect);
        match self.refresh_timeout {
            Some(timeout) => config.timeout(timeout),
            None => config,
        }
    }
}

pub struct ApiClientBuilder {
    config: ApiConfig,
    store: Option<Arc<dyn TokenStore>>,
    on_session_end: Option<Arc<dyn Fn(LoginRedirect) + Send + Sync>>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl ApiClientBuilder {
    /// Defaults to a [`MemoryTokenStore`].
    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Called once per failed refresh, after the tokens were purged.
    pub fn on_session_end(mut self, callback: impl Fn(LoginRedirect) + Send + Sync + 'static) -> Self {
        self.on_session_end = Some(Arc::new(callback));
        self
    }

    /// Appended to both stacks, after authentication and logging.
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn build(self) -> ApiClient {
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryTokenStore::new()));
        let mut auth = BearerAuth::new(store.clone(), self.config.refresh_config());
        if let Some(callback) = self.on_session_end {
            auth = auth.on_session_end(move |redirect| callback(redirect));
        }
        let coordinator = auth.coordinator();

        let mut public = Client::new().base_url(&self.config.base_url).with_middleware(Logger);
        let mut authed = Client::new()
            .base_url(&self.config.base_url)
            .with_middleware(auth)
            .with_middleware(Logger);
        for middleware in self.middlewares {
            public = public.with_shared_middleware(middleware.clone());
            authed = authed.with_shared_middleware(middleware);
        }
        ApiClient {
            config: self.config,
            store,
            coordinator,
            public,
            authed,
        }
    }
}

#[derive(Debug)]
pub struct ApiClient {
    config: ApiConfig,
    store: Arc<dyn TokenStore>,
    coordinator: Arc<RefreshCoordinator>,
    public: Client,
    authed: Client,
}

async fn fetch<T: DeserializeOwned>(request: RequestBuilder<'_>) -> Result<T> {
    let res = request.send().await?.error_for_status()?;
    Ok(res.json().await?)
}

async fn execute(request: RequestBuilder<'_>) -> Result<()> {
    request.send().await?.error_for_status()?;
    Ok(())
}

impl ApiClient {
    pub fn builder(config: ApiConfig) -> ApiClientBuilder {
        ApiClientBuilder {
            config,
            store: None,
            on_session_end: None,
            middlewares: Vec::new(),
        }
    }

    pub fn new(config: ApiConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// The authenticated client, for endpoints without a typed wrapper.
    pub fn client(&self) -> &Client {
        &self.authed
    }

    // Session

    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse> {
        credentials.validate()?;
        let payload: LoginPayload = fetch(self.public.post("/api/auth/login").json(credentials)).await?;
        let login = payload
            .into_login()
            .ok_or_else(|| Error::custom("login response is missing token or name"))?;
        self.store.set(TokenSlot::Access, &login.token)?;
        match &login.refresh_token {
            Some(refresh) => self.store.set(TokenSlot::Refresh, refresh)?,
            None => self.store.remove(TokenSlot::Refresh)?,
        }
        info!(name = %login.name, "logged in");
        Ok(login)
    }

    pub async fn register(&self, registration: &Registration) -> Result<()> {
        registration.validate()?;
        execute(self.public.post("/api/auth/register").json(registration)).await?;
        info!(email = %registration.email, "registered");
        Ok(())
    }

    pub fn logout(&self) -> Result<()> {
        self.store.clear()?;
        info!("logged out");
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.get(TokenSlot::Access).is_some_and(|t| !t.is_empty())
    }

    /// Where to send the browser to sign in with Google.
    pub fn google_login_url(&self) -> String {
        format!("{}/oauth2/authorization/google", self.config.base_url.trim_end_matches('/'))
    }

    /// Finish an OAuth sign-in from the url the provider redirected to. Stores the token it carries.
    pub fn complete_oauth_redirect(&self, url: &str) -> Result<RedirectTarget> {
        let redirect = OAuthRedirect::parse(url)?;
        if let Some(token) = redirect.token() {
            self.store.set(TokenSlot::Access, token)?;
        }
        let target = redirect.target();
        debug!(?target, "completed oauth redirect");
        Ok(target)
    }

    // Profile and dashboard

    pub async fn profile(&self) -> Result<User> {
        fetch(self.authed.get("/api/user/me")).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<()> {
        execute(self.authed.put("/api/user/me").json(update)).await
    }

    pub async fn dashboard(&self) -> Result<Dashboard> {
        fetch(self.authed.get("/api/dashboard")).await
    }

    // Transactions

    pub async fn transactions(&self) -> Result<Vec<Transaction>> {
        fetch(self.authed.get("/api/transactions")).await
    }

    /// The `n` newest transactions. The server lists oldest first.
    pub async fn recent_transactions(&self, n: usize) -> Result<Vec<Transaction>> {
        let transactions = self.transactions().await?;
        Ok(transactions.into_iter().rev().take(n).collect())
    }

    pub async fn create_transaction(&self, transaction: &NewTransaction) -> Result<()> {
        execute(self.authed.post("/api/transactions").json(transaction)).await
    }

    pub async fn update_transaction(&self, id: i64, transaction: &NewTransaction) -> Result<()> {
        execute(self.authed.put(&format!("/api/transactions/{id}")).json(transaction)).await
    }

    pub async fn delete_transaction(&self, id: i64) -> Result<()> {
        execute(self.authed.delete(&format!("/api/transactions/{id}"))).await
    }

    // Categories

    pub async fn categories(&self) -> Result<Vec<Category>> {
        fetch(self.authed.get("/api/categories")).await
    }

    pub async fn create_category(&self, category: &NewCategory) -> Result<()> {
        category.validate()?;
        execute(self.authed.post("/api/categories").json(category)).await
    }

    // Budgets

    pub async fn budgets(&self) -> Result<Vec<Budget>> {
        fetch(self.authed.get("/api/budgets")).await
    }

    pub async fn active_budgets(&self) -> Result<Vec<ActiveBudget>> {
        fetch(self.authed.get("/api/budgets/active")).await
    }

    pub async fn create_budget(&self, budget: &NewBudget) -> Result<()> {
        execute(self.authed.post("/api/budgets").json(budget)).await
    }

    pub async fn update_budget(&self, id: i64, budget: &NewBudget) -> Result<()> {
        execute(self.authed.put(&format!("/api/budgets/{id}")).json(budget)).await
    }

    pub async fn delete_budget(&self, id: i64) -> Result<()> {
        execute(self.authed.delete(&format!("/api/budgets/{id}"))).await
    }

    // Reports

    /// Spending per category for one month (1 for January).
    pub async fn monthly_report(&self, month: u32, year: i32) -> Result<Vec<CategorySpending>> {
        let query = ReportQuery { month: Some(month), year };
        fetch(self.authed.get("/api/reports/monthly").set_query(query)).await
    }

    /// Spending per month for one year.
    pub async fn yearly_report(&self, year: i32) -> Result<Vec<MonthlySpending>> {
        let query = ReportQuery { month: None, year };
        fetch(self.authed.get("/api/reports/yearly").set_query(query)).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use http::{Method, StatusCode};
    use serde_json::json;

    use super::*;
    use crate::auth::RefreshError;
    use crate::middleware::Mock;
    use crate::InMemoryBody;

    fn client(mock: &Mock, store: Arc<MemoryTokenStore>) -> ApiClient {
        ApiClient::builder(ApiConfig::default().base_url("http://api.test"))
            .token_store(store)
            .middleware(Arc::new(mock.clone()))
            .build()
    }

    fn credentials() -> Credentials {
        Credentials {
            email: "ana@example.com".to_string(),
            password: "123456".to_string(),
        }
    }

    #[tokio::test]
    async fn test_login_stores_tokens() {
        let mock = Mock::new().on(Method::POST, "/api/auth/login", |_req| async {
            Mock::json(StatusCode::OK, json!({"token": "T1", "name": "Ana", "refreshToken": "R1"}))
        });
        let store = Arc::new(MemoryTokenStore::new());
        let api = client(&mock, store.clone());
        assert!(!api.is_authenticated());

        let login = api.login(&credentials()).await.unwrap();
        assert_eq!(login.name, "Ana");
        assert!(api.is_authenticated());
        assert_eq!(store.get(TokenSlot::Refresh).as_deref(), Some("R1"));

        let sent = &mock.requests()[0];
        assert_eq!(sent.authorization(), None);
        assert_eq!(sent.body, InMemoryBody::Json(json!({"email": "ana@example.com", "password": "123456"})));
    }

    #[tokio::test]
    async fn test_rejected_login_does_not_refresh() {
        let mock = Mock::new().on(Method::POST, "/api/auth/login", |_req| async { Mock::status(StatusCode::UNAUTHORIZED) });
        let store = Arc::new(MemoryTokenStore::with_tokens("OLD", "R1"));
        let api = client(&mock, store.clone());

        let err = api.login(&credentials()).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(mock.count(Method::POST, "/api/auth/refresh-token"), 0);
        assert_eq!(store.get(TokenSlot::Refresh).as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn test_login_requires_token_and_name() {
        let mock = Mock::new().on(Method::POST, "/api/auth/login", |_req| async { Mock::json(StatusCode::OK, json!({"token": "T1"})) });
        let api = client(&mock, Arc::new(MemoryTokenStore::new()));
        assert!(matches!(api.login(&credentials()).await, Err(Error::Custom(_))));
        assert!(!api.is_authenticated());
    }

    #[tokio::test]
    async fn test_invalid_forms_are_not_sent() {
        let mock = Mock::new();
        let api = client(&mock, Arc::new(MemoryTokenStore::new()));
        let bad = Credentials {
            password: "123".to_string(),
            ..credentials()
        };
        assert!(matches!(api.login(&bad).await, Err(Error::Validation(e)) if e.field == "password"));
        let category = NewCategory {
            name: "F".to_string(),
            kind: TransactionType::Expense,
        };
        assert!(matches!(api.create_category(&category).await, Err(Error::Validation(_))));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_register() {
        let mock = Mock::new().on(Method::POST, "/api/auth/register", |_req| async { Mock::status(StatusCode::CREATED) });
        let api = client(&mock, Arc::new(MemoryTokenStore::new()));
        let registration = Registration {
            email: "ana@example.com".to_string(),
            password: "123456".to_string(),
            name: "Ana".to_string(),
            currency: "EUR".to_string(),
            avatar: "/avatars/avatar2.png".to_string(),
        };
        api.register(&registration).await.unwrap();
        assert_eq!(mock.count(Method::POST, "/api/auth/register"), 1);
    }

    #[tokio::test]
    async fn test_recent_transactions_newest_first() {
        let mock = Mock::new().on(Method::GET, "/api/transactions", |_req| async {
            let txs: Vec<_> = (1..=4)
                .map(|id| json!({"id": id, "description": "tx", "amount": 1.0, "date": "2024-05-01", "type": "INCOME"}))
                .collect();
            Mock::json(StatusCode::OK, json!(txs))
        });
        let api = client(&mock, Arc::new(MemoryTokenStore::with_tokens("T1", "R1")));
        let recent = api.recent_transactions(3).await.unwrap();
        assert_eq!(recent.iter().map(|t| t.id).collect::<Vec<_>>(), vec![4, 3, 2]);
        assert_eq!(mock.requests()[0].authorization(), Some("Bearer T1"));
    }

    #[tokio::test]
    async fn test_report_queries() {
        let mock = Mock::new()
            .on(Method::GET, "/api/reports/monthly", |_req| async {
                Mock::json(StatusCode::OK, json!([{"categoryName": "Food", "totalSpent": 120.5}]))
            })
            .on(Method::GET, "/api/reports/yearly", |_req| async { Mock::json(StatusCode::OK, json!([{"month": 1, "totalSpent": 80}])) });
        let api = client(&mock, Arc::new(MemoryTokenStore::with_tokens("T1", "R1")));

        let monthly = api.monthly_report(5, 2024).await.unwrap();
        assert_eq!(monthly[0].category_name, "Food");
        let yearly = api.yearly_report(2024).await.unwrap();
        assert_eq!(yearly[0].total_spent, 80.0);

        let queries: Vec<_> = mock.requests().iter().map(|r| r.uri.query().unwrap_or("").to_string()).collect();
        assert_eq!(queries, vec!["month=5&year=2024", "year=2024"]);
    }

    #[tokio::test]
    async fn test_crud_paths() {
        let mock = Mock::new()
            .on(Method::PUT, "/api/budgets/9", |_req| async { Mock::status(StatusCode::OK) })
            .on(Method::DELETE, "/api/transactions/4", |_req| async { Mock::status(StatusCode::NO_CONTENT) })
            .on(Method::DELETE, "/api/budgets/9", |_req| async { Mock::status(StatusCode::NOT_FOUND) });
        let api = client(&mock, Arc::new(MemoryTokenStore::with_tokens("T1", "R1")));
        let budget = NewBudget {
            category_id: 2,
            limit_amount: 100.0,
            period: BudgetPeriod::Monthly,
            start_date: "2024-05-01".to_string(),
        };
        api.update_budget(9, &budget).await.unwrap();
        api.delete_transaction(4).await.unwrap();
        let err = api.delete_budget(9).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_expired_session_redirects_to_login() {
        let mock = Mock::new()
            .on(Method::GET, "/api/dashboard", |_req| async { Mock::status(StatusCode::UNAUTHORIZED) })
            .on(Method::POST, "/api/auth/refresh-token", |_req| async { Mock::status(StatusCode::FORBIDDEN) });
        let redirects = Arc::new(Mutex::new(Vec::new()));
        let sink = redirects.clone();
        let store = Arc::new(MemoryTokenStore::with_tokens("T1", "R1"));
        let api = ApiClient::builder(ApiConfig::default().base_url("http://api.test"))
            .token_store(store)
            .on_session_end(move |r| sink.lock().unwrap().push(r.location))
            .middleware(Arc::new(mock.clone()))
            .build();

        let err = api.dashboard().await.unwrap_err();
        assert!(matches!(err, Error::Refresh(RefreshError::Rejected { status, .. }) if status == StatusCode::FORBIDDEN));
        assert!(!api.is_authenticated());
        assert_eq!(*redirects.lock().unwrap(), vec!["/login".to_string()]);
    }

    #[test]
    fn test_oauth_redirect_stores_token() {
        let api = client(&Mock::new(), Arc::new(MemoryTokenStore::new()));
        assert_eq!(api.complete_oauth_redirect("/oauth2/redirect").unwrap(), RedirectTarget::Login);
        assert!(!api.is_authenticated());
        assert_eq!(api.complete_oauth_redirect("/oauth2/redirect?token=G1&new=true").unwrap(), RedirectTarget::Welcome);
        assert_eq!(api.token_store().get(TokenSlot::Access).as_deref(), Some("G1"));
        assert_eq!(api.google_login_url(), "http://api.test/oauth2/authorization/google");
        api.logout().unwrap();
        assert!(!api.is_authenticated());
    }

    #[test]
    fn test_config_from_lookup() {
        let env = HashMap::from([
            ("BUDGET_API_URL", "http://localhost:8080/"),
            ("BUDGET_REFRESH_TIMEOUT_SECS", "10"),
        ]);
        let config = ApiConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config, ApiConfig::default().base_url("http://localhost:8080").refresh_timeout(Duration::from_secs(10)));
        assert_eq!(config.refresh_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.refresh_path, "/api/auth/refresh-token");

        let config = ApiConfig::from_lookup(|k| (k == "BUDGET_REFRESH_TIMEOUT_SECS").then(|| "soon".to_string()));
        assert_eq!(config, ApiConfig::default());
    }
}
