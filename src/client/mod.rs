//! Gated API client for the restaurant backend.
//!
//! Every authenticated call goes through [`ApiClient::request`], which attaches
//! the stored access token and tenant context, and on a 401/403 performs one
//! refresh (shared between concurrent callers) followed by exactly one retry.
//! Unrecoverable auth failures clear the session and, when a [`Navigator`] is
//! attached, send the user to the login page.

mod endpoints;
mod error;

pub use endpoints::{AuthResponse, DashboardOverview};
pub(crate) use endpoints::is_rejected_login;
pub use error::ClientError;

use reqwest::{Method, StatusCode, header::CONTENT_TYPE};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::guard::DashboardScope;
use crate::session::{SessionCredential, TokenStore};
use error::{error_message, is_subscription_message};

/// Header carrying the tenant a request addresses.
pub const TENANT_HEADER: &str = "x-tenant-slug";

/// Backend endpoint exchanging a refresh token for a new pair.
pub const REFRESH_PATH: &str = "/api/auth/refresh";

/// Page the navigator is sent to when the session cannot be recovered.
pub const LOGIN_PAGE: &str = "/login";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The interactive (browser-like) context a client runs in.
///
/// A client built without a navigator behaves as a non-browser caller: no
/// tenant is inferred from a location and auth failures are only returned.
pub trait Navigator: Send + Sync {
    /// Path of the page the user is currently on.
    fn current_path(&self) -> Option<String>;

    /// Client-side navigation to `path`.
    fn redirect(&self, path: &str);
}

/// Authenticated HTTP client with refresh-and-retry.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    base: String,
    store: Arc<dyn TokenStore>,
    navigator: Option<Arc<dyn Navigator>>,
    tenant: Option<String>,
    // Held for the whole refresh exchange so concurrent 401s share one attempt.
    refresh_lock: Mutex<()>,
}

pub struct ApiClientBuilder {
    base: Url,
    store: Arc<dyn TokenStore>,
    navigator: Option<Arc<dyn Navigator>>,
    tenant: Option<String>,
    timeout: Duration,
    http: Option<reqwest::Client>,
}

impl ApiClientBuilder {
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Fix the tenant instead of deriving it from the navigator's location.
    pub fn tenant(mut self, slug: impl Into<String>) -> Self {
        self.tenant = Some(slug.into());
        self
    }

    /// Ignored when a shared HTTP client is supplied.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reuse an existing connection pool.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn build(self) -> Result<ApiClient, ClientError> {
        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder().timeout(self.timeout).build()?,
        };

        Ok(ApiClient {
            inner: Arc::new(Inner {
                http,
                base: self.base.as_str().trim_end_matches('/').to_string(),
                store: self.store,
                navigator: self.navigator,
                tenant: self.tenant,
                refresh_lock: Mutex::new(()),
            }),
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

fn is_auth_status(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

impl ApiClient {
    pub fn builder(base: Url, store: Arc<dyn TokenStore>) -> ApiClientBuilder {
        ApiClientBuilder {
            base,
            store,
            navigator: None,
            tenant: None,
            timeout: DEFAULT_TIMEOUT,
            http: None,
        }
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.inner.store
    }

    /// Tenant the next request will address, if any.
    pub fn tenant_slug(&self) -> Option<String> {
        if let Some(tenant) = &self.inner.tenant {
            return Some(tenant.clone());
        }
        let path = self.inner.navigator.as_ref()?.current_path()?;
        DashboardScope::from_path(&path)?
            .tenant_slug()
            .map(str::to_string)
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(Url::parse(&format!("{}{}", self.inner.base, path))?)
    }

    pub async fn get(&self, path: &str) -> Result<Option<Value>, ClientError> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Option<Value>, ClientError> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Option<Value>, ClientError> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Result<Option<Value>, ClientError> {
        self.request(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Option<Value>, ClientError> {
        self.request(Method::DELETE, path, None).await
    }

    /// Like [`ApiClient::request`], decoding the body into `T`.
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<T>, ClientError> {
        let value = self.request(method, path, body).await?;
        Ok(value.map(serde_json::from_value::<T>).transpose()?)
    }

    /// Perform an authenticated call. Returns `None` for 204 or an empty body.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, ClientError> {
        let url = self.url(path)?;
        let tenant = self.tenant_slug();
        let mut sent = self.inner.store.get_credential();
        let token = sent.as_ref().map(|c| c.token.clone());

        let mut response = self
            .send(&method, &url, body, token.as_deref(), tenant.as_deref())
            .await?;

        let refreshable = sent.clone().filter(|c| c.refresh_token.is_some());
        if let Some(stale) = refreshable.filter(|_| is_auth_status(response.status())) {
            debug!(path = %path, status = %response.status(), "Access token rejected");
            let fresh = self.refresh_session(&stale).await?;
            response = self
                .send(&method, &url, body, Some(&fresh.token), tenant.as_deref())
                .await?;
            sent = Some(fresh);
        }

        self.read_response(response, sent.as_ref()).await
    }

    async fn send(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&Value>,
        token: Option<&str>,
        tenant: Option<&str>,
    ) -> Result<reqwest::Response, ClientError> {
        let mut request = self
            .inner
            .http
            .request(method.clone(), url.clone())
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(tenant) = tenant {
            request = request.header(TENANT_HEADER, tenant);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// `sent` is the credential the request went out with.
    async fn read_response(
        &self,
        response: reqwest::Response,
        sent: Option<&SessionCredential>,
    ) -> Result<Option<Value>, ClientError> {
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let details = serde_json::from_slice::<Value>(&bytes).ok();
            let message = error_message(details.as_ref(), "Request failed");

            if is_subscription_message(&message) {
                return Err(ClientError::SubscriptionInactive(message));
            }
            if is_auth_status(status) {
                return Err(self.expire_session(sent, Some(status), message));
            }
            return Err(ClientError::Request {
                status,
                message,
                details,
            });
        }

        if status == StatusCode::NO_CONTENT || bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Obtain a fresh credential after `stale` was rejected.
    ///
    /// Callers queue on the refresh lock; whoever finds the store still
    /// holding `stale` performs the exchange, the rest reuse its outcome.
    async fn refresh_session(
        &self,
        stale: &SessionCredential,
    ) -> Result<SessionCredential, ClientError> {
        let _guard = self.inner.refresh_lock.lock().await;

        let Some(current) = self.inner.store.get_credential() else {
            return Err(self.expire_session(None, None, "Session expired"));
        };
        if current.token != stale.token {
            debug!("Session already refreshed by a concurrent request");
            return Ok(current);
        }
        let Some(refresh_token) = current.refresh_token.clone() else {
            return Err(self.expire_session(Some(&current), None, "Session expired"));
        };

        info!("Refreshing session");
        let fresh = match self.exchange_refresh_token(&refresh_token).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(error = %e, "Session refresh failed");
                return Err(self.expire_session(Some(&current), e.status(), "Session expired"));
            }
        };

        if self.inner.store.replace_if(&current, fresh.clone()) {
            info!("Session refreshed");
            return Ok(fresh);
        }

        // A newer login replaced the session while the refresh was in flight
        debug!("Discarding refresh result superseded by a newer session");
        self.inner
            .store
            .get_credential()
            .ok_or_else(|| self.expire_session(None, None, "Session expired"))
    }

    async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<SessionCredential, ClientError> {
        let response = self
            .inner
            .http
            .post(self.url(REFRESH_PATH)?)
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::auth_expired(Some(status), "Refresh failed"));
        }

        let bytes = response.bytes().await?;
        let body: RefreshResponse = serde_json::from_slice(&bytes)?;
        Ok(SessionCredential::new(
            body.token,
            body.refresh_token.or_else(|| Some(refresh_token.to_string())),
        ))
    }

    /// End the session `expected` belongs to and build the error.
    ///
    /// The store is cleared and the navigator sent to login only while the
    /// store still holds `expected` (or nothing); a session written by a
    /// newer login in the meantime is left alone.
    fn expire_session(
        &self,
        expected: Option<&SessionCredential>,
        status: Option<StatusCode>,
        message: impl Into<String>,
    ) -> ClientError {
        let ended = match expected {
            Some(expected) => self.inner.store.clear_if(expected),
            None => self.inner.store.get_credential().is_none(),
        };

        if !ended {
            debug!("Newer session present, keeping it");
        } else if let Some(navigator) = &self.inner.navigator {
            info!("Session ended, redirecting to login");
            navigator.redirect(LOGIN_PAGE);
        }
        ClientError::auth_expired(status, message)
    }
}
