//! Backend endpoints: session issuance plus the admin/super pass-through calls.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use super::error::{error_message, is_subscription_message};
use super::{ApiClient, ClientError};
use crate::session::SessionCredential;

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REGISTER_PATH: &str = "/api/auth/register-restaurant";
pub const LOGOUT_PATH: &str = "/api/auth/logout";

/// Body returned by login and registration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Whatever else the backend sends (user, restaurant, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Headline numbers for the tenant dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub total_orders: u64,
    pub pending_orders: u64,
    pub revenue: f64,
    pub low_stock_items: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DashboardSummary {
    todays_orders_count: Option<u64>,
    todays_revenue: Option<f64>,
    low_stock_items: Option<Vec<Value>>,
}

impl From<DashboardSummary> for DashboardOverview {
    fn from(summary: DashboardSummary) -> Self {
        let orders = summary.todays_orders_count.unwrap_or(0);
        Self {
            total_orders: orders,
            // The backend has no live pending count yet; today's orders stand in.
            pending_orders: orders,
            revenue: summary.todays_revenue.unwrap_or(0.0),
            low_stock_items: summary.low_stock_items.unwrap_or_default(),
        }
    }
}

fn segment(id: &str) -> String {
    url::form_urlencoded::byte_serialize(id.as_bytes()).collect()
}

impl ApiClient {
    // =========================================================================
    // Session issuance
    // =========================================================================

    /// Log in and persist the issued credential.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let body = json!({ "email": email, "password": password });
        let auth = self.issue_session(LOGIN_PATH, &body, "Login failed").await?;
        info!("Logged in");
        Ok(auth)
    }

    /// Register a restaurant and persist the issued credential.
    pub async fn register_restaurant(&self, payload: &Value) -> Result<AuthResponse, ClientError> {
        let auth = self
            .issue_session(REGISTER_PATH, payload, "Registration failed")
            .await?;
        info!("Restaurant registered");
        Ok(auth)
    }

    /// Tell the backend the session is over. The local session is cleared
    /// whatever the backend answers.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = self.notify_logout().await;
        self.inner.store.clear();
        if let Err(e) = &result {
            warn!(error = %e, "Backend logout failed, local session cleared anyway");
        }
        result
    }

    async fn notify_logout(&self) -> Result<(), ClientError> {
        let Some(token) = self.inner.store.get_token() else {
            return Ok(());
        };
        let response = self
            .inner
            .http
            .post(self.url(LOGOUT_PATH)?)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let details = response.json::<Value>().await.ok();
        Err(ClientError::Request {
            status,
            message: error_message(details.as_ref(), "Logout failed"),
            details,
        })
    }

    /// Unauthenticated POST to an endpoint that issues a session.
    /// Never goes through refresh: a rejected login is just a failed login.
    async fn issue_session(
        &self,
        path: &str,
        body: &Value,
        fallback: &str,
    ) -> Result<AuthResponse, ClientError> {
        let response = self.inner.http.post(self.url(path)?).json(body).send().await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let details = serde_json::from_slice::<Value>(&bytes).ok();
            let message = error_message(details.as_ref(), fallback);
            if is_subscription_message(&message) {
                return Err(ClientError::SubscriptionInactive(message));
            }
            return Err(ClientError::Request {
                status,
                message,
                details,
            });
        }

        let auth: AuthResponse = serde_json::from_slice(&bytes)?;
        if let Some(token) = &auth.token {
            self.inner.store.set_credential(SessionCredential::new(
                token.clone(),
                auth.refresh_token.clone(),
            ));
        }
        Ok(auth)
    }

    // =========================================================================
    // Dashboard & reports (tenant)
    // =========================================================================

    pub async fn overview(&self) -> Result<DashboardOverview, ClientError> {
        let summary: Option<DashboardSummary> = self
            .request_as(reqwest::Method::GET, "/api/admin/dashboard/summary", None)
            .await?;
        Ok(summary.unwrap_or_default().into())
    }

    pub async fn sales_report(
        &self,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Option<Value>, ClientError> {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if let Some(from) = from {
            query.append_pair("from", from);
        }
        if let Some(to) = to {
            query.append_pair("to", to);
        }
        let query = query.finish();

        let path = if query.is_empty() {
            "/api/admin/reports/sales".to_string()
        } else {
            format!("/api/admin/reports/sales?{}", query)
        };
        self.get(&path).await
    }

    // =========================================================================
    // Menu
    // =========================================================================

    pub async fn menu(&self) -> Result<Option<Value>, ClientError> {
        self.get("/api/admin/menu").await
    }

    pub async fn create_category(&self, data: &Value) -> Result<Option<Value>, ClientError> {
        self.post("/api/admin/categories", data).await
    }

    pub async fn update_category(
        &self,
        id: &str,
        data: &Value,
    ) -> Result<Option<Value>, ClientError> {
        self.put(&format!("/api/admin/categories/{}", segment(id)), data)
            .await
    }

    pub async fn delete_category(&self, id: &str) -> Result<(), ClientError> {
        self.delete(&format!("/api/admin/categories/{}", segment(id)))
            .await?;
        Ok(())
    }

    pub async fn create_item(&self, data: &Value) -> Result<Option<Value>, ClientError> {
        self.post("/api/admin/items", data).await
    }

    pub async fn update_item(&self, id: &str, data: &Value) -> Result<Option<Value>, ClientError> {
        self.put(&format!("/api/admin/items/{}", segment(id)), data)
            .await
    }

    pub async fn delete_item(&self, id: &str) -> Result<(), ClientError> {
        self.delete(&format!("/api/admin/items/{}", segment(id)))
            .await?;
        Ok(())
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub async fn users(&self) -> Result<Option<Value>, ClientError> {
        self.get("/api/admin/users").await
    }

    pub async fn create_user(&self, data: &Value) -> Result<Option<Value>, ClientError> {
        self.post("/api/admin/users", data).await
    }

    pub async fn update_user(&self, id: &str, data: &Value) -> Result<Option<Value>, ClientError> {
        self.put(&format!("/api/admin/users/{}", segment(id)), data)
            .await
    }

    pub async fn delete_user(&self, id: &str) -> Result<(), ClientError> {
        self.delete(&format!("/api/admin/users/{}", segment(id)))
            .await?;
        Ok(())
    }

    // =========================================================================
    // Inventory & website settings (tenant)
    // =========================================================================

    pub async fn inventory(&self) -> Result<Option<Value>, ClientError> {
        self.get("/api/admin/inventory").await
    }

    pub async fn create_inventory_item(&self, data: &Value) -> Result<Option<Value>, ClientError> {
        self.post("/api/admin/inventory", data).await
    }

    pub async fn update_inventory_item(
        &self,
        id: &str,
        data: &Value,
    ) -> Result<Option<Value>, ClientError> {
        self.put(&format!("/api/admin/inventory/{}", segment(id)), data)
            .await
    }

    pub async fn website_settings(&self) -> Result<Option<Value>, ClientError> {
        self.get("/api/admin/website").await
    }

    pub async fn update_website_settings(
        &self,
        data: &Value,
    ) -> Result<Option<Value>, ClientError> {
        self.put("/api/admin/website", data).await
    }

    // =========================================================================
    // Super admin
    // =========================================================================

    pub async fn restaurants(&self) -> Result<Option<Value>, ClientError> {
        self.get("/api/super/restaurants").await
    }

    pub async fn create_restaurant(&self, data: &Value) -> Result<Option<Value>, ClientError> {
        self.post("/api/super/restaurants", data).await
    }

    pub async fn update_restaurant_subscription(
        &self,
        id: &str,
        data: &Value,
    ) -> Result<Option<Value>, ClientError> {
        self.patch(
            &format!("/api/super/restaurants/{}/subscription", segment(id)),
            data,
        )
        .await
    }
}

/// Whether a login failure should be shown as bad credentials.
pub(crate) fn is_rejected_login(err: &ClientError) -> bool {
    matches!(
        err.status(),
        Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST)
    )
}
