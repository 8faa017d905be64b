//! Request guard for dashboard routes.
//!
//! Runs before any protected page renders. The decision is local: the token
//! from the `token` cookie is verified against the shared signing secret and
//! never sent to the backend.

mod middleware;
mod route;

pub use middleware::{GuardState, require_session};
pub use route::DashboardScope;

use std::collections::HashSet;
use std::fmt;

use crate::jwt::{JwtConfig, Role, SessionClaims};

/// Which roles may open a dashboard.
#[derive(Debug, Clone)]
pub struct GuardPolicy {
    allowed_roles: HashSet<Role>,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self::new(Role::ALL)
    }
}

impl GuardPolicy {
    pub fn new(allowed_roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            allowed_roles: allowed_roles.into_iter().collect(),
        }
    }

    pub fn allows(&self, role: Role) -> bool {
        self.allowed_roles.contains(&role)
    }
}

/// Why a request was sent back to login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    MissingToken,
    InvalidToken,
    RoleNotAllowed,
    TenantMismatch,
}

impl RedirectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedirectReason::MissingToken => "missing_token",
            RedirectReason::InvalidToken => "invalid_token",
            RedirectReason::RoleNotAllowed => "role_not_allowed",
            RedirectReason::TenantMismatch => "tenant_mismatch",
        }
    }
}

impl fmt::Display for RedirectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Path is not protected
    PassThrough,
    /// Verified session allowed onto the dashboard
    Allow(SessionClaims),
    /// Send the user to `location` (a login URL carrying `from`)
    Redirect {
        location: String,
        reason: RedirectReason,
    },
}

/// Decide whether a request for `path` holding `token` may proceed.
pub fn evaluate(
    path: &str,
    token: Option<&str>,
    jwt: &JwtConfig,
    policy: &GuardPolicy,
) -> GuardDecision {
    let Some(scope) = DashboardScope::from_path(path) else {
        return GuardDecision::PassThrough;
    };

    let redirect = |reason| GuardDecision::Redirect {
        location: login_redirect(&scope, path),
        reason,
    };

    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return redirect(RedirectReason::MissingToken);
    };

    let claims = match jwt.verify_session_token(token) {
        Ok(claims) => claims,
        Err(_) => return redirect(RedirectReason::InvalidToken),
    };

    if !policy.allows(claims.role) {
        return redirect(RedirectReason::RoleNotAllowed);
    }

    if let (Some(path_slug), Some(claim_slug)) = (scope.tenant_slug(), claims.tenant_slug.as_deref())
    {
        if path_slug != claim_slug {
            return redirect(RedirectReason::TenantMismatch);
        }
    }

    GuardDecision::Allow(claims)
}

/// Login URL for the scope with the originally requested path as `from`.
pub fn login_redirect(scope: &DashboardScope, from: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("from", from)
        .finish();
    format!("{}?{}", scope.login_path(), query)
}
