//! Session token claims, signature verification and unverified peeking.
//!
//! Access tokens are issued by the backend and signed with a shared HS256
//! secret. The guard only trusts claims returned by
//! [`JwtConfig::verify_session_token`]; [`peek_claims`] skips the signature
//! check and is only meant for display.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Roles a backend-issued token can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    RestaurantAdmin,
    Staff,
    Admin,
    Manager,
    Cashier,
    KitchenStaff,
    ProductManager,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::SuperAdmin,
        Role::RestaurantAdmin,
        Role::Staff,
        Role::Admin,
        Role::Manager,
        Role::Cashier,
        Role::KitchenStaff,
        Role::ProductManager,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::RestaurantAdmin => "restaurant_admin",
            Role::Staff => "staff",
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Cashier => "cashier",
            Role::KitchenStaff => "kitchen_staff",
            Role::ProductManager => "product_manager",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("unknown role: {}", s))
    }
}

/// Claims carried by a session access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    /// Subject (backend user id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub role: Role,
    /// Restaurant the token is scoped to, absent for platform-wide tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_slug: Option<String>,
    /// Issued at (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Signing and verification keys for session tokens.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Sign a session token valid for `ttl_secs` from now.
    /// The backend is the real issuer; this is used for fixtures and local setups.
    pub fn issue_session_token(
        &self,
        role: Role,
        tenant_slug: Option<&str>,
        sub: Option<&str>,
        ttl_secs: u64,
    ) -> Result<String, JwtError> {
        let now = unix_now()?;

        let claims = SessionClaims {
            sub: sub.map(str::to_string),
            role,
            tenant_slug: tenant_slug.map(str::to_string),
            iat: Some(now),
            exp: now + ttl_secs,
        };

        self.sign(&claims)
    }

    /// Sign arbitrary claims as-is.
    pub fn sign(&self, claims: &SessionClaims) -> Result<String, JwtError> {
        jsonwebtoken::encode(&Header::default(), claims, &self.encoding_key)
            .map_err(JwtError::Encoding)
    }

    /// Verify signature and expiry, then decode the claims.
    pub fn verify_session_token(&self, token: &str) -> Result<SessionClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;

        let token_data =
            jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &validation)
                .map_err(JwtError::Decoding)?;

        Ok(token_data.claims)
    }
}

/// Decode the payload segment WITHOUT verifying the signature or expiry.
/// Only for display hints; never for authorization.
pub fn peek_claims(token: &str) -> Option<SessionClaims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn unix_now() -> Result<u64, JwtError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| JwtError::TimeError)
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Bad signature, expired, malformed, or unknown role
    Decoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
}

impl fmt::Display for JwtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            JwtError::TimeError => write!(f, "System time error"),
        }
    }
}

impl std::error::Error for JwtError {}
