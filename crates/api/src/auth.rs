//! JWT authentication
//!
//! Bearer tokens carry the caller's identity and both role axes. The
//! extractor turns a verified token into the domain [`Actor`], which is
//! the authorization collaborator's answer to "who is calling".

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use talentry_shared::{PlatformRole, TenantRole};
use talentry_subscriptions::Actor;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub tenant_id: Option<Uuid>,
    pub platform_role: String,
    pub tenant_role: String,
    /// Expiry, unix seconds
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtManager {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }

    /// Issue a token. The API never logs users in itself; this exists for
    /// service-to-service tokens and test fixtures.
    pub fn issue(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::default(), claims, &self.encoding)
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Actor);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthenticated)?;
        let claims = state.jwt.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "Token verification failed");
            ApiError::Unauthenticated
        })?;

        Ok(AuthUser(Actor {
            user_id: claims.sub,
            tenant_id: claims.tenant_id,
            platform_role: PlatformRole::from_str_or_default(&claims.platform_role),
            tenant_role: TenantRole::from_str_or_default(&claims.tenant_role),
        }))
    }
}

/// An authenticated caller holding the platform-admin capability.
/// Rejects with 403 before the handler body runs.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub Actor);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(actor) = AuthUser::from_request_parts(parts, state).await?;
        if !actor.is_platform_admin() {
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(actor))
    }
}
