//! Axum extractors for the identity gate.
//!
//! `RequestIdentity` authenticates the tenant and resolves the user in one
//! pass, so handlers declare the gate as a parameter and receive a typed
//! context or a short-circuited error response.

use crate::api::error::ApiError;
use crate::auth::user::{authenticate_bearer, AuthedUser, ExternalUser};
use crate::auth::tenant::authenticate_tenant;
use crate::error::EngineError;
use crate::server::state::AppState;
use crate::types::Tenant;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

const TENANT_ID_HEADER: &str = "x-tenant-id";
const TENANT_SECRET_HEADER: &str = "x-tenant-secret";
const EXTERNAL_ID_HEADER: &str = "x-external-user-id";
const EXTERNAL_EMAIL_HEADER: &str = "x-external-user-email";
const EXTERNAL_NAME_HEADER: &str = "x-external-user-name";

/// Bearer token extracted from `Authorization: Bearer <token>`.
///
/// A present but malformed header is rejected outright; it never falls
/// through to the external-user path.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

impl BearerToken {
    fn from_parts(parts: &Parts) -> Result<Option<Self>, ApiError> {
        let Some(value) = parts.headers.get("authorization") else {
            return Ok(None);
        };

        let raw = value
            .to_str()
            .map_err(|_| ApiError::unauthorized("authorization header is not valid UTF-8"))?;

        let token = raw.strip_prefix("Bearer ").ok_or_else(|| {
            ApiError::unauthorized("invalid authorization format, expected 'Bearer <token>'")
        })?;

        if token.is_empty() {
            return Err(ApiError::unauthorized("empty bearer token"));
        }

        Ok(Some(Self(token.to_string())))
    }
}

/// The authenticated request context: which tenant, and (when already
/// derivable from headers) which user.
#[derive(Debug, Clone)]
pub struct RequestIdentity {
    /// The authenticated tenant.
    pub tenant: Tenant,
    /// The user, when a bearer token or external-user headers were present.
    pub user: Option<AuthedUser>,
}

impl RequestIdentity {
    /// Finalize the user identity, falling back to body-declared external
    /// user fields.
    ///
    /// # Errors
    ///
    /// Returns `Authentication` when no user identity is available.
    pub fn require_user(&self, body_external: Option<&ExternalUser>) -> Result<AuthedUser, EngineError> {
        if let Some(user) = &self.user {
            return Ok(user.clone());
        }
        if let Some(external) = body_external {
            return AuthedUser::from_external(&self.tenant.id, external);
        }
        Err(EngineError::Authentication(
            "no user identity: provide a bearer token or external user fields".to_string(),
        ))
    }
}

fn header_string(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for RequestIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let tenant_id = header_string(parts, TENANT_ID_HEADER)
            .ok_or_else(|| ApiError::unauthorized("missing x-tenant-id header"))?;
        let secret = header_string(parts, TENANT_SECRET_HEADER)
            .ok_or_else(|| ApiError::unauthorized("missing x-tenant-secret header"))?;
        let origin = header_string(parts, "origin");

        let tenant = authenticate_tenant(
            state.store.as_ref(),
            &state.auth,
            &tenant_id,
            &secret,
            origin.as_deref(),
        )
        .await?;

        // User modes, in order: bearer token, then external-user headers.
        // Body-declared external users resolve later via `require_user`.
        let user = match BearerToken::from_parts(parts)? {
            Some(bearer) => Some(
                authenticate_bearer(
                    state.store.as_ref(),
                    &state.auth.user_token_secret,
                    &bearer.0,
                )
                .await?,
            ),
            None => match header_string(parts, EXTERNAL_ID_HEADER) {
                Some(id) => {
                    let external = ExternalUser {
                        id,
                        email: header_string(parts, EXTERNAL_EMAIL_HEADER),
                        name: header_string(parts, EXTERNAL_NAME_HEADER),
                    };
                    Some(AuthedUser::from_external(&tenant.id, &external)?)
                }
                None => None,
            },
        };

        Ok(Self { tenant, user })
    }
}
