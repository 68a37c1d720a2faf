//! User identity: bearer tokens and tenant-declared external users.

use crate::error::{EngineError, Result};
use crate::providers::UserRepository;
use crate::types::{TenantId, UserId};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT claims carried by every user bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTokenClaims {
    /// Subject — user id.
    pub sub: String,
    /// Token type discriminator; must be `"user"`.
    #[serde(rename = "type")]
    pub token_type: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

/// Issue a signed HS256 user token (login collaborator / test path).
///
/// # Errors
///
/// Returns `Authentication` if encoding fails.
pub fn issue_user_token(user_id: &UserId, secret: &str, lifetime_secs: i64) -> Result<String> {
    let now = Utc::now().timestamp();
    let claims = UserTokenClaims {
        sub: user_id.as_str().to_string(),
        token_type: "user".to_string(),
        iat: now,
        exp: now + lifetime_secs,
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| EngineError::Authentication(format!("token encode failed: {e}")))
}

/// Decode and verify a user bearer token.
///
/// # Errors
///
/// Returns `Authentication` for bad signatures, expired tokens, and tokens
/// whose `type` claim is not `"user"`.
pub fn decode_user_token(token: &str, secret: &str) -> Result<UserTokenClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["sub", "exp"]);

    let claims = jsonwebtoken::decode::<UserTokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            EngineError::Authentication("user token expired".to_string())
        }
        _ => EngineError::Authentication(format!("invalid user token: {e}")),
    })?;

    if claims.token_type != "user" {
        return Err(EngineError::Authentication(
            "token is not a user token".to_string(),
        ));
    }

    Ok(claims)
}

/// Tenant-declared external user fields (headers or request body).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalUser {
    /// External identifier, unique within the declaring tenant.
    pub id: String,
    /// Email address, if the tenant shares it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name, if the tenant shares it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The user identity attached to a request after the gate.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthedUser {
    /// Opaque user id (namespaced for external identities).
    pub id: UserId,
    /// Email, when known.
    pub email: Option<String>,
    /// Display name, when known.
    pub name: Option<String>,
    /// Whether this identity was declared by the tenant rather than proven
    /// by a bearer token.
    pub external: bool,
}

impl AuthedUser {
    /// Build the identity for a tenant-declared external user.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the external id is empty.
    pub fn from_external(tenant_id: &TenantId, external: &ExternalUser) -> Result<Self> {
        if external.id.trim().is_empty() {
            return Err(EngineError::Validation(
                "external user id must not be empty".to_string(),
            ));
        }
        Ok(Self {
            id: UserId::external(tenant_id, external.id.trim()),
            email: external.email.clone(),
            name: external.name.clone(),
            external: true,
        })
    }
}

/// Resolve a bearer token to a registered, active user.
///
/// # Errors
///
/// - `Authentication` — invalid token, unknown user, or inactive user.
/// - `StoreUnavailable` — directory I/O failure.
pub async fn authenticate_bearer<R: UserRepository>(
    directory: &R,
    secret: &str,
    token: &str,
) -> Result<AuthedUser> {
    let claims = decode_user_token(token, secret)?;
    let user_id = UserId::new(claims.sub);

    let user = directory
        .user(&user_id)
        .await?
        .ok_or_else(|| EngineError::Authentication("unknown user".to_string()))?;

    if !user.active {
        return Err(EngineError::Authentication("user is inactive".to_string()));
    }

    Ok(AuthedUser {
        id: user.id,
        email: Some(user.email),
        name: user.name,
        external: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn token_round_trip() {
        let user_id = UserId::new("u-1");
        let token = issue_user_token(&user_id, SECRET, 60).unwrap();
        let claims = decode_user_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "u-1");
        assert_eq!(claims.token_type, "user");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_user_token(&UserId::new("u-1"), SECRET, 60).unwrap();
        assert!(matches!(
            decode_user_token(&token, "other-secret"),
            Err(EngineError::Authentication(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_user_token(&UserId::new("u-1"), SECRET, -120).unwrap();
        let err = decode_user_token(&token, SECRET).unwrap_err();
        assert!(matches!(err, EngineError::Authentication(msg) if msg.contains("expired")));
    }

    #[test]
    fn non_user_token_type_is_rejected() {
        let now = Utc::now().timestamp();
        let claims = UserTokenClaims {
            sub: "u-1".to_string(),
            token_type: "service".to_string(),
            iat: now,
            exp: now + 60,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(decode_user_token(&token, SECRET).is_err());
    }

    #[test]
    fn external_identity_is_namespaced() {
        let tenant = TenantId::new("app-1");
        let user = AuthedUser::from_external(
            &tenant,
            &ExternalUser {
                id: "ext-9".to_string(),
                email: Some("e@example.com".to_string()),
                name: None,
            },
        )
        .unwrap();
        assert_eq!(user.id.as_str(), "ext:app-1:ext-9");
        assert!(user.external);

        let empty = ExternalUser {
            id: "  ".to_string(),
            email: None,
            name: None,
        };
        assert!(AuthedUser::from_external(&tenant, &empty).is_err());
    }
}
