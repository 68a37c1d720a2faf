//! Tenant credential verification and origin policy.

use crate::config::AuthConfig;
use crate::error::{EngineError, Result};
use crate::providers::TenantRepository;
use crate::types::{Tenant, TenantId};
use argon2::password_hash::SaltString;
use argon2::{Argon2, Params, PasswordHasher, PasswordVerifier};

/// Verify a plaintext tenant secret against its stored Argon2id PHC hash.
///
/// Returns `Ok(true)` on match, `Ok(false)` on mismatch.
///
/// # Errors
///
/// Returns `Authentication` if the stored hash is malformed (a corrupt
/// credential row must never authenticate).
pub fn verify_tenant_secret(secret: &str, hash: &str) -> Result<bool> {
    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| EngineError::Authentication(format!("invalid credential hash: {e}")))?;

    match Argon2::default().verify_password(secret.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(EngineError::Authentication(format!("verify error: {e}"))),
    }
}

/// Hash a tenant secret for storage (admin/seed path).
///
/// `cost` maps to the Argon2 time-cost parameter; memory and parallelism
/// stay at the crate defaults.
///
/// # Errors
///
/// Returns `Validation` if the parameters are rejected.
pub fn hash_tenant_secret(secret: &str, cost: u32) -> Result<String> {
    let params = Params::new(Params::DEFAULT_M_COST, cost.max(1), Params::DEFAULT_P_COST, None)
        .map_err(|e| EngineError::Validation(format!("bad hash parameters: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    argon2
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| EngineError::Validation(format!("hashing failed: {e}")))
}

/// Extract the lowercase host from an `Origin` header value.
///
/// Accepts `scheme://host[:port]` and bare hosts; `null` and empty values
/// yield `None`.
#[must_use]
pub fn origin_host(origin: &str) -> Option<String> {
    let trimmed = origin.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        return None;
    }

    let after_scheme = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest);
    let authority = after_scheme.split('/').next().unwrap_or(after_scheme);
    let host = authority.split(':').next().unwrap_or(authority);

    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

fn host_matches(entry: &str, host: &str) -> bool {
    if entry == "*" {
        return true;
    }
    let entry = entry.to_ascii_lowercase();
    // An entry may itself carry a scheme ("https://shop.example.com").
    let entry_host = origin_host(&entry).unwrap_or(entry);

    host == entry_host
        || (host.ends_with(&entry_host)
            && host[..host.len() - entry_host.len()].ends_with('.'))
}

/// Whether `origin` is acceptable for a tenant.
///
/// A tenant with no allow-list of its own falls back to the configured
/// default policy. Requests without an origin pass only when no
/// restrictions apply.
#[must_use]
pub fn origin_allowed(tenant: &Tenant, default_policy: &str, origin: Option<&str>) -> bool {
    let own = &tenant.allowed_origins;
    let fallback: Vec<String> = if own.is_empty() {
        default_policy
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        Vec::new()
    };
    let entries: &[String] = if own.is_empty() { &fallback } else { own };

    let unrestricted = entries.is_empty() || entries.iter().any(|e| e == "*");

    match origin.and_then(origin_host) {
        None => unrestricted,
        Some(host) => unrestricted || entries.iter().any(|entry| host_matches(entry, &host)),
    }
}

/// Authenticate a tenant from its credential headers and request origin.
///
/// # Errors
///
/// - `Authentication` — unknown tenant or wrong secret.
/// - `Authorization` — tenant disabled, or origin not permitted.
/// - `StoreUnavailable` — directory I/O failure.
pub async fn authenticate_tenant<R: TenantRepository>(
    directory: &R,
    config: &AuthConfig,
    tenant_id: &str,
    secret: &str,
    origin: Option<&str>,
) -> Result<Tenant> {
    let id = TenantId::new(tenant_id);
    let tenant = directory
        .tenant(&id)
        .await?
        .ok_or_else(|| EngineError::Authentication("unknown tenant".to_string()))?;

    if !tenant.active {
        tracing::warn!(tenant_id = %tenant.id, "Disabled tenant rejected");
        return Err(EngineError::Authorization("tenant is disabled".to_string()));
    }

    if !verify_tenant_secret(secret, &tenant.secret_hash)? {
        tracing::warn!(tenant_id = %tenant.id, "Tenant secret mismatch");
        return Err(EngineError::Authentication(
            "invalid tenant credentials".to_string(),
        ));
    }

    if !origin_allowed(&tenant, &config.allowed_origins_default, origin) {
        tracing::warn!(tenant_id = %tenant.id, ?origin, "Origin rejected");
        return Err(EngineError::Authorization(format!(
            "origin {} is not permitted for this tenant",
            origin.unwrap_or("<none>")
        )));
    }

    Ok(tenant)
}
