//! Tenant and user directory traits used by the identity gate.

use crate::error::Result;
use crate::types::{Tenant, TenantId, User, UserId};
use std::future::Future;

/// Read-through access to tenant records.
pub trait TenantRepository: Send + Sync {
    /// Load a tenant by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` on I/O failure.
    fn tenant(&self, tenant_id: &TenantId) -> impl Future<Output = Result<Option<Tenant>>> + Send;

    /// Insert a tenant (admin/seed path).
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when the id is taken and `StoreUnavailable` on
    /// I/O failure.
    fn insert_tenant(&self, tenant: &Tenant) -> impl Future<Output = Result<()>> + Send;
}

/// Read-through access to registered users.
pub trait UserRepository: Send + Sync {
    /// Load a user by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` on I/O failure.
    fn user(&self, user_id: &UserId) -> impl Future<Output = Result<Option<User>>> + Send;

    /// Insert a user (signup collaborator/seed path).
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when the id is taken and `StoreUnavailable` on
    /// I/O failure.
    fn insert_user(&self, user: &User) -> impl Future<Output = Result<()>> + Send;
}
