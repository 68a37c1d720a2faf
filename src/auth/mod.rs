//! Identity gate: tenant credentials and user identity.
//!
//! Establishes two orthogonal facts before the engine runs — which tenant
//! and which user — and short-circuits with a typed error otherwise.

pub mod middleware;
pub mod tenant;
pub mod user;

pub use middleware::RequestIdentity;
pub use user::{AuthedUser, ExternalUser};
