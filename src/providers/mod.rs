//! Provider traits for the reservation pipeline.
//!
//! These traits are the seams between the engine and its external
//! dependencies. The engine depends on the traits; `crate::stores` provides
//! the production implementations and `crate::mocks` the in-memory ones
//! used by the test-suite.

pub mod directory;
pub mod lock;
pub mod payment;
pub mod store;

pub use directory::{TenantRepository, UserRepository};
pub use lock::{AcquireOutcome, LockStore, SeatLock};
pub use payment::{GatewayOrder, PaymentProof, PaymentVerifier, VerifiedPayment};
pub use store::DurableStore;
