//! Payment verifiers: simulated, gateway reference, and signed callback.

pub mod reference;
pub mod signed;
pub mod simulated;

use crate::config::{PaymentConfig, PaymentMode};
use crate::providers::PaymentVerifier;
use std::sync::Arc;

pub use reference::ReferenceVerifier;
pub use signed::SignedCallbackVerifier;
pub use simulated::SimulatedVerifier;

/// Reference prefixes accepted by format validation: the gateway's native
/// form and the legacy import form.
const ACCEPTED_PREFIXES: [&str; 2] = ["pay_", "PAY-"];

/// Whether a payment reference carries an accepted prefix.
#[must_use]
pub fn has_accepted_prefix(reference: &str) -> bool {
    ACCEPTED_PREFIXES
        .iter()
        .any(|prefix| reference.starts_with(prefix))
}

/// Build the verifier selected by configuration.
#[must_use]
pub fn build_verifier(config: &PaymentConfig) -> Arc<dyn PaymentVerifier> {
    match config.mode {
        PaymentMode::Simulated => Arc::new(SimulatedVerifier::new(&config.gateway_key_id)),
        PaymentMode::Reference => Arc::new(ReferenceVerifier::new(config)),
        PaymentMode::SignedCallback => Arc::new(SignedCallbackVerifier::new(
            &config.shared_secret,
            &config.gateway_key_id,
        )),
    }
}
