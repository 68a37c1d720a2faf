//! seathold — a multi-tenant seat-booking backend.
//!
//! Coordinates concurrent seat selection across independent frontend
//! applications. The reservation pipeline guarantees a seat is reserved,
//! paid for, and booked exactly once despite arbitrary concurrency,
//! timeouts, and partial failures.
//!
//! # Architecture
//!
//! ```text
//! request ──▶ identity gate ──▶ reservation engine
//!                (auth)            │         │
//!                                  ▼         ▼
//!                            lock store   durable store
//!                             (Redis,      (Postgres,
//!                              TTL'd        transactional
//!                              locks)       ledger)
//!                                  │
//!                                  ▼
//!                           payment verifier
//! ```
//!
//! - The **lock store** is the only atomic gate deciding which single
//!   requester gets a seat right now (`SET NX EX`, TTL-bounded).
//! - The **durable store** holds authoritative state; the confirm step is
//!   one ACID transaction over seat, booking, and reservation rows.
//! - The **identity gate** establishes the tenant (credential hash +
//!   origin policy) and the user (bearer token or tenant-declared
//!   external identity) before the engine runs.
//! - The only path to a booking is holding both the live lock and the
//!   ACTIVE reservation row; that pair is the serialization point.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod mocks;
pub mod payment;
pub mod providers;
pub mod server;
pub mod stores;
pub mod types;

pub use config::Config;
pub use engine::ReservationEngine;
pub use error::{EngineError, Result};
