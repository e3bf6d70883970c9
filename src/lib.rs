//! Edge gateway for the fintech platform.
//!
//! Authenticates bearer tokens (with optional revocation lookup), applies
//! per-route role/permission policies, and forwards requests to the domain
//! services with correlation metadata attached. Every failure leaves as a
//! JSON `ErrorEnvelope`.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
