//! Email address verification against the external validation service.

mod client;

pub use client::{EmailVerifier, HttpVerifier};
