//! Core engine: configuration, error taxonomy, domain models, the discovery
//! state machine and its step-reporting stream.

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod stream;
