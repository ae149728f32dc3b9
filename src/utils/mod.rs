//! Shared helpers used across the discovery and dispatch paths.

pub(crate) mod domain;
