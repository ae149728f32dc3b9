//! Web search collaborator used by the research fallback.

mod client;

pub use client::{HttpSearcher, SearchResult, WebSearcher};
