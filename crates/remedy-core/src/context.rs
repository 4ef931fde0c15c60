//! Semantic code-context collaborator interface.
//!
//! An optional capability consulted by the orchestrator's caller to enrich
//! the first generation call. The core treats its absence as empty context;
//! index construction and maintenance live wholly outside this crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Contextual snippets relevant to a bug, as returned by a semantic index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeContext {
    /// Condensed summary of the relevant code.
    pub summary: String,

    /// Files the summary draws from.
    pub referenced_files: Vec<String>,
}

/// Provider of semantic code context.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Return context relevant to `query`, or `None` when nothing useful
    /// is indexed.
    async fn context_for(&self, query: &str) -> Option<CodeContext>;
}

/// Provider used when no semantic index is configured.
#[derive(Debug, Default)]
pub struct NoContext;

#[async_trait]
impl ContextProvider for NoContext {
    async fn context_for(&self, _query: &str) -> Option<CodeContext> {
        None
    }
}
