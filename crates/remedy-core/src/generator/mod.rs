//! Fix-generation capability interface.
//!
//! The generator is consumed, not specified: given an error, the code, and
//! the ordered history of prior attempts, it returns a candidate fix. The
//! HTTP-backed implementation lives in [`http`]; response parsing in
//! [`parse`].

pub mod http;
pub mod parse;

use async_trait::async_trait;

use crate::domain::{Attempt, FixRequest, GeneratedFix, GenerationError};

/// Producer of candidate fixes.
#[async_trait]
pub trait FixGenerator: Send + Sync {
    /// Generate a candidate fix for `request`, given the full ordered
    /// history of prior attempts (each with its fix, verdict, and new
    /// error).
    ///
    /// A transport or availability failure is returned as an error and is
    /// never recorded as an attempt; an empty or unparsable response is
    /// not an error — implementations return the original code with low
    /// confidence instead.
    async fn generate(
        &self,
        request: &FixRequest,
        history: &[Attempt],
    ) -> Result<GeneratedFix, GenerationError>;
}
