//! In-memory fakes for the capability traits (testing and wiring dry runs).
//!
//! Provides a scripted fix generator, an always-unavailable generator, and
//! a scripted sandbox factory that satisfy the trait contracts without any
//! external process or daemon.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::{
    Attempt, ExecutionResult, FixRequest, GeneratedFix, GenerationError, Language, Result,
};
use crate::generator::FixGenerator;
use crate::sandbox::{ExecutionCell, SandboxFactory};

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

/// One scripted generator turn.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Return this fix.
    Fix(GeneratedFix),
    /// Fail with a transport error.
    Unavailable(String),
}

/// Generator that replays a queue of scripted responses.
///
/// When the queue runs dry it returns the original code unchanged, which
/// mirrors the real parser's behavior for an empty response.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Convenience: a generator that always returns fixes, in order.
    pub fn with_fixes(fixes: Vec<GeneratedFix>) -> Self {
        Self::new(fixes.into_iter().map(ScriptedResponse::Fix).collect())
    }

    /// Number of generate calls observed.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl FixGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        request: &FixRequest,
        _history: &[Attempt],
    ) -> std::result::Result<GeneratedFix, GenerationError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match self.responses.lock().unwrap().pop_front() {
            Some(ScriptedResponse::Fix(fix)) => Ok(fix),
            Some(ScriptedResponse::Unavailable(message)) => {
                Err(GenerationError::Transport(message))
            }
            None => Ok(GeneratedFix::unchanged(
                request.code.clone(),
                "scripted generator exhausted",
            )),
        }
    }
}

/// Generator that is always unreachable.
#[derive(Debug, Clone)]
pub struct UnavailableGenerator {
    message: String,
}

impl UnavailableGenerator {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for UnavailableGenerator {
    fn default() -> Self {
        Self::new("connection refused")
    }
}

#[async_trait]
impl FixGenerator for UnavailableGenerator {
    async fn generate(
        &self,
        _request: &FixRequest,
        _history: &[Attempt],
    ) -> std::result::Result<GeneratedFix, GenerationError> {
        Err(GenerationError::Transport(self.message.clone()))
    }
}

// ---------------------------------------------------------------------------
// FakeSandboxFactory
// ---------------------------------------------------------------------------

/// Sandbox factory whose cells replay scripted execution results.
///
/// Shared counters make the teardown and execution invariants observable
/// from tests after the investigation has consumed the cell.
#[derive(Debug, Default)]
pub struct FakeSandboxFactory {
    results: Arc<Mutex<VecDeque<ExecutionResult>>>,
    teardowns: Arc<AtomicUsize>,
    executions: Arc<AtomicUsize>,
    provisions: Arc<AtomicUsize>,
    provision_failure: Option<String>,
}

impl FakeSandboxFactory {
    /// Cells will pop these results in order; a drained queue yields a
    /// generic failure result.
    pub fn with_results(results: Vec<ExecutionResult>) -> Self {
        Self {
            results: Arc::new(Mutex::new(results.into_iter().collect())),
            ..Self::default()
        }
    }

    /// Factory whose provisioning always fails (network-level fault).
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            provision_failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// How many times any provisioned cell was torn down.
    pub fn teardown_count(&self) -> usize {
        self.teardowns.load(Ordering::Relaxed)
    }

    /// How many executions ran across all provisioned cells.
    pub fn execution_count(&self) -> usize {
        self.executions.load(Ordering::Relaxed)
    }

    /// How many cells were provisioned.
    pub fn provision_count(&self) -> usize {
        self.provisions.load(Ordering::Relaxed)
    }
}

struct FakeCell {
    results: Arc<Mutex<VecDeque<ExecutionResult>>>,
    teardowns: Arc<AtomicUsize>,
    executions: Arc<AtomicUsize>,
}

#[async_trait]
impl ExecutionCell for FakeCell {
    async fn execute(&self, _code: &str, _language: Language) -> Result<ExecutionResult> {
        self.executions.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ExecutionResult::failure(1, "no scripted result", 0)))
    }

    async fn teardown(&self) {
        self.teardowns.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl SandboxFactory for FakeSandboxFactory {
    async fn provision(&self, _investigation_id: &str) -> Result<Box<dyn ExecutionCell>> {
        if let Some(message) = &self.provision_failure {
            return Err(crate::domain::RemedyError::Provision(message.clone()));
        }
        self.provisions.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(FakeCell {
            results: Arc::clone(&self.results),
            teardowns: Arc::clone(&self.teardowns),
            executions: Arc::clone(&self.executions),
        }))
    }
}
