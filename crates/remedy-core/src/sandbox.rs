//! Execution-sandbox trait seams.
//!
//! The retry controller judges candidates through these traits; the
//! Docker-backed implementation lives in the `remedy-sandbox` crate, and
//! test fakes in [`crate::fakes`].

use async_trait::async_trait;

use crate::domain::{ExecutionResult, Language, Result};

/// One provisioned, isolated execution surface for a single investigation.
#[async_trait]
pub trait ExecutionCell: Send + Sync {
    /// Run one candidate program to completion or timeout and return a
    /// structured result.
    ///
    /// Implementations must never leak a live process or container past
    /// this call, on any exit path. Internal sandbox faults should be
    /// folded into a failed [`ExecutionResult`] where possible; an `Err`
    /// is reserved for faults that make the cell unusable.
    async fn execute(&self, code: &str, language: Language) -> Result<ExecutionResult>;

    /// Release every resource this cell's session owns (sidecars,
    /// network). Best-effort, idempotent, never fails the investigation.
    async fn teardown(&self);
}

/// Provisioner of execution cells, one per investigation.
#[async_trait]
pub trait SandboxFactory: Send + Sync {
    /// Provision an isolated cell for the given investigation.
    ///
    /// Recoverable provisioning problems (image build failure, degraded
    /// sidecars) are handled internally; an `Err` means the environment
    /// could not be established at all (e.g. network creation failed) and
    /// the investigation cannot proceed.
    async fn provision(&self, investigation_id: &str) -> Result<Box<dyn ExecutionCell>>;
}
