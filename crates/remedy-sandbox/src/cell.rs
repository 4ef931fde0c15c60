//! The execution cell: runs exactly one candidate program per call inside
//! a provisioned session and returns a structured result.
//!
//! The candidate code is delivered over standard input; the container
//! inherits the session network, the manifest's resource ceiling, and its
//! declared volumes and environment. Every exit path removes the
//! execution container before returning, and the session itself is torn
//! down exactly once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use remedy_core::{ExecutionCell, ExecutionResult, Language, RemedyError};

use crate::docker::{ContainerEngine, ContainerSpec};
use crate::language::command_template;
use crate::manifest::Manifest;
use crate::provisioner::{Provisioner, Session};

/// Default wall-clock timeout for one execution.
pub const EXECUTION_TIMEOUT: Duration = Duration::from_secs(30);

/// A provisioned execution cell bound to one session.
pub struct ProvisionedCell {
    engine: Arc<dyn ContainerEngine>,
    provisioner: Provisioner,
    manifest: Manifest,
    session: tokio::sync::Mutex<Option<Session>>,
    timeout: Duration,
    executions: AtomicU64,
}

impl ProvisionedCell {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        provisioner: Provisioner,
        manifest: Manifest,
        session: Session,
    ) -> Self {
        Self {
            engine,
            provisioner,
            manifest,
            session: tokio::sync::Mutex::new(Some(session)),
            timeout: EXECUTION_TIMEOUT,
            executions: AtomicU64::new(0),
        }
    }

    /// Override the execution timeout (shorter in tests).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The session id, when the session is still live.
    pub async fn session_id(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| s.session_id.clone())
    }
}

#[async_trait]
impl ExecutionCell for ProvisionedCell {
    async fn execute(
        &self,
        code: &str,
        language: Language,
    ) -> remedy_core::Result<ExecutionResult> {
        let (image, network, session_id) = {
            let session = self.session.lock().await;
            let session = session
                .as_ref()
                .ok_or_else(|| RemedyError::Execution("session already torn down".to_string()))?;
            (
                session.image_ref.clone(),
                session.network.clone(),
                session.session_id.clone(),
            )
        };

        let n = self.executions.fetch_add(1, Ordering::Relaxed) + 1;
        let spec = ContainerSpec {
            image,
            name: format!("remedy-{session_id}-exec-{n}"),
            network: Some(network),
            env: self.manifest.env.clone(),
            volumes: self.manifest.volumes.clone(),
            memory_mib: Some(self.manifest.resources.memory_mib),
            cpus: Some(self.manifest.resources.cpus),
            cap_drop_all: true,
            health_cmd: None,
            command: vec![
                "/bin/sh".to_string(),
                "-lc".to_string(),
                command_template(language).to_string(),
            ],
        };

        let run = self
            .engine
            .run_attached(&spec, code, self.timeout)
            .await
            .map_err(|e| RemedyError::Execution(e.to_string()))?;

        Ok(ExecutionResult {
            exit_code: run.exit_code,
            output: run.output,
            timed_out: run.timed_out,
            duration_ms: run.duration_ms,
        })
    }

    async fn teardown(&self) {
        // Taking the session out makes a second teardown a no-op.
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            self.provisioner.teardown(session).await;
        }
    }
}
