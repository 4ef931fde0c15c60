//! Docker-backed implementation of the core sandbox traits.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use remedy_core::{ExecutionCell, RemedyError, SandboxFactory};

use crate::cell::ProvisionedCell;
use crate::docker::{BuildObserver, ContainerEngine, DockerCli, LogObserver};
use crate::manifest::Manifest;
use crate::provisioner::Provisioner;

/// Provisions one isolated Docker session per investigation.
pub struct DockerSandboxFactory {
    engine: Arc<dyn ContainerEngine>,
    provisioner: Provisioner,
    manifest: Manifest,
    project_dir: Option<PathBuf>,
    observer: Arc<dyn BuildObserver>,
    execution_timeout: Option<Duration>,
}

impl DockerSandboxFactory {
    /// Factory over an explicit engine (scripted in tests).
    pub fn new(engine: Arc<dyn ContainerEngine>, manifest: Manifest) -> Self {
        Self {
            provisioner: Provisioner::new(engine.clone()),
            engine,
            manifest,
            project_dir: None,
            observer: Arc::new(LogObserver),
            execution_timeout: None,
        }
    }

    /// Factory over the local Docker daemon.
    pub fn with_docker(manifest: Manifest) -> Self {
        Self::new(Arc::new(DockerCli::new()), manifest)
    }

    /// Project directory whose dependency files feed the image build spec.
    pub fn with_project_dir(mut self, project_dir: PathBuf) -> Self {
        self.project_dir = Some(project_dir);
        self
    }

    /// Replace the build-progress observer.
    pub fn with_observer(mut self, observer: Arc<dyn BuildObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Override the provisioner (e.g. for a shorter health policy).
    pub fn with_provisioner(mut self, provisioner: Provisioner) -> Self {
        self.provisioner = provisioner;
        self
    }

    /// Override the per-execution timeout.
    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl SandboxFactory for DockerSandboxFactory {
    async fn provision(
        &self,
        _investigation_id: &str,
    ) -> remedy_core::Result<Box<dyn ExecutionCell>> {
        let image = self
            .provisioner
            .ensure_image(
                self.project_dir.as_deref(),
                &self.manifest,
                self.observer.as_ref(),
            )
            .await
            .map_err(|e| RemedyError::Provision(e.to_string()))?;

        let session = self
            .provisioner
            .provision_session(&self.manifest, image)
            .await
            .map_err(|e| RemedyError::Provision(e.to_string()))?;

        let mut cell = ProvisionedCell::new(
            self.engine.clone(),
            self.provisioner.clone(),
            self.manifest.clone(),
            session,
        );
        if let Some(timeout) = self.execution_timeout {
            cell = cell.with_timeout(timeout);
        }
        Ok(Box::new(cell))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedEngine;
    use remedy_core::Language;

    #[tokio::test]
    async fn test_factory_provisions_working_cell() {
        let engine = Arc::new(ScriptedEngine::new());
        let factory = DockerSandboxFactory::new(engine.clone(), Manifest::default());

        let cell = factory.provision("inv-1").await.unwrap();
        let result = cell.execute("print('ok')", Language::Python).await.unwrap();
        assert_eq!(result.exit_code, 0);

        cell.teardown().await;
        assert_eq!(engine.removed_networks().len(), 1);
    }

    #[tokio::test]
    async fn test_factory_network_failure_is_provision_error() {
        let engine = Arc::new(ScriptedEngine::new().failing_networks());
        let factory = DockerSandboxFactory::new(engine, Manifest::default());

        let result = factory.provision("inv-1").await;
        assert!(matches!(result, Err(RemedyError::Provision(_))));
    }
}
