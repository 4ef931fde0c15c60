//! Environment provisioning: one isolated session per investigation.
//!
//! A session owns a non-internet-routable network, the sidecar containers
//! declared in the manifest, and a resolved execution image. Sidecar
//! failures are soft (logged, skipped); a failed network creation is fatal
//! to the investigation; a failed image build falls back to the default
//! base image. Teardown is best-effort and never fails the overall result.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::docker::{BuildObserver, ContainerEngine, ContainerSpec, HealthState};
use crate::error::Result;
use crate::image::{BuildSpec, DEFAULT_BASE_IMAGE};
use crate::manifest::{Manifest, ServiceSpec};

/// Readiness polling policy for sidecars.
#[derive(Debug, Clone, Copy)]
pub struct HealthPolicy {
    /// Give up polling a declared probe after this long.
    pub timeout: Duration,
    /// Delay between probe polls.
    pub interval: Duration,
    /// Settle delay for services without a probe.
    pub settle: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            interval: Duration::from_secs(1),
            settle: Duration::from_secs(2),
        }
    }
}

/// One started sidecar, owned by a session.
#[derive(Debug, Clone)]
pub struct SidecarHandle {
    /// Declared service name.
    pub name: String,
    /// Container name used for lifecycle commands.
    pub container: String,
    /// Whether the service failed its readiness probe. Degraded sidecars
    /// do not abort provisioning; dependent code may legitimately fail.
    pub degraded: bool,
}

/// One provisioning unit: network, sidecars, and resolved image.
#[derive(Debug)]
pub struct Session {
    /// Time-derived unique session identifier.
    pub session_id: String,
    /// Resolved execution image reference.
    pub image_ref: String,
    /// Owned session network name.
    pub network: String,
    /// Owned sidecar handles, in declaration order.
    pub sidecars: Vec<SidecarHandle>,
}

/// Builds sessions on a container engine.
#[derive(Clone)]
pub struct Provisioner {
    engine: Arc<dyn ContainerEngine>,
    health: HealthPolicy,
}

impl Provisioner {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self {
            engine,
            health: HealthPolicy::default(),
        }
    }

    /// Override the readiness polling policy (shorter in tests).
    pub fn with_health_policy(mut self, health: HealthPolicy) -> Self {
        self.health = health;
        self
    }

    /// Resolve the execution image for this project, building it if the
    /// content-addressed tag is not already published.
    ///
    /// Cache hits skip the build entirely. A failed build logs the reason
    /// and falls back to the fixed default base image instead of aborting
    /// the investigation.
    pub async fn ensure_image(
        &self,
        project_dir: Option<&Path>,
        manifest: &Manifest,
        observer: &dyn BuildObserver,
    ) -> Result<String> {
        let spec = BuildSpec::derive(project_dir, manifest)?;
        if spec.is_trivial() {
            return Ok(spec.base_image);
        }

        let tag = spec.image_tag()?;
        if self.engine.image_exists(&tag).await? {
            info!(image = %tag, "image cache hit, skipping build");
            return Ok(tag);
        }

        // Build context: the project tree when there is one, otherwise an
        // empty scratch directory (env-only image).
        let scratch;
        let context_dir = match project_dir {
            Some(dir) => dir,
            None => {
                scratch = tempfile::tempdir()?;
                scratch.path()
            }
        };

        let dockerfile = spec.render_dockerfile();
        match self
            .engine
            .build_image(&tag, &dockerfile, context_dir, observer)
            .await
        {
            Ok(()) => {
                info!(image = %tag, "image built and published");
                Ok(tag)
            }
            Err(e) => {
                warn!(error = %e, fallback = DEFAULT_BASE_IMAGE, "image build failed, using default base image");
                Ok(DEFAULT_BASE_IMAGE.to_string())
            }
        }
    }

    /// Provision a full session: network, then sidecars, on the resolved
    /// image. Network creation failure is fatal and nothing is left behind.
    pub async fn provision_session(&self, manifest: &Manifest, image_ref: String) -> Result<Session> {
        let session_id = new_session_id();
        let network = format!("remedy-net-{session_id}");

        self.engine.create_network(&network).await?;

        let sidecars = self.start_sidecars(manifest, &network, &session_id).await;

        info!(
            session_id = %session_id,
            sidecars = sidecars.len(),
            image = %image_ref,
            "session provisioned"
        );
        Ok(Session {
            session_id,
            image_ref,
            network,
            sidecars,
        })
    }

    /// Start every declared service on the session network. Per-sidecar
    /// failures are logged and skipped; the investigation continues with
    /// the remaining sidecars.
    async fn start_sidecars(
        &self,
        manifest: &Manifest,
        network: &str,
        session_id: &str,
    ) -> Vec<SidecarHandle> {
        let mut handles = Vec::new();
        for service in &manifest.services {
            let container = format!("remedy-{session_id}-{}", service.name);
            let spec = ContainerSpec {
                image: service.image.clone(),
                name: container.clone(),
                network: Some(network.to_string()),
                env: service.env.clone(),
                health_cmd: service.healthcheck.as_ref().map(|h| h.command.clone()),
                ..ContainerSpec::default()
            };

            match self.engine.start_detached(&spec).await {
                Ok(_) => {
                    if service.allow_network {
                        // Declared escape hatch: this service also joins the
                        // default bridge for outbound access.
                        if let Err(e) = self.engine.connect_network("bridge", &container).await {
                            warn!(sidecar = %service.name, error = %e, "bridge attach failed");
                        }
                    }
                    let degraded = !self.await_ready(service, &container).await;
                    if degraded {
                        warn!(sidecar = %service.name, "sidecar degraded, continuing without readiness");
                    }
                    handles.push(SidecarHandle {
                        name: service.name.clone(),
                        container,
                        degraded,
                    });
                }
                Err(e) => {
                    warn!(sidecar = %service.name, error = %e, "sidecar failed to start, skipping");
                }
            }
        }
        handles
    }

    /// Poll a declared probe until healthy, unhealthy, or timeout; without
    /// a probe, wait the settle delay. Returns whether the service is ready.
    async fn await_ready(&self, service: &ServiceSpec, container: &str) -> bool {
        if service.healthcheck.is_none() {
            tokio::time::sleep(self.health.settle).await;
            return true;
        }

        let deadline = tokio::time::Instant::now() + self.health.timeout;
        loop {
            match self.engine.health_state(container).await {
                Ok(HealthState::Healthy) => return true,
                Ok(HealthState::Unhealthy) => return false,
                Ok(HealthState::Starting) | Ok(HealthState::NoProbe) => {}
                Err(e) => {
                    warn!(sidecar = %service.name, error = %e, "health probe failed");
                    return false;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.health.interval).await;
        }
    }

    /// Stop and forcibly remove every session resource. Errors in
    /// individual removals are logged and swallowed; this never fails the
    /// overall result.
    pub async fn teardown(&self, session: Session) {
        for sidecar in &session.sidecars {
            if let Err(e) = self.engine.remove_container(&sidecar.container).await {
                warn!(
                    session_id = %session.session_id,
                    sidecar = %sidecar.name,
                    error = %e,
                    "sidecar removal failed"
                );
            }
        }
        if let Err(e) = self.engine.remove_network(&session.network).await {
            warn!(
                session_id = %session.session_id,
                network = %session.network,
                error = %e,
                "network removal failed"
            );
        }
        info!(session_id = %session.session_id, "session torn down");
    }
}

/// Time-derived unique session identifier.
fn new_session_id() -> String {
    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    let nonce = Uuid::new_v4().simple().to_string();
    format!("{stamp}-{}", &nonce[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SandboxError;
    use crate::fakes::ScriptedEngine;
    use crate::manifest::HealthCheck;

    fn fast_policy() -> HealthPolicy {
        HealthPolicy {
            timeout: Duration::from_millis(30),
            interval: Duration::from_millis(5),
            settle: Duration::from_millis(1),
        }
    }

    fn manifest_with_service(healthcheck: Option<HealthCheck>) -> Manifest {
        Manifest {
            services: vec![ServiceSpec {
                name: "db".to_string(),
                image: "postgres:16".to_string(),
                env: Default::default(),
                healthcheck,
                allow_network: false,
            }],
            ..Manifest::default()
        }
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let a = new_session_id();
        let b = new_session_id();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_provision_creates_internal_network() {
        let engine = Arc::new(ScriptedEngine::new());
        let provisioner = Provisioner::new(engine.clone()).with_health_policy(fast_policy());

        let session = provisioner
            .provision_session(&Manifest::default(), "python:3.11-slim".to_string())
            .await
            .unwrap();

        assert!(session.network.starts_with("remedy-net-"));
        assert_eq!(engine.networks_created(), vec![session.network.clone()]);
        assert!(session.sidecars.is_empty());
    }

    #[tokio::test]
    async fn test_network_failure_is_fatal() {
        let engine = Arc::new(ScriptedEngine::new().failing_networks());
        let provisioner = Provisioner::new(engine).with_health_policy(fast_policy());

        let result = provisioner
            .provision_session(&Manifest::default(), "python:3.11-slim".to_string())
            .await;
        assert!(matches!(result, Err(SandboxError::Network(_))));
    }

    #[tokio::test]
    async fn test_healthy_sidecar_is_not_degraded() {
        let engine = Arc::new(ScriptedEngine::new().with_health_sequence(vec![
            HealthState::Starting,
            HealthState::Healthy,
        ]));
        let provisioner = Provisioner::new(engine).with_health_policy(fast_policy());

        let session = provisioner
            .provision_session(
                &manifest_with_service(Some(HealthCheck {
                    command: "pg_isready".to_string(),
                })),
                "python:3.11-slim".to_string(),
            )
            .await
            .unwrap();

        assert_eq!(session.sidecars.len(), 1);
        assert!(!session.sidecars[0].degraded);
    }

    #[tokio::test]
    async fn test_never_healthy_sidecar_degrades_but_does_not_abort() {
        let engine = Arc::new(
            ScriptedEngine::new().with_health_sequence(vec![HealthState::Starting]),
        );
        let provisioner = Provisioner::new(engine).with_health_policy(fast_policy());

        let session = provisioner
            .provision_session(
                &manifest_with_service(Some(HealthCheck {
                    command: "pg_isready".to_string(),
                })),
                "python:3.11-slim".to_string(),
            )
            .await
            .unwrap();

        assert_eq!(session.sidecars.len(), 1);
        assert!(session.sidecars[0].degraded);
    }

    #[tokio::test]
    async fn test_probe_less_sidecar_ready_after_settle() {
        let engine = Arc::new(ScriptedEngine::new());
        let provisioner = Provisioner::new(engine).with_health_policy(fast_policy());

        let session = provisioner
            .provision_session(
                &manifest_with_service(None),
                "python:3.11-slim".to_string(),
            )
            .await
            .unwrap();
        assert!(!session.sidecars[0].degraded);
    }

    #[tokio::test]
    async fn test_failed_sidecar_start_is_skipped() {
        let engine = Arc::new(ScriptedEngine::new().failing_containers());
        let provisioner = Provisioner::new(engine).with_health_policy(fast_policy());

        let session = provisioner
            .provision_session(
                &manifest_with_service(None),
                "python:3.11-slim".to_string(),
            )
            .await
            .unwrap();
        assert!(session.sidecars.is_empty());
    }

    #[tokio::test]
    async fn test_teardown_removes_everything_and_swallows_errors() {
        let engine = Arc::new(ScriptedEngine::new());
        let provisioner = Provisioner::new(engine.clone()).with_health_policy(fast_policy());

        let session = provisioner
            .provision_session(
                &manifest_with_service(None),
                "python:3.11-slim".to_string(),
            )
            .await
            .unwrap();
        let network = session.network.clone();
        let container = session.sidecars[0].container.clone();

        provisioner.teardown(session).await;
        assert!(engine.removed_containers().contains(&container));
        assert!(engine.removed_networks().contains(&network));

        // A second teardown of a fresh empty session must also never fail,
        // even when the engine rejects removals.
        let failing = Arc::new(ScriptedEngine::new().failing_removals());
        let provisioner = Provisioner::new(failing);
        provisioner
            .teardown(Session {
                session_id: "s".to_string(),
                image_ref: "img".to_string(),
                network: "remedy-net-s".to_string(),
                sidecars: vec![SidecarHandle {
                    name: "db".to_string(),
                    container: "remedy-s-db".to_string(),
                    degraded: false,
                }],
            })
            .await;
    }

    #[tokio::test]
    async fn test_ensure_image_builds_once_then_caches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("requirements.txt"), "requests\n").unwrap();
        let engine = Arc::new(ScriptedEngine::new());
        let provisioner = Provisioner::new(engine.clone());
        let observer = crate::docker::LogObserver;

        let manifest = Manifest::default();
        let tag1 = provisioner
            .ensure_image(Some(dir.path()), &manifest, &observer)
            .await
            .unwrap();
        let tag2 = provisioner
            .ensure_image(Some(dir.path()), &manifest, &observer)
            .await
            .unwrap();

        assert_eq!(tag1, tag2);
        assert_eq!(engine.build_count(), 1);
    }

    #[tokio::test]
    async fn test_ensure_image_trivial_spec_skips_build() {
        let engine = Arc::new(ScriptedEngine::new());
        let provisioner = Provisioner::new(engine.clone());
        let observer = crate::docker::LogObserver;

        let image = provisioner
            .ensure_image(None, &Manifest::default(), &observer)
            .await
            .unwrap();
        assert_eq!(image, DEFAULT_BASE_IMAGE);
        assert_eq!(engine.build_count(), 0);
    }

    #[tokio::test]
    async fn test_ensure_image_build_failure_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("requirements.txt"), "requests\n").unwrap();
        let engine = Arc::new(ScriptedEngine::new().failing_builds());
        let provisioner = Provisioner::new(engine);
        let observer = crate::docker::LogObserver;

        let image = provisioner
            .ensure_image(Some(dir.path()), &Manifest::default(), &observer)
            .await
            .unwrap();
        assert_eq!(image, DEFAULT_BASE_IMAGE);
    }
}
