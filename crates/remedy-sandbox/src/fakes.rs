//! Scripted container engine for tests and daemon-free wiring checks.
//!
//! Records every lifecycle call and replays configured health states and
//! execution results, so provisioning and execution invariants can be
//! asserted without a Docker daemon.

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::docker::{AttachedRun, BuildObserver, ContainerEngine, ContainerSpec, HealthState};
use crate::error::{Result, SandboxError};

/// In-memory engine fake with scripted behavior.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    images: Mutex<HashSet<String>>,
    networks: Mutex<Vec<String>>,
    removed_networks: Mutex<Vec<String>>,
    started: Mutex<Vec<ContainerSpec>>,
    removed: Mutex<Vec<String>>,
    attached: Mutex<Vec<ContainerSpec>>,
    attached_results: Mutex<VecDeque<AttachedRun>>,
    health_sequence: Mutex<VecDeque<HealthState>>,
    builds: AtomicUsize,
    fail_networks: bool,
    fail_containers: bool,
    fail_removals: bool,
    fail_builds: bool,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every network creation fails.
    pub fn failing_networks(mut self) -> Self {
        self.fail_networks = true;
        self
    }

    /// Every detached container start fails.
    pub fn failing_containers(mut self) -> Self {
        self.fail_containers = true;
        self
    }

    /// Every removal (container and network) fails.
    pub fn failing_removals(mut self) -> Self {
        self.fail_removals = true;
        self
    }

    /// Every image build fails.
    pub fn failing_builds(mut self) -> Self {
        self.fail_builds = true;
        self
    }

    /// Health states returned in order; the last one repeats.
    pub fn with_health_sequence(self, states: Vec<HealthState>) -> Self {
        *self.health_sequence.lock().unwrap() = states.into_iter().collect();
        self
    }

    /// Attached runs pop these results in order; a drained queue yields a
    /// successful empty run.
    pub fn with_attached_results(self, results: Vec<AttachedRun>) -> Self {
        *self.attached_results.lock().unwrap() = results.into_iter().collect();
        self
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    pub fn networks_created(&self) -> Vec<String> {
        self.networks.lock().unwrap().clone()
    }

    pub fn removed_networks(&self) -> Vec<String> {
        self.removed_networks.lock().unwrap().clone()
    }

    pub fn started_containers(&self) -> Vec<ContainerSpec> {
        self.started.lock().unwrap().clone()
    }

    pub fn removed_containers(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }

    /// Specs of every attached (execution) run observed.
    pub fn attached_specs(&self) -> Vec<ContainerSpec> {
        self.attached.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerEngine for ScriptedEngine {
    async fn image_exists(&self, tag: &str) -> Result<bool> {
        Ok(self.images.lock().unwrap().contains(tag))
    }

    async fn build_image(
        &self,
        tag: &str,
        _dockerfile: &str,
        _context_dir: &Path,
        observer: &dyn BuildObserver,
    ) -> Result<()> {
        if self.fail_builds {
            return Err(SandboxError::ImageBuild("scripted build failure".to_string()));
        }
        self.builds.fetch_add(1, Ordering::Relaxed);
        observer.on_progress(&format!("scripted build of {tag}"));
        self.images.lock().unwrap().insert(tag.to_string());
        Ok(())
    }

    async fn create_network(&self, name: &str) -> Result<()> {
        if self.fail_networks {
            return Err(SandboxError::Network("scripted network failure".to_string()));
        }
        self.networks.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> Result<()> {
        if self.fail_removals {
            return Err(SandboxError::Network("scripted removal failure".to_string()));
        }
        self.removed_networks.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn connect_network(&self, _network: &str, _container: &str) -> Result<()> {
        Ok(())
    }

    async fn start_detached(&self, spec: &ContainerSpec) -> Result<String> {
        if self.fail_containers {
            return Err(SandboxError::Engine("scripted start failure".to_string()));
        }
        self.started.lock().unwrap().push(spec.clone());
        Ok(format!("id-{}", spec.name))
    }

    async fn health_state(&self, _container: &str) -> Result<HealthState> {
        let mut sequence = self.health_sequence.lock().unwrap();
        Ok(if sequence.len() > 1 {
            sequence.pop_front().unwrap()
        } else {
            *sequence.front().unwrap_or(&HealthState::NoProbe)
        })
    }

    async fn remove_container(&self, container: &str) -> Result<()> {
        if self.fail_removals {
            return Err(SandboxError::Engine("scripted removal failure".to_string()));
        }
        self.removed.lock().unwrap().push(container.to_string());
        Ok(())
    }

    async fn run_attached(
        &self,
        spec: &ContainerSpec,
        _stdin: &str,
        _timeout: Duration,
    ) -> Result<AttachedRun> {
        self.attached.lock().unwrap().push(spec.clone());
        let run = self
            .attached_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(AttachedRun {
                exit_code: 0,
                output: String::new(),
                timed_out: false,
                duration_ms: 1,
            });
        // The contract says the execution container never survives the
        // call; the fake records the removal the real engine would do.
        self.removed.lock().unwrap().push(spec.name.clone());
        Ok(run)
    }
}
