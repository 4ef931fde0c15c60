//! Container engine driver.
//!
//! Docker is driven through its CLI with `tokio::process`; the
//! [`ContainerEngine`] trait keeps the provisioner and execution cell
//! independent of the real daemon so they can run against scripted
//! engines in tests.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Result, SandboxError};

/// Observer of image build progress, one call per output line.
pub trait BuildObserver: Send + Sync {
    fn on_progress(&self, line: &str);
}

/// Observer that forwards build output to tracing at debug level.
#[derive(Debug, Default)]
pub struct LogObserver;

impl BuildObserver for LogObserver {
    fn on_progress(&self, line: &str) {
        debug!(target: "remedy_sandbox::build", "{line}");
    }
}

/// Health of a running container, as reported by its declared probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Unhealthy,
    Starting,
    /// The container declares no probe.
    NoProbe,
}

/// Everything needed to start one container.
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    /// Image reference.
    pub image: String,
    /// Container name (used for cleanup by name).
    pub name: String,
    /// Session network to join, if any.
    pub network: Option<String>,
    /// Environment variables.
    pub env: BTreeMap<String, String>,
    /// Volume mounts, host path to container path.
    pub volumes: BTreeMap<String, String>,
    /// Hard memory cap in MiB.
    pub memory_mib: Option<u64>,
    /// CPU allowance in cores.
    pub cpus: Option<f64>,
    /// Drop all capabilities.
    pub cap_drop_all: bool,
    /// Readiness probe command, if declared.
    pub health_cmd: Option<String>,
    /// Command to run (empty = image default).
    pub command: Vec<String>,
}

/// Result of one attached (stdin-fed, output-captured) container run.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachedRun {
    /// Container exit code (non-zero on timeout).
    pub exit_code: i32,
    /// Combined stdout and stderr.
    pub output: String,
    /// Whether the wall-clock timeout fired.
    pub timed_out: bool,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Abstract container engine operations used by the sandbox layer.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Whether an image with this tag exists locally.
    async fn image_exists(&self, tag: &str) -> Result<bool>;

    /// Build `dockerfile` in `context_dir` and tag the result, streaming
    /// each line of build output to `observer`.
    async fn build_image(
        &self,
        tag: &str,
        dockerfile: &str,
        context_dir: &Path,
        observer: &dyn BuildObserver,
    ) -> Result<()>;

    /// Create an isolated, non-internet-routable network.
    async fn create_network(&self, name: &str) -> Result<()>;

    /// Remove a network.
    async fn remove_network(&self, name: &str) -> Result<()>;

    /// Attach a running container to an additional network.
    async fn connect_network(&self, network: &str, container: &str) -> Result<()>;

    /// Start a long-running container in the background; returns its id.
    async fn start_detached(&self, spec: &ContainerSpec) -> Result<String>;

    /// Probe a container's health state.
    async fn health_state(&self, container: &str) -> Result<HealthState>;

    /// Force-remove a container.
    async fn remove_container(&self, container: &str) -> Result<()>;

    /// Run a container to completion or timeout, feeding `stdin` to the
    /// entrypoint and capturing combined output. The container must not
    /// survive this call on any exit path.
    async fn run_attached(
        &self,
        spec: &ContainerSpec,
        stdin: &str,
        timeout: Duration,
    ) -> Result<AttachedRun>;
}

/// Removes a named container when dropped, unless disarmed.
///
/// Backstop for the attached-run path: if the future is cancelled or an
/// early return skips the explicit removal, the drop still reaps the
/// container through a blocking `docker rm -f`.
struct ContainerCleanupGuard {
    name: String,
    armed: bool,
}

impl ContainerCleanupGuard {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ContainerCleanupGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::process::Command::new("docker")
                .args(["rm", "-f", &self.name])
                .output();
        }
    }
}

/// Docker CLI-backed engine.
#[derive(Debug, Clone, Default)]
pub struct DockerCli;

impl DockerCli {
    pub fn new() -> Self {
        Self
    }

    async fn run_checked(&self, args: &[&str], step: &str) -> Result<String> {
        let output = Command::new("docker")
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let detail = if !stderr.is_empty() {
            stderr
        } else if !stdout.is_empty() {
            stdout
        } else {
            "command exited non-zero".to_string()
        };
        Err(SandboxError::Engine(format!("{step}: {detail}")))
    }

    fn container_args(spec: &ContainerSpec) -> Vec<String> {
        let mut args = Vec::new();
        args.push("--name".to_string());
        args.push(spec.name.clone());
        if let Some(network) = &spec.network {
            args.push("--network".to_string());
            args.push(network.clone());
        }
        if let Some(memory_mib) = spec.memory_mib {
            args.push("--memory".to_string());
            args.push(format!("{memory_mib}m"));
        }
        if let Some(cpus) = spec.cpus {
            args.push("--cpus".to_string());
            args.push(format!("{cpus}"));
        }
        if spec.cap_drop_all {
            args.push("--cap-drop".to_string());
            args.push("ALL".to_string());
        }
        if let Some(health_cmd) = &spec.health_cmd {
            args.push("--health-cmd".to_string());
            args.push(health_cmd.clone());
            args.push("--health-interval".to_string());
            args.push("1s".to_string());
        }
        for (key, value) in &spec.env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        for (host, container) in &spec.volumes {
            args.push("-v".to_string());
            args.push(format!("{host}:{container}"));
        }
        args.push(spec.image.clone());
        args.extend(spec.command.iter().cloned());
        args
    }
}

#[async_trait]
impl ContainerEngine for DockerCli {
    async fn image_exists(&self, tag: &str) -> Result<bool> {
        let output = Command::new("docker")
            .args(["image", "inspect", tag])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        Ok(output.success())
    }

    async fn build_image(
        &self,
        tag: &str,
        dockerfile: &str,
        context_dir: &Path,
        observer: &dyn BuildObserver,
    ) -> Result<()> {
        // The Dockerfile is fed over stdin so the project tree stays
        // untouched.
        let mut child = Command::new("docker")
            .args(["build", "-t", tag, "-f", "-"])
            .arg(context_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(dockerfile.as_bytes()).await?;
        }

        // Both pipes are drained concurrently so neither can back up and
        // stall the build.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let drain_stdout = async {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    observer.on_progress(&line);
                }
            }
        };
        let drain_stderr = async {
            let mut tail = Vec::new();
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    observer.on_progress(&line);
                    tail.push(line);
                    if tail.len() > 20 {
                        tail.remove(0);
                    }
                }
            }
            tail
        };
        let ((), tail) = tokio::join!(drain_stdout, drain_stderr);

        let status = child.wait().await?;
        if !status.success() {
            return Err(SandboxError::ImageBuild(tail.join("\n")));
        }
        Ok(())
    }

    async fn create_network(&self, name: &str) -> Result<()> {
        self.run_checked(
            &["network", "create", "--internal", name],
            "docker network create failed",
        )
        .await
        .map_err(|e| SandboxError::Network(e.to_string()))?;
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> Result<()> {
        self.run_checked(&["network", "rm", name], "docker network rm failed")
            .await
            .map_err(|e| SandboxError::Network(e.to_string()))?;
        Ok(())
    }

    async fn connect_network(&self, network: &str, container: &str) -> Result<()> {
        self.run_checked(
            &["network", "connect", network, container],
            "docker network connect failed",
        )
        .await?;
        Ok(())
    }

    async fn start_detached(&self, spec: &ContainerSpec) -> Result<String> {
        let mut args: Vec<String> = vec!["run".to_string(), "-d".to_string()];
        args.extend(Self::container_args(spec));
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_checked(&arg_refs, "docker run failed").await
    }

    async fn health_state(&self, container: &str) -> Result<HealthState> {
        let status = self
            .run_checked(
                &[
                    "inspect",
                    "--format",
                    "{{if .State.Health}}{{.State.Health.Status}}{{end}}",
                    container,
                ],
                "docker inspect failed",
            )
            .await?;
        Ok(match status.as_str() {
            "healthy" => HealthState::Healthy,
            "unhealthy" => HealthState::Unhealthy,
            "starting" => HealthState::Starting,
            _ => HealthState::NoProbe,
        })
    }

    async fn remove_container(&self, container: &str) -> Result<()> {
        self.run_checked(&["rm", "-f", container], "docker rm failed")
            .await?;
        Ok(())
    }

    async fn run_attached(
        &self,
        spec: &ContainerSpec,
        stdin: &str,
        timeout: Duration,
    ) -> Result<AttachedRun> {
        let mut guard = ContainerCleanupGuard::new(&spec.name);
        let start = Instant::now();

        let mut args: Vec<String> = vec!["run".to_string(), "-i".to_string()];
        args.extend(Self::container_args(spec));

        let mut child = Command::new("docker")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // The candidate code goes over stdin, never through the host
        // filesystem namespace. Closing the pipe signals EOF.
        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(stdin.as_bytes()).await?;
            pipe.shutdown().await?;
        }

        let run = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
                combined.push_str(&String::from_utf8_lossy(&output.stderr));
                AttachedRun {
                    exit_code: output.status.code().unwrap_or(-1),
                    output: combined,
                    timed_out: false,
                    duration_ms: start.elapsed().as_millis() as u64,
                }
            }
            Err(_elapsed) => {
                warn!(container = %spec.name, "execution timed out, killing container");
                let _ = self
                    .run_checked(&["kill", &spec.name], "docker kill failed")
                    .await;
                AttachedRun {
                    exit_code: 124,
                    output: format!(
                        "execution timed out after {}s",
                        timeout.as_secs()
                    ),
                    timed_out: true,
                    duration_ms: start.elapsed().as_millis() as u64,
                }
            }
        };

        // Scoped-resource guarantee: the execution container never
        // survives this call.
        if let Err(e) = self.remove_container(&spec.name).await {
            debug!(container = %spec.name, error = %e, "container removal after run");
        }
        guard.disarm();

        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ContainerSpec {
        ContainerSpec {
            image: "remedy-env:abc123".to_string(),
            name: "remedy-s1-exec-1".to_string(),
            network: Some("remedy-net-s1".to_string()),
            env: BTreeMap::from([("KEY".to_string(), "value".to_string())]),
            volumes: BTreeMap::from([("/host".to_string(), "/container".to_string())]),
            memory_mib: Some(512),
            cpus: Some(0.5),
            cap_drop_all: true,
            health_cmd: None,
            command: vec!["/bin/sh".to_string(), "-lc".to_string(), "true".to_string()],
        }
    }

    #[test]
    fn test_container_args_include_limits_and_isolation() {
        let args = DockerCli::container_args(&spec());
        let joined = args.join(" ");
        assert!(joined.contains("--network remedy-net-s1"));
        assert!(joined.contains("--memory 512m"));
        assert!(joined.contains("--cpus 0.5"));
        assert!(joined.contains("--cap-drop ALL"));
        assert!(joined.contains("-e KEY=value"));
        assert!(joined.contains("-v /host:/container"));
        // Image comes before the command.
        let image_pos = args.iter().position(|a| a == "remedy-env:abc123").unwrap();
        let cmd_pos = args.iter().position(|a| a == "true").unwrap();
        assert!(image_pos < cmd_pos);
    }

    #[test]
    fn test_container_args_health_probe() {
        let mut with_probe = spec();
        with_probe.health_cmd = Some("pg_isready".to_string());
        let args = DockerCli::container_args(&with_probe);
        let joined = args.join(" ");
        assert!(joined.contains("--health-cmd pg_isready"));
        assert!(joined.contains("--health-interval 1s"));
    }

    #[test]
    fn test_cleanup_guard_disarm() {
        // A disarmed guard must not attempt removal on drop (no docker
        // daemon in unit tests; an armed drop would still be harmless but
        // slow).
        let mut guard = ContainerCleanupGuard::new("remedy-test-guard");
        guard.disarm();
        drop(guard);
    }
}
