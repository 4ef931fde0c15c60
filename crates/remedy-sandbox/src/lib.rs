//! Remedy Sandbox
//!
//! Isolated, reproducible execution environments for fix verification:
//! manifest loading, content-addressed image builds, per-session networks
//! and sidecars, and the execution cell that runs one candidate program
//! under resource and time bounds with guaranteed teardown.

pub mod cell;
pub mod docker;
pub mod error;
pub mod fakes;
pub mod factory;
pub mod image;
pub mod language;
pub mod manifest;
pub mod provisioner;

pub use cell::{ProvisionedCell, EXECUTION_TIMEOUT};
pub use docker::{
    AttachedRun, BuildObserver, ContainerEngine, ContainerSpec, DockerCli, HealthState,
    LogObserver,
};
pub use error::{Result, SandboxError};
pub use factory::DockerSandboxFactory;
pub use image::{BuildSpec, DEFAULT_BASE_IMAGE, DEPENDENCY_FILES, IMAGE_REPOSITORY};
pub use language::command_template;
pub use manifest::{
    HealthCheck, Manifest, ResourceLimits, ServiceSpec, DEFAULT_CPUS, DEFAULT_MEMORY_MIB,
    MANIFEST_FILE_NAME,
};
pub use provisioner::{HealthPolicy, Provisioner, Session, SidecarHandle};

/// Remedy sandbox version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
