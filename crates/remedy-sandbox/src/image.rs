//! Deterministic build specifications and content-addressed image tags.
//!
//! A build spec is derived from the project's dependency files plus the
//! manifest's environment, so byte-identical inputs always produce the
//! same spec, the same digest, and therefore the same image tag. The
//! engine's tag store is the shared cache: a tag lookup is the lock-free
//! read, and publishing the same tag twice is idempotent because the
//! content is identical by construction of the hash.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::manifest::Manifest;

/// Fixed fallback when an image build fails.
pub const DEFAULT_BASE_IMAGE: &str = "python:3.11-slim";

/// Repository part of derived image tags.
pub const IMAGE_REPOSITORY: &str = "remedy-env";

/// Dependency files recognized in a project directory, in fixed order.
pub const DEPENDENCY_FILES: &[&str] = &["requirements.txt", "package.json", "go.mod", "Cargo.toml"];

/// Deterministic description of one execution image.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BuildSpec {
    /// Base image, selected from the dependency files present.
    pub base_image: String,

    /// Recognized dependency files, name to contents.
    pub dependency_files: BTreeMap<String, String>,

    /// Environment baked into the image.
    pub env: BTreeMap<String, String>,
}

impl BuildSpec {
    /// Derive a build spec from a project directory and manifest.
    ///
    /// Identical dependency-file contents and manifest env always yield an
    /// identical spec.
    pub fn derive(project_dir: Option<&Path>, manifest: &Manifest) -> Result<BuildSpec> {
        let mut dependency_files = BTreeMap::new();
        if let Some(dir) = project_dir {
            for name in DEPENDENCY_FILES {
                let path = dir.join(name);
                if path.is_file() {
                    dependency_files.insert((*name).to_string(), std::fs::read_to_string(&path)?);
                }
            }
        }

        let base_image = if dependency_files.contains_key("package.json") {
            "node:20-slim"
        } else if dependency_files.contains_key("go.mod") {
            "golang:1.22"
        } else if dependency_files.contains_key("Cargo.toml") {
            "rust:1.75-slim"
        } else {
            DEFAULT_BASE_IMAGE
        };

        Ok(BuildSpec {
            base_image: base_image.to_string(),
            dependency_files,
            env: manifest.env.clone(),
        })
    }

    /// Whether this spec adds nothing to its base image.
    pub fn is_trivial(&self) -> bool {
        self.dependency_files.is_empty() && self.env.is_empty()
    }

    /// Stable SHA-256 digest of the spec's canonical JSON form.
    pub fn digest(&self) -> Result<String> {
        let canonical = serde_json::to_vec(self)?;
        let hash = Sha256::digest(&canonical);
        Ok(hex::encode(hash))
    }

    /// Content-addressed image tag: `remedy-env:<first 12 digest chars>`.
    pub fn image_tag(&self) -> Result<String> {
        let digest = self.digest()?;
        Ok(format!("{IMAGE_REPOSITORY}:{}", &digest[..12]))
    }

    /// Render the Dockerfile this spec describes.
    pub fn render_dockerfile(&self) -> String {
        let mut dockerfile = format!("FROM {}\nWORKDIR /workspace\n", self.base_image);

        for (key, value) in &self.env {
            dockerfile.push_str(&format!("ENV {key}={value}\n"));
        }

        if self.dependency_files.contains_key("requirements.txt") {
            dockerfile.push_str("COPY requirements.txt ./\n");
            dockerfile.push_str("RUN pip install --no-cache-dir -r requirements.txt\n");
        }
        if self.dependency_files.contains_key("package.json") {
            dockerfile.push_str("COPY package.json ./\n");
            dockerfile.push_str("RUN npm install\n");
        }
        if self.dependency_files.contains_key("go.mod") {
            dockerfile.push_str("COPY go.mod ./\n");
            dockerfile.push_str("RUN go mod download\n");
        }
        if self.dependency_files.contains_key("Cargo.toml") {
            dockerfile.push_str("COPY Cargo.toml ./\n");
        }

        dockerfile
    }
}
