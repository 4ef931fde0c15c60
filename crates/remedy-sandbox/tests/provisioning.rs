//! Provisioning scenarios against a scripted engine.

use std::sync::Arc;
use std::time::Duration;

use remedy_sandbox::fakes::ScriptedEngine;
use remedy_sandbox::{
    BuildSpec, HealthCheck, HealthPolicy, HealthState, LogObserver, Manifest, Provisioner,
    ServiceSpec, DEFAULT_BASE_IMAGE,
};

fn fast_policy() -> HealthPolicy {
    HealthPolicy {
        timeout: Duration::from_millis(30),
        interval: Duration::from_millis(5),
        settle: Duration::from_millis(1),
    }
}

fn manifest_with_probed_service() -> Manifest {
    Manifest {
        services: vec![ServiceSpec {
            name: "db".to_string(),
            image: "postgres:16".to_string(),
            env: Default::default(),
            healthcheck: Some(HealthCheck {
                command: "pg_isready -U postgres".to_string(),
            }),
            allow_network: false,
        }],
        ..Manifest::default()
    }
}

/// Scenario C: a sidecar whose probe never turns healthy is marked
/// degraded, provisioning completes anyway, and the session is usable.
#[tokio::test]
async fn never_healthy_sidecar_degrades_without_aborting() {
    let engine =
        Arc::new(ScriptedEngine::new().with_health_sequence(vec![HealthState::Starting]));
    let provisioner = Provisioner::new(engine.clone()).with_health_policy(fast_policy());

    let session = provisioner
        .provision_session(&manifest_with_probed_service(), "python:3.11-slim".to_string())
        .await
        .expect("provisioning must not abort on a degraded sidecar");

    assert_eq!(session.sidecars.len(), 1);
    assert!(session.sidecars[0].degraded);
    // The network and sidecar exist: the execution cell can still run.
    assert_eq!(engine.networks_created().len(), 1);
    assert_eq!(engine.started_containers().len(), 1);

    provisioner.teardown(session).await;
    assert_eq!(engine.removed_networks().len(), 1);
}

/// Scenario D: two investigations over byte-identical inputs share one
/// image build and reference the same final tag.
#[tokio::test]
async fn identical_inputs_share_one_image_build() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("requirements.txt"), "fastapi==0.110\n").unwrap();
    let manifest = Manifest::default();

    let engine = Arc::new(ScriptedEngine::new());
    let provisioner_a = Provisioner::new(engine.clone());
    let provisioner_b = Provisioner::new(engine.clone());

    let (tag_a, tag_b) = tokio::join!(
        provisioner_a.ensure_image(Some(dir.path()), &manifest, &LogObserver),
        provisioner_b.ensure_image(Some(dir.path()), &manifest, &LogObserver),
    );
    let tag_a = tag_a.unwrap();
    let tag_b = tag_b.unwrap();

    assert_eq!(tag_a, tag_b);
    // Publishing is idempotent on the tag; redundant concurrent builds are
    // tolerated but the sequential rerun must hit the cache.
    let tag_c = provisioner_a
        .ensure_image(Some(dir.path()), &manifest, &LogObserver)
        .await
        .unwrap();
    assert_eq!(tag_c, tag_a);
    assert!(engine.build_count() <= 2);

    let spec = BuildSpec::derive(Some(dir.path()), &manifest).unwrap();
    assert_eq!(spec.image_tag().unwrap(), tag_a);
}

/// Build failure falls back to the default base image; the observer still
/// received nothing and provisioning proceeds.
#[tokio::test]
async fn build_failure_falls_back_and_session_still_provisions() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("requirements.txt"), "requests\n").unwrap();

    let engine = Arc::new(ScriptedEngine::new().failing_builds());
    let provisioner = Provisioner::new(engine.clone()).with_health_policy(fast_policy());

    let image = provisioner
        .ensure_image(Some(dir.path()), &Manifest::default(), &LogObserver)
        .await
        .unwrap();
    assert_eq!(image, DEFAULT_BASE_IMAGE);

    let session = provisioner
        .provision_session(&Manifest::default(), image)
        .await
        .unwrap();
    assert_eq!(session.image_ref, DEFAULT_BASE_IMAGE);
    provisioner.teardown(session).await;
}

/// Sessions are independent: each gets its own network name, so two
/// concurrent investigations never share mutable provisioning state.
#[tokio::test]
async fn concurrent_sessions_have_independent_networks() {
    let engine = Arc::new(ScriptedEngine::new());
    let provisioner = Provisioner::new(engine.clone()).with_health_policy(fast_policy());

    let manifest_a = Manifest::default();
    let manifest_b = Manifest::default();
    let (a, b) = tokio::join!(
        provisioner.provision_session(&manifest_a, "python:3.11-slim".to_string()),
        provisioner.provision_session(&manifest_b, "python:3.11-slim".to_string()),
    );
    let a = a.unwrap();
    let b = b.unwrap();

    assert_ne!(a.session_id, b.session_id);
    assert_ne!(a.network, b.network);
    assert_eq!(engine.networks_created().len(), 2);
}
