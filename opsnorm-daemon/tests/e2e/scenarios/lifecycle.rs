//! Build -> run -> shutdown lifecycle.

use std::time::Duration;

use opsnorm_core::pipeline::HealthStatus;
use opsnorm_daemon::orchestrator::Orchestrator;

use crate::helpers::assertions::{read_records, stop_after, wait_for_file};
use crate::helpers::config::TestEnv;

#[tokio::test]
async fn runs_with_no_receivers() {
    let env = TestEnv::new();
    let mut orchestrator = Orchestrator::build_from_config(env.config())
        .await
        .expect("build");
    assert_eq!(orchestrator.pipeline().receiver_count(), 0);

    orchestrator
        .run_until(stop_after(Duration::from_millis(100)))
        .await
        .expect("run");

    assert!(env.output_path().exists(), "output opened at startup");
    assert!(read_records(&env.output_path()).is_empty());
}

#[tokio::test]
async fn health_before_start_is_unhealthy() {
    let env = TestEnv::new().receiver("solr", "solr_system", "solr.log");
    let orchestrator = Orchestrator::build_from_config(env.config())
        .await
        .expect("build");

    let health = orchestrator.health().await;
    assert!(health.status.is_unhealthy());
    assert_eq!(health.receivers, 1);
    assert_eq!(health.components.len(), 2);
    assert!(
        health
            .components
            .iter()
            .all(|c| matches!(c.status, HealthStatus::Unhealthy(_)))
    );
}

#[tokio::test]
async fn pid_file_lives_for_the_run() {
    let env = TestEnv::new().pid_file("run/opsnorm.pid");
    let pid_path = env.root().join("run/opsnorm.pid");
    let mut orchestrator = Orchestrator::build_from_config(env.config())
        .await
        .expect("build");

    let run = tokio::spawn(async move {
        orchestrator
            .run_until(stop_after(Duration::from_millis(300)))
            .await
    });

    wait_for_file(&pid_path).await;
    let content = std::fs::read_to_string(&pid_path).expect("read pid");
    assert_eq!(content.trim(), std::process::id().to_string());

    run.await.expect("join").expect("run");
    assert!(!pid_path.exists(), "PID file removed after shutdown");
}

#[tokio::test]
async fn second_run_is_rejected() {
    let env = TestEnv::new().pid_file("opsnorm.pid");
    let mut orchestrator = Orchestrator::build_from_config(env.config())
        .await
        .expect("build");

    orchestrator
        .run_until(stop_after(Duration::from_millis(50)))
        .await
        .expect("first run");

    let err = orchestrator
        .run_until(stop_after(Duration::from_millis(50)))
        .await
        .expect_err("record channel already consumed");
    assert!(err.to_string().contains("already ran"));
    assert!(!env.root().join("opsnorm.pid").exists());
}
