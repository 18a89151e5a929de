//! Configuration errors surface at build time, before anything runs.

use opsnorm_daemon::orchestrator::Orchestrator;

use crate::helpers::config::TestEnv;

async fn build_err(env: &TestEnv) -> String {
    match Orchestrator::build_from_config(env.config()).await {
        Ok(_) => panic!("build should fail"),
        Err(e) => e.to_string(),
    }
}

#[tokio::test]
async fn unknown_receiver_type() {
    let env = TestEnv::new().receiver("x", "nginx_access", "x.log");
    let err = build_err(&env).await;
    assert!(err.contains("nginx_access"), "got: {err}");
}

#[tokio::test]
async fn missing_rule_dir() {
    let env = TestEnv::new().tune(|c| c.pipeline.rule_dir = "/nonexistent/opsnorm/rules".into());
    let err = build_err(&env).await;
    assert!(err.contains("rule sets"), "got: {err}");
}

#[tokio::test]
async fn file_output_without_path() {
    let env = TestEnv::new().tune(|c| c.output.path.clear());
    let err = build_err(&env).await;
    assert!(err.contains("output.path"), "got: {err}");
}

#[tokio::test]
async fn relative_include_path() {
    let env = TestEnv::new().tune(|c| {
        c.receivers.push(opsnorm_core::config::ReceiverConfig {
            name: "rel".into(),
            kind: "couchdb".into(),
            include_paths: vec!["logs/*.log".into()],
            exclude_paths: vec![],
        });
    });
    let err = build_err(&env).await;
    assert!(err.contains("absolute"), "got: {err}");
}

#[tokio::test]
async fn duplicate_receiver_names() {
    let env = TestEnv::new()
        .receiver("dup", "couchdb", "a.log")
        .receiver("dup", "solr_system", "b.log");
    let err = build_err(&env).await;
    assert!(err.contains("duplicate"), "got: {err}");
}

#[tokio::test]
async fn builtin_name_in_rule_dir_is_ignored() {
    let env = TestEnv::new()
        .rule_file(
            "couchdb.yml",
            "name: couchdb\nprocessors:\n  - type: parse_json\n",
        )
        .receiver("couch", "couchdb", "couchdb.log");

    let orchestrator = Orchestrator::build_from_config(env.config())
        .await
        .expect("shadowing rule set is skipped, not fatal");
    assert_eq!(orchestrator.pipeline().registry().type_names().len(), 4);
}

#[tokio::test]
async fn missing_config_file() {
    let result = Orchestrator::build(std::path::Path::new("/nonexistent/opsnorm.toml")).await;
    let err = result.err().expect("missing file").to_string();
    assert!(err.contains("failed to load config"), "got: {err}");
}
