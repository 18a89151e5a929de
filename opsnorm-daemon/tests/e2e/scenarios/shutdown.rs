//! Shutdown flushes pending records and cleans up.

use std::time::Duration;

use opsnorm_daemon::orchestrator::Orchestrator;

use crate::helpers::assertions::read_records;
use crate::helpers::config::TestEnv;

#[tokio::test]
async fn pending_record_is_flushed_on_shutdown() {
    // idle flush disabled: the lone record can only close at shutdown
    let env = TestEnv::new()
        .tune(|c| c.pipeline.flush_timeout_ms = 0)
        .receiver("solr", "solr_system", "solr.log");
    env.append(
        "solr.log",
        &["2022-01-06 04:20:00.000 INFO  (main) [   ] o.a.s.c.SolrCore Loading core"],
    );

    let mut orchestrator = Orchestrator::build_from_config(env.config())
        .await
        .expect("build");

    let output = env.output_path();
    let check_pending = async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        // still pending while running
        assert!(read_records(&output).is_empty());
        Ok::<_, anyhow::Error>("test")
    };
    orchestrator.run_until(check_pending).await.expect("run");

    let records = read_records(&env.output_path());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["fields"]["message"], "Loading core");
}

#[tokio::test]
async fn failed_trigger_still_cleans_up() {
    let env = TestEnv::new()
        .pid_file("opsnorm.pid")
        .receiver("solr", "solr_system", "solr.log");
    env.append(
        "solr.log",
        &["2022-01-06 04:20:00.000 WARN  (main) [   ] o.a.s.c.SolrCore slow"],
    );

    let mut orchestrator = Orchestrator::build_from_config(env.config())
        .await
        .expect("build");
    let trigger = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Err::<&'static str, _>(anyhow::anyhow!("signal handler failed"))
    };

    let err = orchestrator.run_until(trigger).await.expect_err("trigger error");
    assert!(err.to_string().contains("signal handler failed"));
    assert!(!env.root().join("opsnorm.pid").exists());
    assert_eq!(read_records(&env.output_path()).len(), 1);
}
