//! Log files in, JSON lines out.

use std::time::Duration;

use opsnorm_daemon::orchestrator::Orchestrator;

use crate::helpers::assertions::{read_records, stop_after};
use crate::helpers::config::TestEnv;

const COUCHDB_ACCESS: &str = "[notice] 2021-12-02T23:36:42.555157Z node@host <0.1.0> tag 127.0.0.1 1.2.3.4 user GET /path 201 ok 16";
const GC_START: &str = "[2022-01-17T18:31:37.240+0000][652141][gc,start    ] GC(3) Pause Young (Normal) (G1 Evacuation Pause)";

async fn run_for(env: &TestEnv, millis: u64) {
    let mut orchestrator = Orchestrator::build_from_config(env.config())
        .await
        .expect("build");
    orchestrator
        .run_until(stop_after(Duration::from_millis(millis)))
        .await
        .expect("run");
}

#[tokio::test]
async fn solr_exception_becomes_one_record() {
    let env = TestEnv::new().receiver("solr", "solr_system", "solr.log");
    env.append(
        "solr.log",
        &[
            "2022-01-06 04:20:00.000 INFO  (main) [   ] o.a.s.c.SolrCore Loading core",
            "2022-01-06 04:20:01.100 ERROR (main) [   ] o.a.s.c.SolrCore Failed => java.lang.IllegalStateException: boom",
            "\tat org.apache.solr.core.SolrCore.<init>(SolrCore.java:1012)",
            "\tat org.apache.solr.core.CoreContainer.create(CoreContainer.java:1397)",
        ],
    );

    run_for(&env, 400).await;

    let records = read_records(&env.output_path());
    assert_eq!(records.len(), 2);

    let first = &records[0];
    assert_eq!(first["receiver"], "solr");
    assert_eq!(first["fields"]["severity"], "INFO");

    let second = &records[1];
    assert_eq!(second["fields"]["severity"], "ERROR");
    assert_eq!(second["fields"]["message"], "Failed");
    assert!(
        second["fields"]["exception"]
            .as_str()
            .is_some_and(|e| e.contains("CoreContainer.java:1397"))
    );
    assert!(
        second["timestamp"]
            .as_str()
            .is_some_and(|ts| ts.starts_with("2022-01-06T04:20:01.1"))
    );
    assert_eq!(
        second["fields"]["labels"]["instrumentation_source"],
        "opsnorm/solr_system"
    );
}

#[tokio::test]
async fn receivers_share_the_output() {
    let env = TestEnv::new()
        .receiver("couch", "couchdb", "couchdb.log")
        .receiver("gc", "elasticsearch_gc", "gc.log");
    env.append("couchdb.log", &[COUCHDB_ACCESS]);
    env.append("gc.log", &[GC_START]);

    run_for(&env, 400).await;

    let mut records = read_records(&env.output_path());
    records.sort_by(|a, b| a["receiver"].as_str().cmp(&b["receiver"].as_str()));
    assert_eq!(records.len(), 2);

    assert_eq!(records[0]["receiver"], "couch");
    assert_eq!(records[0]["fields"]["httpRequest"]["status"], 201);
    assert_eq!(records[0]["fields"]["severity"], "NOTICE");

    assert_eq!(records[1]["receiver"], "gc");
    assert_eq!(records[1]["fields"]["gc_run"], 3);
}

#[tokio::test]
async fn appended_lines_are_picked_up() {
    let env = TestEnv::new().receiver("couch", "couchdb", "couchdb.log");
    let mut orchestrator = Orchestrator::build_from_config(env.config())
        .await
        .expect("build");

    let writer = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        env.append("couchdb.log", &[COUCHDB_ACCESS, COUCHDB_ACCESS]);
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok::<_, anyhow::Error>("test")
    };
    orchestrator.run_until(writer).await.expect("run");

    assert_eq!(read_records(&env.output_path()).len(), 2);
}

#[tokio::test]
async fn custom_rule_set_from_rule_dir() {
    let env = TestEnv::new()
        .rule_file(
            "myapp.yaml",
            r#"
name: myapp
processors:
  - type: parse_regex
    rules:
      - pattern: '^(?<ts>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}) (?<level>[A-Z]+) (?<message>.*)$'
        time_field: ts
        time_format: '%Y-%m-%d %H:%M:%S'
  - type: modify_fields
    rules:
      - field: { dest: severity, move_from: level, map_values: { WARN: WARNING }, map_values_exclusive: true }
"#,
        )
        .receiver("app", "myapp", "app.log");
    env.append("app.log", &["2024-03-01 10:00:00 WARN disk almost full"]);

    run_for(&env, 400).await;

    let records = read_records(&env.output_path());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["fields"]["severity"], "WARNING");
    assert_eq!(records[0]["fields"]["message"], "disk almost full");
    assert!(records[0]["fields"].get("level").is_none());
}
