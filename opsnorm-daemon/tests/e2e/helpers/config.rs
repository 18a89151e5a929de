//! Test configuration builder.
//!
//! [`TestEnv`] owns a temp directory with a `logs/` subdirectory for input
//! files and an `out.jsonl` output path, and builds an `OpsnormConfig`
//! pointing at them.

use std::io::Write;
use std::path::{Path, PathBuf};

use opsnorm_core::config::{OpsnormConfig, ReceiverConfig};
use tempfile::TempDir;

/// Temp layout for one scenario.
pub struct TestEnv {
    dir: TempDir,
    config: OpsnormConfig,
}

#[allow(dead_code)]
impl TestEnv {
    /// File output, fast polling, read from head, no PID file.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("logs")).expect("logs dir");

        let mut config = OpsnormConfig::default();
        config.general.pid_file = String::new();
        config.pipeline.poll_interval_ms = 20;
        config.pipeline.flush_timeout_ms = 50;
        config.pipeline.read_from_head = true;
        config.output.kind = "file".to_owned();
        config.output.path = dir.path().join("out.jsonl").to_string_lossy().into_owned();

        Self { dir, config }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn log_dir(&self) -> PathBuf {
        self.dir.path().join("logs")
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.config.output.path)
    }

    /// Add a receiver reading `logs/<file_name>`.
    pub fn receiver(mut self, name: &str, kind: &str, file_name: &str) -> Self {
        let include = self.log_dir().join(file_name).to_string_lossy().into_owned();
        self.config.receivers.push(ReceiverConfig {
            name: name.to_owned(),
            kind: kind.to_owned(),
            include_paths: vec![include],
            exclude_paths: vec![],
        });
        self
    }

    /// Write a YAML rule set into `rules/` and point `rule_dir` at it.
    pub fn rule_file(mut self, file_name: &str, yaml: &str) -> Self {
        let rules = self.dir.path().join("rules");
        std::fs::create_dir_all(&rules).expect("rules dir");
        std::fs::write(rules.join(file_name), yaml).expect("write rule file");
        self.config.pipeline.rule_dir = rules.to_string_lossy().into_owned();
        self
    }

    pub fn pid_file(mut self, file_name: &str) -> Self {
        self.config.general.pid_file = self
            .dir
            .path()
            .join(file_name)
            .to_string_lossy()
            .into_owned();
        self
    }

    pub fn tune(mut self, f: impl FnOnce(&mut OpsnormConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Append lines to `logs/<file_name>`, creating it if needed.
    pub fn append(&self, file_name: &str, lines: &[&str]) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_dir().join(file_name))
            .expect("open log file");
        for line in lines {
            writeln!(file, "{line}").expect("append line");
        }
    }

    pub fn config(&self) -> OpsnormConfig {
        self.config.clone()
    }
}
