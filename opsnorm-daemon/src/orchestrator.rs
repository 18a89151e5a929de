//! Daemon orchestration -- assembly, lifecycle and shutdown.
//!
//! The [`Orchestrator`] loads configuration, compiles the rule registry
//! (built-in integrations plus YAML rule sets from `rule_dir`), builds the
//! [`LogPipeline`] and wires its record channel to the sink writer.
//!
//! # Startup order
//!
//! 1. PID file
//! 2. Sink writer (consumer first, so sources never block on a missing reader)
//! 3. Log pipeline sources
//!
//! # Shutdown order
//!
//! 1. Log pipeline: sources are cancelled and flush pending records
//! 2. Sink writer: drains the channel, flushes the output
//! 3. PID file removal

use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use opsnorm_core::config::OpsnormConfig;
use opsnorm_core::pipeline::{HealthStatus, Pipeline};
use opsnorm_core::types::LogRecord;
use opsnorm_log_pipeline::{
    LogPipeline, LogPipelineBuilder, PipelineConfig, RuleRegistry, RuleSetLoader,
};

use crate::health::{ComponentHealth, DaemonHealth, aggregate_status};
use crate::metrics_server;
use crate::sink::{RecordOutput, spawn_sink_writer};

/// How often the main loop logs a non-healthy status.
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// How often the uptime gauge is refreshed.
const UPTIME_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// The main daemon orchestrator.
pub struct Orchestrator {
    config: OpsnormConfig,
    pipeline: LogPipeline,
    record_rx: Option<mpsc::Receiver<LogRecord>>,
    sink_task: Option<JoinHandle<Result<u64>>>,
    shutdown_tx: broadcast::Sender<()>,
    start_time: Instant,
}

impl Orchestrator {
    /// Load `opsnorm.toml` (with environment overrides) and build.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = OpsnormConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    ///
    /// Every receiver type is resolved here; an unknown type fails the
    /// build before anything starts.
    pub async fn build_from_config(config: OpsnormConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let registry = build_registry(&config.pipeline.rule_dir).await?;
        tracing::info!(types = ?registry.type_names(), "rule registry ready");

        let pipeline_config = PipelineConfig::from_core(&config.pipeline, &config.receivers);
        let (pipeline, record_rx) = LogPipelineBuilder::new()
            .config(pipeline_config)
            .registry(registry)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build log pipeline: {}", e))?;

        if config.metrics.enabled {
            metrics_server::record_daemon_metrics(pipeline.receiver_count());
        }

        let (shutdown_tx, _) = broadcast::channel(4);

        tracing::info!(
            receivers = pipeline.receiver_count(),
            output = %config.output.kind,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            pipeline,
            record_rx,
            sink_task: None,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Start everything and block until SIGTERM or SIGINT.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(wait_for_shutdown_signal()).await
    }

    /// Start everything and block until `shutdown` resolves.
    ///
    /// `shutdown` yields the name of the trigger for logging.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = Result<&'static str>>,
    {
        let pid_file = self.pid_file();
        if let Some(path) = &pid_file {
            write_pid_file(path)?;
        }

        if let Err(e) = self.start().await {
            tracing::error!(error = %e, "startup failed");
            self.stop_sink().await;
            if let Some(path) = &pid_file {
                remove_pid_file(path);
            }
            return Err(e);
        }

        let uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, self.shutdown_tx.subscribe()));

        tracing::info!("entering main loop");
        let mut health_tick = tokio::time::interval(HEALTH_CHECK_INTERVAL);
        health_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let trigger = loop {
            tokio::select! {
                signal = &mut shutdown => break signal,
                _ = health_tick.tick() => {
                    let health = self.health().await;
                    if !health.status.is_healthy() {
                        tracing::warn!(status = ?health.status, "daemon not healthy");
                    }
                }
            }
        };

        match &trigger {
            Ok(name) => tracing::info!(signal = name, "shutdown requested"),
            Err(e) => tracing::error!(error = %e, "shutdown trigger failed, stopping"),
        }

        let result = self.shutdown().await;
        if let Some(task) = uptime_task {
            let _ = task.await;
        }
        if let Some(path) = &pid_file {
            remove_pid_file(path);
        }

        trigger.and(result)
    }

    async fn start(&mut self) -> Result<()> {
        let output = RecordOutput::from_config(&self.config.output)?;
        let writer = output.open().await?;
        let record_rx = self
            .record_rx
            .take()
            .ok_or_else(|| anyhow::anyhow!("orchestrator already ran"))?;
        self.sink_task = Some(spawn_sink_writer(
            writer,
            record_rx,
            self.shutdown_tx.subscribe(),
        ));

        self.pipeline
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start log pipeline: {}", e))
    }

    /// Stop the pipeline, then let the sink drain.
    async fn shutdown(&mut self) -> Result<()> {
        let stopped = self
            .pipeline
            .stop()
            .await
            .map_err(|e| anyhow::anyhow!("failed to stop log pipeline: {}", e));
        self.stop_sink().await;
        stopped
    }

    async fn stop_sink(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(task) = self.sink_task.take() {
            match task.await {
                Ok(Ok(written)) => tracing::info!(written, "records written"),
                Ok(Err(e)) => tracing::error!(error = %e, "sink writer failed"),
                Err(e) => tracing::error!(error = %e, "sink writer panicked"),
            }
        }
    }

    fn pid_file(&self) -> Option<std::path::PathBuf> {
        let path = &self.config.general.pid_file;
        (!path.is_empty()).then(|| std::path::PathBuf::from(path))
    }

    /// Current aggregated health.
    pub async fn health(&self) -> DaemonHealth {
        let sink_status = match &self.sink_task {
            Some(task) if task.is_finished() => {
                HealthStatus::Unhealthy("sink writer stopped".to_owned())
            }
            Some(_) => HealthStatus::Healthy,
            None => HealthStatus::Unhealthy("not started".to_owned()),
        };
        let components = vec![
            ComponentHealth::new("log-pipeline", self.pipeline.health_check().await),
            ComponentHealth::new("record-sink", sink_status),
        ];

        DaemonHealth {
            status: aggregate_status(&components),
            uptime_secs: self.start_time.elapsed().as_secs(),
            receivers: self.pipeline.receiver_count(),
            components,
        }
    }

    /// Loaded configuration.
    pub fn config(&self) -> &OpsnormConfig {
        &self.config
    }

    /// The assembled log pipeline.
    pub fn pipeline(&self) -> &LogPipeline {
        &self.pipeline
    }
}

/// Built-in integrations plus every YAML rule set under `rule_dir`.
///
/// An empty `rule_dir` means built-ins only. A configured but unreadable
/// directory is an error.
pub async fn build_registry(rule_dir: &str) -> Result<RuleRegistry> {
    let mut registry = RuleRegistry::with_builtins()
        .map_err(|e| anyhow::anyhow!("failed to compile built-in rule sets: {}", e))?;
    if rule_dir.is_empty() {
        return Ok(registry);
    }

    let rule_sets = RuleSetLoader::load_directory(rule_dir)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load rule sets: {}", e))?;
    for rule_set in &rule_sets {
        registry
            .register(rule_set)
            .map_err(|e| anyhow::anyhow!("rule set '{}': {}", rule_set.name, e))?;
    }
    Ok(registry)
}

/// Wait for SIGTERM or SIGINT and return the signal name.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Write the current PID, refusing to overwrite an existing file.
///
/// The file is created with `create_new` so two daemons cannot race on
/// it. The parent directory is created with mode 0o700.
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            fs::DirBuilder::new()
                .mode(0o700)
                .recursive(true)
                .create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    let pid = std::process::id();
    writeln!(file, "{pid}")?;
    tracing::info!(pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file. Failure is logged, not returned.
pub fn remove_pid_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::info!(path = %path.display(), "PID file removed"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file"),
    }
}

fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    use opsnorm_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPTIME_UPDATE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown_rx.recv() => break,
            }
        }
    })
}
