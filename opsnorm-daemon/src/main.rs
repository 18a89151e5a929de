use anyhow::Result;
use clap::Parser;

use opsnorm_core::config::OpsnormConfig;
use opsnorm_daemon::cli::DaemonCli;
use opsnorm_daemon::logging;
use opsnorm_daemon::orchestrator::{Orchestrator, build_registry};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = OpsnormConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load {}: {}", cli.config.display(), e))?;
    cli.apply_overrides(&mut config);

    if cli.validate {
        return validate(&config).await;
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "opsnorm-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    orchestrator.run().await?;

    tracing::info!("opsnorm-daemon shut down");
    Ok(())
}

/// `--validate`: check the config and that every receiver type resolves.
async fn validate(config: &OpsnormConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    let registry = build_registry(&config.pipeline.rule_dir).await?;
    for receiver in &config.receivers {
        if !registry.contains(&receiver.kind) {
            return Err(anyhow::anyhow!(
                "receiver '{}' has unknown type '{}' (known: {})",
                receiver.name,
                receiver.kind,
                registry.type_names().join(", ")
            ));
        }
    }

    println!(
        "configuration valid: {} receiver(s), output {}",
        config.receivers.len(),
        config.output.kind
    );
    Ok(())
}
