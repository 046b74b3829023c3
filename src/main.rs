use anyhow::{Context, Result};
use clap::Parser;
use eventflow::dsl::load_flows_from_dir;
use eventflow::monitoring::{init_logging, LogExt, MonitoringConfig};
use eventflow::stdlib::registry_with_builtins;
use eventflow::{install_global, local_dispatcher, EngineConfig, FlowExecutor};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Run one flow instance and print its outcome as JSON
#[derive(Debug, Parser)]
#[command(name = "eventflow", version, about)]
struct Cli {
    /// Flow to run
    flow_id: String,

    /// Directory holding `.yml` / `.yaml` flow documents
    #[arg(long, env = "EVENTFLOW_FLOW_DIR", default_value = "flows")]
    flows: PathBuf,

    /// Initial payload, as JSON
    #[arg(long, default_value = "{}")]
    payload: String,

    /// Correlation id; generated when absent
    #[arg(long)]
    correlation_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let monitoring = MonitoringConfig::from_env();
    init_logging(&monitoring).context("Failed to initialize logging")?;
    let config = EngineConfig::load();

    let flows = load_flows_from_dir(&cli.flows)
        .with_context(|| format!("Failed to load flows from {}", cli.flows.display()))?;
    let payload: Value =
        serde_json::from_str(&cli.payload).context("Payload is not valid JSON")?;

    let plugins = install_global(registry_with_builtins()?)
        .context("Failed to install plugin registry")?;
    let dispatcher = local_dispatcher().context("Failed to register local functions")?;
    let executor = FlowExecutor::new(Arc::new(flows), plugins, Arc::new(dispatcher))
        .with_config(config);

    let handle = executor.start_flow(&cli.flow_id, payload, cli.correlation_id);
    info!(flow_id = %cli.flow_id, correlation_id = %handle.correlation_id(), "Flow submitted");

    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling flow before its next task");
            token.cancel();
        }
    });

    let outcome = handle.join().await.log_err("Flow failed")?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
