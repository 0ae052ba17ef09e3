use campaign_forge::host::{DocumentHost, MemoryHost};
use campaign_forge::{CliArgs, GeneratorConfig, LoggingConfig, init_logging, run_stdio};
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = init_logging(LoggingConfig::from_env())?;

    let cli = CliArgs::parse();
    let config = GeneratorConfig::from_args(cli)?;

    let host: Arc<dyn DocumentHost> = match config.document.as_deref() {
        Some(path) => Arc::new(MemoryHost::from_snapshot_file(path)?),
        None => Arc::new(MemoryHost::new()),
    };

    run_stdio(host, config).await
}
