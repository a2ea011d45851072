use clap::Parser;
use pricectl::{Config, cli, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = pricectl::config::Args::parse();

    let config = Config::load(&args)?;

    // If --validate flag is set, exit successfully after config validation
    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    telemetry::init_tracing()?;

    tracing::debug!("{:?}", args);

    cli::run(args, config).await
}
