mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use sensorbox::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Serve(args) => {
            if let Some(address) = args.address {
                config.server.bind_addr = address;
            }
            sensorbox::observability::init_tracing(&config.telemetry.log_filter);
            sensorbox::api::run(config).await?;
        }
        Commands::Config => print!("{}", config.to_toml()?),
    }

    Ok(())
}
