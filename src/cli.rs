use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sensorbox")]
#[command(about = "SensorBox task lifecycle service", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to `SENSORBOX_CONFIG` or `config/sensorbox.toml`)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API and the message consumer
    Serve(ServeArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Override `server.bind_addr`
    #[arg(long)]
    pub address: Option<SocketAddr>,
}
