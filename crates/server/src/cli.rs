//! Command-line interface.

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "vigil", version, about = "Monitoring-rule evaluation engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the engine server.
    Server(ServerArgs),
}

#[derive(Args, Debug)]
pub struct ServerArgs {
    /// How the configuration is loaded. Only `file` is supported here;
    /// `apollo` refers to the config-center deployment.
    #[arg(short = 't', long = "type", default_value = "file")]
    pub config_type: String,

    /// Path to the configuration file.
    #[arg(short = 'c', long = "conf", default_value = "conf/vigil.toml")]
    pub config: String,
}
