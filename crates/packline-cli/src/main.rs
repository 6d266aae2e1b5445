#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use packline_core::{Config, Mode};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "packline")]
#[command(author, version, about = "Build, serve and inspect a web application", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Project config file (overrides discovery of packline.config.json / .js)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Build mode: development or production
    #[arg(long, global = true, env = "NODE_ENV", default_value = "production")]
    mode: Mode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Build the project into the output directory
    Build,

    /// Build in development mode, serve the output and rebuild on change
    Dev {
        /// Port to listen on (overrides devServer.port)
        #[arg(long)]
        port: Option<u16>,

        /// Host to bind to (overrides devServer.host)
        #[arg(long)]
        host: Option<String>,
    },

    /// Print the resolved configuration as JSON
    Inspect,

    /// Show which rule and loader pipeline apply to a file
    Route {
        /// File path, relative to the project root
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd)
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json)
        .with_mode(cli.mode)
        .with_config_file(cli.config);

    // Version output needs no subscriber
    if matches!(cli.command, Commands::Version) {
        return commands::version::run(cli.json);
    }

    logging::init(config.verbosity, config.json_logs);

    match cli.command {
        Commands::Version => commands::version::run(cli.json),
        Commands::Build => commands::build::run(&config, cli.json),
        Commands::Dev { port, host } => {
            let action = commands::dev::DevAction { config, port, host };
            let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
            runtime.block_on(commands::dev::run(action))
        }
        Commands::Inspect => commands::inspect::run(&config, cli.json),
        Commands::Route { file } => commands::route::run(&config, &file, cli.json),
    }
}
