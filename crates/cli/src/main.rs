mod base_metrics;
mod bootstrap;
mod config_commands;
mod render_commands;
mod run_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::{config_commands::ConfigAction, render_commands::Format};

#[derive(Parser)]
#[command(name = "tally", about = "Tally, application metrics with push reporters")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery in ./ and ~/.config/tally/).
    #[arg(long, global = true, env = "TALLY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the enabled reporters (default when no subcommand is provided).
    Run,
    /// Print one export of the registries.
    Render {
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
        /// `/<registry>` or `/<registry>/<metric>`; empty renders everything.
        #[arg(long, default_value = "")]
        path: String,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "tally starting");

    let config_path = cli.config.as_deref();
    match cli.command {
        None | Some(Commands::Run) => {
            let config = bootstrap::load_config(config_path)?;
            let telemetry = bootstrap::build(&config)?;
            run_commands::handle_run(&config, &telemetry).await
        },
        Some(Commands::Render { format, path }) => {
            let config = bootstrap::load_config(config_path)?;
            let telemetry = bootstrap::build(&config)?;
            render_commands::handle_render(&telemetry, format, &path)
        },
        Some(Commands::Config { action }) => config_commands::handle_config(action, config_path),
    }
}
