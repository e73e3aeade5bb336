//! CLI entry point.
//!
//! Loads `.env`, parses arguments, sets up logging and dispatches to the
//! handlers. Only `fetch` bootstraps the download engine.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mediafetch_cli::bootstrap::load_config;
use mediafetch_cli::handlers::{self, fetch::FetchArgs};
use mediafetch_cli::{Cli, CliError, Commands};

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.download_dir.as_deref())?;

    match cli.command {
        Commands::Fetch {
            sources,
            category,
            play,
            no_organize,
        } => {
            let config = if no_organize {
                config.with_organize(false)
            } else {
                config
            };
            let args = FetchArgs {
                sources,
                category,
                play,
            };
            handlers::fetch::execute(config, args).await?;
        }
        Commands::Classify {
            filenames,
            category,
            json,
        } => handlers::classify::execute(&filenames, category, json)?,
        Commands::Sweep => handlers::sweep::execute(&config)?,
        Commands::Disk => handlers::disk::execute(&config)?,
        Commands::Config => handlers::config::execute(&config)?,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        let code = err.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
        std::process::exit(code);
    }
}
