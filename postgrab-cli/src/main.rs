mod cli;
mod commands;
mod config;
mod error;
mod output;

use crate::{
    cli::{Args, Commands},
    commands::CommandExecutor,
    config::AppConfig,
    error::Result,
};
use clap::{CommandFactory, Parser};
#[cfg(feature = "colored-output")]
use colored::*;
use std::path::Path;
use std::process;
use tracing::{Level, debug, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args).await {
        error!("postgrab failed: {}", e);
        #[cfg(feature = "colored-output")]
        eprintln!("{} {}", "Error:".red().bold(), e);
        #[cfg(not(feature = "colored-output"))]
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config_path = args.config.as_deref();

    let executor = match args.command {
        Commands::Completions { shell } => {
            let mut cmd = Args::command();
            let bin_name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
            return Ok(());
        }
        Commands::Config { show, reset } => return manage_config(config_path, show, reset),
        _ => {
            let mut config = AppConfig::load(config_path)?;
            if let Some(retries) = args.retries {
                config.platforms.retry.max_attempts = retries.max(1);
            }
            debug!("Loaded configuration: {:?}", config);
            CommandExecutor::new(config, args.proxy.into_proxy())?
        }
    };
    let timeout_secs = args.timeout.unwrap_or(executor.default_timeout());

    let result = match args.command {
        Commands::Fetch {
            url,
            output,
            output_file,
        } => {
            executor
                .fetch(&url, output, output_file.as_deref(), timeout_secs)
                .await
        }
        Commands::Download {
            url,
            output_dir,
            no_caption,
        } => {
            executor
                .download(&url, output_dir.as_deref(), !no_caption, timeout_secs)
                .await
        }
        Commands::Platforms { output } => executor.list_platforms(output).await,
        Commands::AuthMode { mode } => executor.auth_mode(mode).await,
        Commands::Login { status } => executor.login(status).await,
        Commands::Logout => executor.logout().await,
        Commands::Completions { .. } | Commands::Config { .. } => Ok(()),
    };

    executor.shutdown().await;
    result
}

fn manage_config(config_path: Option<&Path>, show: bool, reset: bool) -> Result<()> {
    if reset {
        let path = AppConfig::reset(config_path)?;
        println!("✓ Configuration at {} reset to defaults", path.display());
    } else if show {
        println!("{}", AppConfig::load(config_path)?.show()?);
    } else {
        println!("Use --show to print the configuration or --reset to restore the defaults");
    }
    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = match (verbose, quiet) {
        (_, true) => EnvFilter::new("error"),
        (true, _) => EnvFilter::new("debug"),
        _ => EnvFilter::from_default_env().add_directive(Level::INFO.into()),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_level(verbose))
        .with(filter)
        .init();
}
