//! Stagegate CLI entry point.

use anyhow::Result;
use clap::Parser;

use stagegate::cli::{commands, handle_error, Cli, Commands};
use stagegate::domain::models::Config;
use stagegate::infrastructure::config::ConfigLoader;
use stagegate::infrastructure::logging::LoggerImpl;

fn load_config(cli: &Cli) -> Result<Config> {
    match cli.config {
        Some(ref path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Serve(args) => commands::serve::execute(args, &config, cli.json).await,
        Commands::Item(args) => commands::item::execute(args, &config, cli.json).await,
        Commands::Stage(args) => commands::stage::execute(args, &config, cli.json).await,
        Commands::Persona(args) => commands::persona::execute(args, &config, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
