//! Cache command - inspect and clear the result cache.

use clap::{Args, Subcommand};
use console::style;

use fidex_core::ResultCache;

use super::load_config;

/// Arguments for the cache command.
#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    command: CacheCommand,
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Show the cache directory
    Path,

    /// Remove all cached results
    Clear,
}

pub async fn run(args: CacheArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let cache = ResultCache::new(config.cache.root_path);

    match args.command {
        CacheCommand::Path => {
            println!("{}", cache.root().display());
            if !config.cache.enabled {
                println!("{} Caching is disabled in the configuration.", style("ℹ").blue());
            }
        }
        CacheCommand::Clear => {
            let removed = cache.clear()?;
            println!(
                "{} Removed {} cached results from {}",
                style("✓").green(),
                removed,
                cache.root().display()
            );
        }
    }

    Ok(())
}
