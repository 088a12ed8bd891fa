mod cli;

use chunkflow::{config, manifest::Manifest, simulate};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "chunkflow=debug,chunkflow_media=trace,chunkflow_common=debug".to_string()
        } else {
            "chunkflow=info,chunkflow_media=warn".to_string()
        }
    });

    // Reports go to stdout, logs to stderr
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Simulate {
            manifest,
            json,
            cancel,
        } => run_simulation(&manifest, cli.config.as_deref(), json, &cancel),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("chunkflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_simulation(
    manifest_path: &Path,
    config_path: Option<&Path>,
    json: bool,
    cancel: &[u32],
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let manifest = Manifest::load(manifest_path)?;
    let media_root = manifest.media_root(manifest_path);

    tracing::info!(
        "Simulating {} chunks from {:?}",
        manifest.chunks.len(),
        media_root
    );

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(simulate::simulate(&manifest, &media_root, &config, cancel))?;

    if json || config.output.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", simulate::render_table(&report));
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(path)?;
    config::validate_config(&config)?;

    match path {
        Some(p) => println!("Configuration valid: {:?}", p),
        None => println!("Configuration valid (defaults)"),
    }
    println!("  sample size: {} bytes", config.loader.sample_size);
    println!("  keyframe interval: {}", config.loader.keyframe_interval);
    println!("  evict consumed: {}", config.buffer.evict_consumed);

    Ok(())
}
