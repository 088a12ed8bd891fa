use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chunkflow")]
#[command(author, version, about = "Chunk-to-buffer handoff simulator")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a manifest's chunks into a sample buffer and report their ranges
    Simulate {
        /// Chunk manifest (JSON)
        #[arg(required = true)]
        manifest: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Abandon these chunk indices before they load
        #[arg(long = "cancel", value_name = "INDEX")]
        cancel: Vec<u32>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
