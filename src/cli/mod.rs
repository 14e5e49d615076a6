//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "vellum",
    version,
    about = "Multi-tenant document ingestion and retrieval pipeline for RAG backends",
    long_about = "Vellum ingests plain-text documents into a partitioned vector index and \
                  retrieves tenant-scoped passages for question answering. The embedding \
                  variant and store backend are selected by configuration; the generation \
                  model itself stays with the hosting application."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/vellum/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Profile to apply (e.g., "development", "production")
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a plain-text document into the vector index
    Ingest {
        /// Path to the already-extracted plain-text file
        file: PathBuf,

        /// Ingestion mode: "resume", "custom", or any tenant-scoped mode
        #[arg(short, long, default_value = "resume")]
        mode: String,

        /// Tenant id owning the document
        #[arg(short, long)]
        tenant: String,

        /// Subject for shared knowledge domains (custom mode)
        #[arg(short, long)]
        subject: Option<String>,
    },

    /// Retrieve passages for a question and print the assembled
    /// generation request
    Ask {
        /// Question to retrieve context for
        question: String,

        /// Mode the content was ingested under
        #[arg(short, long, default_value = "resume")]
        mode: String,

        /// Tenant id issuing the question
        #[arg(short, long)]
        tenant: String,

        /// Subject for shared knowledge domains (custom mode)
        #[arg(short, long)]
        subject: Option<String>,
    },

    /// Delete a tenant's records (or a whole shared domain) from the index
    Wipe {
        /// Mode whose records should be removed
        #[arg(short, long)]
        mode: String,

        /// Tenant id to wipe (ignored for shared domains)
        #[arg(short, long, default_value = "")]
        tenant: String,

        /// Subject for shared knowledge domains (custom mode)
        #[arg(short, long)]
        subject: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
