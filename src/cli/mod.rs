//! CLI module for mcp-rag
//!
//! Provides command-line interface parsing for the `rag-context` binary.
//! Uses clap for argument parsing and owo-colors for status messages.

pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// rag-context - manage and query a document retrieval index
#[derive(Parser, Debug)]
#[command(
    name = "rag-context",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "Manage and query a document retrieval index",
    long_about = "Ingests documents into a vector index and retrieves the chunks most\n\
                  relevant to a query. Results are printed as JSON on stdout.",
    after_help = "EXAMPLES:\n    \
                  rag-context ingest ./documents             # Index every markdown file\n    \
                  rag-context ingest ./notes -p '**/*.txt'   # Index text files instead\n    \
                  rag-context query \"what color is the sky\"  # Top chunks for a question\n    \
                  rag-context remove ./documents/old.md      # Drop one document"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "rag.toml", env = "RAG_CONFIG", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index every matching file in a directory
    Ingest {
        /// Directory to ingest (defaults to `ingest.documents_dir`)
        dir: Option<PathBuf>,

        /// Glob matched against paths relative to the directory
        #[arg(short, long)]
        pattern: Option<String>,
    },

    /// Index a single file under an explicit source identifier
    Add {
        /// Source identifier to store the document under
        source: String,

        /// File to read
        file: PathBuf,
    },

    /// Retrieve the chunks most relevant to a query
    Query {
        /// Query text
        text: String,

        /// Number of results (defaults to `retrieval.default_k`)
        #[arg(short)]
        k: Option<usize>,
    },

    /// List indexed source identifiers
    Sources {
        /// Include every chunk and the last update time per source
        #[arg(short, long)]
        detailed: bool,
    },

    /// Remove a document from the index
    Remove {
        /// Source identifier to remove
        source: String,
    },

    /// Remove every document from the index
    Clear,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        let cli = Cli::try_parse_from(["rag-context", "query", "what color is the sky", "-k", "1"])
            .unwrap();
        match cli.command {
            Commands::Query { text, k } => {
                assert_eq!(text, "what color is the sky");
                assert_eq!(k, Some(1));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_ingest_with_global_flags() {
        let cli = Cli::try_parse_from([
            "rag-context",
            "ingest",
            "./docs",
            "--pattern",
            "**/*.txt",
            "--config",
            "custom.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        match cli.command {
            Commands::Ingest { dir, pattern } => {
                assert_eq!(dir, Some(PathBuf::from("./docs")));
                assert_eq!(pattern.as_deref(), Some("**/*.txt"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_sources_detailed() {
        let cli = Cli::try_parse_from(["rag-context", "sources"]).unwrap();
        assert!(matches!(cli.command, Commands::Sources { detailed: false }));

        let cli = Cli::try_parse_from(["rag-context", "sources", "--detailed"]).unwrap();
        assert!(matches!(cli.command, Commands::Sources { detailed: true }));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["rag-context"]).is_err());
    }
}
