//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Browse the notebooklet library
#[derive(Parser, Debug)]
#[command(name = "notebooklets")]
#[command(about = "Browse and search packaged security investigation notebooklets")]
#[command(version)]
pub struct Args {
    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the notebooklet tree
    List {
        /// Extra notebooklet roots (can be repeated)
        #[arg(long)]
        path: Vec<PathBuf>,
    },

    /// Search notebooklets by keyword or regular expression
    Find {
        /// Comma or space separated search terms
        terms: String,

        /// Only show notebooklets matching every term
        #[arg(long)]
        full_match: bool,

        /// Extra notebooklet roots (can be repeated)
        #[arg(long)]
        path: Vec<PathBuf>,
    },

    /// Show help for a notebooklet or folder
    Show {
        /// Dotted path, e.g. azsent.host.HostSummary
        name: String,

        /// Extra notebooklet roots (can be repeated)
        #[arg(long)]
        path: Vec<PathBuf>,
    },

    /// List known and default data providers
    Providers {
        /// Primary query provider, overriding the config file
        #[arg(long)]
        query_provider: Option<String>,

        /// Provider list, e.g. `--providers=+ipstacklookup,-geolitelookup`
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        providers: Vec<String>,
    },

    /// List entity pivot functions
    Pivots {
        /// Only show pivots for this entity
        #[arg(long)]
        entity: Option<String>,
    },
}
