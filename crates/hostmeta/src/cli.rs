//! Command-line arguments

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use hostmeta_collect::Category;

use crate::config::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "hostmeta")]
#[command(version, about = "Collect, merge and query compute host metadata", long_about = None)]
pub struct Cli {
    /// Inventory store file (overrides `store.path`)
    #[arg(long, global = true)]
    pub dbfile: Option<PathBuf>,

    /// Configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Raise log verbosity (repeatable)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format (overrides `log.format`)
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Query the inventory store
    Show(ShowArgs),

    /// List all hosts in the store
    #[command(name = "hosts")]
    Hosts,

    /// Collect metadata about this host
    Collect(CollectArgs),

    /// Merge a directory of JSON snapshots
    Merge(MergeArgs),
}

#[derive(Args, Debug, Default)]
pub struct ShowArgs {
    /// Host to show
    #[arg(long)]
    pub host: Option<String>,

    /// Category to show
    #[arg(long)]
    pub key: Option<String>,

    /// List categories of `--host`, or all hosts
    #[arg(long)]
    pub list_keys: bool,
}

#[derive(Args, Debug, Default)]
pub struct CollectArgs {
    /// Write a standalone snapshot file instead of updating the store
    #[arg(long, conflicts_with = "into_dir")]
    pub out: Option<PathBuf>,

    /// Write `<DIR>/<hostname>.json` for a later merge
    #[arg(long, value_name = "DIR")]
    pub into_dir: Option<PathBuf>,

    /// Categories to collect, comma separated
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<Category>,

    /// Free-form comment stored with the record
    #[arg(long)]
    pub comment: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct MergeArgs {
    /// Directory of `*.json` documents
    pub dir: PathBuf,

    /// Output file (overrides `merge.output`)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Nest the merged hosts under this key (overrides `merge.root`)
    #[arg(long)]
    pub root: Option<String>,

    /// Also import the merged hosts into the store
    #[arg(long)]
    pub into_store: bool,
}
