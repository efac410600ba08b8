//! Subcommand implementations
//!
//! Every command writes its report to the given writer so the dispatch can be
//! tested without a terminal.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use eyre::WrapErr;
use hostmeta_collect::Collector;
use hostmeta_core::{InventoryError, InventoryStore, MergeBatch};
use serde_json::{Value, json};
use tracing::info;

use crate::cli::{CollectArgs, MergeArgs, ShowArgs};
use crate::config::{CollectConfig, MergeConfig};

const SHOW_USAGE: &str = "usage: hostmeta show [--host HOST] [--key KEY] [--list-keys]";

/// How a command ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// A lookup missed; the message says what was not found
    NotFound(String),
    /// Nothing to do with the given arguments
    Usage,
}

impl Outcome {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Outcome::Done => ExitCode::SUCCESS,
            Outcome::NotFound(_) => ExitCode::from(1),
            Outcome::Usage => ExitCode::from(2),
        }
    }
}

/// `hostmeta show`
///
/// The store is only opened once the arguments name something to show.
///
/// # Errors
/// Returns an error if the store cannot be loaded or the output cannot be
/// written; lookup misses are reported through [`Outcome::NotFound`].
pub fn show(store_path: &Path, args: &ShowArgs, out: &mut impl Write) -> eyre::Result<Outcome> {
    if args.host.is_none() && args.key.is_none() && !args.list_keys {
        writeln!(out, "{SHOW_USAGE}")?;
        return Ok(Outcome::Usage);
    }

    let store = InventoryStore::load(store_path)?;
    show_in(&store, args, out)
}

fn show_in(store: &InventoryStore, args: &ShowArgs, out: &mut impl Write) -> eyre::Result<Outcome> {
    let result = match (args.host.as_deref(), args.key.as_deref(), args.list_keys) {
        (Some(host), _, true) => store
            .get_keys(host)
            .map(|keys| print_lines(out, &keys)),
        (Some(host), Some(key), false) => store
            .get_value(host, key)
            .map(|value| print_value(out, value)),
        (None, Some(key), _) => return show_key_across_hosts(store, key, out),
        (Some(host), None, false) => store
            .get_record(host)
            .map(|record| print_value(out, &json!(record))),
        (None, None, true) => Ok(print_lines(out, &store.list_hosts())),
        (None, None, false) => {
            writeln!(out, "{SHOW_USAGE}")?;
            return Ok(Outcome::Usage);
        }
    };

    match result {
        Ok(written) => {
            written?;
            Ok(Outcome::Done)
        }
        Err(e) if e.is_not_found() => Ok(Outcome::NotFound(e.to_string())),
        Err(e) => Err(e.into()),
    }
}

/// Every host's value for `key`, then the hosts that lack it
fn show_key_across_hosts(
    store: &InventoryStore,
    key: &str,
    out: &mut impl Write,
) -> eyre::Result<Outcome> {
    let lookup = store.get_key_across_hosts(key);

    for (host, value) in &lookup.matches {
        writeln!(out, "{host}:")?;
        print_value(out, value)?;
    }
    if !lookup.misses.is_empty() {
        writeln!(out, "key `{key}` not found on: {}", lookup.misses.join(", "))?;
    }

    if lookup.matches.is_empty() {
        return Ok(Outcome::NotFound(format!("key `{key}` not found on any host")));
    }
    Ok(Outcome::Done)
}

/// `hostmeta hosts`
///
/// # Errors
/// Returns an error if the output cannot be written.
pub fn hosts(store: &InventoryStore, out: &mut impl Write) -> eyre::Result<Outcome> {
    print_lines(out, &store.list_hosts())?;
    Ok(Outcome::Done)
}

/// `hostmeta collect`
///
/// # Errors
/// Returns an error if the hostname cannot be determined or the result cannot
/// be written.
pub async fn collect(
    collector: &Collector,
    config: &CollectConfig,
    store_path: &Path,
    args: &CollectArgs,
    out: &mut impl Write,
) -> eyre::Result<Outcome> {
    let categories = if args.only.is_empty() {
        config.categories()
    } else {
        args.only.clone()
    };

    let mut snapshot = collector.collect(&categories).await?;
    if let Some(comment) = &args.comment {
        snapshot.record.insert("comment", json!(comment));
    }

    if let Some(path) = &args.out {
        snapshot.write(path)?;
        writeln!(out, "wrote {} to {}", snapshot.hostname, path.display())?;
    } else if let Some(dir) = &args.into_dir {
        let path = snapshot.write_into_dir(dir).map_err(|e| match e {
            InventoryError::AlreadyExists(path) => eyre::eyre!(
                "{} already exists; remove it or collect with --out",
                path.display()
            ),
            other => other.into(),
        })?;
        writeln!(out, "wrote {} to {}", snapshot.hostname, path.display())?;
    } else {
        let mut store = InventoryStore::load(store_path)?;
        let verb = if store.contains_host(&snapshot.hostname) {
            "replaced"
        } else {
            "stored"
        };
        store.add_host(snapshot.hostname.clone(), snapshot.record);
        store.persist()?;
        writeln!(out, "{verb} {} in {}", snapshot.hostname, store_path.display())?;
    }

    Ok(Outcome::Done)
}

/// `hostmeta merge`
///
/// # Errors
/// Returns an error if the directory cannot be read, a document is malformed,
/// or an output cannot be written.
pub fn merge(
    config: &MergeConfig,
    store_path: &Path,
    args: &MergeArgs,
    out: &mut impl Write,
) -> eyre::Result<Outcome> {
    let mut batch = MergeBatch::read_directory(&args.dir)
        .wrap_err_with(|| format!("failed to merge {}", args.dir.display()))?;
    let documents = batch.len();

    let hosts = batch.combine_flat().clone();
    if let Some(root) = args.root.as_deref().or(config.root.as_deref()) {
        batch.combine_nested(root);
    }

    let output = args.out.as_deref().unwrap_or(&config.output);
    batch.write(output)?;
    info!(documents, output = %output.display(), "merge written");
    writeln!(
        out,
        "merged {documents} documents into {}",
        output.display()
    )?;

    if args.into_store {
        let mut store = InventoryStore::load(store_path)?;
        let imported = store.import(&hosts)?;
        store.persist()?;
        writeln!(out, "imported {imported} hosts into {}", store_path.display())?;
    }

    Ok(Outcome::Done)
}

fn print_lines(out: &mut impl Write, lines: &[String]) -> std::io::Result<()> {
    for line in lines {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

fn print_value(out: &mut impl Write, value: &Value) -> std::io::Result<()> {
    match value {
        Value::String(s) => writeln!(out, "{s}"),
        other => {
            serde_json::to_writer_pretty(&mut *out, other)?;
            writeln!(out)
        }
    }
}
