//! High-level metadata collection API

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use hostmeta_core::{HostSnapshot, MetadataRecord};
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

use crate::category::Category;
use crate::error::CollectError;
use crate::parse;
use crate::runner::{CommandRunner, shell_quote};

const DPKG_QUERY: &str = r"dpkg-query -W -f='${Package}\t${Version}\n'";
const RPM_QUERY: &str = r"rpm -qa --queryformat '%{NAME}\t%{VERSION}-%{RELEASE}\n'";

/// Metadata collector
///
/// Probes the host one category at a time. Every probe is independent: one
/// failing does not stop the others.
pub struct Collector {
    runner: Arc<dyn CommandRunner>,
    /// Per-probe timeout
    timeout: Duration,
    /// Checkout name → path, reported under `git`
    git_paths: BTreeMap<String, PathBuf>,
}

impl Collector {
    /// Create a new collector
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            timeout: Duration::from_secs(60),
            git_paths: BTreeMap::new(),
        }
    }

    /// Set probe timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the git checkouts whose revision is reported
    #[must_use]
    pub fn with_git_paths(mut self, git_paths: BTreeMap<String, PathBuf>) -> Self {
        self.git_paths = git_paths;
        self
    }

    /// Collect the requested categories into a snapshot of this host
    ///
    /// The record starts from [`MetadataRecord::skeleton`]; a category whose
    /// probe fails keeps its skeleton value (or stays absent) and the failure
    /// is logged.
    ///
    /// # Errors
    /// Returns an error only if the hostname cannot be determined.
    #[instrument(skip_all, fields(runner = self.runner.runner_type()))]
    pub async fn collect(&self, categories: &[Category]) -> Result<HostSnapshot, CollectError> {
        info!(categories = categories.len(), "collecting host metadata");

        let hostname = self.hostname().await?;
        let mut record = MetadataRecord::skeleton();

        for &category in categories {
            match self.get(category).await {
                Ok(value) => {
                    record.insert(category.as_str(), value);
                }
                Err(e) if e.is_unavailable() => {
                    debug!(%category, error = %e, "category not available on this host");
                }
                Err(e) => warn!(%category, error = %e, "failed to collect category"),
            }
        }

        record.insert("collection_time", json!(timestamp()));
        info!(host = %hostname, categories = record.len(), "collection completed");

        Ok(HostSnapshot::new(hostname, record))
    }

    /// Probe a single category
    ///
    /// # Errors
    /// Returns the probe's error.
    pub async fn get(&self, category: Category) -> Result<Value, CollectError> {
        match category {
            Category::Env => Ok(self.get_env()),
            Category::Packages => self.get_packages().await,
            Category::Processes => self.get_processes().await,
            Category::Time => Ok(json!(timestamp())),
            Category::Cpu => self.get_cpu().await,
            Category::Mpi => self.get_mpi().await,
            Category::Network => self.get_network().await,
            Category::Vms => self.get_vms().await,
            Category::Users => self.get_users().await,
            Category::Mounts => self.get_mounts().await,
            Category::Git => self.get_git().await,
        }
    }

    /// Hostname of this machine
    ///
    /// # Errors
    /// Returns an error if `hostname` fails or prints nothing.
    pub async fn hostname(&self) -> Result<String, CollectError> {
        let name = self.run("hostname").await?.trim().to_string();
        if name.is_empty() {
            return Err(CollectError::Parse("empty hostname".to_string()));
        }
        Ok(name)
    }

    /// Environment of the collecting process
    #[must_use]
    pub fn get_env(&self) -> Value {
        let env: Map<String, Value> = std::env::vars().map(|(k, v)| (k, json!(v))).collect();
        Value::Object(env)
    }

    /// Installed packages, from dpkg or else rpm
    ///
    /// # Errors
    /// Returns an error if neither package database can be queried.
    pub async fn get_packages(&self) -> Result<Value, CollectError> {
        let output = match self.run(DPKG_QUERY).await {
            Err(e) if e.is_unavailable() => {
                debug!("dpkg not available, trying rpm");
                self.run(RPM_QUERY).await?
            }
            other => other?,
        };

        let packages = parse::packages(&output);
        debug!(
            count = packages.as_object().map_or(0, Map::len),
            "collected packages"
        );
        Ok(packages)
    }

    /// # Errors
    /// Returns an error if `ps` fails.
    pub async fn get_processes(&self) -> Result<Value, CollectError> {
        let output = self.run("ps -eo pid=,comm=").await?;
        Ok(parse::processes(&output))
    }

    /// # Errors
    /// Returns an error if `/proc/cpuinfo` cannot be read or parsed.
    pub async fn get_cpu(&self) -> Result<Value, CollectError> {
        let output = self.run("cat /proc/cpuinfo").await?;
        parse::cpuinfo(&output)
    }

    /// MPI launcher path and version
    ///
    /// # Errors
    /// Returns an error if `mpirun` is not on the path.
    pub async fn get_mpi(&self) -> Result<Value, CollectError> {
        // `command -v` exits 1, not 127, for an unknown name
        let path = match self.run("command -v mpirun").await {
            Err(CollectError::CommandFailed { status: 1, .. }) => {
                return Err(CollectError::Unavailable("mpirun".to_string()));
            }
            other => other?.trim().to_string(),
        };
        let version = self.run("mpirun --version 2>&1").await?;

        Ok(json!({
            "path": path,
            "version": parse::mpi_version(&version)?,
        }))
    }

    /// # Errors
    /// Returns an error if `ip` fails or prints unexpected output.
    pub async fn get_network(&self) -> Result<Value, CollectError> {
        let output = self.run("ip -j addr show").await?;
        parse::ip_addresses(&output)
    }

    /// Names of libvirt domains, running or not
    ///
    /// # Errors
    /// Returns an error if `virsh` fails.
    pub async fn get_vms(&self) -> Result<Value, CollectError> {
        let output = self.run("virsh list --all --name").await?;
        Ok(parse::names(&output))
    }

    /// # Errors
    /// Returns an error if `getent` fails.
    pub async fn get_users(&self) -> Result<Value, CollectError> {
        let output = self.run("getent passwd").await?;
        Ok(parse::passwd(&output))
    }

    /// # Errors
    /// Returns an error if `/proc/mounts` cannot be read.
    pub async fn get_mounts(&self) -> Result<Value, CollectError> {
        let output = self.run("cat /proc/mounts").await?;
        Ok(parse::mounts(&output))
    }

    /// `git describe --always` for every configured checkout
    ///
    /// A checkout that cannot be described is reported as `null`.
    ///
    /// # Errors
    /// Never fails as a whole; kept fallible to match the other probes.
    pub async fn get_git(&self) -> Result<Value, CollectError> {
        let mut revisions = Map::new();

        for (name, path) in &self.git_paths {
            let cmd = format!(
                "git -C {} describe --always",
                shell_quote(&path.to_string_lossy())
            );
            let revision = match self.run(&cmd).await {
                Ok(out) => json!(out.trim()),
                Err(e) => {
                    warn!(checkout = %name, error = %e, "failed to describe git checkout");
                    Value::Null
                }
            };
            revisions.insert(name.clone(), revision);
        }

        Ok(Value::Object(revisions))
    }

    /// Run a probe, retrying once on a timeout or I/O error
    async fn run(&self, cmd: &str) -> Result<String, CollectError> {
        match self.run_once(cmd).await {
            Err(e) if e.is_retryable() => {
                debug!(command = %cmd, error = %e, "retrying probe");
                self.run_once(cmd).await
            }
            other => other,
        }
    }

    async fn run_once(&self, cmd: &str) -> Result<String, CollectError> {
        self.runner
            .run_with_timeout(cmd, self.timeout)
            .await?
            .into_stdout(cmd)
    }
}

/// Local wall-clock time, microsecond precision
fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}
