//! Collectable metadata categories

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CollectError;

/// A metadata category the collector knows how to probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Process environment variables
    Env,
    /// Installed packages and versions
    Packages,
    /// Running processes
    Processes,
    /// Local time of the probe
    Time,
    /// CPU description from `/proc/cpuinfo`
    Cpu,
    /// MPI launcher path and version
    Mpi,
    /// Network interfaces and addresses
    Network,
    /// Virtual machines known to libvirt
    Vms,
    /// Local user accounts
    Users,
    /// Mounted filesystems
    Mounts,
    /// Revisions of configured git checkouts
    Git,
}

impl Category {
    /// Every category
    pub const ALL: [Category; 11] = [
        Category::Env,
        Category::Packages,
        Category::Processes,
        Category::Time,
        Category::Cpu,
        Category::Mpi,
        Category::Network,
        Category::Vms,
        Category::Users,
        Category::Mounts,
        Category::Git,
    ];

    /// Categories collected when none are requested
    ///
    /// Leaves out `env`, which tends to carry credentials.
    pub const DEFAULT: [Category; 10] = [
        Category::Packages,
        Category::Processes,
        Category::Time,
        Category::Cpu,
        Category::Mpi,
        Category::Network,
        Category::Vms,
        Category::Users,
        Category::Mounts,
        Category::Git,
    ];

    /// Record key for this category
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Env => "env",
            Category::Packages => "packages",
            Category::Processes => "processes",
            Category::Time => "time",
            Category::Cpu => "cpu",
            Category::Mpi => "mpi",
            Category::Network => "network",
            Category::Vms => "vms",
            Category::Users => "users",
            Category::Mounts => "mounts",
            Category::Git => "git",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CollectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CollectError::Parse(format!("unknown category: {s}")))
    }
}
