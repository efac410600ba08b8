//! Parsers for probe command output
//!
//! Each parser turns the raw stdout of one probe into the JSON value stored
//! under its category.

use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::error::CollectError;

/// `name<TAB>version` lines, as printed by `dpkg-query -W -f` and `rpm -qa
/// --queryformat`
#[must_use]
pub fn packages(output: &str) -> Value {
    let mut packages = Map::new();

    for line in output.lines() {
        let Some((name, version)) = line.split_once('\t') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        packages.insert(name.to_string(), json!(version.trim()));
    }

    Value::Object(packages)
}

/// `ps -eo pid=,comm=` output
#[must_use]
pub fn processes(output: &str) -> Value {
    let processes: Vec<Value> = output
        .lines()
        .filter_map(|line| {
            let (pid, name) = line.trim().split_once(char::is_whitespace)?;
            let pid: u32 = pid.parse().ok()?;
            Some(json!({"pid": pid, "name": name.trim()}))
        })
        .collect();

    Value::Array(processes)
}

/// `/proc/cpuinfo`: fields of the first processor block plus the processor
/// count
///
/// # Errors
/// Returns `Parse` if no processor block is present.
pub fn cpuinfo(output: &str) -> Result<Value, CollectError> {
    let mut fields = Map::new();
    let mut processors = 0u32;

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key == "processor" {
            processors += 1;
        }
        if processors == 1 && !key.is_empty() {
            fields.insert(key.replace(' ', "_"), json!(value.trim()));
        }
    }

    if processors == 0 {
        return Err(CollectError::Parse("no processor entries in cpuinfo".to_string()));
    }

    fields.remove("processor");
    fields.insert("processors".to_string(), json!(processors));
    Ok(Value::Object(fields))
}

/// First non-empty line of `mpirun --version`
///
/// # Errors
/// Returns `Parse` if the output is blank.
pub fn mpi_version(output: &str) -> Result<String, CollectError> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CollectError::Parse("empty mpirun version output".to_string()))
}

/// `ip -j addr show`, reduced to `ifname → {mac, state, ipv4, ipv6}`
///
/// # Errors
/// Returns `Parse` if the output is not the expected JSON.
pub fn ip_addresses(output: &str) -> Result<Value, CollectError> {
    #[derive(Deserialize)]
    struct LinkRow {
        ifname: String,
        #[serde(default)]
        address: Option<String>,
        #[serde(default)]
        operstate: Option<String>,
        #[serde(default)]
        addr_info: Vec<AddrRow>,
    }

    #[derive(Deserialize)]
    struct AddrRow {
        family: String,
        local: Option<String>,
        prefixlen: Option<u8>,
    }

    let rows: Vec<LinkRow> =
        serde_json::from_str(output).map_err(|e| CollectError::Parse(e.to_string()))?;

    let mut interfaces = Map::new();
    for row in rows {
        let mut ipv4 = Vec::new();
        let mut ipv6 = Vec::new();

        for addr in row.addr_info {
            let Some(local) = addr.local else { continue };
            let cidr = match addr.prefixlen {
                Some(len) => format!("{local}/{len}"),
                None => local,
            };
            match addr.family.as_str() {
                "inet" => ipv4.push(cidr),
                "inet6" => ipv6.push(cidr),
                _ => {}
            }
        }

        interfaces.insert(
            row.ifname,
            json!({
                "mac": row.address.unwrap_or_default(),
                "state": row.operstate.unwrap_or_default(),
                "ipv4": ipv4,
                "ipv6": ipv6,
            }),
        );
    }

    Ok(Value::Object(interfaces))
}

/// `getent passwd` lines
#[must_use]
pub fn passwd(output: &str) -> Value {
    let users: Vec<Value> = output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 7 {
                return None;
            }
            Some(json!({
                "name": fields[0],
                "uid": fields[2].parse::<u32>().ok(),
                "gid": fields[3].parse::<u32>().ok(),
                "home": fields[5],
                "shell": fields[6],
            }))
        })
        .collect();

    Value::Array(users)
}

/// `/proc/mounts` lines
#[must_use]
pub fn mounts(output: &str) -> Value {
    let mounts: Vec<Value> = output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let device = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next()?;
            let options = fields.next().unwrap_or_default();
            Some(json!({
                "device": device,
                "mount_point": unescape_mount_path(mount_point),
                "filesystem": fs_type,
                "options": options,
            }))
        })
        .collect();

    Value::Array(mounts)
}

/// One name per line, as printed by `virsh list --all --name`
#[must_use]
pub fn names(output: &str) -> Value {
    Value::Array(
        output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| json!(line))
            .collect(),
    )
}

/// `/proc/mounts` escapes space, tab, newline and backslash as octal
fn unescape_mount_path(raw: &str) -> String {
    raw.replace("\\040", " ")
        .replace("\\011", "\t")
        .replace("\\012", "\n")
        .replace("\\134", "\\")
}
