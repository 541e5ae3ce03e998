//! Daemon configuration access.
//!
//! Extracts broker connection details from the daemon's TOML
//! configuration, reads the persisted client id, builds bus topic names,
//! and performs the line-level config rewrites the test flows need
//! (forcing a local broker, toggling the facts-file key).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Broker connection parameters extracted from the daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerDetails {
    pub host: String,
    pub port: u16,
    /// Namespace segment prepended to every topic the daemon uses.
    pub path_prefix: String,
}

/// Shape of the configuration entries this harness cares about; all other
/// keys in the file are ignored.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    server: Vec<String>,
    #[serde(rename = "path-prefix")]
    path_prefix: Option<String>,
}

/// Reads broker host, port and path prefix from the daemon config file.
///
/// The first entry of the `server` array is authoritative. `path-prefix`
/// defaults to `"yggdrasil"` when absent. A missing file surfaces as a
/// not-found error (the underlying `io::Error` stays in the chain); a
/// missing or empty `server` array, or a URL without a parseable port, is
/// an invalid-configuration error naming the offending entry.
pub fn broker_details(config_path: &Path) -> Result<BrokerDetails> {
    let raw = fs::read_to_string(config_path)
        .with_context(|| format!("unable to read config file {}", config_path.display()))?;
    let config: RawConfig = toml::from_str(&raw)
        .with_context(|| format!("unable to parse config file {}", config_path.display()))?;

    let url = config
        .server
        .first()
        .ok_or_else(|| anyhow::anyhow!("no 'server' entry found in {}", config_path.display()))?;
    let (host, port) = parse_server_url(url)?;

    Ok(BrokerDetails {
        host,
        port,
        path_prefix: config
            .path_prefix
            .unwrap_or_else(|| crate::DEFAULT_PATH_PREFIX.to_string()),
    })
}

/// Splits a broker URL such as `mqtt://localhost:1883` into host and port.
///
/// The scheme is optional. Bracketed IPv6 literals (`[::1]:1883`) are
/// detected and unbracketed; for everything else the split happens on the
/// last colon, so an unbracketed IPv6 host still passes through as long
/// as a port is present.
fn parse_server_url(url: &str) -> Result<(String, u16)> {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);

    let (host, port) = if let Some(rest) = without_scheme.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| anyhow::anyhow!("unterminated IPv6 literal in server URL: {url}"))?;
        let port = after
            .strip_prefix(':')
            .ok_or_else(|| anyhow::anyhow!("no port specified in server URL: {url}"))?;
        (host, port)
    } else {
        without_scheme
            .rsplit_once(':')
            .ok_or_else(|| anyhow::anyhow!("no port specified in server URL: {url}"))?
    };

    let port = port
        .parse::<u16>()
        .with_context(|| format!("invalid port in server URL: {url}"))?;
    Ok((host.to_string(), port))
}

/// Reads the daemon's persisted client id.
///
/// The id is treated as an opaque string; a missing or empty file is an
/// immediate error so callers never subscribe to a malformed topic.
pub fn client_id(path: &Path) -> Result<String> {
    let id = fs::read_to_string(path)
        .with_context(|| format!("unable to read client id file {}", path.display()))?;
    let id = id.trim_end().to_string();
    if id.is_empty() {
        return Err(anyhow::anyhow!("client id file {} is empty", path.display()));
    }
    Ok(id)
}

/// Topic the daemon publishes control messages (including
/// connection-status events) on.
pub fn control_topic(path_prefix: &str, client_id: &str) -> String {
    format!("{path_prefix}/{client_id}/control/out")
}

/// Topic the daemon consumes inbound data messages from.
pub fn data_in_topic(path_prefix: &str, client_id: &str) -> String {
    format!("{path_prefix}/{client_id}/data/in")
}

/// Replaces every `server =` line (commented out or not) with a single
/// entry pointing at `url`, inserted right below the first line.
pub fn force_server_entry(config_path: &Path, url: &str) -> Result<()> {
    rewrite_lines(config_path, |lines| {
        lines.retain(|line| !is_key_line(line, "server"));
        let entry = format!("server = [\"{url}\"]");
        let at = lines.len().min(1);
        lines.insert(at, entry);
    })
}

/// Comments out every top-level `key` line.
pub fn comment_out_key(config_path: &Path, key: &str) -> Result<()> {
    rewrite_lines(config_path, |lines| {
        for line in lines.iter_mut() {
            if line.starts_with(key) {
                *line = format!("#{line}");
            }
        }
    })
}

/// Undoes [`comment_out_key`]: strips one leading `#` from every
/// `#key` line.
pub fn uncomment_key(config_path: &Path, key: &str) -> Result<()> {
    rewrite_lines(config_path, |lines| {
        for line in lines.iter_mut() {
            if let Some(rest) = line.strip_prefix('#') {
                if rest.starts_with(key) {
                    *line = rest.to_string();
                }
            }
        }
    })
}

fn rewrite_lines(config_path: &Path, edit: impl FnOnce(&mut Vec<String>)) -> Result<()> {
    let raw = fs::read_to_string(config_path)
        .with_context(|| format!("unable to read config file {}", config_path.display()))?;
    let mut lines: Vec<String> = raw.lines().map(str::to_string).collect();
    edit(&mut lines);
    let mut rewritten = lines.join("\n");
    rewritten.push('\n');
    fs::write(config_path, rewritten)
        .with_context(|| format!("unable to write config file {}", config_path.display()))
}

/// True when `line` is an assignment to `key`, with or without a leading
/// comment marker.
fn is_key_line(line: &str, key: &str) -> bool {
    let content = line.strip_prefix('#').unwrap_or(line);
    match content.strip_prefix(key) {
        Some(rest) => rest.trim_start().starts_with('='),
        None => false,
    }
}
