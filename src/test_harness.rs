//! Composition layer for integration tests against a live yggdrasil
//! installation.
//!
//! Bundles the well-known paths of the installation under test and wires
//! the verification primitives together for the common flows: awaiting a
//! canonical-facts publication, injecting data messages through the
//! command-line tools, and dispatching as an arbitrary user for
//! authorization checks. Also hosts the availability probes the test
//! suite uses to skip gracefully on hosts without the required tooling.

use anyhow::{Context, Result};
use log::info;
use serde_json::Value;
use std::net::TcpStream;
use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use crate::config;
use crate::observer::{self, BrokerAddress};
use crate::service;

/// Handle on the yggdrasil installation of the current host.
#[derive(Debug, Clone)]
pub struct TestEnvironment {
    pub config_path: PathBuf,
    pub client_id_path: PathBuf,
    pub unit: String,
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(crate::DEFAULT_CONFIG_PATH),
            client_id_path: PathBuf::from(crate::CLIENT_ID_PATH),
            unit: crate::YGGDRASIL_UNIT.to_string(),
        }
    }
}

impl TestEnvironment {
    /// Environment rooted at the host's standard installation paths.
    pub fn host() -> Self {
        Self::default()
    }

    /// Forces the daemon onto the local broker, then restarts it and
    /// waits for a connection-status message carrying non-empty canonical
    /// facts on its control topic.
    ///
    /// Returns the canonical-facts mapping, or `None` when nothing
    /// matching arrived within `timeout`.
    pub async fn wait_for_canonical_facts(&self, timeout: Duration) -> Result<Option<Value>> {
        // Point the daemon at the local broker so the facts are
        // observable from this process.
        config::force_server_entry(&self.config_path, crate::LOCAL_BROKER_URL)?;

        let details = config::broker_details(&self.config_path)?;
        let client_id = config::client_id(&self.client_id_path)?;
        let topic = config::control_topic(&details.path_prefix, &client_id);
        let broker = BrokerAddress::new(details.host.clone(), details.port);

        info!("waiting for canonical facts on '{topic}'");
        let unit = self.unit.clone();
        observer::wait_for_message(
            &broker,
            &topic,
            observer::connection_status_facts,
            // Restarting the daemon makes it pick up the rewritten broker
            // URL and republish its status.
            move || async move { service::restart(&unit).await },
            timeout,
        )
        .await
    }

    /// Wraps `payload` in a data message for `directive` and publishes it
    /// on the daemon's inbound data topic via the command-line tools.
    pub async fn publish_data_message(&self, directive: &str, payload: &str) -> Result<()> {
        let details = config::broker_details(&self.config_path)?;
        let client_id = config::client_id(&self.client_id_path)?;
        let topic = config::data_in_topic(&details.path_prefix, &client_id);

        let pipeline = format!(
            "echo '{payload}' \
             | yggctl generate data-message --directive {directive} - \
             | mosquitto_pub --url {}/{topic} --stdin-line",
            crate::LOCAL_BROKER_URL
        );
        info!("publishing data message for directive '{directive}'");
        let output = Command::new("sh")
            .arg("-c")
            .arg(&pipeline)
            .output()
            .await
            .context("failed to run data message pipeline")?;
        if !output.status.success() {
            return Err(anyhow::anyhow!(
                "data message pipeline failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }

    /// Dispatches `payload` to `worker` through `yggctl dispatch`, running
    /// as `user` via a login shell.
    ///
    /// The raw output is returned untouched so callers can assert on exit
    /// status and the daemon's authorization message.
    pub async fn dispatch_as_user(
        &self,
        user: &str,
        worker: &str,
        payload: &str,
    ) -> Result<Output> {
        let command = format!("echo '{payload}' | yggctl dispatch --worker {worker} -");
        info!("dispatching to worker '{worker}' as user '{user}'");
        Command::new("su")
            .arg("-")
            .arg(user)
            .arg("-c")
            .arg(&command)
            .output()
            .await
            .with_context(|| format!("failed to dispatch as user '{user}'"))
    }
}

/// Checks if a command is available on the system PATH.
pub fn command_available(cmd: &str) -> bool {
    std::process::Command::new("which")
        .arg(cmd)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Checks if a broker accepts TCP connections at `host:port`.
pub fn broker_reachable(host: &str, port: u16) -> bool {
    use std::net::ToSocketAddrs;
    let Ok(mut addrs) = (host, port).to_socket_addrs() else {
        return false;
    };
    addrs.any(|addr| TcpStream::connect_timeout(&addr, Duration::from_millis(200)).is_ok())
}

/// Checks if a usable docker daemon is present for container-backed tests.
pub fn docker_available() -> bool {
    std::process::Command::new("docker")
        .arg("info")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// True when the test process runs as root; the lifecycle and
/// authorization flows mutate system state and need it.
pub fn running_as_root() -> bool {
    std::process::Command::new("id")
        .arg("-u")
        .output()
        .map(|output| String::from_utf8_lossy(&output.stdout).trim() == "0")
        .unwrap_or(false)
}
