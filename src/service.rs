//! systemd-backed process control for the daemon under test.
//!
//! The harness never manages the daemon process itself; every lifecycle
//! operation is delegated to `systemctl` and observed through its
//! tri-state activity query.

use anyhow::{Context, Result};
use log::debug;
use std::process::Output;
use tokio::process::Command;

/// Activity of a systemd unit as reported by `systemctl is-active`.
///
/// Probes map this to a boolean through their predicate; the harness
/// itself never collapses `Error` into either of the other states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Active,
    Inactive,
    /// Anything other than a clean active/inactive answer (failed unit,
    /// unknown unit, activating, ...).
    Error,
}

/// Queries the current activity state of `unit`.
pub async fn service_state(unit: &str) -> Result<ServiceState> {
    let output = systemctl(&["is-active", unit]).await?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let state = state_from_output(output.status.success(), stdout.trim());
    debug!("unit '{unit}' is {state:?}");
    Ok(state)
}

fn state_from_output(success: bool, stdout: &str) -> ServiceState {
    if success && stdout == "active" {
        ServiceState::Active
    } else if stdout == "inactive" {
        ServiceState::Inactive
    } else {
        ServiceState::Error
    }
}

pub async fn start(unit: &str) -> Result<()> {
    run_verb("start", unit).await
}

pub async fn stop(unit: &str) -> Result<()> {
    run_verb("stop", unit).await
}

pub async fn restart(unit: &str) -> Result<()> {
    run_verb("restart", unit).await
}

/// Returns the human-readable `systemctl status` text for `unit`.
///
/// `systemctl status` exits non-zero for inactive units, so only a spawn
/// failure is an error here; the caller asserts on the text itself.
pub async fn status_output(unit: &str) -> Result<String> {
    let output = systemctl(&["status", unit]).await?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// True when the unit file is known to systemd on this host.
pub async fn unit_installed(unit: &str) -> bool {
    systemctl(&["cat", unit])
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

async fn run_verb(verb: &str, unit: &str) -> Result<()> {
    let output = systemctl(&[verb, unit]).await?;
    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "systemctl {verb} {unit} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(())
}

async fn systemctl(args: &[&str]) -> Result<Output> {
    debug!("running systemctl {}", args.join(" "));
    Command::new("systemctl")
        .args(args)
        .output()
        .await
        .with_context(|| format!("failed to run systemctl {}", args.join(" ")))
}
