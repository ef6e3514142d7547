//! Readiness waits for the two slow external conditions: droplet network
//! address assignment and sshd accepting connections. Both are the same
//! bounded poll with different probes.

use std::net::Ipv4Addr;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;

use crate::application::ports::{CloudProvisioner, RemoteShell};
use crate::application::services::poll;
use crate::domain::error::TimeoutError;
use crate::domain::session::{NodeId, ShellSession};

/// Poll the droplet until a public IPv4 address is assigned.
///
/// # Errors
///
/// Returns `TimeoutError` when `timeout` elapses, the provisioner's own
/// error if a query fails (including the droplet disappearing), or an
/// interruption error when the cancel flag flips mid-wait.
pub async fn await_network_address(
    cloud: &impl CloudProvisioner,
    id: &NodeId,
    interval: Duration,
    timeout: Duration,
    cancel: &watch::Receiver<bool>,
) -> Result<Ipv4Addr> {
    poll::until(interval, timeout, cancel, move || cloud.node_address(id))
        .await?
        .ok_or_else(|| {
            TimeoutError {
                what: "droplet network address",
                limit: timeout,
            }
            .into()
        })
}

/// Repeatedly attempt to open a shell session until the droplet's sshd
/// accepts one. Transient refusals during the boot window are retried.
///
/// # Errors
///
/// Returns `TimeoutError` when `timeout` elapses without an open session,
/// or an interruption error when the cancel flag flips mid-wait.
pub async fn await_shell_ready(
    shell: &impl RemoteShell,
    address: Ipv4Addr,
    interval: Duration,
    timeout: Duration,
    cancel: &watch::Receiver<bool>,
) -> Result<ShellSession> {
    poll::until(interval, timeout, cancel, move || shell.try_open(address))
        .await?
        .ok_or_else(|| {
            TimeoutError {
                what: "ssh on the droplet",
                limit: timeout,
            }
            .into()
        })
}
