//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::net::Ipv4Addr;
use std::process::Output;

use anyhow::Result;

use crate::domain::session::{NodeId, ProvisionRequest, ShellSession, TunnelSpec};

// ── Cloud Port ────────────────────────────────────────────────────────────────

/// Droplet lifecycle against the cloud provider's API.
#[allow(async_fn_in_trait)]
pub trait CloudProvisioner {
    /// Create a droplet. On success a billable remote resource exists.
    async fn create_node(&self, request: &ProvisionRequest) -> Result<NodeId>;

    /// Query the droplet once for a public IPv4 address. `Ok(None)` while
    /// the address has not been assigned yet.
    ///
    /// # Errors
    ///
    /// Returns `ProvisionError::NodeGone` if the droplet disappeared, or an
    /// API error for any other failed query.
    async fn node_address(&self, id: &NodeId) -> Result<Option<Ipv4Addr>>;

    /// Delete the droplet. Idempotent: an already-deleted droplet is
    /// success. Failure is returned so the caller can report it through
    /// its own output path; cleanup callers downgrade it to a warning.
    async fn destroy_node(&self, id: &NodeId) -> Result<()>;
}

// ── Remote Shell Port ─────────────────────────────────────────────────────────

/// Remote command execution over an encrypted channel.
#[allow(async_fn_in_trait)]
pub trait RemoteShell {
    /// One attempt to open an authenticated session and run a no-op probe.
    /// `Ok(None)` for transient failures during the boot window (connection
    /// refused, auth not ready). The caller owns the returned session and
    /// must `close` it.
    async fn try_open(&self, address: Ipv4Addr) -> Result<Option<ShellSession>>;

    /// Run a command through the session, blocking until the remote process
    /// exits.
    ///
    /// # Errors
    ///
    /// Returns `RemoteExecError` on a non-zero exit status or when the
    /// session dies mid-execution.
    async fn run_command(&self, session: &ShellSession, command: &str) -> Result<()>;

    /// Release the session. Safe on an already-dead session.
    async fn close(&self, session: ShellSession);
}

// ── Traffic Redirection Port ──────────────────────────────────────────────────

/// A running tunnel process owned by the caller.
#[allow(async_fn_in_trait)]
pub trait Tunnel {
    /// Resolve when the tunnel process exits on its own.
    async fn wait(&mut self) -> Result<()>;

    /// Kill the tunnel process. Best-effort.
    async fn terminate(&mut self);
}

/// Local network redirection rules and the tunnel carrying redirected
/// traffic to the droplet.
#[allow(async_fn_in_trait)]
pub trait TrafficRedirector {
    type Tunnel: Tunnel;

    /// Install the rules redirecting outbound TCP 80/443 to
    /// `local_proxy_port`. Idempotent: rules already present are not
    /// duplicated.
    ///
    /// # Errors
    ///
    /// Returns `PrivilegeError` when elevated privileges are unavailable.
    async fn enable_redirection(&self, local_proxy_port: u16) -> Result<()>;

    /// Remove the rules. Best-effort; absent rules are not an error.
    async fn disable_redirection(&self, local_proxy_port: u16);

    /// Spawn the long-lived encrypted tunnel. The caller owns the handle
    /// and must terminate it during OFF.
    async fn start_tunnel(&self, spec: &TunnelSpec) -> Result<Self::Tunnel>;
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output. On timeout the child is
    /// killed, not left orphaned.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;

    /// Run a program with inherited stdio and return only its exit status.
    async fn run_status(&self, program: &str, args: &[&str]) -> Result<std::process::ExitStatus>;

    /// Spawn a program without waiting for it to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned.
    fn spawn(&self, program: &str, args: &[&str]) -> Result<tokio::process::Child>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit status lines without
/// depending on the Presentation layer. Sync trait; no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
