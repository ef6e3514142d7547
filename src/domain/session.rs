//! Session state and provisioning value types.

use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use serde::Serialize;

/// Opaque identifier for a provisioned droplet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A droplet that is believed to exist remotely. Identifier and address are
/// always known together; there is no half-provisioned representation.
#[derive(Debug, Clone)]
pub struct ActiveNode {
    pub id: NodeId,
    pub address: Ipv4Addr,
}

/// Handle for an open remote shell session: an ssh control-master socket
/// bound to the droplet's address. Owned by the session until closed.
#[derive(Debug, Clone)]
pub struct ShellSession {
    pub address: Ipv4Addr,
    pub control_path: PathBuf,
}

/// Immutable description of the droplet to create. Serializes as the
/// DigitalOcean create-droplet request body.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionRequest {
    pub name: String,
    pub region: String,
    pub size: String,
    pub image: String,
    pub ssh_keys: Vec<String>,
    pub backups: bool,
    pub ipv6: bool,
}

/// Parameters for the local-to-remote tunnel process.
#[derive(Debug, Clone)]
pub struct TunnelSpec {
    pub local_port: u16,
    pub remote_bind_host: String,
    pub remote_port: u16,
    pub address: Ipv4Addr,
    pub identity_file: PathBuf,
}

/// The one mutable piece of state in the process: what the lifecycle
/// controller currently holds open. Mutated only during ON and OFF
/// transitions and cleared after a successful OFF.
#[derive(Debug)]
pub struct Session<T> {
    pub node: Option<ActiveNode>,
    pub shell: Option<ShellSession>,
    pub tunnel: Option<T>,
}

impl<T> Session<T> {
    #[must_use]
    pub fn cleared() -> Self {
        Self {
            node: None,
            shell: None,
            tunnel: None,
        }
    }

    /// True when nothing is held: no node, no shell session, no tunnel.
    #[must_use]
    pub fn is_cleared(&self) -> bool {
        self.node.is_none() && self.shell.is_none() && self.tunnel.is_none()
    }
}

impl<T> Default for Session<T> {
    fn default() -> Self {
        Self::cleared()
    }
}
