//! Tunable settings and the provisioning plan derived from them.
//!
//! Defaults match the droplet this tool has always created: a small Ubuntu
//! droplet in nyc3 running tinyproxy on port 8888, reached through a local
//! tunnel on port 3128.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::session::{ProvisionRequest, TunnelSpec};

/// User-tunable settings, optionally loaded from
/// `~/.droplet-proxy/config.yaml`. Missing keys fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub droplet_name: String,
    pub region: String,
    pub size: String,
    pub image: String,
    /// Local port the tunnel listens on and iptables redirects to.
    pub local_proxy_port: u16,
    /// Proxy listener as seen from the droplet itself.
    pub remote_bind_host: String,
    pub remote_proxy_port: u16,
    /// SSH identity file; defaults to `~/.ssh/digitalocean` when unset.
    pub identity_file: Option<PathBuf>,
    /// How long to wait for the droplet to get a public IPv4 address.
    pub boot_timeout_secs: u64,
    /// How long to wait for sshd to accept connections after boot.
    pub shell_timeout_secs: u64,
    pub poll_interval_secs: u64,
    /// Command run on the droplet to install the proxy software.
    pub provision_command: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            droplet_name: "proxy-US".into(),
            region: "nyc3".into(),
            size: "s-1vcpu-512mb-10gb".into(),
            image: "ubuntu-20-04-x64".into(),
            local_proxy_port: 3128,
            remote_bind_host: "localhost".into(),
            remote_proxy_port: 8888,
            identity_file: None,
            boot_timeout_secs: 300,
            shell_timeout_secs: 180,
            poll_interval_secs: 1,
            provision_command: "sudo apt-get update && sudo apt-get install -y tinyproxy".into(),
        }
    }
}

impl Settings {
    /// Freeze these settings into the plan for one ON attempt.
    #[must_use]
    pub fn plan(&self, ssh_key_id: &str, identity_file: PathBuf) -> ProvisionPlan {
        ProvisionPlan {
            request: ProvisionRequest {
                name: self.droplet_name.clone(),
                region: self.region.clone(),
                size: self.size.clone(),
                image: self.image.clone(),
                ssh_keys: vec![ssh_key_id.to_owned()],
                backups: false,
                ipv6: true,
            },
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            boot_timeout: Duration::from_secs(self.boot_timeout_secs),
            shell_timeout: Duration::from_secs(self.shell_timeout_secs),
            provision_command: self.provision_command.clone(),
            local_proxy_port: self.local_proxy_port,
            remote_bind_host: self.remote_bind_host.clone(),
            remote_proxy_port: self.remote_proxy_port,
            identity_file,
        }
    }
}

/// Everything the lifecycle controller needs for one ON/OFF cycle,
/// constructed once before provisioning starts.
#[derive(Debug, Clone)]
pub struct ProvisionPlan {
    pub request: ProvisionRequest,
    pub poll_interval: Duration,
    pub boot_timeout: Duration,
    pub shell_timeout: Duration,
    pub provision_command: String,
    pub local_proxy_port: u16,
    pub remote_bind_host: String,
    pub remote_proxy_port: u16,
    pub identity_file: PathBuf,
}

impl ProvisionPlan {
    #[must_use]
    pub fn tunnel_spec(&self, address: std::net::Ipv4Addr) -> TunnelSpec {
        TunnelSpec {
            local_port: self.local_proxy_port,
            remote_bind_host: self.remote_bind_host.clone(),
            remote_port: self.remote_proxy_port,
            address,
            identity_file: self.identity_file.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_stock_droplet() {
        let settings = Settings::default();
        assert_eq!(settings.droplet_name, "proxy-US");
        assert_eq!(settings.region, "nyc3");
        assert_eq!(settings.local_proxy_port, 3128);
        assert_eq!(settings.remote_proxy_port, 8888);
        assert_eq!(settings.poll_interval_secs, 1);
    }

    #[test]
    fn plan_carries_the_ssh_key_into_the_request() {
        let plan = Settings::default().plan("key-42", PathBuf::from("/tmp/id"));
        assert_eq!(plan.request.ssh_keys, vec!["key-42".to_owned()]);
        assert!(!plan.request.backups);
        assert!(plan.request.ipv6);
    }

    #[test]
    fn tunnel_spec_forwards_the_configured_ports() {
        let plan = Settings::default().plan("key-42", PathBuf::from("/tmp/id"));
        let spec = plan.tunnel_spec(std::net::Ipv4Addr::new(203, 0, 113, 5));
        assert_eq!(spec.local_port, 3128);
        assert_eq!(spec.remote_bind_host, "localhost");
        assert_eq!(spec.remote_port, 8888);
    }
}
