//! Local traffic redirection, implementing `TrafficRedirector`.
//!
//! Two iptables NAT rules push outbound web traffic into the local tunnel
//! port, and an `ssh -N -L` child process carries it to the droplet.

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, TrafficRedirector, Tunnel};
use crate::domain::error::PrivilegeError;
use crate::domain::session::TunnelSpec;

/// Outbound destination ports that get redirected into the proxy.
const REDIRECTED_PORTS: [u16; 2] = [80, 443];

pub struct IptablesRedirector<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> IptablesRedirector<R> {
    #[must_use]
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    // Runner failures (spawn, timeout) pass through untouched; only a
    // rule iptables refuses to add is a privilege problem.
    async fn iptables(&self, args: &[String]) -> Result<std::process::Output> {
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner.run("sudo", &refs).await.context("running iptables")
    }
}

fn rule_args(op: &str, dport: u16, to_port: u16) -> Vec<String> {
    [
        "iptables",
        "-t",
        "nat",
        op,
        "OUTPUT",
        "-p",
        "tcp",
        "--dport",
        &dport.to_string(),
        "-j",
        "REDIRECT",
        "--to-port",
        &to_port.to_string(),
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

/// The ssh port-forward child. Lives until terminated or the remote end
/// closes the connection.
pub struct SshTunnel {
    child: tokio::process::Child,
}

impl Tunnel for SshTunnel {
    async fn wait(&mut self) -> Result<()> {
        self.child
            .wait()
            .await
            .context("waiting for the ssh tunnel")?;
        Ok(())
    }

    async fn terminate(&mut self) {
        let _ = self.child.kill().await;
    }
}

impl<R: CommandRunner> TrafficRedirector for IptablesRedirector<R> {
    type Tunnel = SshTunnel;

    async fn enable_redirection(&self, local_proxy_port: u16) -> Result<()> {
        for dport in REDIRECTED_PORTS {
            // Check-then-add keeps a second enable from stacking duplicate
            // rules.
            let check = self.iptables(&rule_args("-C", dport, local_proxy_port)).await?;
            if check.status.success() {
                continue;
            }
            let added = self.iptables(&rule_args("-A", dport, local_proxy_port)).await?;
            if !added.status.success() {
                return Err(PrivilegeError(format!(
                    "iptables refused to add the port {dport} redirect rule: {}",
                    String::from_utf8_lossy(&added.stderr).trim()
                ))
                .into());
            }
        }
        Ok(())
    }

    async fn disable_redirection(&self, local_proxy_port: u16) {
        for dport in REDIRECTED_PORTS {
            // Absent rules make -D exit non-zero; that is fine.
            let _ = self.iptables(&rule_args("-D", dport, local_proxy_port)).await;
        }
    }

    async fn start_tunnel(&self, spec: &TunnelSpec) -> Result<SshTunnel> {
        let forward = format!(
            "{}:{}:{}",
            spec.local_port, spec.remote_bind_host, spec.remote_port
        );
        let identity = spec.identity_file.to_string_lossy().to_string();
        let dest = format!("root@{}", spec.address);
        let child = self.runner.spawn(
            "ssh",
            &[
                "-i",
                &identity,
                "-o",
                "StrictHostKeyChecking=accept-new",
                "-o",
                "ExitOnForwardFailure=yes",
                "-N",
                "-L",
                &forward,
                &dest,
            ],
        )?;
        Ok(SshTunnel { child })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::cell::RefCell;
    use std::os::unix::process::ExitStatusExt;
    use std::process::{ExitStatus, Output};

    use super::*;

    /// Runner that replays scripted exit codes and records argv.
    struct ScriptedRunner {
        codes: RefCell<Vec<i32>>,
        calls: RefCell<Vec<Vec<String>>>,
        fail_on_call: Option<usize>,
    }

    impl ScriptedRunner {
        fn new(codes: Vec<i32>) -> Self {
            Self {
                codes: RefCell::new(codes),
                calls: RefCell::new(Vec::new()),
                fail_on_call: None,
            }
        }

        fn argv(&self) -> Vec<Vec<String>> {
            self.calls.borrow().clone()
        }
    }

    impl CommandRunner for ScriptedRunner {
        async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
            let mut call = vec![program.to_owned()];
            call.extend(args.iter().map(|a| (*a).to_owned()));
            self.calls.borrow_mut().push(call);
            if self.fail_on_call == Some(self.calls.borrow().len() - 1) {
                anyhow::bail!("iptables timed out after 30s")
            }
            let code = if self.codes.borrow().is_empty() {
                0
            } else {
                self.codes.borrow_mut().remove(0)
            };
            Ok(Output {
                status: ExitStatus::from_raw(code << 8),
                stdout: Vec::new(),
                stderr: b"permission denied".to_vec(),
            })
        }

        async fn run_status(&self, _: &str, _: &[&str]) -> Result<ExitStatus> {
            anyhow::bail!("not expected")
        }

        fn spawn(&self, _: &str, _: &[&str]) -> Result<tokio::process::Child> {
            anyhow::bail!("not expected")
        }
    }

    #[tokio::test]
    async fn enable_adds_both_rules_when_absent() {
        // -C misses, -A succeeds, for 80 then 443.
        let runner = ScriptedRunner::new(vec![1, 0, 1, 0]);
        let redirector = IptablesRedirector::new(runner);
        redirector.enable_redirection(3128).await.expect("enable");

        let argv = redirector.runner.argv();
        assert_eq!(argv.len(), 4);
        assert!(argv[0].contains(&"-C".to_owned()));
        assert!(argv[1].contains(&"-A".to_owned()));
        assert!(argv[1].contains(&"80".to_owned()));
        assert!(argv[3].contains(&"443".to_owned()));
        assert!(argv[1].contains(&"3128".to_owned()));
    }

    #[tokio::test]
    async fn enable_skips_rules_that_already_exist() {
        // Both -C checks hit; no -A issued.
        let runner = ScriptedRunner::new(vec![0, 0]);
        let redirector = IptablesRedirector::new(runner);
        redirector.enable_redirection(3128).await.expect("enable");

        let argv = redirector.runner.argv();
        assert_eq!(argv.len(), 2);
        assert!(argv.iter().all(|call| call.contains(&"-C".to_owned())));
    }

    #[tokio::test]
    async fn enable_surfaces_a_privilege_error_when_add_fails() {
        let runner = ScriptedRunner::new(vec![1, 4]);
        let redirector = IptablesRedirector::new(runner);
        let err = redirector
            .enable_redirection(3128)
            .await
            .expect_err("expected Err");
        let privilege = err.downcast_ref::<PrivilegeError>().expect("PrivilegeError");
        assert!(privilege.0.contains("port 80"), "got: {}", privilege.0);
    }

    #[tokio::test]
    async fn runner_failures_are_not_labeled_privilege_errors() {
        let runner = ScriptedRunner {
            fail_on_call: Some(0),
            ..ScriptedRunner::new(vec![])
        };
        let redirector = IptablesRedirector::new(runner);
        let err = redirector
            .enable_redirection(3128)
            .await
            .expect_err("expected Err");
        assert!(err.downcast_ref::<PrivilegeError>().is_none(), "got: {err:#}");
        assert!(err.to_string().contains("running iptables"), "got: {err:#}");
    }

    #[tokio::test]
    async fn disable_removes_both_rules_best_effort() {
        // Rules absent: both -D calls fail, and that is not an error.
        let runner = ScriptedRunner::new(vec![1, 1]);
        let redirector = IptablesRedirector::new(runner);
        redirector.disable_redirection(3128).await;

        let argv = redirector.runner.argv();
        assert_eq!(argv.len(), 2);
        assert!(argv.iter().all(|call| call.contains(&"-D".to_owned())));
    }

    #[test]
    fn rule_args_match_the_nat_output_shape() {
        let args = rule_args("-A", 443, 3128);
        assert_eq!(
            args,
            vec![
                "iptables", "-t", "nat", "-A", "OUTPUT", "-p", "tcp", "--dport", "443", "-j",
                "REDIRECT", "--to-port", "3128",
            ]
        );
    }
}
