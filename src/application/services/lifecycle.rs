//! The ON/OFF lifecycle state machine.
//!
//! Imports only from `crate::domain` and `crate::application`. All I/O is
//! routed through the injected port traits, so the whole machine runs
//! against mocks in tests.

use anyhow::{Context, Result};
use tokio::sync::watch;

use crate::application::ports::{
    CloudProvisioner, ProgressReporter, RemoteShell, TrafficRedirector, Tunnel,
};
use crate::application::services::readiness;
use crate::domain::session::{ActiveNode, NodeId, Session};
use crate::domain::settings::ProvisionPlan;

/// Where the controller currently is in the ON/OFF cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Provisioning,
    Active,
    TearingDown,
}

/// Owns the one `Session` in the process and drives the ports through the
/// `IDLE → PROVISIONING → ACTIVE → TEARING_DOWN → IDLE` cycle.
///
/// Cancellation is cooperative: the Ctrl-C handler only flips the watch
/// flag, and the controller observes it at the next step boundary, at the
/// next readiness poll iteration, or in the ACTIVE wait. An in-flight
/// remote command runs to completion before teardown begins.
pub struct LifecycleController<'a, C, S, R, P>
where
    C: CloudProvisioner,
    S: RemoteShell,
    R: TrafficRedirector,
    P: ProgressReporter,
{
    cloud: &'a C,
    shell: &'a S,
    redirector: &'a R,
    reporter: &'a P,
    plan: ProvisionPlan,
    session: Session<R::Tunnel>,
    state: LifecycleState,
    redirection_on: bool,
}

impl<'a, C, S, R, P> LifecycleController<'a, C, S, R, P>
where
    C: CloudProvisioner,
    S: RemoteShell,
    R: TrafficRedirector,
    P: ProgressReporter,
{
    pub fn new(cloud: &'a C, shell: &'a S, redirector: &'a R, reporter: &'a P, plan: ProvisionPlan) -> Self {
        Self {
            cloud,
            shell,
            redirector,
            reporter,
            plan,
            session: Session::cleared(),
            state: LifecycleState::Idle,
            redirection_on: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    #[must_use]
    pub fn session(&self) -> &Session<R::Tunnel> {
        &self.session
    }

    /// Run the full ON transition and block until the tunnel exits on its
    /// own or an interrupt arrives, then tear everything down.
    ///
    /// # Errors
    ///
    /// Returns an error if any provisioning step fails; everything created
    /// up to that point has already been reaped best-effort.
    pub async fn run_until_stopped(&mut self, cancel: &mut watch::Receiver<bool>) -> Result<()> {
        self.turn_on(cancel).await?;
        self.reporter.success(&format!(
            "proxy is on; ports 80/443 now route through the droplet via localhost:{} (Ctrl-C to stop)",
            self.plan.local_proxy_port
        ));
        self.wait_until_stopped(cancel).await;
        Ok(())
    }

    /// The ON transition: `IDLE → PROVISIONING → ACTIVE`.
    ///
    /// # Errors
    ///
    /// Returns an error on any failed step. Partial failure never leaks a
    /// billable droplet: whatever was created is destroyed before the
    /// error is returned.
    pub async fn turn_on(&mut self, cancel: &watch::Receiver<bool>) -> Result<()> {
        self.state = LifecycleState::Provisioning;
        match self.provision(cancel).await {
            Ok(()) => {
                self.state = LifecycleState::Active;
                Ok(())
            }
            Err(err) => {
                self.state = LifecycleState::TearingDown;
                self.reporter.warn("start failed; cleaning up what was created");
                self.abort().await;
                self.state = LifecycleState::Idle;
                Err(err)
            }
        }
    }

    /// Block in ACTIVE until the tunnel dies or the cancel flag flips,
    /// then run the OFF sequence.
    pub async fn wait_until_stopped(&mut self, cancel: &mut watch::Receiver<bool>) {
        if let Some(tunnel) = self.session.tunnel.as_mut() {
            let reporter = self.reporter;
            tokio::select! {
                result = tunnel.wait() => match result {
                    Ok(()) => reporter.warn("tunnel closed by the remote end"),
                    Err(err) => reporter.warn(&format!("tunnel failed: {err}")),
                },
                _ = cancel.changed() => {}
            }
        }
        self.turn_off().await;
    }

    /// The OFF transition: `ACTIVE → TEARING_DOWN → IDLE`.
    ///
    /// Every step is best-effort so one failure never blocks the rest of
    /// the teardown or process exit. Redirection stops before the droplet
    /// dies so traffic is never silently blackholed; destruction proceeds
    /// even if rule removal reported an error. With nothing active this is
    /// a clean no-op.
    pub async fn turn_off(&mut self) {
        self.state = LifecycleState::TearingDown;
        self.reporter.step("removing traffic redirection...");
        self.redirector
            .disable_redirection(self.plan.local_proxy_port)
            .await;
        self.redirection_on = false;

        if let Some(mut tunnel) = self.session.tunnel.take() {
            self.reporter.step("stopping the tunnel...");
            tunnel.terminate().await;
        }
        if let Some(shell) = self.session.shell.take() {
            self.shell.close(shell).await;
        }
        if let Some(node) = self.session.node.take() {
            self.reporter.step(&format!("destroying droplet {}...", node.id));
            self.destroy_best_effort(&node.id).await;
        }

        self.state = LifecycleState::Idle;
        self.reporter.success("proxy is off");
    }

    async fn provision(&mut self, cancel: &watch::Receiver<bool>) -> Result<()> {
        self.check_cancel(cancel)?;
        self.reporter.step("creating droplet...");
        let id = self
            .cloud
            .create_node(&self.plan.request)
            .await
            .context("creating droplet")?;
        self.reporter.success(&format!("droplet {id} created"));

        // The droplet exists but is not in the session yet; this one edge
        // reaps it by hand before bailing.
        self.reporter.step("waiting for the droplet network address...");
        let address = match readiness::await_network_address(
            self.cloud,
            &id,
            self.plan.poll_interval,
            self.plan.boot_timeout,
            cancel,
        )
        .await
        {
            Ok(address) => address,
            Err(err) => {
                self.destroy_best_effort(&id).await;
                return Err(err.context("waiting for the droplet network address"));
            }
        };
        self.session.node = Some(ActiveNode { id, address });
        self.reporter.success(&format!("droplet address {address}"));

        // From here on every handle lands in the session immediately, so a
        // failure in any later step lets `abort` reap all of it.
        self.check_cancel(cancel)?;
        self.reporter.step("waiting for ssh to come up...");
        let shell_session = readiness::await_shell_ready(
            self.shell,
            address,
            self.plan.poll_interval,
            self.plan.shell_timeout,
            cancel,
        )
        .await
        .context("waiting for ssh")?;
        self.session.shell = Some(shell_session);
        self.reporter.success("ssh is up");

        self.check_cancel(cancel)?;
        self.reporter.step("installing the proxy on the droplet...");
        if let Some(shell_session) = self.session.shell.as_ref() {
            self.shell
                .run_command(shell_session, &self.plan.provision_command)
                .await
                .context("installing proxy software")?;
        }
        self.reporter.success("proxy installed");

        self.check_cancel(cancel)?;
        self.reporter.step("redirecting local web traffic...");
        self.redirector
            .enable_redirection(self.plan.local_proxy_port)
            .await
            .context("enabling traffic redirection")?;
        self.redirection_on = true;

        let spec = self.plan.tunnel_spec(address);
        let tunnel = self
            .redirector
            .start_tunnel(&spec)
            .await
            .context("starting the ssh tunnel")?;
        self.session.tunnel = Some(tunnel);
        Ok(())
    }

    /// Best-effort cleanup of a partially completed ON, in reverse order
    /// of creation. Failures here are swallowed so they never mask the
    /// error that triggered the abort.
    async fn abort(&mut self) {
        if let Some(mut tunnel) = self.session.tunnel.take() {
            tunnel.terminate().await;
        }
        if self.redirection_on {
            self.redirector
                .disable_redirection(self.plan.local_proxy_port)
                .await;
            self.redirection_on = false;
        }
        if let Some(shell) = self.session.shell.take() {
            self.shell.close(shell).await;
        }
        if let Some(node) = self.session.node.take() {
            self.destroy_best_effort(&node.id).await;
        }
    }

    /// Delete the droplet, downgrading failure to a warning so cleanup
    /// never masks the error that triggered it or blocks exit.
    async fn destroy_best_effort(&self, id: &NodeId) {
        if let Err(err) = self.cloud.destroy_node(id).await {
            self.reporter
                .warn(&format!("droplet {id} was not deleted: {err:#}"));
        }
    }

    fn check_cancel(&self, cancel: &watch::Receiver<bool>) -> Result<()> {
        if *cancel.borrow() {
            anyhow::bail!("interrupted");
        }
        Ok(())
    }
}
