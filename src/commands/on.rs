//! `droplet-proxy on`: provision the droplet, redirect traffic, and block
//! until interrupted.

use anyhow::{Context, Result};
use tokio::sync::watch;

use crate::application::services::lifecycle::LifecycleController;
use crate::infra::api::DigitalOceanClient;
use crate::infra::command_runner::{TokioCommandRunner, DEFAULT_CMD_TIMEOUT, REMOTE_EXEC_TIMEOUT};
use crate::infra::config::{self, Credentials};
use crate::infra::redirect::IptablesRedirector;
use crate::infra::ssh::SshShell;
use crate::output::reporter::TerminalReporter;
use crate::output::OutputContext;

/// Run `droplet-proxy on`.
///
/// # Errors
///
/// Returns an error if configuration is missing, privileges cannot be
/// obtained, or any provisioning step fails.
pub async fn run(ctx: &OutputContext) -> Result<()> {
    let credentials = Credentials::from_env()?;
    let settings = config::load_settings().context("loading settings")?;
    let identity = match settings.identity_file.clone() {
        Some(path) => path,
        None => config::default_identity()?,
    };

    let local_runner = TokioCommandRunner::new(DEFAULT_CMD_TIMEOUT);
    super::ensure_privileges(&local_runner, ctx).await?;

    let cloud = DigitalOceanClient::new(credentials.api_token.clone(), credentials.api_base.clone());
    let shell = SshShell::new(TokioCommandRunner::new(REMOTE_EXEC_TIMEOUT), identity.clone());
    let redirector = IptablesRedirector::new(local_runner);
    let reporter = TerminalReporter::new(ctx);
    let plan = settings.plan(&credentials.ssh_key_id, identity);

    // The signal handler only flips the flag; the controller runs the OFF
    // sequence itself at the next checkpoint.
    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let mut controller = LifecycleController::new(&cloud, &shell, &redirector, &reporter, plan);
    controller.run_until_stopped(&mut cancel_rx).await
}
