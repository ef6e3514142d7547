//! `droplet-proxy off`: remove redirection and tear down whatever is
//! still up.
//!
//! Nothing persists between processes, so a fresh `off` has no droplet or
//! tunnel handle to reap; it removes the local rules and exits. The full
//! teardown of an active session runs inside `on` when it is interrupted.

use anyhow::{Context, Result};

use crate::application::services::lifecycle::LifecycleController;
use crate::infra::api::DigitalOceanClient;
use crate::infra::command_runner::{TokioCommandRunner, DEFAULT_CMD_TIMEOUT, REMOTE_EXEC_TIMEOUT};
use crate::infra::config::{self, Credentials};
use crate::infra::redirect::IptablesRedirector;
use crate::infra::ssh::SshShell;
use crate::output::reporter::TerminalReporter;
use crate::output::OutputContext;

/// Run `droplet-proxy off`.
///
/// # Errors
///
/// Returns an error if configuration is missing or privileges cannot be
/// obtained; the teardown itself is best-effort and never fails.
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

    let mut controller = LifecycleController::new(&cloud, &shell, &redirector, &reporter, plan);
    controller.turn_off().await;
    Ok(())
}
