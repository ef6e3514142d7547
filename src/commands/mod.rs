//! Thin command handlers. Each one wires credentials, settings, and infra
//! adapters together and hands control to the lifecycle controller.

pub mod off;
pub mod on;

use anyhow::Result;

use crate::application::ports::CommandRunner;
use crate::domain::error::PrivilegeError;
use crate::output::OutputContext;

/// One upfront sudo prompt so iptables never stalls mid-transition waiting
/// for a password.
///
/// # Errors
///
/// Returns `PrivilegeError` when sudo is unavailable or authentication
/// fails.
pub(crate) async fn ensure_privileges(
    runner: &impl CommandRunner,
    ctx: &OutputContext,
) -> Result<()> {
    ctx.info("redirecting traffic needs sudo; you may be asked for your password");
    let status = runner
        .run_status("sudo", &["-v"])
        .await
        .map_err(|err| PrivilegeError(format!("cannot run sudo: {err}")))?;
    if !status.success() {
        return Err(PrivilegeError("sudo authentication failed".into()).into());
    }
    Ok(())
}
