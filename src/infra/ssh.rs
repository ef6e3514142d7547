//! Remote shell over the system `ssh` binary, implementing `RemoteShell`.
//!
//! An open session is an ssh control master bound to a socket in a private
//! temp directory; commands multiplex over that socket so each one skips
//! the handshake and the session survives between calls.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, RemoteShell};
use crate::domain::error::RemoteExecError;
use crate::domain::session::ShellSession;

/// Exit status ssh itself uses for connection and multiplexing errors, as
/// opposed to the remote command's own status.
const SSH_PROTO_EXIT: i32 = 255;

pub struct SshShell<R: CommandRunner> {
    runner: R,
    identity_file: PathBuf,
}

impl<R: CommandRunner> SshShell<R> {
    #[must_use]
    pub fn new(runner: R, identity_file: PathBuf) -> Self {
        Self {
            runner,
            identity_file,
        }
    }
}

fn destination(address: Ipv4Addr) -> String {
    format!("root@{address}")
}

impl<R: CommandRunner> RemoteShell for SshShell<R> {
    async fn try_open(&self, address: Ipv4Addr) -> Result<Option<ShellSession>> {
        let control_dir = tempfile::Builder::new()
            .prefix("droplet-proxy-")
            .tempdir()
            .context("creating ssh control directory")?
            .into_path();
        let control_path = control_dir.join("control.sock");
        let control = control_path.to_string_lossy().to_string();
        let identity = self.identity_file.to_string_lossy().to_string();
        let dest = destination(address);

        let opened = self
            .runner
            .run(
                "ssh",
                &[
                    "-i",
                    &identity,
                    "-o",
                    "BatchMode=yes",
                    "-o",
                    "StrictHostKeyChecking=accept-new",
                    "-o",
                    "ConnectTimeout=5",
                    "-M",
                    "-S",
                    &control,
                    "-f",
                    "-N",
                    &dest,
                ],
            )
            .await
            .context("spawning ssh")?;
        if !opened.status.success() {
            // Refused or auth not ready yet; normal during the boot window.
            let _ = std::fs::remove_dir_all(&control_dir);
            return Ok(None);
        }

        let session = ShellSession {
            address,
            control_path,
        };

        // Probe with a no-op; a master that dies immediately is "not ready".
        // The master is daemonized by -f, so on any probe failure it must
        // be shut down here or it outlives the process.
        let probe = match self.runner.run("ssh", &["-S", &control, &dest, "true"]).await {
            Ok(output) => output,
            Err(err) => {
                self.close(session).await;
                return Err(err.context("running the ssh probe"));
            }
        };
        if probe.status.success() {
            Ok(Some(session))
        } else {
            self.close(session).await;
            Ok(None)
        }
    }

    async fn run_command(&self, session: &ShellSession, command: &str) -> Result<()> {
        let control = session.control_path.to_string_lossy().to_string();
        let dest = destination(session.address);
        let output = self
            .runner
            .run("ssh", &["-S", &control, &dest, command])
            .await
            .context("running the remote command")?;
        match output.status.code() {
            Some(0) => Ok(()),
            Some(SSH_PROTO_EXIT) | None => Err(RemoteExecError::SessionClosed {
                command: command.to_owned(),
            }
            .into()),
            Some(code) => Err(RemoteExecError::NonZeroExit {
                command: command.to_owned(),
                code,
            }
            .into()),
        }
    }

    async fn close(&self, session: ShellSession) {
        let control = session.control_path.to_string_lossy().to_string();
        let dest = destination(session.address);
        let _ = self
            .runner
            .run("ssh", &["-S", &control, "-O", "exit", &dest])
            .await;
        if let Some(dir) = session.control_path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
