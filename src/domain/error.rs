//! Typed domain error enums.
//!
//! All error types implement `thiserror::Error` and convert to
//! `anyhow::Error` via the `?` operator. Each failure identifies the stage
//! that failed; cleanup paths never surface errors of their own.

use std::time::Duration;

use thiserror::Error;

use crate::domain::session::NodeId;

/// Missing or invalid configuration. Fatal before any remote call is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is not set; export it before running droplet-proxy")]
    MissingEnv { name: &'static str },
}

/// Cloud API failures. Fatal for the current ON attempt and trigger
/// best-effort cleanup of any partially created droplet.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("DigitalOcean API returned {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("unexpected API response: {0}")]
    MalformedResponse(String),

    #[error("droplet {0} no longer exists")]
    NodeGone(NodeId),
}

/// A bounded wait elapsed without the condition becoming true.
#[derive(Debug, Error)]
#[error("timed out after {}s waiting for {what}", limit.as_secs())]
pub struct TimeoutError {
    pub what: &'static str,
    pub limit: Duration,
}

/// A remote provisioning command failed.
#[derive(Debug, Error)]
pub enum RemoteExecError {
    #[error("remote command '{command}' exited with status {code}")]
    NonZeroExit { command: String, code: i32 },

    #[error("ssh session closed while running '{command}'")]
    SessionClosed { command: String },
}

/// Local redirection rules could not be installed. Fatal, but droplet and
/// tunnel cleanup is still attempted.
#[derive(Debug, Error)]
#[error("elevated privileges required: {0}")]
pub struct PrivilegeError(pub String);
