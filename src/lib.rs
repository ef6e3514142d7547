//! droplet-proxy library: an on/off switch for an ephemeral DigitalOcean
//! forward proxy.
//!
//! `on` creates a droplet, installs tinyproxy over SSH, redirects local web
//! traffic into an SSH tunnel, and blocks until interrupted. `off` removes
//! the redirection rules. Everything the switch acquires lives only for the
//! lifetime of the `on` process.

pub mod application;
pub mod cli;
pub mod commands;
pub mod domain;
pub mod infra;
pub mod output;
