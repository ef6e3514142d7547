//! Command-line interface definitions using clap.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use crate::output::OutputContext;

/// Route your traffic through a throwaway DigitalOcean proxy droplet.
#[derive(Parser)]
#[command(
    name = "droplet-proxy",
    version,
    about = "Ephemeral DigitalOcean proxy droplet, on and off like a switch",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Suppress progress output (errors still print)
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Create the proxy droplet and redirect local traffic through it
    On,
    /// Remove local redirection rules
    Off,
}

impl Cli {
    /// Dispatch the parsed command.
    ///
    /// # Errors
    ///
    /// Propagates whatever the command handler returns.
    pub async fn run(self) -> Result<()> {
        let ctx = OutputContext::new(self.no_color, self.quiet);
        match self.command {
            Command::On => commands::on::run(&ctx).await,
            Command::Off => commands::off::run(&ctx).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_on() {
        let cli = Cli::try_parse_from(["droplet-proxy", "on"]).unwrap();
        assert!(matches!(cli.command, Command::On));
        assert!(!cli.quiet);
    }

    #[test]
    fn parses_off_with_quiet() {
        let cli = Cli::try_parse_from(["droplet-proxy", "off", "--quiet"]).unwrap();
        assert!(matches!(cli.command, Command::Off));
        assert!(cli.quiet);
    }

    #[test]
    fn global_flags_work_before_the_subcommand() {
        let cli = Cli::try_parse_from(["droplet-proxy", "--no-color", "on"]).unwrap();
        assert!(cli.no_color);
    }

    #[test]
    fn rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["droplet-proxy", "toggle"]).is_err());
    }

    #[test]
    fn requires_a_subcommand() {
        assert!(Cli::try_parse_from(["droplet-proxy"]).is_err());
    }
}
