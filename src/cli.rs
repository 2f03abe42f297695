//! CLI argument parsing with clap derive

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::apt::Apt;
use crate::command_runner::{BUILD_TIMEOUT, DEFAULT_CMD_TIMEOUT, TokioCommandRunner};
use crate::config::DeployConfig;
use crate::output::OutputContext;
use crate::systemd::Systemctl;
use crate::talib::TalibInstaller;
use crate::venv::VirtualEnv;

/// Host provisioning and service lifecycle for the Doky bot
#[derive(Parser)]
#[command(
    name = "doky-deploy",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Shared config-file argument.
#[derive(Args, Default)]
pub struct ConfigArgs {
    /// Path to the deploy configuration file
    #[arg(long, env = "DOKY_DEPLOY_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Provision host prerequisites (packages, TA-Lib, venv, dependencies)
    Provision(ConfigArgs),

    /// Install the systemd unit, enable it on boot and start the bot
    Deploy(ConfigArgs),

    /// Show the bot unit's current state
    Status(ConfigArgs),
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command's first failing step aborts the run.
    pub async fn run(self) -> Result<()> {
        let ctx = OutputContext::new(self.no_color, self.quiet);
        match self.command {
            Command::Provision(args) => {
                let cfg = DeployConfig::load(args.config.as_deref())?;
                let pkg = Apt::new(TokioCommandRunner::new(BUILD_TIMEOUT));
                let native = TalibInstaller::new(TokioCommandRunner::new(BUILD_TIMEOUT));
                let env = VirtualEnv::new(
                    cfg.venv_dir.clone(),
                    TokioCommandRunner::new(BUILD_TIMEOUT),
                );
                crate::provision::run(&ctx, &cfg, &pkg, &native, &env).await
            }
            Command::Deploy(args) => {
                let cfg = DeployConfig::load(args.config.as_deref())?;
                let init = Systemctl::new(TokioCommandRunner::new(DEFAULT_CMD_TIMEOUT));
                crate::deploy::run(&ctx, &cfg, &init).await
            }
            Command::Status(args) => {
                let cfg = DeployConfig::load(args.config.as_deref())?;
                let init = Systemctl::new(TokioCommandRunner::new(DEFAULT_CMD_TIMEOUT));
                crate::deploy::status(&ctx, &cfg, &init).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn config_flag_parses_per_subcommand() {
        let cli = Cli::parse_from(["doky-deploy", "provision", "--config", "custom.yaml"]);
        match cli.command {
            Command::Provision(args) => {
                assert_eq!(args.config, Some(PathBuf::from("custom.yaml")));
            }
            _ => panic!("expected provision"),
        }
    }
}
