//! doky-deploy - host provisioning and systemd lifecycle for the Doky bot

use clap::Parser;

use doky_deploy::cli::Cli;
use doky_deploy::output::OutputContext;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let ctx = OutputContext::new(cli.no_color, cli.quiet);
    if let Err(e) = cli.run().await {
        ctx.error(&format!("{e:#}"));
        std::process::exit(1);
    }
}
