use clap::Parser as _;

use droplet_proxy::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = cli.run().await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
