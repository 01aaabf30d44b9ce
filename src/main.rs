use clap::Parser;

use mpps_proxy::config::{Cli, Config};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = Config::from_args(cli);
    mpps_proxy::run(config).await;
}
