use clap::Parser;

use wct::cli::{Cli, execute};
use wct::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref());

    let code = execute(cli).await;
    std::process::exit(code);
}
