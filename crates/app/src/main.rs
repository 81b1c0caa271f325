//! Edge Promo CLI

use std::process;

use clap::Parser;

mod cli;

#[tokio::main]
pub async fn main() {
    let _env = dotenvy::dotenv();

    let cli = cli::Cli::parse();

    if let Err(error) = cli.run().await {
        fail(&error);
    }
}

#[expect(
    clippy::print_stderr,
    clippy::exit,
    reason = "the binary reports fatal errors on stderr and exits non-zero"
)]
fn fail(error: &str) -> ! {
    eprintln!("{error}");
    process::exit(1);
}
