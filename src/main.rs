//! monodelta CLI entry point.

use monodelta::cli::{self, Cli};
use monodelta::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli::execute(cli).await
}
