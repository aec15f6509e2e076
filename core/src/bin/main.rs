/// Parley CLI
///
/// Checks and runs dialogue scripts without a host game. Useful for
/// writers iterating on a script and for CI checks of dialogue content.

use parley_core::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
