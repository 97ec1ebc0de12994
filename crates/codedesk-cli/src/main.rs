//! Thin entrypoint for the `codedesk` binary.

use std::process;

#[tokio::main]
async fn main() {
    let exit_code = codedesk_cli::run().await;
    process::exit(exit_code);
}
