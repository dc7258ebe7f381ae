//! Assetpipe - command-line front end for the asset build pipelines

use std::process::ExitCode;

use assetpipe::cli;

fn main() -> ExitCode {
    cli::run()
}
