//! Loam - A flat-file content engine

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = loam_cms::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
