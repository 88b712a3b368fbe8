//! Lanzar CLI entry point.

use clap::Parser;

fn main() {
    let cli = lanzar::cli::Cli::parse();
    match lanzar::cli::dispatch(cli.command) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}
