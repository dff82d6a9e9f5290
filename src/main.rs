//! Symscan CLI entry point.

use symscan::cli;

fn main() {
    let exit_code = match cli::parse_args(std::env::args_os()) {
        Ok(cli) => cli::run(&cli),
        Err(code) => code,
    };
    std::process::exit(exit_code);
}
