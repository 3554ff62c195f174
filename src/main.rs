use clap::Parser;
use patterniq::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
