use clap::Parser;
use meridian::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
