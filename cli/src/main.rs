//! `herbtrace` entry point.

use clap::Parser;
use herbtrace_cli::Cli;

fn main() {
    let cli = Cli::parse();
    herbtrace_cli::init_tracing(cli.verbose);
    std::process::exit(cli.run());
}
