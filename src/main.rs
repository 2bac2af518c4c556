use clap::Parser;
use sigtrader::cli::{Cli, run};
use sigtrader::logging::init_logging;

fn main() -> std::process::ExitCode {
    init_logging();
    run(Cli::parse())
}
