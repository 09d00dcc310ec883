use std::process::ExitCode;

fn main() -> ExitCode {
    tickety_cli::run()
}
