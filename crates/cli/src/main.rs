use std::process::ExitCode;

fn main() -> ExitCode {
    shipflow_cli::run()
}
