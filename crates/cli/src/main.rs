use std::process::ExitCode;

fn main() -> ExitCode {
    panaderia_cli::run()
}
