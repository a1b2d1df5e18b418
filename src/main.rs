use std::process::ExitCode;

fn main() -> ExitCode {
    herald::app::startup::startup()
}
