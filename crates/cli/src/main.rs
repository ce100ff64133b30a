use std::process::ExitCode;

fn main() -> ExitCode {
    wedmatch_cli::run()
}
