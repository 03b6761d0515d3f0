use std::process::ExitCode;

fn main() -> ExitCode {
    chewdoc::cli::run()
}
