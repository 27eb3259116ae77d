use std::process::ExitCode;

fn main() -> ExitCode {
    engine_sim::runtime::run_from_args()
}
