//! Voice assistant webhook server.
//! Run with: cargo run --bin voxline-server

use std::process::ExitCode;

use voxline_agent::start_voxline_agent;

fn main() -> ExitCode {
    start_voxline_agent::run()
}
