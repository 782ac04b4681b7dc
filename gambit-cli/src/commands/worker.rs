//! Worker command - computes one signature for the process backend

use anyhow::{Context, Result};
use gambit_core::concurrency::serve_worker;

/// Read a request from stdin and write the signature to stdout
pub fn execute() -> Result<()> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut output = stdout.lock();
    serve_worker(stdin.lock(), &mut output).context("Signature worker failed")
}
