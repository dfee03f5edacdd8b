//! benchvault - benchmark evaluation and versioned snapshot tracking CLI.
//!
//! # Usage
//!
//! ```bash
//! # Evaluate a run and record it
//! benchvault run --model-version gpt-4o --dataset-version bills-v3 \
//!     --prompt-version p7 --environment ci \
//!     --detected detected.json --ground-truth gt.json --run-id ci-1234
//!
//! # Inspect current snapshots and history
//! benchvault current --environment ci
//! benchvault history --model-version gpt-4o --metric f1
//! benchvault compare -m gpt-4o -m gemini-1.5-pro
//!
//! # Roll the current pointer back to an older version
//! benchvault checkout --model-version gpt-4o --dataset-version bills-v3 \
//!     --environment ci --version 3
//! ```

use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();
    benchvault::cli::run_cli()
}
