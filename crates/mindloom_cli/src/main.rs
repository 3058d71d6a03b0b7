//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `mindloom_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

use mindloom_core::{now_ms, root_id, NullSink, OutlineError, OutlineService};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("mindloom smoke failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), OutlineError> {
    let now = now_ms();
    let mut outline = OutlineService::new(now, NullSink);

    let home = outline.create(root_id(), "Home", 1.0, now)?;
    outline.create(home, "To Do", 1.0, now)?;
    outline.rename(home, "Work", now)?;

    println!("mindloom_core version={}", mindloom_core::core_version());
    println!("thoughts={}", outline.graph().len());
    println!("recent_entries={}", outline.recent().len());
    Ok(())
}
