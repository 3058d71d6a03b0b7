//! Outline use-case service.
//!
//! # Responsibility
//! - Orchestrate one user edit end to end: synchronous graph mutation,
//!   recently-edited tracking, then deferred persistence.
//! - Keep callers decoupled from engine, tracker and sink details.
//!
//! # Invariants
//! - The in-memory graph transition completes before any sink I/O starts.
//! - Tracker updates are best-effort and never fail an edit.
//! - A sink failure is surfaced but does not roll back the graph; the
//!   caller may replay the delta (sinks are idempotent).

pub mod outline;

pub use outline::{OutlineError, OutlineService};
