//! Core domain logic for Mindloom.
//!
//! The authoritative thought graph, its mutation engine, the lexeme index
//! and the recently-edited tracker live here. This crate is the single
//! source of truth for outline invariants; presentation and transport
//! layers only consume its read surface and deltas.

pub mod canon;
pub mod engine;
pub mod graph;
pub mod integrity;
pub mod logging;
pub mod model;
pub mod persist;
pub mod recent;
pub mod service;

pub use canon::{Canonical, Canonicalizer, LexemeKey};
pub use engine::{EngineError, MutationDelta, RenameOutcome};
pub use graph::{GraphError, ThoughtGraph};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::{
    now_ms, root_id, EditPath, Lexeme, PathStep, Rank, Thought, ThoughtId, Timestamp, ROOT_VALUE,
};
pub use persist::{NullSink, PersistenceSink, SinkError, SqliteSink};
pub use recent::{RecentEntry, RecentIndex, RECENT_DECAY_MS};
pub use service::{OutlineError, OutlineService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
