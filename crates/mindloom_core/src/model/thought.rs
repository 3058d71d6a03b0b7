//! Thought record and identity primitives.
//!
//! # Responsibility
//! - Define the node record owned by the thought store.
//! - Provide the reserved root identity.
//!
//! # Invariants
//! - `context` always equals the value chain from root to this thought,
//!   including its own value; the mutation engine maintains it on every
//!   structural edit.
//! - `children` ids must resolve inside the owning store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier for a thought.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type ThoughtId = Uuid;

/// Unix epoch milliseconds.
pub type Timestamp = i64;

/// Sibling ordering key.
///
/// Fractional so that rank collisions can be resolved by a minimal nudge
/// instead of renumbering a whole sibling list.
pub type Rank = f64;

/// Reserved value of the root thought.
pub const ROOT_VALUE: &str = "__ROOT__";

/// Identifier of the reserved root thought.
pub fn root_id() -> ThoughtId {
    Uuid::nil()
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

/// One node of the outline graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thought {
    /// Stable global id used for linking and delta keys.
    pub id: ThoughtId,
    /// Raw user-facing value.
    pub value: String,
    /// Sibling ordering key under `parent_id`.
    pub rank: Rank,
    /// Parent reference. `None` only for the reserved root.
    pub parent_id: Option<ThoughtId>,
    /// Child thought ids.
    pub children: BTreeSet<ThoughtId>,
    /// Value chain from root to (and including) this thought.
    pub context: Vec<String>,
    /// Last edit timestamp, epoch milliseconds.
    pub last_updated: Timestamp,
}

impl Thought {
    /// Creates a detached thought record.
    ///
    /// `context` starts empty; the store fills it in at insertion from the
    /// parent chain.
    pub fn new(
        id: ThoughtId,
        value: impl Into<String>,
        rank: Rank,
        parent_id: Option<ThoughtId>,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            value: value.into(),
            rank,
            parent_id,
            children: BTreeSet::new(),
            context: Vec::new(),
            last_updated: now,
        }
    }

    /// Whether this is the reserved root record.
    pub fn is_root(&self) -> bool {
        self.id == root_id()
    }
}
