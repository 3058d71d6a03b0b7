//! Identity-carrying edit paths.
//!
//! A `Path` (id sequence) pins one location in the tree; a `Context`
//! (value sequence) names a value chain that may recur at many locations.
//! `EditPath` carries both so the recently-edited tracker can derive its
//! canonical segments without reading the thought store.

use crate::model::thought::ThoughtId;
use serde::{Deserialize, Serialize};

/// One step of an edit path: the thought id plus its raw value at the time
/// the path was captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub id: ThoughtId,
    pub value: String,
}

impl PathStep {
    pub fn new(id: ThoughtId, value: impl Into<String>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }
}

/// Ordered steps from the first thought below the root down to the edited
/// thought. The reserved root is never part of an edit path.
pub type EditPath = Vec<PathStep>;
