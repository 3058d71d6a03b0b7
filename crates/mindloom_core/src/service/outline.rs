//! Outline service facade over graph, engine, tracker and sink.

use crate::engine::{self, EngineError, MutationDelta};
use crate::graph::{GraphError, ThoughtGraph};
use crate::model::{Rank, Thought, ThoughtId, Timestamp};
use crate::persist::{PersistenceSink, SinkError};
use crate::recent::RecentIndex;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors surfaced to callers of the outline service.
#[derive(Debug)]
pub enum OutlineError {
    /// The mutation itself was rejected; the graph is unchanged.
    Engine(EngineError),
    /// Direct store insertion failed; the graph is unchanged.
    Graph(GraphError),
    /// The mutation applied but the delta could not be persisted.
    Sink(SinkError),
}

impl Display for OutlineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Engine(err) => write!(f, "{err}"),
            Self::Graph(err) => write!(f, "{err}"),
            Self::Sink(err) => write!(f, "failed to persist edit: {err}"),
        }
    }
}

impl Error for OutlineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Engine(err) => Some(err),
            Self::Graph(err) => Some(err),
            Self::Sink(err) => Some(err),
        }
    }
}

impl From<EngineError> for OutlineError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

impl From<GraphError> for OutlineError {
    fn from(value: GraphError) -> Self {
        Self::Graph(value)
    }
}

/// One-stop facade for interactive edits.
pub struct OutlineService<S: PersistenceSink> {
    graph: ThoughtGraph,
    recent: RecentIndex,
    sink: S,
}

impl<S: PersistenceSink> OutlineService<S> {
    /// Creates a service around a freshly seeded graph.
    pub fn new(now: Timestamp, sink: S) -> Self {
        Self {
            graph: ThoughtGraph::new(now),
            recent: RecentIndex::new(),
            sink,
        }
    }

    pub fn graph(&self) -> &ThoughtGraph {
        &self.graph
    }

    /// Current recently-edited snapshot. Callers may hold on to it; later
    /// edits produce new snapshots and never mutate this one.
    pub fn recent(&self) -> &RecentIndex {
        &self.recent
    }

    /// Inserts a new thought under `parent_id`.
    pub fn create(
        &mut self,
        parent_id: ThoughtId,
        value: &str,
        rank: Rank,
        now: Timestamp,
    ) -> Result<ThoughtId, OutlineError> {
        let id = ThoughtId::new_v4();
        self.graph
            .insert(Thought::new(id, value, rank, Some(parent_id), now))?;
        let key = self.graph.canon().key(value);
        let delta = MutationDelta::capture(&self.graph, [id, parent_id], [key]);

        if let Some(path) = self.graph.edit_path(id) {
            self.recent = self.recent.node_change(&path, &path, now);
        }
        self.persist("create", &delta)?;
        Ok(id)
    }

    /// Renames a thought. Returns the id carrying the value afterwards
    /// (differs from `id` when a collision merge folded it away).
    pub fn rename(
        &mut self,
        id: ThoughtId,
        new_value: &str,
        now: Timestamp,
    ) -> Result<ThoughtId, OutlineError> {
        let before = self.graph.edit_path(id);
        let outcome = engine::rename(&mut self.graph, id, new_value, now)?;
        if outcome.delta.is_empty() {
            return Ok(outcome.target);
        }

        if let (Some(old), Some(new)) = (before, self.graph.edit_path(outcome.target)) {
            self.recent = self.recent.node_change(&old, &new, now);
        }
        self.persist("rename", &outcome.delta)?;
        Ok(outcome.target)
    }

    /// Moves a thought (with its subtree) under a new parent.
    pub fn move_thought(
        &mut self,
        id: ThoughtId,
        new_parent_id: ThoughtId,
        new_rank: Rank,
        now: Timestamp,
    ) -> Result<(), OutlineError> {
        let before = self.graph.edit_path(id);
        let delta = engine::move_thought(&mut self.graph, id, new_parent_id, new_rank, now)?;

        if let (Some(old), Some(new)) = (before, self.graph.edit_path(id)) {
            self.recent = self.recent.node_move(&old, &new, now);
        }
        self.persist("move", &delta)?;
        Ok(())
    }

    /// Deletes a thought and its whole subtree.
    pub fn delete(&mut self, id: ThoughtId, now: Timestamp) -> Result<(), OutlineError> {
        let before = self.graph.edit_path(id);
        let delta = engine::delete(&mut self.graph, id)?;

        if let Some(path) = before {
            self.recent = self.recent.node_delete(&path, true, now);
        }
        self.persist("delete", &delta)?;
        Ok(())
    }

    /// Forwards a delta to the sink, strictly after the in-memory state
    /// transition and tracker update have completed.
    fn persist(&mut self, op: &str, delta: &MutationDelta) -> Result<(), OutlineError> {
        match self.sink.persist(delta) {
            Ok(()) => {
                info!(
                    "event=edit_persisted module=service status=ok op={op} thoughts={} lexemes={}",
                    delta.thoughts.len(),
                    delta.lexemes.len()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=edit_persisted module=service status=error op={op} error={err}"
                );
                Err(OutlineError::Sink(err))
            }
        }
    }
}
