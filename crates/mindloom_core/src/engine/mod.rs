//! Mutation engine: rename, move and delete over the thought graph.
//!
//! # Responsibility
//! - Apply structural edits transactionally across the thought store and
//!   the lexeme index.
//! - Propagate context changes to every descendant of an edited thought.
//! - Report every changed record as a typed delta for persistence.
//!
//! # Invariants
//! - Validate-then-mutate: every failure check completes before the first
//!   write, so a raised error leaves the graph untouched.
//! - Descendant walks carry a visited set; a revisited id is reported as
//!   corruption, never an infinite loop.
//! - Lexeme membership only changes through `ThoughtGraph::reindex`.

use crate::canon::LexemeKey;
use crate::graph::{resolve_rank, ThoughtGraph};
use crate::model::{root_id, Lexeme, Rank, Thought, ThoughtId, Timestamp};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by a single mutation.
///
/// All variants are recovered at the boundary of one user edit: the graph
/// is unchanged when any of these is returned.
#[derive(Debug)]
pub enum EngineError {
    /// Target id is not in the store.
    NotFound(ThoughtId),
    /// The reserved root cannot be renamed, moved or deleted.
    ImmutableThought(ThoughtId),
    /// The target's parent reference points outside the store.
    OrphanThought {
        thought: ThoughtId,
        parent: ThoughtId,
    },
    /// A thought on the delete path has no lexeme entry for its value.
    MissingLexeme { thought: ThoughtId, value: String },
    /// The move destination lies inside the moved subtree.
    CycleDetected(ThoughtId),
    /// The store contradicts itself (cyclic child sets, dangling child
    /// ids, a parentless non-root). Fatal for this edit only.
    CorruptGraph {
        thought: ThoughtId,
        reason: &'static str,
    },
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "thought not found: {id}"),
            Self::ImmutableThought(id) => write!(f, "thought is reserved and immutable: {id}"),
            Self::OrphanThought { thought, parent } => {
                write!(f, "thought {thought} references missing parent {parent}")
            }
            Self::MissingLexeme { thought, value } => {
                write!(f, "thought {thought} has no lexeme entry for value `{value}`")
            }
            Self::CycleDetected(id) => {
                write!(f, "move would place thought {id} inside its own subtree")
            }
            Self::CorruptGraph { thought, reason } => {
                write!(f, "graph corruption at thought {thought}: {reason}")
            }
        }
    }
}

impl Error for EngineError {}

/// Changed records produced by one mutation. `None` means deleted.
#[derive(Debug, Clone, Default)]
pub struct MutationDelta {
    pub thoughts: BTreeMap<ThoughtId, Option<Thought>>,
    pub lexemes: BTreeMap<LexemeKey, Option<Lexeme>>,
}

impl MutationDelta {
    pub fn is_empty(&self) -> bool {
        self.thoughts.is_empty() && self.lexemes.is_empty()
    }

    /// Snapshots the current state of the touched ids and keys.
    pub fn capture(
        graph: &ThoughtGraph,
        thoughts: impl IntoIterator<Item = ThoughtId>,
        lexemes: impl IntoIterator<Item = LexemeKey>,
    ) -> Self {
        let mut delta = Self::default();
        for id in thoughts {
            delta.thoughts.insert(id, graph.get(id).cloned());
        }
        for key in lexemes {
            delta.lexemes.insert(key, graph.lexeme_for(key).cloned());
        }
        delta
    }
}

/// Result of a rename: the delta plus the id that now carries the value
/// (differs from the input id when a collision merge folded it away).
#[derive(Debug)]
pub struct RenameOutcome {
    pub target: ThoughtId,
    pub delta: MutationDelta,
}

/// Renames one thought.
///
/// Renaming to the current value is a no-op. When a sibling already
/// carries the same canonical value (a collision), the target is merged
/// into it: children are folded under the survivor and the target id is
/// removed. Otherwise the value is renamed in place and the lexeme index
/// updated. Either way every descendant's stored context is recomputed.
pub fn rename(
    graph: &mut ThoughtGraph,
    id: ThoughtId,
    new_value: &str,
    now: Timestamp,
) -> EngineResult<RenameOutcome> {
    let target = graph.get(id).ok_or(EngineError::NotFound(id))?;
    if id == root_id() {
        return Err(EngineError::ImmutableThought(id));
    }
    if target.value == new_value {
        return Ok(RenameOutcome {
            target: id,
            delta: MutationDelta::default(),
        });
    }

    let old_value = target.value.clone();
    let parent_id = required_parent(target)?;
    if !graph.contains(parent_id) {
        return Err(EngineError::OrphanThought {
            thought: id,
            parent: parent_id,
        });
    }

    let old_key = graph.canon().key(&old_value);
    let new_key = graph.canon().key(new_value);
    let collision = sibling_collision(graph, id, parent_id, new_key);

    let mut touched_thoughts = BTreeSet::from([id, parent_id]);
    let touched_lexemes = BTreeSet::from([old_key, new_key]);

    let survivor = match collision {
        Some(other) => {
            collect_subtree(graph, id)?;
            let removed = graph
                .remove(id)
                .ok_or(EngineError::NotFound(id))?;
            for &child in &removed.children {
                if let Some(thought) = graph.thought_mut(child) {
                    thought.parent_id = Some(other);
                }
            }
            if let Some(thought) = graph.thought_mut(other) {
                thought.children.extend(removed.children.iter().copied());
                thought.last_updated = now;
            }
            let subtree = collect_subtree(graph, other)?;
            refresh_contexts(graph, &subtree);
            touched_thoughts.extend(subtree);
            other
        }
        None => {
            let subtree = collect_subtree(graph, id)?;
            graph.reindex(id, Some(&old_value), Some(new_value));
            if let Some(thought) = graph.thought_mut(id) {
                thought.value = new_value.to_string();
                thought.last_updated = now;
            }
            refresh_contexts(graph, &subtree);
            touched_thoughts.extend(subtree);
            id
        }
    };

    Ok(RenameOutcome {
        target: survivor,
        delta: MutationDelta::capture(graph, touched_thoughts, touched_lexemes),
    })
}

/// Moves one thought (and its whole subtree) under a new parent.
///
/// Rank collisions at the destination are resolved by nudging the moved
/// thought's rank by a minimal fractional offset; siblings are never
/// renumbered. Lexeme membership is untouched, but every descendant's
/// stored context is recomputed for the new ancestor chain.
pub fn move_thought(
    graph: &mut ThoughtGraph,
    id: ThoughtId,
    new_parent_id: ThoughtId,
    new_rank: Rank,
    now: Timestamp,
) -> EngineResult<MutationDelta> {
    let target = graph.get(id).ok_or(EngineError::NotFound(id))?;
    if id == root_id() {
        return Err(EngineError::ImmutableThought(id));
    }
    let old_parent_id = required_parent(target)?;
    if !graph.contains(old_parent_id) {
        return Err(EngineError::OrphanThought {
            thought: id,
            parent: old_parent_id,
        });
    }
    if !graph.contains(new_parent_id) {
        return Err(EngineError::NotFound(new_parent_id));
    }
    ensure_outside_subtree(graph, id, new_parent_id)?;

    let subtree = collect_subtree(graph, id)?;
    let taken: Vec<Rank> = graph
        .children_of(new_parent_id)
        .iter()
        .filter(|sibling| sibling.id != id)
        .map(|sibling| sibling.rank)
        .collect();
    let rank = resolve_rank(&taken, new_rank);

    if let Some(parent) = graph.thought_mut(old_parent_id) {
        parent.children.remove(&id);
    }
    if let Some(parent) = graph.thought_mut(new_parent_id) {
        parent.children.insert(id);
    }
    if let Some(thought) = graph.thought_mut(id) {
        thought.parent_id = Some(new_parent_id);
        thought.rank = rank;
        thought.last_updated = now;
    }
    refresh_contexts(graph, &subtree);

    let mut touched: BTreeSet<ThoughtId> = subtree.into_iter().collect();
    touched.insert(old_parent_id);
    touched.insert(new_parent_id);
    Ok(MutationDelta::capture(graph, touched, std::iter::empty()))
}

/// Deletes one thought and its whole subtree, bottom-up.
///
/// Every doomed thought's lexeme entry is verified before the first write;
/// a missing entry indicates prior corruption and aborts the edit with the
/// graph unchanged.
pub fn delete(graph: &mut ThoughtGraph, id: ThoughtId) -> EngineResult<MutationDelta> {
    let target = graph.get(id).ok_or(EngineError::NotFound(id))?;
    if id == root_id() {
        return Err(EngineError::ImmutableThought(id));
    }
    let parent_id = required_parent(target)?;
    if !graph.contains(parent_id) {
        return Err(EngineError::OrphanThought {
            thought: id,
            parent: parent_id,
        });
    }

    let subtree = collect_subtree(graph, id)?;
    let mut touched_lexemes = BTreeSet::new();
    for &doomed in &subtree {
        let thought = graph.get(doomed).ok_or(EngineError::CorruptGraph {
            thought: doomed,
            reason: "subtree id missing from store",
        })?;
        let key = graph.canon().key(&thought.value);
        let indexed = graph
            .lexeme_for(key)
            .is_some_and(|lexeme| lexeme.contexts.contains(&doomed));
        if !indexed {
            return Err(EngineError::MissingLexeme {
                thought: doomed,
                value: thought.value.clone(),
            });
        }
        touched_lexemes.insert(key);
    }

    // Children before parents, so each removal unlinks from a live parent.
    for &doomed in subtree.iter().rev() {
        graph.remove(doomed);
    }

    let mut touched: BTreeSet<ThoughtId> = subtree.into_iter().collect();
    touched.insert(parent_id);
    Ok(MutationDelta::capture(graph, touched, touched_lexemes))
}

fn required_parent(thought: &Thought) -> EngineResult<ThoughtId> {
    thought.parent_id.ok_or(EngineError::CorruptGraph {
        thought: thought.id,
        reason: "non-root thought without parent reference",
    })
}

/// Another child of `parent_id` whose value shares the canonical key.
fn sibling_collision(
    graph: &ThoughtGraph,
    id: ThoughtId,
    parent_id: ThoughtId,
    key: LexemeKey,
) -> Option<ThoughtId> {
    let lexeme = graph.lexeme_for(key)?;
    lexeme.contexts.iter().copied().find(|&other| {
        other != id
            && graph
                .get(other)
                .is_some_and(|thought| thought.parent_id == Some(parent_id))
    })
}

/// Preorder subtree ids starting at `start`; parents precede children.
fn collect_subtree(graph: &ThoughtGraph, start: ThoughtId) -> EngineResult<Vec<ThoughtId>> {
    let mut ordered = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            return Err(EngineError::CorruptGraph {
                thought: id,
                reason: "cycle in child sets",
            });
        }
        let thought = graph.get(id).ok_or(EngineError::CorruptGraph {
            thought: id,
            reason: "child id missing from store",
        })?;
        ordered.push(id);
        stack.extend(thought.children.iter().copied());
    }
    Ok(ordered)
}

/// Rejects a destination that sits inside the moved thought's subtree.
fn ensure_outside_subtree(
    graph: &ThoughtGraph,
    id: ThoughtId,
    destination: ThoughtId,
) -> EngineResult<()> {
    let mut visited = HashSet::new();
    let mut cursor = Some(destination);
    while let Some(current) = cursor {
        if current == id {
            return Err(EngineError::CycleDetected(id));
        }
        if !visited.insert(current) {
            return Err(EngineError::CorruptGraph {
                thought: current,
                reason: "cycle in parent chain",
            });
        }
        cursor = graph
            .get(current)
            .ok_or(EngineError::CorruptGraph {
                thought: current,
                reason: "parent chain id missing from store",
            })?
            .parent_id;
    }
    Ok(())
}

/// Rewrites the stored context of every id in `ordered` (preorder, so each
/// parent is refreshed before its children).
fn refresh_contexts(graph: &mut ThoughtGraph, ordered: &[ThoughtId]) {
    for &id in ordered {
        let parent_context = graph
            .get(id)
            .and_then(|thought| thought.parent_id)
            .and_then(|parent| graph.get(parent))
            .filter(|parent| !parent.is_root())
            .map(|parent| parent.context.clone())
            .unwrap_or_default();
        if let Some(thought) = graph.thought_mut(id) {
            let mut context = parent_context;
            context.push(thought.value.clone());
            thought.context = context;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{collect_subtree, EngineError};
    use crate::graph::ThoughtGraph;
    use crate::model::{root_id, Thought, ThoughtId};

    #[test]
    fn collect_subtree_reports_dangling_child_as_corruption() {
        let mut graph = ThoughtGraph::new(0);
        let id = ThoughtId::new_v4();
        graph
            .insert(Thought::new(id, "a", 1.0, Some(root_id()), 0))
            .unwrap();
        // Simulate corruption: a child id that was never stored.
        graph
            .thought_mut(id)
            .unwrap()
            .children
            .insert(ThoughtId::new_v4());
        let err = collect_subtree(&graph, id).unwrap_err();
        assert!(matches!(err, EngineError::CorruptGraph { .. }));
    }
}
