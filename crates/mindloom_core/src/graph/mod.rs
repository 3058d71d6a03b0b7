//! Authoritative thought store and lexeme index.
//!
//! # Responsibility
//! - Own the id → thought map and the key → lexeme map.
//! - Keep both consistent through the single `reindex` write path.
//! - Provide the read surface used by UI collaborators
//!   (`get`, `children_of`, `lexeme_for`).
//!
//! # Invariants
//! - Every non-root thought has a parent present in the store.
//! - `id ∈ lexeme.contexts` iff the thought's value canonicalizes to the
//!   lexeme key; empty lexemes are garbage-collected immediately.
//! - Child listing is deterministic: rank ascending, then id.

use crate::canon::{Canonicalizer, LexemeKey};
use crate::model::{root_id, EditPath, Lexeme, PathStep, Rank, Thought, ThoughtId, Timestamp, ROOT_VALUE};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Minimal fractional offset used to resolve sibling rank collisions.
pub(crate) const RANK_NUDGE: f64 = 1e-6;

/// Errors from direct store operations.
#[derive(Debug)]
pub enum GraphError {
    /// A thought with this id is already stored.
    DuplicateThought(ThoughtId),
    /// Non-root thoughts must carry a parent reference.
    ParentRequired(ThoughtId),
    /// The referenced parent is not in the store.
    ParentNotFound {
        thought: ThoughtId,
        parent: ThoughtId,
    },
}

impl Display for GraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateThought(id) => write!(f, "thought already exists: {id}"),
            Self::ParentRequired(id) => write!(f, "thought has no parent reference: {id}"),
            Self::ParentNotFound { thought, parent } => {
                write!(f, "parent {parent} of thought {thought} not in store")
            }
        }
    }
}

impl Error for GraphError {}

/// The authoritative graph: thought store plus lexeme index.
#[derive(Debug)]
pub struct ThoughtGraph {
    thoughts: HashMap<ThoughtId, Thought>,
    lexemes: HashMap<LexemeKey, Lexeme>,
    canon: Canonicalizer,
}

impl ThoughtGraph {
    /// Creates a graph seeded with the reserved root thought.
    ///
    /// The root is not indexed in the lexeme map; it is reserved and can
    /// never be renamed, moved or deleted.
    pub fn new(now: Timestamp) -> Self {
        let mut graph = Self {
            thoughts: HashMap::new(),
            lexemes: HashMap::new(),
            canon: Canonicalizer::new(),
        };
        graph
            .thoughts
            .insert(root_id(), Thought::new(root_id(), ROOT_VALUE, 0.0, None, now));
        graph
    }

    pub fn canon(&self) -> &Canonicalizer {
        &self.canon
    }

    pub fn get(&self, id: ThoughtId) -> Option<&Thought> {
        self.thoughts.get(&id)
    }

    pub fn contains(&self, id: ThoughtId) -> bool {
        self.thoughts.contains_key(&id)
    }

    /// Number of stored thoughts, the root included.
    pub fn len(&self) -> usize {
        self.thoughts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thoughts.is_empty()
    }

    /// Children of `id` sorted by rank ascending, then id.
    pub fn children_of(&self, id: ThoughtId) -> Vec<&Thought> {
        let mut children: Vec<&Thought> = self
            .thoughts
            .get(&id)
            .map(|thought| {
                thought
                    .children
                    .iter()
                    .filter_map(|child| self.thoughts.get(child))
                    .collect()
            })
            .unwrap_or_default();
        children.sort_by(|a, b| {
            a.rank
                .partial_cmp(&b.rank)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        children
    }

    pub fn lexeme_for(&self, key: LexemeKey) -> Option<&Lexeme> {
        self.lexemes.get(&key)
    }

    pub fn thoughts(&self) -> impl Iterator<Item = &Thought> {
        self.thoughts.values()
    }

    pub fn lexemes(&self) -> impl Iterator<Item = &Lexeme> {
        self.lexemes.values()
    }

    /// Inserts a new thought under its parent.
    ///
    /// Fills in the stored context from the parent chain, resolves rank
    /// collisions by a minimal fractional nudge, links the parent's child
    /// set and indexes the value's lexeme.
    pub fn insert(&mut self, mut thought: Thought) -> Result<(), GraphError> {
        if self.thoughts.contains_key(&thought.id) {
            return Err(GraphError::DuplicateThought(thought.id));
        }
        let Some(parent_id) = thought.parent_id else {
            return Err(GraphError::ParentRequired(thought.id));
        };
        let Some(parent) = self.thoughts.get(&parent_id) else {
            return Err(GraphError::ParentNotFound {
                thought: thought.id,
                parent: parent_id,
            });
        };

        let taken: Vec<Rank> = parent
            .children
            .iter()
            .filter_map(|child| self.thoughts.get(child))
            .map(|child| child.rank)
            .collect();
        thought.rank = resolve_rank(&taken, thought.rank);

        let mut context = parent.context.clone();
        if !parent.is_root() {
            debug_assert_eq!(context.last().map(String::as_str), Some(parent.value.as_str()));
        }
        context.push(thought.value.clone());
        thought.context = context;

        let id = thought.id;
        let value = thought.value.clone();
        self.thoughts.insert(id, thought);
        if let Some(parent) = self.thoughts.get_mut(&parent_id) {
            parent.children.insert(id);
        }
        self.reindex(id, None, Some(&value));
        Ok(())
    }

    /// Removes one thought: unlinks it from its parent's child set and
    /// drops its lexeme membership. Children are left in place; recursive
    /// deletion is the mutation engine's job.
    pub fn remove(&mut self, id: ThoughtId) -> Option<Thought> {
        let thought = self.thoughts.remove(&id)?;
        if let Some(parent_id) = thought.parent_id {
            if let Some(parent) = self.thoughts.get_mut(&parent_id) {
                parent.children.remove(&id);
            }
        }
        self.reindex(id, Some(&thought.value), None);
        Some(thought)
    }

    /// The single lexeme-membership write path.
    ///
    /// Atomically removes `id` from the old value's lexeme (dropping the
    /// lexeme when its context set empties) and adds it to the new value's
    /// lexeme (creating it when absent).
    pub fn reindex(&mut self, id: ThoughtId, old_value: Option<&str>, new_value: Option<&str>) {
        if let Some(old) = old_value {
            let canonical = self.canon.canonicalize(old);
            if let Some(lexeme) = self.lexemes.get_mut(&canonical.key) {
                lexeme.contexts.remove(&id);
                if lexeme.contexts.is_empty() {
                    self.lexemes.remove(&canonical.key);
                }
            }
        }
        if let Some(new) = new_value {
            let canonical = self.canon.canonicalize(new);
            self.lexemes
                .entry(canonical.key)
                .or_insert_with(|| Lexeme::new(canonical.key, canonical.text))
                .contexts
                .insert(id);
        }
    }

    /// Identity-plus-value path from just below the root down to `id`.
    ///
    /// Returns `None` for the root, an unknown id, or a corrupted parent
    /// chain (missing link or cycle).
    pub fn edit_path(&self, id: ThoughtId) -> Option<EditPath> {
        if id == root_id() {
            return None;
        }
        let mut steps = Vec::new();
        let mut visited = HashSet::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == root_id() {
                break;
            }
            if !visited.insert(current) {
                return None;
            }
            let thought = self.thoughts.get(&current)?;
            steps.push(PathStep::new(current, thought.value.clone()));
            cursor = thought.parent_id;
        }
        steps.reverse();
        Some(steps)
    }

    pub(crate) fn thought_mut(&mut self, id: ThoughtId) -> Option<&mut Thought> {
        self.thoughts.get_mut(&id)
    }

    pub(crate) fn replace_lexemes(&mut self, lexemes: HashMap<LexemeKey, Lexeme>) {
        self.lexemes = lexemes;
    }
}

/// Nudges `requested` upward by the minimal fractional offset until it no
/// longer collides with a taken sibling rank.
pub(crate) fn resolve_rank(taken: &[Rank], requested: Rank) -> Rank {
    let mut rank = requested;
    while taken.iter().any(|existing| *existing == rank) {
        rank += RANK_NUDGE;
    }
    rank
}
