//! Offline integrity checking and index repair.
//!
//! # Responsibility
//! - Detect violated store/index invariants from a full graph dump.
//! - Rebuild the lexeme index from thought values when it has drifted.
//!
//! Runs against the in-memory graph only; it is tooling for operators,
//! not part of the interactive mutation path.

use crate::canon::LexemeKey;
use crate::graph::ThoughtGraph;
use crate::model::{Lexeme, ThoughtId};
use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};

/// One detected invariant violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A thought references a parent id missing from the store.
    MissingParent {
        thought: ThoughtId,
        parent: ThoughtId,
    },
    /// A child set references an id missing from the store.
    MissingChild { parent: ThoughtId, child: ThoughtId },
    /// A lexeme context references a thought missing from the store.
    UnknownLexemeContext { key: LexemeKey, thought: ThoughtId },
    /// A lexeme context's stored value no longer canonicalizes to the
    /// lexeme's key.
    StaleLexemeContext { key: LexemeKey, thought: ThoughtId },
    /// A lexeme exists with no contexts.
    EmptyLexeme { key: LexemeKey },
    /// A thought's value has no lexeme entry at all.
    UnindexedThought { thought: ThoughtId },
    /// The parent chain of a thought loops back on itself.
    ParentCycle { thought: ThoughtId },
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingParent { thought, parent } => {
                write!(f, "thought {thought} references missing parent {parent}")
            }
            Self::MissingChild { parent, child } => {
                write!(f, "thought {parent} references missing child {child}")
            }
            Self::UnknownLexemeContext { key, thought } => {
                write!(f, "lexeme {key:#018x} references missing thought {thought}")
            }
            Self::StaleLexemeContext { key, thought } => {
                write!(f, "lexeme {key:#018x} holds stale context {thought}")
            }
            Self::EmptyLexeme { key } => write!(f, "lexeme {key:#018x} has no contexts"),
            Self::UnindexedThought { thought } => {
                write!(f, "thought {thought} has no lexeme entry")
            }
            Self::ParentCycle { thought } => {
                write!(f, "parent chain of thought {thought} forms a cycle")
            }
        }
    }
}

/// Scans the full graph for invariant violations.
pub fn check(graph: &ThoughtGraph) -> Vec<Violation> {
    let mut violations = Vec::new();

    for thought in graph.thoughts() {
        if let Some(parent) = thought.parent_id {
            if !graph.contains(parent) {
                violations.push(Violation::MissingParent {
                    thought: thought.id,
                    parent,
                });
            }
        }
        for &child in &thought.children {
            if !graph.contains(child) {
                violations.push(Violation::MissingChild {
                    parent: thought.id,
                    child,
                });
            }
        }
        if has_parent_cycle(graph, thought.id) {
            violations.push(Violation::ParentCycle {
                thought: thought.id,
            });
        }
        if !thought.is_root() {
            let key = graph.canon().key(&thought.value);
            let indexed = graph
                .lexeme_for(key)
                .is_some_and(|lexeme| lexeme.contexts.contains(&thought.id));
            if !indexed {
                violations.push(Violation::UnindexedThought {
                    thought: thought.id,
                });
            }
        }
    }

    for lexeme in graph.lexemes() {
        if lexeme.contexts.is_empty() {
            violations.push(Violation::EmptyLexeme { key: lexeme.key });
        }
        for &id in &lexeme.contexts {
            match graph.get(id) {
                None => violations.push(Violation::UnknownLexemeContext {
                    key: lexeme.key,
                    thought: id,
                }),
                Some(thought) => {
                    if graph.canon().key(&thought.value) != lexeme.key {
                        violations.push(Violation::StaleLexemeContext {
                            key: lexeme.key,
                            thought: id,
                        });
                    }
                }
            }
        }
    }

    violations
}

/// Rebuilds the lexeme index from stored thought values.
///
/// Returns the number of lexemes in the rebuilt index. This is the repair
/// half of the offline contract: the store side stays untouched.
pub fn rebuild_lexemes(graph: &mut ThoughtGraph) -> usize {
    let mut rebuilt: HashMap<LexemeKey, Lexeme> = HashMap::new();
    let entries: Vec<(ThoughtId, String)> = graph
        .thoughts()
        .filter(|thought| !thought.is_root())
        .map(|thought| (thought.id, thought.value.clone()))
        .collect();
    for (id, value) in entries {
        let canonical = graph.canon().canonicalize(&value);
        rebuilt
            .entry(canonical.key)
            .or_insert_with(|| Lexeme::new(canonical.key, canonical.text))
            .contexts
            .insert(id);
    }
    let count = rebuilt.len();
    graph.replace_lexemes(rebuilt);
    count
}

fn has_parent_cycle(graph: &ThoughtGraph, start: ThoughtId) -> bool {
    let mut visited = HashSet::new();
    let mut cursor = Some(start);
    while let Some(current) = cursor {
        if !visited.insert(current) {
            return true;
        }
        cursor = graph.get(current).and_then(|thought| thought.parent_id);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::{check, rebuild_lexemes, Violation};
    use crate::graph::ThoughtGraph;
    use crate::model::{root_id, Thought, ThoughtId};

    fn seeded() -> (ThoughtGraph, ThoughtId) {
        let mut graph = ThoughtGraph::new(0);
        let id = ThoughtId::new_v4();
        graph
            .insert(Thought::new(id, "apple", 1.0, Some(root_id()), 0))
            .unwrap();
        (graph, id)
    }

    #[test]
    fn healthy_graph_has_no_violations() {
        let (graph, _) = seeded();
        assert!(check(&graph).is_empty());
    }

    #[test]
    fn stale_value_is_detected_and_repaired() {
        let (mut graph, id) = seeded();
        // Tamper with the value behind the index's back.
        graph.thought_mut(id).unwrap().value = "pear".to_string();
        let violations = check(&graph);
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::StaleLexemeContext { .. })));
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::UnindexedThought { .. })));

        rebuild_lexemes(&mut graph);
        assert!(check(&graph).is_empty());
        let key = graph.canon().key("pear");
        assert!(graph
            .lexeme_for(key)
            .is_some_and(|lexeme| lexeme.contexts.contains(&id)));
    }

    #[test]
    fn dangling_lexeme_context_is_detected() {
        let (mut graph, id) = seeded();
        // Add a phantom context id to the apple lexeme.
        let phantom = ThoughtId::new_v4();
        graph.reindex(phantom, None, Some("apple"));
        let violations = check(&graph);
        assert!(violations.iter().any(|v| matches!(
            v,
            Violation::UnknownLexemeContext { thought, .. } if *thought == phantom
        )));
        let _ = id;
    }
}
