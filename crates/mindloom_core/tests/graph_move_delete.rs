use mindloom_core::engine::{self, EngineError};
use mindloom_core::{root_id, Thought, ThoughtGraph, ThoughtId};

fn setup() -> ThoughtGraph {
    ThoughtGraph::new(0)
}

fn add(graph: &mut ThoughtGraph, parent: ThoughtId, value: &str, rank: f64) -> ThoughtId {
    let id = ThoughtId::new_v4();
    graph
        .insert(Thought::new(id, value, rank, Some(parent), 0))
        .unwrap();
    id
}

#[test]
fn move_subtree_preserves_ids_and_relative_rank_order() {
    let mut graph = setup();
    let projects = add(&mut graph, root_id(), "Projects", 1.0);
    let archive = add(&mut graph, root_id(), "Archive", 2.0);
    let children: Vec<ThoughtId> = (1..=5)
        .map(|n| add(&mut graph, projects, &format!("Item {n}"), n as f64))
        .collect();

    engine::move_thought(&mut graph, projects, archive, 1.0, 10).unwrap();

    assert_eq!(graph.get(projects).unwrap().parent_id, Some(archive));
    let ordered: Vec<ThoughtId> = graph
        .children_of(projects)
        .iter()
        .map(|thought| thought.id)
        .collect();
    assert_eq!(ordered, children);
    for (index, &child) in children.iter().enumerate() {
        let record = graph.get(child).unwrap();
        assert_eq!(
            record.context,
            vec![
                "Archive".to_string(),
                "Projects".to_string(),
                format!("Item {}", index + 1)
            ]
        );
    }
}

#[test]
fn move_resolves_rank_collision_by_fractional_nudge() {
    let mut graph = setup();
    let a = add(&mut graph, root_id(), "A", 1.0);
    let b = add(&mut graph, root_id(), "B", 2.0);
    let settled = add(&mut graph, b, "Settled", 2.0);

    engine::move_thought(&mut graph, a, b, 2.0, 10).unwrap();

    let moved_rank = graph.get(a).unwrap().rank;
    assert_ne!(moved_rank, 2.0);
    assert!(moved_rank > 2.0 && moved_rank < 2.001);
    // The resident sibling keeps its rank untouched.
    assert_eq!(graph.get(settled).unwrap().rank, 2.0);
    let ordered: Vec<ThoughtId> = graph.children_of(b).iter().map(|t| t.id).collect();
    assert_eq!(ordered, vec![settled, a]);
}

#[test]
fn move_into_own_subtree_is_rejected_without_changes() {
    let mut graph = setup();
    let a = add(&mut graph, root_id(), "A", 1.0);
    let inner = add(&mut graph, a, "Inner", 1.0);

    let err = engine::move_thought(&mut graph, a, inner, 1.0, 10).unwrap_err();
    assert!(matches!(err, EngineError::CycleDetected(id) if id == a));
    assert_eq!(graph.get(a).unwrap().parent_id, Some(root_id()));
    assert_eq!(graph.get(inner).unwrap().parent_id, Some(a));
}

#[test]
fn move_of_reserved_root_is_rejected() {
    let mut graph = setup();
    let a = add(&mut graph, root_id(), "A", 1.0);
    let err = engine::move_thought(&mut graph, root_id(), a, 1.0, 1).unwrap_err();
    assert!(matches!(err, EngineError::ImmutableThought(_)));
}

#[test]
fn deleting_last_context_removes_the_lexeme() {
    let mut graph = setup();
    let apple = add(&mut graph, root_id(), "apple", 1.0);
    let key = graph.canon().key("apple");
    assert!(graph.lexeme_for(key).is_some());

    let delta = engine::delete(&mut graph, apple).unwrap();
    assert!(graph.get(apple).is_none());
    assert!(graph.lexeme_for(key).is_none());
    assert!(matches!(delta.lexemes.get(&key), Some(None)));
}

#[test]
fn deleting_one_of_two_contexts_keeps_the_lexeme() {
    let mut graph = setup();
    let fruit = add(&mut graph, root_id(), "Fruit", 1.0);
    let first = add(&mut graph, fruit, "apple", 1.0);
    let second = add(&mut graph, root_id(), "apple", 2.0);
    let key = graph.canon().key("apple");

    engine::delete(&mut graph, first).unwrap();
    let lexeme = graph.lexeme_for(key).unwrap();
    assert!(!lexeme.contexts.contains(&first));
    assert!(lexeme.contexts.contains(&second));
    assert_eq!(lexeme.contexts.len(), 1);
}

#[test]
fn delete_removes_the_whole_subtree_bottom_up() {
    let mut graph = setup();
    let a = add(&mut graph, root_id(), "A", 1.0);
    let b = add(&mut graph, a, "B", 1.0);
    let c = add(&mut graph, b, "C", 1.0);

    let delta = engine::delete(&mut graph, a).unwrap();
    for id in [a, b, c] {
        assert!(graph.get(id).is_none());
        assert!(matches!(delta.thoughts.get(&id), Some(None)));
    }
    assert!(!graph.get(root_id()).unwrap().children.contains(&a));
    // The parent's shrunken child set is part of the delta.
    assert!(matches!(delta.thoughts.get(&root_id()), Some(Some(_))));
}

#[test]
fn delete_with_missing_parent_is_an_orphan_error() {
    let mut graph = setup();
    let parent = add(&mut graph, root_id(), "Parent", 1.0);
    let child = add(&mut graph, parent, "Child", 1.0);

    // Store-level removal leaves the child's parent reference dangling.
    graph.remove(parent);
    let err = engine::delete(&mut graph, child).unwrap_err();
    assert!(matches!(
        err,
        EngineError::OrphanThought { thought, parent: p } if thought == child && p == parent
    ));
    // The failed edit wrote nothing.
    assert!(graph.get(child).is_some());
}

#[test]
fn delete_of_reserved_root_is_rejected() {
    let mut graph = setup();
    let err = engine::delete(&mut graph, root_id()).unwrap_err();
    assert!(matches!(err, EngineError::ImmutableThought(_)));
}

#[test]
fn delete_aborts_on_missing_lexeme_without_partial_writes() {
    let mut graph = setup();
    let parent = add(&mut graph, root_id(), "Parent", 1.0);
    let child = add(&mut graph, parent, "Child", 1.0);

    // Deindex the child behind the engine's back to simulate corruption.
    graph.reindex(child, Some("Child"), None);

    let err = engine::delete(&mut graph, parent).unwrap_err();
    assert!(matches!(
        err,
        EngineError::MissingLexeme { thought, .. } if thought == child
    ));
    // Abort happened before the first write.
    assert!(graph.get(parent).is_some());
    assert!(graph.get(child).is_some());
    assert!(graph
        .lexeme_for(graph.canon().key("Parent"))
        .is_some());
}
