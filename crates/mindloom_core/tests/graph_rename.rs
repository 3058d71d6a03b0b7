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

fn assert_lexeme_invariant(graph: &ThoughtGraph) {
    for lexeme in graph.lexemes() {
        assert!(
            !lexeme.contexts.is_empty(),
            "lexeme {:#018x} has no contexts",
            lexeme.key
        );
        for &id in &lexeme.contexts {
            let thought = graph.get(id).expect("lexeme context must resolve");
            assert_eq!(
                graph.canon().key(&thought.value),
                lexeme.key,
                "value `{}` no longer canonicalizes to its lexeme",
                thought.value
            );
        }
    }
}

#[test]
fn rename_updates_descendant_contexts_without_id_churn() {
    let mut graph = setup();
    let home = add(&mut graph, root_id(), "Home", 1.0);
    let todo = add(&mut graph, home, "To Do", 1.0);
    assert_eq!(
        graph.get(todo).unwrap().context,
        vec!["Home".to_string(), "To Do".to_string()]
    );

    let outcome = engine::rename(&mut graph, home, "Work", 10).unwrap();
    assert_eq!(outcome.target, home);
    assert_eq!(
        graph.get(todo).unwrap().context,
        vec!["Work".to_string(), "To Do".to_string()]
    );
    // The descendant kept its identifier and its lexeme entry.
    let todo_key = graph.canon().key("To Do");
    assert!(graph
        .lexeme_for(todo_key)
        .is_some_and(|lexeme| lexeme.contexts.contains(&todo)));

    // The old value's last reference is gone, the new one is indexed.
    assert!(graph.lexeme_for(graph.canon().key("Home")).is_none());
    assert!(graph
        .lexeme_for(graph.canon().key("Work"))
        .is_some_and(|lexeme| lexeme.contexts.contains(&home)));
    assert_lexeme_invariant(&graph);
}

#[test]
fn rename_to_current_value_is_a_noop() {
    let mut graph = setup();
    let home = add(&mut graph, root_id(), "Home", 1.0);
    let before = graph.get(home).unwrap().clone();

    let outcome = engine::rename(&mut graph, home, "Home", 99).unwrap();
    assert!(outcome.delta.is_empty());
    assert_eq!(graph.get(home).unwrap(), &before);
    assert_lexeme_invariant(&graph);
}

#[test]
fn rename_of_reserved_root_is_rejected() {
    let mut graph = setup();
    let err = engine::rename(&mut graph, root_id(), "anything", 1).unwrap_err();
    assert!(matches!(err, EngineError::ImmutableThought(id) if id == root_id()));
}

#[test]
fn rename_collision_merges_into_existing_sibling() {
    let mut graph = setup();
    let cat = add(&mut graph, root_id(), "Cat", 1.0);
    let dog = add(&mut graph, root_id(), "Dog", 2.0);
    let kitten = add(&mut graph, cat, "Kitten", 1.0);

    // `dog` already carries the canonical value; the rename folds `cat`
    // into it instead of duplicating.
    let outcome = engine::rename(&mut graph, cat, "dog", 50).unwrap();
    assert_eq!(outcome.target, dog);
    assert!(graph.get(cat).is_none());
    assert!(matches!(outcome.delta.thoughts.get(&cat), Some(None)));

    let kitten_record = graph.get(kitten).unwrap();
    assert_eq!(kitten_record.parent_id, Some(dog));
    assert_eq!(
        kitten_record.context,
        vec!["Dog".to_string(), "Kitten".to_string()]
    );
    assert!(graph.get(dog).unwrap().children.contains(&kitten));

    let dog_key = graph.canon().key("dog");
    let lexeme = graph.lexeme_for(dog_key).unwrap();
    assert!(lexeme.contexts.contains(&dog));
    assert!(!lexeme.contexts.contains(&cat));
    assert!(graph.lexeme_for(graph.canon().key("Cat")).is_none());
    assert_lexeme_invariant(&graph);
}

#[test]
fn rename_delta_reports_every_changed_record() {
    let mut graph = setup();
    let home = add(&mut graph, root_id(), "Home", 1.0);
    let todo = add(&mut graph, home, "To Do", 1.0);
    let groceries = add(&mut graph, todo, "Groceries", 1.0);

    let outcome = engine::rename(&mut graph, home, "Work", 10).unwrap();
    for id in [home, todo, groceries] {
        assert!(matches!(outcome.delta.thoughts.get(&id), Some(Some(_))));
    }
    assert!(matches!(
        outcome.delta.lexemes.get(&graph.canon().key("Home")),
        Some(None)
    ));
    assert!(matches!(
        outcome.delta.lexemes.get(&graph.canon().key("Work")),
        Some(Some(_))
    ));
}

#[test]
fn rename_on_missing_thought_is_not_found() {
    let mut graph = setup();
    let err = engine::rename(&mut graph, ThoughtId::new_v4(), "x", 1).unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}
