use mindloom_core::integrity::{check, rebuild_lexemes, Violation};
use mindloom_core::{root_id, Thought, ThoughtGraph, ThoughtId};

fn add(graph: &mut ThoughtGraph, parent: ThoughtId, value: &str, rank: f64) -> ThoughtId {
    let id = ThoughtId::new_v4();
    graph
        .insert(Thought::new(id, value, rank, Some(parent), 0))
        .unwrap();
    id
}

#[test]
fn freshly_built_graph_passes_all_checks() {
    let mut graph = ThoughtGraph::new(0);
    let home = add(&mut graph, root_id(), "Home", 1.0);
    add(&mut graph, home, "To Do", 1.0);
    add(&mut graph, root_id(), "apple", 2.0);
    assert!(check(&graph).is_empty());
}

#[test]
fn store_level_removal_leaves_detectable_orphans() {
    let mut graph = ThoughtGraph::new(0);
    let parent = add(&mut graph, root_id(), "Parent", 1.0);
    let child = add(&mut graph, parent, "Child", 1.0);

    graph.remove(parent);
    let violations = check(&graph);
    assert!(violations.iter().any(|v| matches!(
        v,
        Violation::MissingParent { thought, parent: p } if *thought == child && *p == parent
    )));
}

#[test]
fn deindexed_thought_is_detected_and_repairable() {
    let mut graph = ThoughtGraph::new(0);
    let apple = add(&mut graph, root_id(), "apple", 1.0);
    graph.reindex(apple, Some("apple"), None);

    let violations = check(&graph);
    assert!(violations.iter().any(|v| matches!(
        v,
        Violation::UnindexedThought { thought } if *thought == apple
    )));

    rebuild_lexemes(&mut graph);
    assert!(check(&graph).is_empty());
}
