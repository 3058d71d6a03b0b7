use mindloom_core::engine::MutationDelta;
use mindloom_core::persist::{PersistenceSink, SinkResult};
use mindloom_core::{root_id, NullSink, OutlineError, OutlineService};

fn setup() -> OutlineService<NullSink> {
    OutlineService::new(0, NullSink)
}

#[test]
fn edits_flow_through_graph_tracker_and_sink() {
    let mut outline = setup();
    let home = outline.create(root_id(), "Home", 1.0, 10).unwrap();
    let todo = outline.create(home, "To Do", 1.0, 20).unwrap();

    let target = outline.rename(home, "Work", 30).unwrap();
    assert_eq!(target, home);
    assert_eq!(
        outline.graph().get(todo).unwrap().context,
        vec!["Work".to_string(), "To Do".to_string()]
    );

    let leaves = outline.recent().leaves();
    assert!(!leaves.is_empty());
    assert!(leaves[0]
        .path
        .iter()
        .any(|step| step.value == "Work" || step.value == "To Do"));
}

#[test]
fn rename_collision_reports_the_surviving_id() {
    let mut outline = setup();
    let cat = outline.create(root_id(), "Cat", 1.0, 10).unwrap();
    let dog = outline.create(root_id(), "Dog", 2.0, 10).unwrap();

    let survivor = outline.rename(cat, "dog", 20).unwrap();
    assert_eq!(survivor, dog);
    assert!(outline.graph().get(cat).is_none());
}

#[test]
fn delete_prunes_graph_and_tracker() {
    let mut outline = setup();
    let home = outline.create(root_id(), "Home", 1.0, 10).unwrap();
    let todo = outline.create(home, "To Do", 1.0, 20).unwrap();

    outline.delete(todo, 30).unwrap();
    assert!(outline.graph().get(todo).is_none());
    assert!(outline.graph().get(home).is_some());
    let key = outline.graph().canon().key("To Do");
    assert!(outline.graph().lexeme_for(key).is_none());
}

#[test]
fn reserved_root_edits_surface_as_engine_errors() {
    let mut outline = setup();
    let err = outline.rename(root_id(), "anything", 10).unwrap_err();
    assert!(matches!(err, OutlineError::Engine(_)));
}

struct FailingSink;

impl PersistenceSink for FailingSink {
    fn persist(&mut self, _delta: &MutationDelta) -> SinkResult<()> {
        Err(mindloom_core::SinkError::Sqlite(
            rusqlite::Error::InvalidQuery,
        ))
    }
}

#[test]
fn sink_failure_is_surfaced_but_graph_keeps_the_edit() {
    let mut outline = OutlineService::new(0, FailingSink);
    let err = outline.create(root_id(), "Home", 1.0, 10).unwrap_err();
    assert!(matches!(err, OutlineError::Sink(_)));
    // The in-memory transition completed before the sink ran; the caller
    // may replay the delta against a healthy sink.
    assert_eq!(outline.graph().len(), 2);
}
