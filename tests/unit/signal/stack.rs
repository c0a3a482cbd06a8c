use super::*;

fn frame(id: SignalId, label: &str) -> EvalFrame {
    EvalFrame {
        id,
        label: label.to_owned(),
        collector: None,
        failure: None,
    }
}

#[test]
fn pop_on_empty_stack_is_underflow() {
    let mut stack = DependencyStack::default();
    let err = stack.pop(SignalId::fresh(), "x").err().unwrap();
    assert!(matches!(err, ReelError::ContextUnderflow));
}

#[test]
fn pop_of_wrong_frame_is_mismatch_and_unwinds() {
    let a = SignalId::fresh();
    let b = SignalId::fresh();
    let mut stack = DependencyStack::default();
    stack.push(frame(a, "a"));
    stack.push(frame(b, "b"));

    let err = stack.pop(a, "a").err().unwrap();
    match err {
        ReelError::ContextMismatch { expected, found } => {
            assert_eq!(expected, "a");
            assert_eq!(found, "b");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(stack.depth(), 0);
}

#[test]
fn poison_marks_cycle_members_only() {
    let outer = SignalId::fresh();
    let a = SignalId::fresh();
    let b = SignalId::fresh();
    let mut stack = DependencyStack::default();
    stack.push(frame(outer, "outer"));
    stack.push(frame(a, "a"));
    stack.push(frame(b, "b"));

    let err = ReelError::CircularDependency {
        signal: "a".to_owned(),
    };
    stack.poison_from(a, &err);

    assert!(stack.pop(b, "b").unwrap().failure.is_some());
    assert!(stack.pop(a, "a").unwrap().failure.is_some());
    assert!(stack.pop(outer, "outer").unwrap().failure.is_none());
}

#[test]
fn scope_guard_pops_when_dropped_early() {
    let before = dependency_depth();
    {
        let _scope = EvalScope::enter(SignalId::fresh(), "dropped".to_owned(), None);
        assert_eq!(dependency_depth(), before + 1);
    }
    assert_eq!(dependency_depth(), before);
}

#[test]
fn scope_guard_pops_during_unwind() {
    let before = dependency_depth();
    let result = std::panic::catch_unwind(|| {
        let _scope = EvalScope::enter(SignalId::fresh(), "panicking".to_owned(), None);
        panic!("evaluator blew up");
    });
    assert!(result.is_err());
    assert_eq!(dependency_depth(), before);
}

#[test]
fn untracked_scope_has_no_collector() {
    untracked(|| {
        assert_eq!(dependency_depth(), 1);
        assert!(with_stack(|s| s.collector()).is_none());
    });
    assert_eq!(dependency_depth(), 0);
}
