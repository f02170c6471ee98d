//! Integration tests for the single-store dispatch pipeline.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::anyhow;
use serde_json::json;
use tracing_subscriber::EnvFilter;
use treestate_engine::testing::Recorder;
use treestate_engine::{
    action_types, create_store, effect_types, meta_types, Action, Chain, Dispatchable, Effect,
    HierarchyDescriptor, Map, NodeOptions, Observable, Reducer, Store, StoreConfig, StoreError,
    Subscriber, Value,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Every test builds its store here, so `RUST_LOG` output covers all of them.
fn new_store() -> Store {
    init_tracing();
    create_store()
}

// ---------------------------------------------------------------------------
// Reducers
// ---------------------------------------------------------------------------

/// `set` replaces the slice with the payload; everything else is ignored.
fn setter() -> Reducer {
    Reducer::new(|state, action| {
        if action.action_type == "set" {
            Ok(action.payload.clone())
        } else {
            Ok(state.clone())
        }
    })
}

/// Counts reducer and effects-handler invocations.
fn counted(reducer_calls: Rc<Cell<usize>>, effects_calls: Rc<Cell<usize>>) -> Reducer {
    Reducer::new(move |state, _| {
        reducer_calls.set(reducer_calls.get() + 1);
        Ok(state.clone())
    })
    .with_effects(move |_, _, _| {
        effects_calls.set(effects_calls.get() + 1);
        Vec::new()
    })
}

fn failing_on(action_type: &'static str) -> Reducer {
    Reducer::new(move |state, action| {
        if action.action_type == action_type {
            Err(anyhow!("reducer rejected {}", action.action_type))
        } else {
            Ok(state.clone())
        }
    })
}

fn state(json: serde_json::Value) -> Value {
    Value::from(json)
}

// ---------------------------------------------------------------------------
// dispatch()
// ---------------------------------------------------------------------------

#[test]
fn dispatch_returns_the_new_state() {
    let store = new_store();
    store.use_hierarchy(setter()).unwrap();

    let result = store.dispatch(Action::new("set").with_payload(2)).unwrap();

    assert!(result.is_ok());
    assert_eq!(result.state, Value::from(2));
    assert_eq!(store.get_state().unwrap(), Value::from(2));
}

#[test]
fn skip_reducers_still_runs_the_effects_layer() {
    let reducer_calls = Rc::new(Cell::new(0));
    let effects_calls = Rc::new(Cell::new(0));
    let store = new_store();
    store
        .use_hierarchy(counted(reducer_calls.clone(), effects_calls.clone()))
        .unwrap();

    let chain = Chain::from(Action::new("a")).with_meta(meta_types::SKIP_REDUCERS, None);
    store.dispatch(chain).unwrap();

    assert_eq!(reducer_calls.get(), 1);
    assert_eq!(effects_calls.get(), 2);
}

#[test]
fn skip_effects_still_runs_the_reducer_layer() {
    let reducer_calls = Rc::new(Cell::new(0));
    let effects_calls = Rc::new(Cell::new(0));
    let store = new_store();
    store
        .use_hierarchy(counted(reducer_calls.clone(), effects_calls.clone()))
        .unwrap();

    let chain = Chain::from(Action::new("a")).with_meta(meta_types::SKIP_EFFECTS, None);
    store.dispatch(chain).unwrap();

    assert_eq!(reducer_calls.get(), 2);
    assert_eq!(effects_calls.get(), 1);
}

#[test]
fn skip_effects_keeps_the_dispatch_effect() {
    let store = new_store();
    let recorder = Recorder::new();
    recorder.attach(&store);

    let chain = Chain::from(Action::new("a")).with_meta(meta_types::SKIP_EFFECTS, None);
    store.dispatch(chain).unwrap();

    let effects = recorder.effects();
    assert_eq!(effects.len(), 1);
    assert_eq!(effects[0].effect_types(), vec![effect_types::DISPATCH.to_string()]);
}

#[test]
fn hydrate_action_commits_the_payload_itself() {
    let store = new_store();
    store.use_hierarchy(setter()).unwrap();
    let recorder = Recorder::new();
    recorder.attach(&store);
    let payload = state(json!({"a": 1}));

    let result = store.dispatch(Action::hydrate(payload.clone())).unwrap();

    assert!(result.state.same(&payload));
    assert!(store.get_state().unwrap().same(&payload));

    let effects = recorder.effects();
    assert_eq!(effects.len(), 1);
    assert_eq!(effects[0].effect_types(), vec![effect_types::DISPATCH.to_string()]);
    let dispatched = &effects[0].effects[0].message().unwrap().payload;
    assert_eq!(dispatched.get("type"), Value::from(action_types::HYDRATE));
    assert!(dispatched.get("payload").same(&payload));
}

#[test]
fn invalid_dispatchables_are_rejected() {
    let store = new_store();

    let err = Dispatchable::from_value(&state(json!({}))).unwrap_err();
    assert!(err.to_string().starts_with("Invalid meta chain"));

    let err = store.dispatch(Action::new("")).unwrap_err();
    assert!(matches!(err, StoreError::InvalidMetaChain));

    let err = Dispatchable::from_value(&state(json!({"type": 1}))).unwrap_err();
    assert!(matches!(err, StoreError::InvalidTypeField { field: "type", .. }));

    let err = Dispatchable::from_value(&state(json!("increment"))).unwrap_err();
    assert!(matches!(err, StoreError::InvalidDispatchable { detailed_type: "string" }));
}

#[test]
fn null_and_numbers_are_not_dispatchable() {
    let store = new_store();
    let recorder = Recorder::new();
    recorder.attach(&store);

    for (value, kind) in [(Value::Null, "null"), (Value::from(1), "number"), (state(json!([1])), "array")] {
        let err = Dispatchable::from_value(&value).unwrap_err();
        assert!(
            matches!(err, StoreError::InvalidDispatchable { detailed_type } if detailed_type == kind),
            "{value:?} should be rejected"
        );
    }

    assert_eq!(recorder.effect_calls(), 0);
    assert_eq!(recorder.state_calls(), 0);
    assert_eq!(store.get_state().unwrap(), Value::Null);
}

#[test]
fn object_form_dispatchables_honor_their_meta() {
    let store = new_store();
    store.use_hierarchy(setter()).unwrap();

    let dispatchable = Dispatchable::from_value(&state(json!({
        "metaType": meta_types::SKIP_REDUCERS,
        "payload": {"type": "set", "payload": 5}
    })))
    .unwrap();
    let result = store.dispatch(dispatchable).unwrap();

    assert_eq!(result.state, Value::Null);
}

#[test]
fn reentrant_calls_surface_as_dispatch_errors() {
    let store = new_store();
    let handle = store.clone();
    store
        .use_hierarchy(Reducer::new(move |state, action| {
            match action.action_type.as_str() {
                "read" => {
                    handle.get_state()?;
                }
                "hydrate" => {
                    handle.hydrate(1)?;
                }
                "merge" => {
                    handle.set_state(json!({"a": 1}))?;
                }
                _ => {}
            }
            Ok(state.clone())
        }))
        .unwrap();

    for action_type in ["read", "hydrate", "merge"] {
        let result = store.dispatch(Action::new(action_type)).unwrap();

        let err = result.error.expect("reentrant call should fail");
        assert!(err.to_string().contains("cannot be called within a reducer"));
        assert!(err
            .downcast_ref::<StoreError>()
            .is_some_and(StoreError::is_reentrancy));
    }

    // the guard is released once the reducer layer is done
    assert!(store.get_state().is_ok());
}

#[test]
fn reducer_errors_keep_the_previous_state() {
    let store = new_store();
    store
        .use_hierarchy(HierarchyDescriptor::branch([
            ("a", setter().into()),
            ("b", failing_on("fail").into()),
        ]))
        .unwrap();
    let before = store.get_state().unwrap();
    let recorder = Recorder::new();
    recorder.attach(&store);

    let result = store.dispatch(Action::new("fail")).unwrap();

    assert!(result.state.same(&before));
    assert_eq!(recorder.errors(), vec!["reducer rejected fail".to_string()]);
    assert_eq!(recorder.state_calls(), 0);

    let effects = recorder.effects();
    assert_eq!(effects.len(), 1);
    assert_eq!(effects[0].error.as_deref(), Some("reducer rejected fail"));
    assert_eq!(effects[0].effect_types(), vec![effect_types::DISPATCH.to_string()]);
}

#[test]
fn inducers_commit_through_the_hydrate_path() {
    let store = new_store();
    store.hydrate(json!({"n": 1})).unwrap();

    let result = store
        .dispatch(Dispatchable::inducer(|state| {
            let n = state.get("n").as_f64().unwrap_or_default();
            Value::map([("n", n + 1.0)])
        }))
        .unwrap();

    assert_eq!(result.state, state(json!({"n": 2})));
}

#[test]
fn inducers_returning_the_same_state_notify_nobody() {
    let store = new_store();
    store.hydrate(json!({"n": 1})).unwrap();
    let before = store.get_state().unwrap();
    let recorder = Recorder::new();
    recorder.attach(&store);

    let result = store.dispatch(Dispatchable::inducer(|state| state.clone())).unwrap();

    assert!(result.state.same(&before));
    assert_eq!(recorder.effect_calls(), 0);
}

#[test]
fn inducers_cannot_read_their_own_store() {
    let store = new_store();
    let handle = store.clone();
    let seen = Rc::new(Cell::new(false));
    let flag = seen.clone();

    store
        .dispatch(Dispatchable::inducer(move |state| {
            flag.set(handle.get_state().is_err_and(|e| e.is_reentrancy()));
            state.clone()
        }))
        .unwrap();

    assert!(seen.get());
}

// ---------------------------------------------------------------------------
// hydrate() / set_state()
// ---------------------------------------------------------------------------

#[test]
fn hydrate_is_chainable_and_idempotent() {
    let store = new_store();
    let recorder = Recorder::new();
    recorder.attach(&store);
    let payload = state(json!({"a": 1}));

    store.hydrate(payload.clone()).unwrap().hydrate(payload.clone()).unwrap();

    assert_eq!(recorder.states(), vec![(payload, Value::Null)]);
}

#[test]
fn hydrate_bypasses_plain_reducers() {
    let calls = Rc::new(Cell::new(0));
    let store = new_store();
    store
        .use_hierarchy(counted(calls.clone(), Rc::new(Cell::new(0))))
        .unwrap();

    store.hydrate(json!({"x": 1})).unwrap();

    assert_eq!(calls.get(), 1);
    assert_eq!(store.get_state().unwrap(), state(json!({"x": 1})));
}

#[test]
fn set_state_deep_merges_and_keeps_untouched_branches() {
    let store = new_store();
    store
        .hydrate(json!({"a": {"b": 1}, "c": {"d": 2}}))
        .unwrap();
    let before = store.get_state().unwrap();

    let result = store.set_state(json!({"a": {"e": 3}})).unwrap();

    assert_eq!(result.state, state(json!({"a": {"b": 1, "e": 3}, "c": {"d": 2}})));
    assert!(result.state.get("c").same(&before.get("c")));
}

#[test]
fn set_state_with_nothing_new_is_a_no_op() {
    let store = new_store();
    store.hydrate(json!({"a": 1})).unwrap();
    let before = store.get_state().unwrap();
    let recorder = Recorder::new();
    recorder.attach(&store);

    let result = store.set_state(json!({"a": 1})).unwrap();

    assert!(result.state.same(&before));
    assert_eq!(recorder.effect_calls(), 0);
}

#[test]
fn set_state_runs_the_effects_layer() {
    let store = new_store();
    store
        .use_hierarchy(setter().with_effects(|_, action, _| {
            vec![Chain::from(Effect::new("seen").with_payload(action.action_type.as_str()))]
        }))
        .unwrap();
    let recorder = Recorder::new();
    recorder.attach(&store);

    store.set_state(json!({"a": 1})).unwrap();

    let effects = recorder.effects();
    assert_eq!(
        effects[0].effect_types(),
        vec![effect_types::DISPATCH.to_string(), "seen".to_string()]
    );
    assert_eq!(
        effects[0].effects[1].message().unwrap().payload,
        Value::from(action_types::PARTIAL_HYDRATE)
    );
    assert_eq!(
        effects[0].effects[0].message().unwrap().payload.get("type"),
        Value::from(action_types::PARTIAL_HYDRATE)
    );
}

// ---------------------------------------------------------------------------
// set_node_options()
// ---------------------------------------------------------------------------

#[test]
fn node_options_shape_created_nodes() {
    let store = new_store();
    store.set_node_options(NodeOptions::new().with_create(|| {
        let mut node = Map::new();
        node.insert("created".into(), Value::from(true));
        node
    }));

    store
        .use_hierarchy(HierarchyDescriptor::branch([(
            "a",
            Reducer::new(|_, _| Ok(Value::from(1))).into(),
        )]))
        .unwrap();

    assert_eq!(store.get_state().unwrap(), state(json!({"created": true, "a": 1})));
}

#[test]
fn node_options_shape_merged_nodes() {
    let clones = Rc::new(Cell::new(0));
    let counter = clones.clone();
    let store = new_store();
    store.hydrate(json!({"a": {"b": 1}})).unwrap();
    store.set_node_options(NodeOptions::new().with_clone(move |node| {
        counter.set(counter.get() + 1);
        node.clone()
    }));

    store.set_state(json!({"a": {"c": 2}})).unwrap();

    assert_eq!(clones.get(), 2);
}

// ---------------------------------------------------------------------------
// subscribe()
// ---------------------------------------------------------------------------

#[test]
fn subscribers_receive_new_and_previous_state() {
    let store = new_store();
    store.hydrate(json!({"a": 1})).unwrap();
    let recorder = Recorder::new();
    recorder.attach(&store);

    store.hydrate(json!({"a": 2})).unwrap();

    assert_eq!(
        recorder.states(),
        vec![(state(json!({"a": 2})), state(json!({"a": 1})))]
    );
}

#[test]
fn closures_subscribe_to_state_changes() {
    let store = new_store();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    store.subscribe(move |new_state: &Value, _: &Value| log.borrow_mut().push(new_state.clone()));

    store.hydrate(1).unwrap();
    store.hydrate(2).unwrap();

    assert_eq!(*seen.borrow(), vec![Value::from(1), Value::from(2)]);
}

#[test]
fn unchanged_state_only_reaches_effects_subscribers() {
    let store = new_store();
    store.use_hierarchy(setter()).unwrap();
    let recorder = Recorder::new();
    recorder.attach(&store);

    store.dispatch(Action::new("noop")).unwrap();

    assert_eq!(recorder.state_calls(), 0);
    assert_eq!(recorder.effect_calls(), 1);
}

#[test]
fn repeated_nan_counts_as_unchanged() {
    let store = new_store();
    store
        .use_hierarchy(Reducer::new(|_, _| Ok(Value::from(f64::NAN))))
        .unwrap();
    let recorder = Recorder::new();
    recorder.attach(&store);

    store.dispatch(Action::new("again")).unwrap();

    assert_eq!(recorder.state_calls(), 0);
    assert_eq!(recorder.effect_calls(), 1);
}

#[test]
fn effects_subscribers_see_the_dispatched_chain() {
    let store = new_store();
    let recorder = Recorder::new();
    recorder.attach(&store);
    let chain = Chain::from(Action::new("a").with_payload(1)).with_meta("custom", Some(Value::from("x")));

    store.dispatch(&chain).unwrap();

    let effects = recorder.effects();
    assert!(effects[0].action.ptr_eq(&chain));
    assert_eq!(effects[0].effects[0].message().unwrap().payload, chain.to_value());
}

#[test]
fn unsubscribe_stops_notifications() {
    let store = new_store();
    let recorder = Recorder::new();
    let subscription = recorder.attach(&store);

    store.hydrate(1).unwrap();
    subscription.unsubscribe();
    subscription.unsubscribe();
    store.hydrate(2).unwrap();

    assert_eq!(recorder.state_calls(), 1);
}

#[test]
fn subscribers_may_unsubscribe_while_notified() {
    let store = new_store();
    let slot: Rc<RefCell<Option<treestate_engine::Subscription>>> = Rc::default();
    let calls = Rc::new(Cell::new(0));

    let own = slot.clone();
    let counter = calls.clone();
    let subscription = store.subscribe(Subscriber::new().on_next(move |_, _| {
        counter.set(counter.get() + 1);
        if let Some(subscription) = own.borrow().as_ref() {
            subscription.unsubscribe();
        }
    }));
    *slot.borrow_mut() = Some(subscription);

    store.hydrate(1).unwrap();
    store.hydrate(2).unwrap();

    assert_eq!(calls.get(), 1);
}

// ---------------------------------------------------------------------------
// use_hierarchy()
// ---------------------------------------------------------------------------

#[test]
fn use_hierarchy_recalculates_once() {
    let calls = Rc::new(Cell::new(0));
    let store = new_store();

    store
        .use_hierarchy(counted(calls.clone(), Rc::new(Cell::new(0))))
        .unwrap();

    assert_eq!(calls.get(), 1);
}

#[test]
fn use_hierarchy_reports_recalculation_failures() {
    let store = new_store();

    let err = store
        .use_hierarchy(failing_on(action_types::RECALCULATE))
        .unwrap_err();

    assert!(matches!(err, StoreError::Dispatch(_)));
    assert_eq!(store.get_state().unwrap(), Value::Null);
}

#[test]
fn null_hierarchy_keeps_state() {
    let store = Store::with_config(StoreConfig::new().with_initial_state(json!({"a": 1}))).unwrap();

    store.use_hierarchy(HierarchyDescriptor::Null).unwrap();

    assert_eq!(store.get_state().unwrap(), state(json!({"a": 1})));
}

// ---------------------------------------------------------------------------
// Observable
// ---------------------------------------------------------------------------

#[test]
fn observable_emits_only_subsequent_states() {
    let store = new_store();
    store.hydrate(1).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();

    store.subscribe_next(Box::new(move |value| log.borrow_mut().push(value.clone())));
    store.hydrate(2).unwrap();

    assert_eq!(*seen.borrow(), vec![Value::from(2)]);
}
