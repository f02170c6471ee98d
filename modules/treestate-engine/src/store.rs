//! The store: state holder and dispatch pipeline.
//!
//! Every dispatch goes through the same steps:
//!
//! 1. Reentrancy check and meta-chain validation.
//! 2. DELEGATE routing to a sub-store, if requested.
//! 3. Reducer layer: hydrate/merge for hydrate actions, otherwise the
//!    compiled hierarchy (skipped under SKIP_REDUCERS).
//! 4. Commit.
//! 5. Effects layer: DISPATCH first, then every paired effects handler
//!    (skipped under SKIP_EFFECTS or after a reducer error).
//! 6. Notify subscribers: errors, then state changes, then effects.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace, warn};
use treestate_value::{merge, Value};

use crate::config::StoreConfig;
use crate::constants::{action_types, effect_types, meta_types};
use crate::dispatch::{DispatchResult, Dispatchable};
use crate::error::{StoreError, StoreResult};
use crate::hierarchy::{compile, DiffNode, HierarchyDescriptor, HierarchyType};
use crate::meta::{ActionChain, Chain, EffectChain};
use crate::options::NodeOptions;
use crate::subscriber::{EffectsEvent, Subscriber, Subscription};
use crate::types::{Action, Effect};

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Idle,
    Reducing,
}

/// Shared store internals. Sub-store registrations and subscriptions point
/// here weakly.
pub(crate) struct StoreInner {
    id: u64,
    name: Option<String>,
    state: RefCell<Value>,
    tree: RefCell<Rc<DiffNode>>,
    subscribers: RefCell<Vec<(u64, Rc<Subscriber>)>>,
    next_subscriber_id: Cell<u64>,
    status: Cell<Status>,
    node_options: RefCell<NodeOptions>,
}

impl StoreInner {
    fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("store#{}", self.id),
        }
    }

    fn assert_idle(&self, method: &'static str) -> StoreResult<()> {
        match self.status.get() {
            Status::Idle => Ok(()),
            Status::Reducing => Err(StoreError::Reentrancy { method }),
        }
    }

    pub(crate) fn remove_subscriber(&self, id: u64) {
        self.subscribers.borrow_mut().retain(|(sub_id, _)| *sub_id != id);
    }

    /// Snapshot, so handlers may subscribe or unsubscribe while being called.
    fn subscribers(&self) -> Vec<Rc<Subscriber>> {
        self.subscribers.borrow().iter().map(|(_, s)| Rc::clone(s)).collect()
    }

    fn notify(
        &self,
        action: &ActionChain,
        effects: &[EffectChain],
        new_state: &Value,
        prev_state: &Value,
        error: Option<&anyhow::Error>,
    ) {
        let subscribers = self.subscribers();

        if let Some(err) = error {
            for subscriber in &subscribers {
                subscriber.notify_error(err);
            }
        }

        if !new_state.same(prev_state) {
            for subscriber in &subscribers {
                subscriber.notify_next(new_state, prev_state);
            }
        }

        let event = EffectsEvent {
            action,
            effects,
            new_state,
            prev_state,
            error,
        };
        for subscriber in &subscribers {
            subscriber.notify_effects(&event);
        }
    }

    /// Re-emit a sub-store's dispatch to this store's effects subscribers.
    /// The state did not change here, so new and prev are the same value.
    fn forward_effects(
        &self,
        action: &ActionChain,
        effects: &[EffectChain],
        error: Option<&anyhow::Error>,
    ) {
        let state = self.state.borrow().clone();
        let event = EffectsEvent {
            action,
            effects,
            new_state: &state,
            prev_state: &state,
            error,
        };
        for subscriber in self.subscribers() {
            subscriber.notify_effects(&event);
        }
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        self.tree.get_mut().teardown();
    }
}

/// Marks the reducer layer as running. Reset on drop, so a panicking reducer
/// does not leave the store locked.
struct ReducerLayer<'a> {
    inner: &'a StoreInner,
}

impl<'a> ReducerLayer<'a> {
    fn enter(inner: &'a StoreInner) -> Self {
        inner.status.set(Status::Reducing);
        Self { inner }
    }
}

impl Drop for ReducerLayer<'_> {
    fn drop(&mut self) {
        self.inner.status.set(Status::Idle);
    }
}

/// Handle to a store. Cloning is cheap and every clone refers to the same
/// store.
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

/// A fresh store with null state and no hierarchy.
pub fn create_store() -> Store {
    Store::new()
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self::named(None)
    }

    fn named(name: Option<String>) -> Self {
        let id = NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            inner: Rc::new(StoreInner {
                id,
                name,
                state: RefCell::new(Value::Null),
                tree: RefCell::new(Rc::default()),
                subscribers: RefCell::new(Vec::new()),
                next_subscriber_id: Cell::new(1),
                status: Cell::new(Status::Idle),
                node_options: RefCell::new(NodeOptions::default()),
            }),
        }
    }

    pub fn with_config(config: StoreConfig) -> StoreResult<Self> {
        let store = Self::named(config.name);
        store.set_node_options(config.node_options);
        if let Some(hierarchy) = config.hierarchy {
            store.use_hierarchy(hierarchy)?;
        }
        if let Some(state) = config.initial_state {
            store.hydrate(state)?;
        }

        Ok(store)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Configured name, or `store#<id>`.
    pub fn label(&self) -> String {
        self.inner.label()
    }

    pub fn ptr_eq(&self, other: &Store) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Kind of the root of the current hierarchy.
    pub fn hierarchy_type(&self) -> HierarchyType {
        self.inner.tree.borrow().hierarchy_type()
    }

    /// Sub-store registered at exactly `path` in the current hierarchy.
    pub fn sub_store(&self, path: &[&str]) -> Option<Store> {
        let keys: Vec<String> = path.iter().map(|k| k.to_string()).collect();
        let tree = self.current_tree();
        match tree.find_store(&keys) {
            Some((store, rest)) if rest.is_empty() => Some(store.clone()),
            _ => None,
        }
    }

    pub fn get_state(&self) -> StoreResult<Value> {
        self.inner.assert_idle("get_state")?;
        Ok(self.current_state())
    }

    pub fn dispatch(&self, dispatchable: impl Into<Dispatchable>) -> StoreResult<DispatchResult> {
        match dispatchable.into() {
            Dispatchable::Action(chain) => self.dispatch_chain(chain, "dispatch"),
            Dispatchable::Inducer(inducer) => {
                self.inner.assert_idle("dispatch")?;
                let prev = self.current_state();
                let next = {
                    let _layer = ReducerLayer::enter(&self.inner);
                    inducer(&prev)
                };
                self.dispatch_chain(Chain::from(Action::hydrate(next)), "dispatch")
            }
        }
    }

    /// Replace the whole state. Sub-stores receive their new slices; plain
    /// reducers are not run.
    pub fn hydrate(&self, state: impl Into<Value>) -> StoreResult<&Self> {
        let result = self.dispatch_chain(Chain::from(Action::hydrate(state)), "hydrate")?;
        match result.error {
            Some(err) => Err(StoreError::Dispatch(err)),
            None => Ok(self),
        }
    }

    /// Deep-merge `patch` into the current state using the store's node options.
    pub fn set_state(&self, patch: impl Into<Value>) -> StoreResult<DispatchResult> {
        self.dispatch_chain(Chain::from(Action::partial_hydrate(patch)), "set_state")
    }

    /// Replace the hierarchy. Previous sub-store registrations are released,
    /// the new descriptor is compiled and every reducer is re-run.
    pub fn use_hierarchy(&self, descriptor: impl Into<HierarchyDescriptor>) -> StoreResult<&Self> {
        self.inner.assert_idle("use_hierarchy")?;

        self.current_tree().teardown();

        let parent = Rc::downgrade(&self.inner);
        let mut register =
            |path: &[String], child: &Store| register_sub_store(parent.clone(), path, child);
        let tree = compile(descriptor.into(), &mut register, &[]);

        trace!(store = %self.label(), root = ?tree.hierarchy_type(), "Installed hierarchy");
        *self.inner.tree.borrow_mut() = Rc::new(tree);

        let recalculate = Chain::from(Action::new(action_types::RECALCULATE));
        let result = self.dispatch_chain(recalculate, "use_hierarchy")?;
        match result.error {
            Some(err) => Err(StoreError::Dispatch(err)),
            None => Ok(self),
        }
    }

    /// Takes effect from the next dispatch on.
    pub fn set_node_options(&self, options: NodeOptions) -> &Self {
        *self.inner.node_options.borrow_mut() = options;
        self
    }

    pub fn subscribe(&self, subscriber: impl Into<Subscriber>) -> Subscription {
        let id = self.inner.next_subscriber_id.get();
        self.inner.next_subscriber_id.set(id + 1);
        self.inner
            .subscribers
            .borrow_mut()
            .push((id, Rc::new(subscriber.into())));

        Subscription {
            store: Rc::downgrade(&self.inner),
            id,
        }
    }

    fn current_state(&self) -> Value {
        self.inner.state.borrow().clone()
    }

    fn current_tree(&self) -> Rc<DiffNode> {
        Rc::clone(&self.inner.tree.borrow())
    }

    fn dispatch_chain(&self, chain: ActionChain, method: &'static str) -> StoreResult<DispatchResult> {
        self.inner.assert_idle(method)?;

        let action = chain.message()?.clone();
        if let Some(path) = chain.meta_data(meta_types::DELEGATE)? {
            return self.delegate(&chain, path);
        }

        let skip_reducers = chain.has_meta(meta_types::SKIP_REDUCERS)?;
        let skip_effects = chain.has_meta(meta_types::SKIP_EFFECTS)?;

        debug!(
            store = %self.label(),
            action = %action.action_type,
            skip_reducers,
            skip_effects,
            "Dispatching action"
        );

        let prev = self.current_state();
        let tree = self.current_tree();
        let nodes = self.inner.node_options.borrow().clone();

        let outcome = if action.is_hydrate() {
            let next = if action.action_type == action_types::HYDRATE {
                action.payload.clone()
            } else {
                merge(&prev, &action.payload, &nodes)
            };

            if next.same(&prev) {
                debug!(store = %self.label(), "Hydration left state unchanged");
                return Ok(DispatchResult {
                    state: prev,
                    error: None,
                });
            }

            let _layer = ReducerLayer::enter(&self.inner);
            tree.propagate_hydrate(&next, &action, &nodes)
        } else if skip_reducers {
            Ok(prev.clone())
        } else {
            let _layer = ReducerLayer::enter(&self.inner);
            tree.reduce(&prev, &action, &nodes)
        };

        let (next, error) = match outcome {
            Ok(next) => (next, None),
            Err(err) => {
                warn!(
                    store = %self.label(),
                    action = %action.action_type,
                    error = %err,
                    "Reducer layer failed, keeping previous state"
                );
                (prev.clone(), Some(err))
            }
        };

        *self.inner.state.borrow_mut() = next.clone();

        let mut effects = vec![Chain::from(
            Effect::new(effect_types::DISPATCH).with_payload(chain.to_value()),
        )];
        if !skip_effects && error.is_none() {
            tree.collect_effects(&next, &action, &mut effects);
        }

        self.inner
            .notify(&chain, &effects, &next, &prev, error.as_ref());

        Ok(DispatchResult { state: next, error })
    }

    /// Route `chain` to the sub-store at `path`. The remaining path, if any,
    /// travels along as a new DELEGATE node so nested stores keep routing.
    fn delegate(&self, chain: &ActionChain, path: &Value) -> StoreResult<DispatchResult> {
        let keys = path
            .as_list()
            .and_then(|items| {
                items
                    .iter()
                    .map(|key| key.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
            })
            .ok_or_else(|| StoreError::InvalidDelegation {
                path: path.to_string(),
            })?;

        let tree = self.current_tree();
        let (child, rest) = tree
            .find_store(&keys)
            .ok_or_else(|| StoreError::InvalidDelegation {
                path: keys.join(", "),
            })?;

        let stripped = chain.without_meta(meta_types::DELEGATE);
        let forwarded = if rest.is_empty() {
            stripped
        } else {
            stripped.with_meta(
                meta_types::DELEGATE,
                Some(Value::list(rest.iter().map(String::as_str))),
            )
        };

        debug!(
            store = %self.label(),
            child = %child.label(),
            path = ?keys,
            "Delegating action to sub-store"
        );

        let result = child.dispatch(forwarded)?;
        Ok(DispatchResult {
            state: self.current_state(),
            error: result.error,
        })
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

/// Watch `child` for dispatches the parent did not start and re-emit them to
/// the parent's effects subscribers, tagged with the child's position.
fn register_sub_store(parent: Weak<StoreInner>, path: &[String], child: &Store) -> Subscription {
    trace!(child = %child.label(), path = ?path, "Registering sub-store");

    let path = Value::list(path.iter().map(String::as_str));
    child.subscribe(Subscriber::new().on_effects(move |event| {
        // INHERIT means the parent started it and already notified its own subscribers
        if event.action.has_meta(meta_types::INHERIT).unwrap_or(true) {
            return;
        }
        let Some(parent) = parent.upgrade() else {
            return;
        };

        let action = event.action.with_meta(meta_types::DELEGATE, Some(path.clone()));
        parent.forward_effects(&action, event.effects, event.error);
    }))
}
