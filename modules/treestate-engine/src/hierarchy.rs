//! Hierarchy descriptors and the diff tree they compile into.
//!
//! A descriptor is what users hand to `Store::use_hierarchy`: a reducer, a
//! sub-store, a map of nested descriptors, or nothing. Compiling it yields a
//! `DiffNode` tree that the store walks on every dispatch:
//!
//! ```text
//! descriptor ──compile──► DiffNode tree
//!                             │
//!                             ├─► reduce()           reducer layer
//!                             ├─► propagate_hydrate() hydrate/setState path
//!                             └─► collect_effects()  effects layer
//! ```
//!
//! Sub-stores are registered with the owning store while compiling; the
//! returned `Subscription` is the teardown handle kept on the node.

use indexmap::IndexMap;
use tracing::trace;
use treestate_value::{NodeStrategy, Value};

use crate::constants::meta_types;
use crate::error::{StoreError, StoreResult};
use crate::meta::{add_meta, Chain, EffectChain};
use crate::reducer::Reducer;
use crate::store::Store;
use crate::subscriber::Subscription;
use crate::types::Action;

/// Kind of a descriptor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyType {
    Branch,
    Null,
    Reducer,
    Store,
}

/// User-authored hierarchy. Consumed once by `compile`.
#[derive(Debug, Default)]
pub enum HierarchyDescriptor {
    Branch(IndexMap<String, HierarchyDescriptor>),
    Reducer(Reducer),
    Store(Store),
    #[default]
    Null,
}

impl HierarchyDescriptor {
    pub fn branch<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, HierarchyDescriptor)>,
    {
        HierarchyDescriptor::Branch(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn hierarchy_type(&self) -> HierarchyType {
        classify(self)
    }
}

impl From<Reducer> for HierarchyDescriptor {
    fn from(reducer: Reducer) -> Self {
        HierarchyDescriptor::Reducer(reducer)
    }
}

impl From<Store> for HierarchyDescriptor {
    fn from(store: Store) -> Self {
        HierarchyDescriptor::Store(store)
    }
}

impl From<&Store> for HierarchyDescriptor {
    fn from(store: &Store) -> Self {
        HierarchyDescriptor::Store(store.clone())
    }
}

impl From<IndexMap<String, HierarchyDescriptor>> for HierarchyDescriptor {
    fn from(children: IndexMap<String, HierarchyDescriptor>) -> Self {
        HierarchyDescriptor::Branch(children)
    }
}

impl<T: Into<HierarchyDescriptor>> From<Option<T>> for HierarchyDescriptor {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or_default()
    }
}

/// Untyped descriptors: `null` and (nested) plain objects of `null`s.
/// Anything else has no reducer or store to offer.
impl TryFrom<Value> for HierarchyDescriptor {
    type Error = StoreError;

    fn try_from(value: Value) -> StoreResult<Self> {
        match value {
            Value::Null => Ok(HierarchyDescriptor::Null),
            Value::Map(map) => map
                .iter()
                .map(|(key, child)| Ok((key.clone(), HierarchyDescriptor::try_from(child.clone())?)))
                .collect::<StoreResult<IndexMap<_, _>>>()
                .map(HierarchyDescriptor::Branch),
            other => Err(StoreError::InvalidHierarchyDescriptor {
                detailed_type: other.detailed_type(),
            }),
        }
    }
}

pub fn classify(descriptor: &HierarchyDescriptor) -> HierarchyType {
    match descriptor {
        HierarchyDescriptor::Branch(_) => HierarchyType::Branch,
        HierarchyDescriptor::Reducer(_) => HierarchyType::Reducer,
        HierarchyDescriptor::Store(_) => HierarchyType::Store,
        HierarchyDescriptor::Null => HierarchyType::Null,
    }
}

/// Callback the owning store supplies to wire up a sub-store found at `path`.
pub type RegisterSubStore<'a> = dyn FnMut(&[String], &Store) -> Subscription + 'a;

/// Compiled hierarchy node.
#[derive(Debug)]
pub enum DiffNode {
    Branch(IndexMap<String, DiffNode>),
    Reducer(Reducer),
    Store {
        store: Store,
        reducer: Reducer,
        teardown: Subscription,
    },
    Null,
}

impl Default for DiffNode {
    fn default() -> Self {
        DiffNode::Null
    }
}

/// Turn a descriptor into a diff tree, registering every sub-store on the way.
pub fn compile(
    descriptor: HierarchyDescriptor,
    register: &mut RegisterSubStore<'_>,
    path: &[String],
) -> DiffNode {
    match descriptor {
        HierarchyDescriptor::Branch(entries) => DiffNode::Branch(
            entries
                .into_iter()
                .map(|(key, child)| {
                    let mut child_path = path.to_vec();
                    child_path.push(key.clone());
                    let node = compile(child, register, &child_path);
                    (key, node)
                })
                .collect(),
        ),
        HierarchyDescriptor::Null => DiffNode::Null,
        HierarchyDescriptor::Reducer(reducer) => DiffNode::Reducer(reducer),
        HierarchyDescriptor::Store(store) => {
            trace!(store = %store.label(), path = ?path, "Compiling sub-store node");
            DiffNode::Store {
                teardown: register(path, &store),
                reducer: wrap_store_in_reducer(&store),
                store,
            }
        }
    }
}

/// A reducer that forwards every action into `store`.
///
/// Hydrate and partial-hydrate actions are rewritten into a full hydrate of
/// the slice this reducer owns, so the child ends up holding exactly what the
/// parent computed for that position. Everything is tagged INHERIT so the
/// parent can recognize (and not re-emit) the child's notifications. Child
/// errors surface as this reducer's error.
pub fn wrap_store_in_reducer(store: &Store) -> Reducer {
    let store = store.clone();

    Reducer::new(move |state, action| {
        let action = if action.is_hydrate() {
            Action::hydrate(state.clone())
        } else {
            action.clone()
        };

        let inherited = add_meta(&Chain::from(action), meta_types::INHERIT, None);
        let result = store.dispatch(inherited)?;

        match result.error {
            Some(err) => Err(err),
            None => Ok(result.state),
        }
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Pass {
    /// Every reducer runs.
    Reduce,
    /// Only sub-stores run; plain reducers keep their slice.
    Hydrate,
}

impl DiffNode {
    pub fn hierarchy_type(&self) -> HierarchyType {
        match self {
            DiffNode::Branch(_) => HierarchyType::Branch,
            DiffNode::Reducer(_) => HierarchyType::Reducer,
            DiffNode::Store { .. } => HierarchyType::Store,
            DiffNode::Null => HierarchyType::Null,
        }
    }

    /// Reducer layer: compute the next state for this subtree.
    pub fn reduce(
        &self,
        state: &Value,
        action: &Action,
        nodes: &dyn NodeStrategy,
    ) -> anyhow::Result<Value> {
        self.walk(state, action, nodes, Pass::Reduce)
    }

    /// Push an already-computed state down into every sub-store.
    pub fn propagate_hydrate(
        &self,
        state: &Value,
        action: &Action,
        nodes: &dyn NodeStrategy,
    ) -> anyhow::Result<Value> {
        self.walk(state, action, nodes, Pass::Hydrate)
    }

    fn walk(
        &self,
        state: &Value,
        action: &Action,
        nodes: &dyn NodeStrategy,
        pass: Pass,
    ) -> anyhow::Result<Value> {
        match self {
            DiffNode::Branch(children) => {
                let mut changes = Vec::new();
                for (key, child) in children {
                    let prev = state.get(key);
                    let next = child.walk(&prev, action, nodes, pass)?;
                    if !next.same(&prev) {
                        changes.push((key, next));
                    }
                }

                if changes.is_empty() {
                    return Ok(state.clone());
                }

                let mut node = match state.as_map() {
                    Some(map) => nodes.clone_node(map),
                    None => nodes.create_node(),
                };
                for (key, next) in changes {
                    node.insert(key.clone(), next);
                }
                Ok(Value::from(node))
            }
            DiffNode::Reducer(reducer) => match pass {
                Pass::Reduce => reducer.reduce(state, action),
                Pass::Hydrate => Ok(state.clone()),
            },
            DiffNode::Store { reducer, .. } => reducer.reduce(state, action),
            DiffNode::Null => Ok(state.clone()),
        }
    }

    /// Effects layer: run every paired effects handler against the committed
    /// state. Sub-stores already ran their own effects layer while reducing.
    pub fn collect_effects(&self, state: &Value, action: &Action, effects: &mut Vec<EffectChain>) {
        match self {
            DiffNode::Branch(children) => {
                for (key, child) in children {
                    child.collect_effects(&state.get(key), action, effects);
                }
            }
            DiffNode::Reducer(reducer) if reducer.has_effects() => {
                let emitted = reducer.effects(state, action, effects);
                effects.extend(emitted);
            }
            DiffNode::Reducer(_) | DiffNode::Store { .. } | DiffNode::Null => {}
        }
    }

    /// First sub-store along `path`, plus the keys left over after it.
    pub fn find_store<'a, 'p>(&'a self, path: &'p [String]) -> Option<(&'a Store, &'p [String])> {
        let mut node = self;
        let mut rest = path;
        loop {
            match node {
                DiffNode::Store { store, .. } => return Some((store, rest)),
                DiffNode::Branch(children) => {
                    let (key, tail) = rest.split_first()?;
                    node = children.get(key)?;
                    rest = tail;
                }
                DiffNode::Reducer(_) | DiffNode::Null => return None,
            }
        }
    }

    /// Release every sub-store registration in this subtree.
    pub fn teardown(&self) {
        match self {
            DiffNode::Branch(children) => children.values().for_each(DiffNode::teardown),
            DiffNode::Store {
                store, teardown, ..
            } => {
                trace!(store = %store.label(), "Tearing down sub-store registration");
                teardown.unsubscribe();
            }
            DiffNode::Reducer(_) | DiffNode::Null => {}
        }
    }
}
