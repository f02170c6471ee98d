//! Node options: how a store clones and creates map nodes.

use std::fmt;
use std::rc::Rc;

use treestate_value::{Map, NodeStrategy, Value};

use crate::error::{StoreError, StoreResult};

type CloneFn = dyn Fn(&Map) -> Map;
type CreateFn = dyn Fn() -> Map;

/// Callable accepted by `NodeOptions::from_entries`. `clone` is called with
/// `Some(node)`, `create` with `None`.
pub type NodeFn = Rc<dyn Fn(Option<&Map>) -> Map>;

/// Untyped option value.
#[derive(Clone)]
pub enum OptionValue {
    Function(NodeFn),
    Value(Value),
}

impl OptionValue {
    pub fn function(f: impl Fn(Option<&Map>) -> Map + 'static) -> Self {
        OptionValue::Function(Rc::new(f))
    }

    fn detailed_type(&self) -> &'static str {
        match self {
            OptionValue::Function(_) => "function",
            OptionValue::Value(value) => value.detailed_type(),
        }
    }
}

impl From<Value> for OptionValue {
    fn from(value: Value) -> Self {
        OptionValue::Value(value)
    }
}

/// Recognized node options. Unset options fall back to a shallow clone and
/// an empty map.
#[derive(Clone, Default)]
pub struct NodeOptions {
    clone: Option<Rc<CloneFn>>,
    create: Option<Rc<CreateFn>>,
}

impl NodeOptions {
    pub const KEYS: [&'static str; 2] = ["clone", "create"];

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clone(mut self, f: impl Fn(&Map) -> Map + 'static) -> Self {
        self.clone = Some(Rc::new(f));
        self
    }

    pub fn with_create(mut self, f: impl Fn() -> Map + 'static) -> Self {
        self.create = Some(Rc::new(f));
        self
    }

    /// Build options from untyped key/value pairs.
    ///
    /// Every key is checked against `KEYS` before any value is looked at.
    pub fn from_entries<K, I>(entries: I) -> StoreResult<Self>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, OptionValue)>,
    {
        let entries: Vec<(String, OptionValue)> =
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect();

        if let Some((key, _)) = entries.iter().find(|(k, _)| !Self::KEYS.contains(&k.as_str())) {
            return Err(StoreError::UnknownNodeOption { key: key.clone() });
        }

        let mut options = Self::default();
        for (key, value) in entries {
            let f = match value {
                OptionValue::Function(f) => f,
                other => {
                    return Err(StoreError::InvalidNodeOption {
                        detailed_type: other.detailed_type(),
                        key,
                    });
                }
            };

            match key.as_str() {
                "clone" => options = options.with_clone(move |node| f(Some(node))),
                _ => options = options.with_create(move || f(None)),
            }
        }

        Ok(options)
    }
}

impl NodeStrategy for NodeOptions {
    fn clone_node(&self, node: &Map) -> Map {
        match &self.clone {
            Some(clone) => clone(node),
            None => node.clone(),
        }
    }

    fn create_node(&self) -> Map {
        match &self.create {
            Some(create) => create(),
            None => Map::new(),
        }
    }
}

impl fmt::Debug for NodeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeOptions")
            .field("clone", &self.clone.is_some())
            .field("create", &self.create.is_some())
            .finish()
    }
}
