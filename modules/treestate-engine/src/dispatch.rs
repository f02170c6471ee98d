use std::fmt;

use treestate_value::Value;

use crate::error::StoreResult;
use crate::meta::{ActionChain, Chain};
use crate::types::Action;

type InducerFn = dyn FnOnce(&Value) -> Value;

/// Anything `Store::dispatch` accepts.
pub enum Dispatchable {
    /// A plain action, optionally wrapped in meta nodes.
    Action(ActionChain),
    /// Computes the next state from the current one. Its result is committed
    /// the same way `hydrate` would.
    Inducer(Box<InducerFn>),
}

impl Dispatchable {
    pub fn inducer(f: impl FnOnce(&Value) -> Value + 'static) -> Self {
        Dispatchable::Inducer(Box::new(f))
    }

    /// Parse an untyped dispatchable (an action or meta chain in object form).
    pub fn from_value(value: &Value) -> StoreResult<Self> {
        Ok(Dispatchable::Action(Chain::from_value(value)?))
    }
}

impl From<ActionChain> for Dispatchable {
    fn from(chain: ActionChain) -> Self {
        Dispatchable::Action(chain)
    }
}

impl From<&ActionChain> for Dispatchable {
    fn from(chain: &ActionChain) -> Self {
        Dispatchable::Action(chain.clone())
    }
}

impl From<Action> for Dispatchable {
    fn from(action: Action) -> Self {
        Dispatchable::Action(Chain::from(action))
    }
}

impl fmt::Debug for Dispatchable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dispatchable::Action(chain) => f.debug_tuple("Action").field(chain).finish(),
            Dispatchable::Inducer(_) => f.write_str("Inducer"),
        }
    }
}

/// Outcome of a dispatch.
///
/// A failing reducer does not make `dispatch` return `Err`; the store keeps
/// its previous state and the failure is reported here.
#[derive(Debug)]
pub struct DispatchResult {
    pub state: Value,
    pub error: Option<anyhow::Error>,
}

impl DispatchResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
