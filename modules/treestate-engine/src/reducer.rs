//! Reducers and their paired effects handlers.

use std::fmt;
use std::rc::Rc;

use treestate_value::Value;

use crate::meta::EffectChain;
use crate::types::Action;

type ReduceFn = dyn Fn(&Value, &Action) -> anyhow::Result<Value>;
type EffectsFn = dyn Fn(&Value, &Action, &[EffectChain]) -> Vec<EffectChain>;

/// Pure state update for one slice of the tree, plus an optional effects
/// handler run after the new state is committed.
///
/// Reducers see the action with all meta stripped. Returning the incoming
/// `state` unchanged (same identity) tells the store nothing happened.
#[derive(Clone)]
pub struct Reducer {
    reduce: Rc<ReduceFn>,
    effects: Option<Rc<EffectsFn>>,
}

impl Reducer {
    pub fn new<F>(reduce: F) -> Self
    where
        F: Fn(&Value, &Action) -> anyhow::Result<Value> + 'static,
    {
        Self {
            reduce: Rc::new(reduce),
            effects: None,
        }
    }

    /// Attach an effects handler. It receives the committed state slice, the
    /// action, and the effects queued so far in this dispatch.
    pub fn with_effects<F>(mut self, effects: F) -> Self
    where
        F: Fn(&Value, &Action, &[EffectChain]) -> Vec<EffectChain> + 'static,
    {
        self.effects = Some(Rc::new(effects));
        self
    }

    pub fn reduce(&self, state: &Value, action: &Action) -> anyhow::Result<Value> {
        (self.reduce)(state, action)
    }

    pub fn has_effects(&self) -> bool {
        self.effects.is_some()
    }

    pub fn effects(&self, state: &Value, action: &Action, queued: &[EffectChain]) -> Vec<EffectChain> {
        match &self.effects {
            Some(effects) => effects(state, action, queued),
            None => Vec::new(),
        }
    }
}

impl fmt::Debug for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reducer")
            .field("effects", &self.effects.is_some())
            .finish()
    }
}
