//! Store observers: state subscribers, error subscribers, effects subscribers.

use std::fmt;
use std::rc::Weak;

use treestate_value::Value;

use crate::meta::{ActionChain, EffectChain};
use crate::store::StoreInner;

type NextFn = dyn Fn(&Value, &Value);
type ErrorFn = dyn Fn(&anyhow::Error);
type EffectsFn = dyn Fn(&EffectsEvent<'_>);

/// What effects subscribers see once per dispatch.
#[derive(Debug, Clone, Copy)]
pub struct EffectsEvent<'a> {
    /// The dispatched chain, meta nodes included.
    pub action: &'a ActionChain,
    /// `DISPATCH` first, then whatever the effects layer produced.
    pub effects: &'a [EffectChain],
    pub new_state: &'a Value,
    pub prev_state: &'a Value,
    pub error: Option<&'a anyhow::Error>,
}

/// A set of optional handlers. Any `Fn(&Value, &Value)` converts into a
/// subscriber that only listens for state changes.
#[derive(Default)]
pub struct Subscriber {
    next: Option<Box<NextFn>>,
    error: Option<Box<ErrorFn>>,
    effects: Option<Box<EffectsFn>>,
}

impl Subscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with `(new_state, prev_state)` whenever the state identity changes.
    pub fn on_next(mut self, f: impl Fn(&Value, &Value) + 'static) -> Self {
        self.next = Some(Box::new(f));
        self
    }

    /// Called when a dispatch's reducer layer fails.
    pub fn on_error(mut self, f: impl Fn(&anyhow::Error) + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    /// Called once per dispatch, changed state or not.
    pub fn on_effects(mut self, f: impl Fn(&EffectsEvent<'_>) + 'static) -> Self {
        self.effects = Some(Box::new(f));
        self
    }

    pub(crate) fn notify_next(&self, new_state: &Value, prev_state: &Value) {
        if let Some(next) = &self.next {
            next(new_state, prev_state);
        }
    }

    pub(crate) fn notify_error(&self, error: &anyhow::Error) {
        if let Some(handler) = &self.error {
            handler(error);
        }
    }

    pub(crate) fn notify_effects(&self, event: &EffectsEvent<'_>) {
        if let Some(effects) = &self.effects {
            effects(event);
        }
    }
}

impl<F> From<F> for Subscriber
where
    F: Fn(&Value, &Value) + 'static,
{
    fn from(next: F) -> Self {
        Subscriber::new().on_next(next)
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("next", &self.next.is_some())
            .field("error", &self.error.is_some())
            .field("effects", &self.effects.is_some())
            .finish()
    }
}

/// Handle returned by `Store::subscribe`.
///
/// Dropping it does not unsubscribe. It holds the store weakly, so a
/// forgotten subscription never keeps a store alive.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub(crate) store: Weak<StoreInner>,
    pub(crate) id: u64,
}

impl Subscription {
    /// Stop receiving notifications. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(store) = self.store.upgrade() {
            store.remove_subscriber(self.id);
        }
    }
}
