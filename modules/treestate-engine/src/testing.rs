//! Test helpers: a subscriber that records everything a store tells it.
//!
//! ```ignore
//! let recorder = Recorder::new();
//! recorder.attach(&store);
//! store.dispatch(Action::new("increment"))?;
//! assert_eq!(recorder.state_calls(), 1);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use treestate_value::Value;

use crate::meta::{ActionChain, EffectChain};
use crate::store::Store;
use crate::subscriber::{Subscriber, Subscription};

/// One effects notification, owned.
#[derive(Debug, Clone)]
pub struct RecordedEffects {
    pub action: ActionChain,
    pub effects: Vec<EffectChain>,
    pub new_state: Value,
    pub prev_state: Value,
    pub error: Option<String>,
}

impl RecordedEffects {
    /// `effectType` of every effect, in emission order.
    pub fn effect_types(&self) -> Vec<String> {
        self.effects
            .iter()
            .filter_map(|chain| chain.message().ok())
            .map(|effect| effect.effect_type.clone())
            .collect()
    }
}

#[derive(Debug, Default)]
struct Recorded {
    states: Vec<(Value, Value)>,
    errors: Vec<String>,
    effects: Vec<RecordedEffects>,
}

/// Records state, error and effects notifications. Clones share one log.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    log: Rc<RefCell<Recorded>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A subscriber writing into this recorder.
    pub fn subscriber(&self) -> Subscriber {
        let states = Rc::clone(&self.log);
        let errors = Rc::clone(&self.log);
        let effects = Rc::clone(&self.log);

        Subscriber::new()
            .on_next(move |new_state, prev_state| {
                states
                    .borrow_mut()
                    .states
                    .push((new_state.clone(), prev_state.clone()));
            })
            .on_error(move |err| errors.borrow_mut().errors.push(err.to_string()))
            .on_effects(move |event| {
                effects.borrow_mut().effects.push(RecordedEffects {
                    action: event.action.clone(),
                    effects: event.effects.to_vec(),
                    new_state: event.new_state.clone(),
                    prev_state: event.prev_state.clone(),
                    error: event.error.map(|e| e.to_string()),
                });
            })
    }

    pub fn attach(&self, store: &Store) -> Subscription {
        store.subscribe(self.subscriber())
    }

    /// `(new_state, prev_state)` pairs.
    pub fn states(&self) -> Vec<(Value, Value)> {
        self.log.borrow().states.clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.log.borrow().errors.clone()
    }

    pub fn effects(&self) -> Vec<RecordedEffects> {
        self.log.borrow().effects.clone()
    }

    pub fn state_calls(&self) -> usize {
        self.log.borrow().states.len()
    }

    pub fn effect_calls(&self) -> usize {
        self.log.borrow().effects.len()
    }

    pub fn clear(&self) {
        *self.log.borrow_mut() = Recorded::default();
    }
}
