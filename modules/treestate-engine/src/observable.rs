use treestate_value::Value;

use crate::store::Store;
use crate::subscriber::{Subscriber, Subscription};

/// Minimal push interface over a stream of states.
///
/// Only states produced after subscribing are emitted; the current state is
/// not replayed.
pub trait Observable {
    fn subscribe_next(&self, on_next: Box<dyn Fn(&Value)>) -> Subscription;
}

impl Observable for Store {
    fn subscribe_next(&self, on_next: Box<dyn Fn(&Value)>) -> Subscription {
        self.subscribe(Subscriber::new().on_next(move |new_state, _| on_next(new_state)))
    }
}
