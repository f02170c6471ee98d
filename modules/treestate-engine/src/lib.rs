//! Hierarchical state store.
//!
//! A store holds one immutable state tree. Its shape is described by a
//! hierarchy of reducers and nested stores; dispatching an action runs the
//! reducer layer, commits the result, runs the effects layer, then notifies
//! subscribers. Nested stores keep their own state, subscribers and
//! reentrancy guard while staying in sync with the slice their parent owns.
//!
//! Actions and effects travel inside meta chains: annotation nodes wrapped
//! around the message that steer routing (`DELEGATE`, `INHERIT`) and which
//! layers run (`SKIP_REDUCERS`, `SKIP_EFFECTS`).

pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod hierarchy;
pub mod meta;
pub mod observable;
pub mod options;
pub mod reducer;
pub mod store;
pub mod subscriber;
#[cfg(feature = "test-utils")]
pub mod testing;
pub mod types;

pub use config::StoreConfig;
pub use constants::{action_types, effect_types, meta_types};
pub use dispatch::{DispatchResult, Dispatchable};
pub use error::{StoreError, StoreResult};
pub use hierarchy::{classify, HierarchyDescriptor, HierarchyType};
pub use meta::{
    add_meta, get_meta_data, has_meta, remove_all_meta, remove_meta, ActionChain, Chain,
    EffectChain, MetaNode,
};
pub use observable::Observable;
pub use options::{NodeOptions, OptionValue};
pub use reducer::Reducer;
pub use store::{create_store, Store};
pub use subscriber::{EffectsEvent, Subscriber, Subscription};
pub use types::{Action, Effect, Message};

pub use treestate_value::{Map, Value};
