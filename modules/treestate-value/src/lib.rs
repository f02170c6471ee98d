//! Reference-shared state values for treestate stores.
//!
//! A `Value` is a small JSON-like tree whose lists and maps live behind `Rc`,
//! so cloning a value is cheap and untouched subtrees keep their identity
//! across updates. Identity (`Value::same`) is what stores compare to decide
//! whether anything changed.
//!
//! Zero knowledge of stores, actions or reducers.

pub mod merge;
pub mod value;

pub use merge::{merge, DefaultNodes, NodeStrategy};
pub use value::{Map, Value};
