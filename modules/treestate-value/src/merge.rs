//! Deep merge with structural sharing.

use std::rc::Rc;

use crate::value::{Map, Value};

/// How map nodes are cloned and created when a tree is rebuilt.
///
/// Stores route their node options through this trait so callers can swap
/// in their own node bookkeeping without touching the merge or branch logic.
pub trait NodeStrategy {
    /// Shallow copy of an existing node. Child values keep their identity.
    fn clone_node(&self, node: &Map) -> Map;

    /// A fresh, empty node.
    fn create_node(&self) -> Map;
}

/// Shallow clone and empty map.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNodes;

impl NodeStrategy for DefaultNodes {
    fn clone_node(&self, node: &Map) -> Map {
        node.clone()
    }

    fn create_node(&self) -> Map {
        Map::new()
    }
}

/// Deep-merge `patch` into `prev`.
///
/// - a non-map patch replaces `prev` outright;
/// - a map patch over a non-map `prev` is returned as is (same identity);
/// - a map patch over a map merges key by key, cloning `prev` through the
///   strategy. Keys the patch does not mention keep their identity.
///
/// When no key changed identity the original `prev` is returned, so merging a
/// tree into itself (or into an identical-valued subtree of scalars) is a no-op.
pub fn merge(prev: &Value, patch: &Value, nodes: &dyn NodeStrategy) -> Value {
    if prev.same(patch) {
        return prev.clone();
    }

    let (Value::Map(prev_map), Value::Map(patch_map)) = (prev, patch) else {
        return patch.clone();
    };

    let mut changed = false;
    let mut next = nodes.clone_node(prev_map);

    for (key, patch_child) in patch_map.iter() {
        let prev_child = prev_map.get(key).cloned().unwrap_or_default();
        let merged = merge(&prev_child, patch_child, nodes);

        if !prev_map.contains_key(key) || !merged.same(&prev_child) {
            changed = true;
            next.insert(key.clone(), merged);
        }
    }

    if changed {
        Value::Map(Rc::new(next))
    } else {
        prev.clone()
    }
}
