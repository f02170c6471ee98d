use treestate_value::Value;

use crate::hierarchy::HierarchyDescriptor;
use crate::options::NodeOptions;

/// Everything a store can be created with.
///
/// Applied in order: name, node options, hierarchy, then initial state. The
/// initial state is hydrated after the hierarchy is in place, so sub-stores
/// receive their slices of it.
#[derive(Debug, Default)]
pub struct StoreConfig {
    /// Shows up in logs instead of the numeric store id.
    pub name: Option<String>,
    pub initial_state: Option<Value>,
    pub hierarchy: Option<HierarchyDescriptor>,
    pub node_options: NodeOptions,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_initial_state(mut self, state: impl Into<Value>) -> Self {
        self.initial_state = Some(state.into());
        self
    }

    pub fn with_hierarchy(mut self, hierarchy: impl Into<HierarchyDescriptor>) -> Self {
        self.hierarchy = Some(hierarchy.into());
        self
    }

    pub fn with_node_options(mut self, options: NodeOptions) -> Self {
        self.node_options = options;
        self
    }
}
