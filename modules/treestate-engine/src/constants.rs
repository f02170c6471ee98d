//! Built-in type tags.
//!
//! The exact strings matter: stores, meta chains and effect subscribers
//! recognize each other's control messages by these values.

/// Action types handled by the store itself.
pub mod action_types {
    /// Replace the whole state with the payload.
    pub const HYDRATE: &str = "@@treestate/hydrate";
    /// Deep-merge the payload into the current state.
    pub const PARTIAL_HYDRATE: &str = "@@treestate/partialHydrate";
    /// Re-run every reducer after the hierarchy changes.
    pub const RECALCULATE: &str = "@@treestate/recalculate";
}

/// Meta types that steer the dispatch pipeline.
pub mod meta_types {
    /// Action was forwarded from a parent store.
    pub const INHERIT: &str = "@@treestate/inherit";
    /// Route the action to the sub-store at the path in `metaData`.
    pub const DELEGATE: &str = "@@treestate/delegate";
    pub const SKIP_REDUCERS: &str = "@@treestate/skipReducers";
    pub const SKIP_EFFECTS: &str = "@@treestate/skipEffects";
}

/// Effect types emitted by the store itself.
pub mod effect_types {
    /// Emitted once per dispatch; payload is the dispatched meta chain.
    pub const DISPATCH: &str = "@@treestate/dispatch";
}
