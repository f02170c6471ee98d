//! Typed errors for store operations.

use thiserror::Error;

/// Errors raised synchronously by the store API.
///
/// Validation and reentrancy errors are returned to the caller. Errors from
/// user reducers travel inside `DispatchResult::error` instead, and only show
/// up here as `Dispatch` when a chainable call (`hydrate`, `use_hierarchy`)
/// has nowhere else to put them.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Dispatched value is neither an action object nor an inducer
    #[error("invalid dispatchable: expected an action object or an inducer, received {detailed_type}")]
    InvalidDispatchable { detailed_type: &'static str },

    /// A `type`, `metaType` or `effectType` field is not a string
    #[error("invalid {field} field: expected a string, received {detailed_type}")]
    InvalidTypeField {
        field: &'static str,
        detailed_type: &'static str,
    },

    /// The chain does not end in an action/effect with a non-empty type
    #[error(
        "Invalid meta chain. The last node in the chain must be either a valid action object \
         with a non-empty \"type\" property or an effect with a non-empty \"effectType\" property"
    )]
    InvalidMetaChain,

    /// Hierarchy descriptor is not a reducer, store, branch map or null
    #[error("invalid hierarchy descriptor: expected a reducer, store, plain object or null, received {detailed_type}")]
    InvalidHierarchyDescriptor { detailed_type: &'static str },

    /// DELEGATE path does not lead to a sub-store
    #[error("invalid delegation path [{path}]: no sub-store found at this location")]
    InvalidDelegation { path: String },

    /// Node option key outside the recognized set
    #[error("invalid node option \"{key}\": valid options are \"clone\" and \"create\"")]
    UnknownNodeOption { key: String },

    /// Node option value that is not a function
    #[error("invalid node option \"{key}\": expected a function, received {detailed_type}")]
    InvalidNodeOption {
        key: String,
        detailed_type: &'static str,
    },

    /// Store API called while this store's reducer layer is running
    #[error("store.{method}() cannot be called within a reducer")]
    Reentrancy { method: &'static str },

    /// Reducer layer failed during a chainable call
    #[error(transparent)]
    Dispatch(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_reentrancy(&self) -> bool {
        matches!(self, StoreError::Reentrancy { .. })
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
