//! Actions and effects: the messages at the end of every meta chain.

use std::fmt;

use treestate_value::Value;

use crate::constants::action_types;

/// Anything that can terminate a meta chain.
pub trait Message: Clone + fmt::Debug + PartialEq {
    /// Name of the type field in the object form (`type` / `effectType`).
    const TYPE_FIELD: &'static str;

    fn kind(&self) -> &str;

    fn payload(&self) -> &Value;

    fn from_parts(kind: String, payload: Value) -> Self;

    /// Object form: `{ <TYPE_FIELD>: kind, payload? }`. A null payload is omitted.
    fn to_value(&self) -> Value {
        let mut entries = vec![(Self::TYPE_FIELD, Value::from(self.kind()))];
        if !self.payload().is_null() {
            entries.push(("payload", self.payload().clone()));
        }
        Value::map(entries)
    }
}

/// A typed message describing an intended state change.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub action_type: String,
    pub payload: Value,
}

impl Action {
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            payload: Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Full state replacement.
    pub fn hydrate(state: impl Into<Value>) -> Self {
        Self::new(action_types::HYDRATE).with_payload(state)
    }

    /// Deep merge into the current state.
    pub fn partial_hydrate(patch: impl Into<Value>) -> Self {
        Self::new(action_types::PARTIAL_HYDRATE).with_payload(patch)
    }

    pub fn is_hydrate(&self) -> bool {
        self.action_type == action_types::HYDRATE
            || self.action_type == action_types::PARTIAL_HYDRATE
    }
}

impl Message for Action {
    const TYPE_FIELD: &'static str = "type";

    fn kind(&self) -> &str {
        &self.action_type
    }

    fn payload(&self) -> &Value {
        &self.payload
    }

    fn from_parts(kind: String, payload: Value) -> Self {
        Self {
            action_type: kind,
            payload,
        }
    }
}

/// A typed side-effect notification, decoupled from state change.
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub effect_type: String,
    pub payload: Value,
}

impl Effect {
    pub fn new(effect_type: impl Into<String>) -> Self {
        Self {
            effect_type: effect_type.into(),
            payload: Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = payload.into();
        self
    }
}

impl Message for Effect {
    const TYPE_FIELD: &'static str = "effectType";

    fn kind(&self) -> &str {
        &self.effect_type
    }

    fn payload(&self) -> &Value {
        &self.payload
    }

    fn from_parts(kind: String, payload: Value) -> Self {
        Self {
            effect_type: kind,
            payload,
        }
    }
}
