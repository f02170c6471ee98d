//! Meta chains.
//!
//! A meta chain is zero or more annotation nodes wrapped around an action or
//! effect. Nodes are immutable and reference counted: adding a node shares the
//! whole existing chain, and removing one copies only the nodes above it.

use std::rc::Rc;

use treestate_value::{Map, Value};

use crate::error::{StoreError, StoreResult};
use crate::types::{Action, Effect, Message};

/// One annotation layer.
#[derive(Debug, PartialEq)]
pub struct MetaNode<T> {
    pub meta_type: String,
    /// Absent when the caller supplied nothing (or something falsy).
    pub meta_data: Option<Value>,
    pub payload: Chain<T>,
}

/// Either another meta layer or the terminal message.
#[derive(Debug, PartialEq)]
pub enum Chain<T> {
    Meta(Rc<MetaNode<T>>),
    Message(Rc<T>),
}

pub type ActionChain = Chain<Action>;
pub type EffectChain = Chain<Effect>;

impl<T> Clone for Chain<T> {
    fn clone(&self) -> Self {
        match self {
            Chain::Meta(node) => Chain::Meta(Rc::clone(node)),
            Chain::Message(msg) => Chain::Message(Rc::clone(msg)),
        }
    }
}

impl<T> From<T> for Chain<T> {
    fn from(msg: T) -> Self {
        Chain::Message(Rc::new(msg))
    }
}

impl<T> Chain<T> {
    /// True when both handles point at the same head node.
    pub fn ptr_eq(&self, other: &Chain<T>) -> bool {
        match (self, other) {
            (Chain::Meta(a), Chain::Meta(b)) => Rc::ptr_eq(a, b),
            (Chain::Message(a), Chain::Message(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<T: Message> Chain<T> {
    pub fn with_meta(&self, meta_type: &str, meta_data: Option<Value>) -> Self {
        add_meta(self, meta_type, meta_data)
    }

    pub fn has_meta(&self, meta_type: &str) -> StoreResult<bool> {
        has_meta(self, meta_type)
    }

    pub fn meta_data(&self, meta_type: &str) -> StoreResult<Option<&Value>> {
        get_meta_data(self, meta_type)
    }

    pub fn without_meta(&self, meta_type: &str) -> Self {
        remove_meta(self, meta_type)
    }

    /// The terminal message, validated.
    pub fn message(&self) -> StoreResult<&T> {
        remove_all_meta(self)
    }

    /// Parse the object form produced by `to_value`.
    ///
    /// Top-level non-objects are not dispatchable at all; structural problems
    /// further down are reported as an invalid meta chain.
    pub fn from_value(value: &Value) -> StoreResult<Self> {
        match value.as_map() {
            Some(map) => parse_node(map),
            None => Err(StoreError::InvalidDispatchable {
                detailed_type: value.detailed_type(),
            }),
        }
    }

    /// Object form: `{ metaType, metaData?, payload }` down to the message.
    pub fn to_value(&self) -> Value {
        match self {
            Chain::Meta(node) => {
                let mut map = Map::new();
                map.insert("metaType".into(), Value::from(node.meta_type.as_str()));
                if let Some(data) = &node.meta_data {
                    map.insert("metaData".into(), data.clone());
                }
                map.insert("payload".into(), node.payload.to_value());
                Value::from(map)
            }
            Chain::Message(msg) => msg.to_value(),
        }
    }
}

fn parse_node<T: Message>(map: &Map) -> StoreResult<Chain<T>> {
    if let Some(meta_type) = map.get("metaType") {
        let meta_type = meta_type.as_str().ok_or(StoreError::InvalidTypeField {
            field: "metaType",
            detailed_type: meta_type.detailed_type(),
        })?;

        let payload = match map.get("payload") {
            Some(Value::Map(inner)) => parse_node(inner)?,
            _ => return Err(StoreError::InvalidMetaChain),
        };

        return Ok(Chain::Meta(Rc::new(MetaNode {
            meta_type: meta_type.to_string(),
            meta_data: map.get("metaData").filter(|d| d.is_truthy()).cloned(),
            payload,
        })));
    }

    match map.get(T::TYPE_FIELD) {
        Some(Value::String(kind)) if !kind.is_empty() => Ok(Chain::from(T::from_parts(
            kind.to_string(),
            map.get("payload").cloned().unwrap_or_default(),
        ))),
        Some(Value::String(_)) | None => Err(StoreError::InvalidMetaChain),
        Some(other) => Err(StoreError::InvalidTypeField {
            field: T::TYPE_FIELD,
            detailed_type: other.detailed_type(),
        }),
    }
}

fn checked<T: Message>(msg: &T) -> StoreResult<&T> {
    if msg.kind().is_empty() {
        return Err(StoreError::InvalidMetaChain);
    }
    Ok(msg)
}

/// Wrap `chain` in a new meta node. Falsy `meta_data` is dropped entirely.
pub fn add_meta<T>(chain: &Chain<T>, meta_type: &str, meta_data: Option<Value>) -> Chain<T> {
    Chain::Meta(Rc::new(MetaNode {
        meta_type: meta_type.to_string(),
        meta_data: meta_data.filter(Value::is_truthy),
        payload: chain.clone(),
    }))
}

/// `metaData` of the first node with `meta_type`, walking from the head.
pub fn get_meta_data<'a, T: Message>(
    chain: &'a Chain<T>,
    meta_type: &str,
) -> StoreResult<Option<&'a Value>> {
    let mut node = chain;
    loop {
        match node {
            Chain::Meta(meta) if meta.meta_type == meta_type => {
                return Ok(meta.meta_data.as_ref());
            }
            Chain::Meta(meta) => node = &meta.payload,
            Chain::Message(msg) => {
                checked(&**msg)?;
                return Ok(None);
            }
        }
    }
}

pub fn has_meta<T: Message>(chain: &Chain<T>, meta_type: &str) -> StoreResult<bool> {
    let mut node = chain;
    loop {
        match node {
            Chain::Meta(meta) if meta.meta_type == meta_type => return Ok(true),
            Chain::Meta(meta) => node = &meta.payload,
            Chain::Message(msg) => {
                checked(&**msg)?;
                return Ok(false);
            }
        }
    }
}

/// Strip every meta node and return the terminal message.
pub fn remove_all_meta<T: Message>(chain: &Chain<T>) -> StoreResult<&T> {
    let mut node = chain;
    loop {
        match node {
            Chain::Meta(meta) => node = &meta.payload,
            Chain::Message(msg) => return checked(&**msg),
        }
    }
}

/// Remove the first node with `meta_type`.
///
/// Nodes above the match are copied and relinked; the match's payload and
/// everything below it are shared with the input. The input is never touched.
///
/// The walk copies every node it passes before it knows whether a match
/// exists. When there is none, those copies are thrown away and the original
/// chain handle is returned, so `ptr_eq` holds between input and output.
/// Check `has_meta` first if that waste matters.
pub fn remove_meta<T>(chain: &Chain<T>, meta_type: &str) -> Chain<T> {
    let mut copies: Vec<(String, Option<Value>)> = Vec::new();
    let mut node = chain;

    while let Chain::Meta(meta) = node {
        if meta.meta_type == meta_type {
            return copies
                .into_iter()
                .rev()
                .fold(meta.payload.clone(), |payload, (meta_type, meta_data)| {
                    Chain::Meta(Rc::new(MetaNode {
                        meta_type,
                        meta_data,
                        payload,
                    }))
                });
        }

        copies.push((meta.meta_type.clone(), meta.meta_data.clone()));
        node = &meta.payload;
    }

    chain.clone()
}
