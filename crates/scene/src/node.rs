use foundation::handles::Handle;
use serde_json::Value;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NodeId(pub Handle);

impl NodeId {
    pub fn index(&self) -> u32 {
        self.0.index()
    }
}

/// Data bound to a node, plus its position in the bound sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Datum {
    pub value: Value,
    pub index: usize,
}

impl Datum {
    pub fn new(value: Value, index: usize) -> Self {
        Self { value, index }
    }
}

/// An event name with an optional namespace, written `type.namespace`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventName {
    pub kind: String,
    pub namespace: Option<String>,
}

impl EventName {
    pub fn parse(name: &str) -> Self {
        match name.split_once('.') {
            Some((kind, ns)) => Self {
                kind: kind.to_string(),
                namespace: Some(ns.to_string()),
            },
            None => Self {
                kind: name.to_string(),
                namespace: None,
            },
        }
    }

    /// `self` used as a removal pattern: an empty type matches every type.
    pub fn matches(&self, other: &EventName) -> bool {
        (self.kind.is_empty() || self.kind == other.kind) && self.namespace == other.namespace
    }
}
