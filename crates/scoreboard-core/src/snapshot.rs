//! Immutable snapshot of server-authoritative state

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::Result;
use crate::node::StateNode;
use crate::patch::{apply_patch, Patch};

/// The full mirrored state tree.
///
/// A snapshot is never mutated after construction. Cloning shares the root,
/// so [`Snapshot::ptr_eq`] tells "same update" apart from "new update" even
/// when the contents happen to be equal.
#[derive(Debug, Clone)]
pub struct Snapshot {
    root: Arc<StateNode>,
}

impl Snapshot {
    pub fn new(root: StateNode) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    pub fn from_value(value: Value) -> Self {
        Self::new(StateNode::from(value))
    }

    pub fn root(&self) -> &StateNode {
        &self.root
    }

    /// Look up a node by dot-separated path
    pub fn get(&self, path: &str) -> Option<&StateNode> {
        self.root.get_path(path)
    }

    /// `true` when both handles refer to the same snapshot instance
    pub fn ptr_eq(a: &Snapshot, b: &Snapshot) -> bool {
        Arc::ptr_eq(&a.root, &b.root)
    }

    /// Produce the successor snapshot for `patch`; `self` is left untouched
    pub fn apply(&self, patch: &Patch) -> Snapshot {
        apply_patch(self, patch)
    }

    pub fn to_value(&self) -> Value {
        self.root.to_value()
    }

    /// Decode the tree into a typed view
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_value())?)
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        Snapshot::ptr_eq(self, other) || self.root == other.root
    }
}

impl From<Value> for Snapshot {
    fn from(value: Value) -> Self {
        Snapshot::from_value(value)
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.root.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        StateNode::deserialize(deserializer).map(Snapshot::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clone_is_same_instance() {
        let snap = Snapshot::from_value(json!({ "period": 1 }));
        let copy = snap.clone();
        assert!(Snapshot::ptr_eq(&snap, &copy));
    }

    #[test]
    fn test_equal_contents_are_distinct_instances() {
        let a = Snapshot::from_value(json!({ "period": 1 }));
        let b = Snapshot::from_value(json!({ "period": 1 }));
        assert_eq!(a, b);
        assert!(!Snapshot::ptr_eq(&a, &b));
    }

    #[test]
    fn test_decode_typed_view() {
        #[derive(Deserialize)]
        struct Partial {
            period: u32,
        }
        let snap = Snapshot::from_value(json!({ "period": 3, "extra": true }));
        let partial: Partial = snap.decode().unwrap();
        assert_eq!(partial.period, 3);
    }

    #[test]
    fn test_deserialize_from_wire() {
        let snap: Snapshot = serde_json::from_str(r#"{"clock":{"isRunning":true}}"#).unwrap();
        assert_eq!(
            snap.get("clock.isRunning").and_then(StateNode::as_bool),
            Some(true)
        );
    }
}
