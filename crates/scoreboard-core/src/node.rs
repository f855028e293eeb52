//! Reference-counted JSON tree used to mirror server state.
//!
//! [`StateNode`] is a JSON value whose containers are held behind [`Arc`], so
//! cloning a node is cheap and two trees can share unchanged branches. This
//! is what lets patch application produce a new root while every untouched
//! subtree keeps its identity (see [`StateNode::same_ref`]).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};

/// Map type used for object nodes
pub type NodeMap = BTreeMap<String, StateNode>;

/// A JSON value with shared, copy-on-write containers
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StateNode {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(Arc<str>),
    Array(Arc<Vec<StateNode>>),
    Object(Arc<NodeMap>),
}

impl StateNode {
    /// A new, empty object node
    pub fn empty_object() -> Self {
        StateNode::Object(Arc::new(NodeMap::new()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, StateNode::Null)
    }

    /// `true` for objects and arrays
    pub fn is_container(&self) -> bool {
        matches!(self, StateNode::Object(_) | StateNode::Array(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StateNode::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StateNode::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            StateNode::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StateNode::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StateNode::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&NodeMap> {
        match self {
            StateNode::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[StateNode]> {
        match self {
            StateNode::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a direct child: an object key, or a decimal index into an array
    pub fn get(&self, key: &str) -> Option<&StateNode> {
        match self {
            StateNode::Object(map) => map.get(key),
            StateNode::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Look up a descendant by dot-separated path (`"clock.timeRemainingMillis"`)
    pub fn get_path(&self, path: &str) -> Option<&StateNode> {
        path.split('.').try_fold(self, |node, segment| node.get(segment))
    }

    /// Identity comparison for containers.
    ///
    /// Returns `true` only when both nodes are the same kind of container and
    /// point at the same allocation. Scalars have no identity and always
    /// compare `false`.
    pub fn same_ref(&self, other: &StateNode) -> bool {
        match (self, other) {
            (StateNode::Object(a), StateNode::Object(b)) => Arc::ptr_eq(a, b),
            (StateNode::Array(a), StateNode::Array(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Convert to an owned `serde_json::Value`
    pub fn to_value(&self) -> Value {
        Value::from(self)
    }
}

impl From<Value> for StateNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => StateNode::Null,
            Value::Bool(b) => StateNode::Bool(b),
            Value::Number(n) => StateNode::Number(n),
            Value::String(s) => StateNode::String(Arc::from(s)),
            Value::Array(items) => {
                StateNode::Array(Arc::new(items.into_iter().map(StateNode::from).collect()))
            }
            Value::Object(map) => StateNode::Object(Arc::new(
                map.into_iter()
                    .map(|(k, v)| (k, StateNode::from(v)))
                    .collect(),
            )),
        }
    }
}

impl From<&StateNode> for Value {
    fn from(node: &StateNode) -> Self {
        match node {
            StateNode::Null => Value::Null,
            StateNode::Bool(b) => Value::Bool(*b),
            StateNode::Number(n) => Value::Number(n.clone()),
            StateNode::String(s) => Value::String(s.to_string()),
            StateNode::Array(items) => Value::Array(items.iter().map(Value::from).collect()),
            StateNode::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for StateNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StateNode::Null => serializer.serialize_unit(),
            StateNode::Bool(b) => serializer.serialize_bool(*b),
            StateNode::Number(n) => n.serialize(serializer),
            StateNode::String(s) => serializer.serialize_str(s),
            StateNode::Array(items) => serializer.collect_seq(items.iter()),
            StateNode::Object(map) => serializer.collect_map(map.iter()),
        }
    }
}

impl<'de> Deserialize<'de> for StateNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(StateNode::from)
    }
}

impl fmt::Display for StateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip_preserves_shape() {
        let value = json!({
            "clock": { "timeRemainingMillis": 1200000, "isRunning": false },
            "home": { "goals": [], "shots": 3 },
            "gameId": null,
        });
        let node = StateNode::from(value.clone());
        assert_eq!(node.to_value(), value);
    }

    #[test]
    fn test_get_path_walks_objects_and_arrays() {
        let node = StateNode::from(json!({
            "home": { "goals": [ { "scorerNumber": 9 }, { "scorerNumber": 17 } ] }
        }));
        assert_eq!(
            node.get_path("home.goals.1.scorerNumber")
                .and_then(StateNode::as_i64),
            Some(17)
        );
        assert!(node.get_path("home.goals.5").is_none());
        assert!(node.get_path("away.goals").is_none());
    }

    #[test]
    fn test_clone_shares_containers() {
        let node = StateNode::from(json!({ "clock": { "t": 1 } }));
        let copy = node.clone();
        assert!(node.same_ref(&copy));
        assert!(node
            .get("clock")
            .unwrap()
            .same_ref(copy.get("clock").unwrap()));
    }

    #[test]
    fn test_same_ref_is_false_for_equal_but_distinct_trees() {
        let a = StateNode::from(json!({ "x": 1 }));
        let b = StateNode::from(json!({ "x": 1 }));
        assert_eq!(a, b);
        assert!(!a.same_ref(&b));
        assert!(!StateNode::Null.same_ref(&StateNode::Null));
    }

    #[test]
    fn test_serialize_matches_serde_json() {
        let value = json!({ "a": [1, "two", true, null], "b": { "c": 2.5 } });
        let node = StateNode::from(value.clone());
        let text = serde_json::to_string(&node).unwrap();
        let reparsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(reparsed, value);
    }
}
