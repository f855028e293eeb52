//! Dot-path patches and their structural-sharing application

use std::fmt;
use std::sync::Arc;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::node::StateNode;
use crate::snapshot::Snapshot;

/// Largest gap an array index may leave past the current end of an array.
/// Anything further is treated as a bad entry rather than padded.
const MAX_INDEX_GAP: usize = 1024;

/// Ordered mapping from dot-separated paths to replacement values.
///
/// Entries keep the order they arrived in on the wire and are applied in
/// that order, so a later entry touching the same path wins.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Patch {
    entries: Vec<(String, StateNode)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn set(mut self, path: impl Into<String>, value: impl Into<StateNode>) -> Self {
        self.insert(path, value);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, value: impl Into<StateNode>) {
        self.entries.push((path.into(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StateNode)> {
        self.entries.iter().map(|(path, value)| (path.as_str(), value))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(path, _)| path.as_str())
    }
}

impl Serialize for Patch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(k, v)| (k, v)))
    }
}

struct PatchVisitor;

impl<'de> Visitor<'de> for PatchVisitor {
    type Value = Patch;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object mapping dot paths to values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Patch, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((path, value)) = access.next_entry::<String, StateNode>()? {
            entries.push((path, value));
        }
        Ok(Patch { entries })
    }
}

impl<'de> Deserialize<'de> for Patch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(PatchVisitor)
    }
}

// ─────────────────────────────────────────────────────────────────
// Application
// ─────────────────────────────────────────────────────────────────

/// Apply `patch` to `snapshot`, returning a new snapshot.
///
/// The input is never modified. The returned root is always a fresh
/// allocation; containers along each patched path are shallow-copied and
/// every other branch is shared with the input. Entries that cannot be
/// applied (a non-index segment against an array) are skipped with a
/// warning.
pub fn apply_patch(snapshot: &Snapshot, patch: &Patch) -> Snapshot {
    let mut root = match snapshot.root() {
        StateNode::Object(map) => StateNode::Object(Arc::new((**map).clone())),
        StateNode::Array(items) => StateNode::Array(Arc::new((**items).clone())),
        _ => StateNode::empty_object(),
    };

    for (path, value) in patch.iter() {
        if let Err(reason) = assign_path(&mut root, path, value.clone()) {
            tracing::warn!("Skipping patch entry '{}': {}", path, reason);
        }
    }

    Snapshot::new(root)
}

fn assign_path(root: &mut StateNode, path: &str, value: StateNode) -> Result<(), String> {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return Ok(());
    };

    let mut current = root;
    for segment in parents {
        current = descend(current, segment)?;
    }
    set_child(current, last, value)
}

/// Step into `segment`, making the child a writable container
fn descend<'a>(node: &'a mut StateNode, segment: &str) -> Result<&'a mut StateNode, String> {
    let child = match node {
        StateNode::Object(map) => Arc::make_mut(map)
            .entry(segment.to_string())
            .or_insert(StateNode::Null),
        StateNode::Array(items) => {
            let index = parse_index(segment, items.len())?;
            let items = Arc::make_mut(items);
            if index >= items.len() {
                items.resize(index + 1, StateNode::Null);
            }
            &mut items[index]
        }
        _ => return Err(format!("'{}' has no container parent", segment)),
    };

    if !child.is_container() {
        *child = StateNode::empty_object();
    }
    Ok(child)
}

fn set_child(node: &mut StateNode, segment: &str, value: StateNode) -> Result<(), String> {
    match node {
        StateNode::Object(map) => {
            Arc::make_mut(map).insert(segment.to_string(), value);
            Ok(())
        }
        StateNode::Array(items) => {
            let index = parse_index(segment, items.len())?;
            let items = Arc::make_mut(items);
            if index >= items.len() {
                items.resize(index + 1, StateNode::Null);
            }
            items[index] = value;
            Ok(())
        }
        _ => Err(format!("'{}' has no container parent", segment)),
    }
}

fn parse_index(segment: &str, len: usize) -> Result<usize, String> {
    let index = segment
        .parse::<usize>()
        .map_err(|_| format!("'{}' is not an array index", segment))?;
    if index > len + MAX_INDEX_GAP {
        return Err(format!("index {} is too far past the end ({})", index, len));
    }
    Ok(index)
}
