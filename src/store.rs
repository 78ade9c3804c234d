//! # Store Nodes
//!
//! A [`StoreNode`] is the reactive runtime instance of an [`Entity`]: every field
//! becomes an observable cell, every object entry a nested store node and every
//! list entry an observable sequence of store nodes ([`StoreListNode`]).
//!
//! Store nodes are the source of truth. Application code mutates them through
//! [`StoreNode::set`], [`StoreNode::replace`] and [`StoreNode::clear`] (or by
//! assigning field cells directly); form nodes built from them follow.
//!
//! `null` is the "no value" marker: reading an unset field returns `Value::Null`.
//!
//! ```rust
//! use focus4::{Domain, Entity, SchemaKind, StoreNode, field};
//! use serde_json::json;
//!
//! let text = Domain::builder(SchemaKind::String).build();
//! let entity = Entity::builder("Operation")
//!     .entry("code", field(&text, |f| f))
//!     .entry("libelle", field(&text, |f| f.optional()))
//!     .build();
//!
//! let node = StoreNode::new(&entity);
//! node.set(&json!({"code": "ABC"}));
//! assert_eq!(node.field("code").unwrap().value(), json!("ABC"));
//! assert_eq!(node.to_value(), json!({"code": "ABC"}));
//! node.clear();
//! assert!(node.field("code").unwrap().value().is_null());
//! ```

use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::trace;

use crate::entity::{Entity, Entry, FieldEntry};
use crate::observable::{Observable, action};

/////////////////////////////////////////////// Fields ////////////////////////////////////////////////

struct StoreFieldData {
    field: Arc<FieldEntry>,
    value: Observable<Value>,
}

/// An observable field value together with its metadata.
#[derive(Clone)]
pub struct StoreField(Rc<StoreFieldData>);

impl std::fmt::Debug for StoreField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreField")
            .field("name", &self.0.field.name)
            .field("value", &self.0.value)
            .finish()
    }
}

impl StoreField {
    fn new(field: &Arc<FieldEntry>) -> Self {
        let initial = field.default_value.clone().unwrap_or(Value::Null);
        StoreField(Rc::new(StoreFieldData {
            field: Arc::clone(field),
            value: Observable::new(initial),
        }))
    }

    /// Field metadata.
    pub fn field(&self) -> &Arc<FieldEntry> {
        &self.0.field
    }

    /// Current value, recording the read.
    pub fn value(&self) -> Value {
        self.0.value.get()
    }

    /// Assigns the value.
    pub fn set_value(&self, value: impl Into<Value>) {
        self.0.value.set(value.into());
    }

    /// The underlying observable cell.
    pub fn cell(&self) -> &Observable<Value> {
        &self.0.value
    }
}

////////////////////////////////////////////// Entries ////////////////////////////////////////////////

/// One entry of a store node.
#[derive(Clone, Debug)]
pub enum StoreEntry {
    /// A field cell.
    Field(StoreField),
    /// A nested store node.
    Object(StoreNode),
    /// A list of store nodes.
    List(StoreListNode),
}

/////////////////////////////////////////////// Nodes /////////////////////////////////////////////////

struct StoreNodeData {
    entity: Entity,
    entries: IndexMap<String, StoreEntry>,
}

/// Reactive instance of an entity.
#[derive(Clone)]
pub struct StoreNode(Rc<StoreNodeData>);

impl std::fmt::Debug for StoreNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreNode")
            .field("entity", &self.0.entity.name())
            .field("entries", &self.0.entries)
            .finish()
    }
}

/// Builds a store node for `entity`.
pub fn build_node(entity: &Entity) -> StoreNode {
    StoreNode::new(entity)
}

impl StoreNode {
    /// Builds a store node for `entity`, with every field at its default value
    /// and every list empty.
    pub fn new(entity: &Entity) -> Self {
        let entries = entity
            .entries()
            .map(|(key, entry)| {
                let store_entry = match entry {
                    Entry::Field(f) => StoreEntry::Field(StoreField::new(f)),
                    Entry::Object(o) => StoreEntry::Object(StoreNode::new(&o.entity)),
                    Entry::List(l) => StoreEntry::List(StoreListNode::new(&l.entity)),
                    Entry::RecursiveList(_) => StoreEntry::List(StoreListNode::new(entity)),
                };
                (key.to_string(), store_entry)
            })
            .collect();
        StoreNode(Rc::new(StoreNodeData {
            entity: entity.clone(),
            entries,
        }))
    }

    /// The entity this node realizes.
    pub fn entity(&self) -> &Entity {
        &self.0.entity
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &StoreEntry)> {
        self.0.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Looks up an entry.
    pub fn entry(&self, key: &str) -> Option<&StoreEntry> {
        self.0.entries.get(key)
    }

    /// Looks up a field.
    pub fn field(&self, key: &str) -> Option<&StoreField> {
        match self.entry(key)? {
            StoreEntry::Field(f) => Some(f),
            _ => None,
        }
    }

    /// Looks up a nested node.
    pub fn object(&self, key: &str) -> Option<&StoreNode> {
        match self.entry(key)? {
            StoreEntry::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Looks up a nested list.
    pub fn list(&self, key: &str) -> Option<&StoreListNode> {
        match self.entry(key)? {
            StoreEntry::List(l) => Some(l),
            _ => None,
        }
    }

    /// Merges `data` into the node.
    ///
    /// Only keys present in `data` are touched: fields are assigned, nested objects
    /// are merged recursively and nested lists are replaced wholesale. Keys unknown
    /// to the entity are ignored, as is any non-object `data`.
    pub fn set(&self, data: &Value) {
        let Some(data) = data.as_object() else {
            trace!("ignoring non-object data for store node set");
            return;
        };
        action(|| {
            for (key, value) in data {
                match self.0.entries.get(key) {
                    Some(StoreEntry::Field(f)) => f.set_value(value.clone()),
                    Some(StoreEntry::Object(o)) => {
                        if value.is_null() {
                            o.clear();
                        } else {
                            o.set(value);
                        }
                    }
                    Some(StoreEntry::List(l)) => l.set(value),
                    None => {}
                }
            }
        });
    }

    /// Replaces the whole content of the node; keys missing from `data` are cleared.
    pub fn replace(&self, data: &Value) {
        action(|| {
            self.clear();
            self.set(data);
        });
    }

    /// Resets every field to `null` and empties every list, recursively.
    pub fn clear(&self) {
        action(|| {
            for entry in self.0.entries.values() {
                match entry {
                    StoreEntry::Field(f) => f.set_value(Value::Null),
                    StoreEntry::Object(o) => o.clear(),
                    StoreEntry::List(l) => l.clear(),
                }
            }
        });
    }

    /// Flattens the node to a JSON object, recording every read.
    ///
    /// Fields holding `null` are omitted.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        for (key, entry) in &self.0.entries {
            match entry {
                StoreEntry::Field(f) => {
                    let value = f.value();
                    if !value.is_null() {
                        map.insert(key.clone(), value);
                    }
                }
                StoreEntry::Object(o) => {
                    map.insert(key.clone(), o.to_value());
                }
                StoreEntry::List(l) => {
                    map.insert(key.clone(), l.to_value());
                }
            }
        }
        Value::Object(map)
    }

    /// True if both handles refer to the same node.
    pub fn ptr_eq(&self, other: &StoreNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Addresses of every list item below this node, recording the reads.
    pub(crate) fn item_ids(&self) -> Vec<usize> {
        let mut ids = Vec::new();
        self.collect_item_ids(&mut ids);
        ids
    }

    fn collect_item_ids(&self, ids: &mut Vec<usize>) {
        for entry in self.0.entries.values() {
            match entry {
                StoreEntry::Field(_) => {}
                StoreEntry::Object(o) => o.collect_item_ids(ids),
                StoreEntry::List(l) => l.collect_item_ids(ids),
            }
        }
    }
}

/////////////////////////////////////////////// Lists /////////////////////////////////////////////////

struct StoreListData {
    entity: Entity,
    items: Observable<Vec<StoreNode>>,
}

/// Observable sequence of store nodes sharing one entity.
#[derive(Clone)]
pub struct StoreListNode(Rc<StoreListData>);

impl std::fmt::Debug for StoreListNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreListNode")
            .field("entity", &self.0.entity.name())
            .field("items", &self.0.items)
            .finish()
    }
}

impl StoreListNode {
    /// Creates an empty list of `entity` records.
    pub fn new(entity: &Entity) -> Self {
        StoreListNode(Rc::new(StoreListData {
            entity: entity.clone(),
            items: Observable::new(Vec::new()),
        }))
    }

    /// Entity of the items.
    pub fn entity(&self) -> &Entity {
        &self.0.entity
    }

    /// Number of items, recording the read.
    pub fn len(&self) -> usize {
        self.0.items.with(Vec::len)
    }

    /// True when the list has no item.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Item at `index`.
    pub fn get(&self, index: usize) -> Option<StoreNode> {
        self.0.items.with(|items| items.get(index).cloned())
    }

    /// Snapshot of the items.
    pub fn nodes(&self) -> Vec<StoreNode> {
        self.0.items.get()
    }

    /// Builds a new item from `data` and appends it.
    pub fn push_node(&self, data: &Value) -> StoreNode {
        let node = StoreNode::new(&self.0.entity);
        action(|| {
            node.set(data);
            self.0.items.update(|items| items.push(node.clone()));
        });
        node
    }

    /// Replaces every item with nodes built from the elements of `data`.
    ///
    /// Anything other than an array empties the list.
    pub fn set(&self, data: &Value) {
        let nodes: Vec<StoreNode> = data
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|item| {
                        let node = StoreNode::new(&self.0.entity);
                        node.set(item);
                        node
                    })
                    .collect()
            })
            .unwrap_or_default();
        self.0.items.replace(nodes);
    }

    /// Removes the item at `index`, if any.
    pub fn remove(&self, index: usize) -> Option<StoreNode> {
        if index >= self.0.items.with_untracked(Vec::len) {
            return None;
        }
        let mut removed = None;
        self.0.items.update(|items| removed = Some(items.remove(index)));
        removed
    }

    /// Removes every item.
    pub fn clear(&self) {
        if self.0.items.with_untracked(Vec::is_empty) {
            return;
        }
        self.0.items.replace(Vec::new());
    }

    /// Flattens the list to a JSON array, recording every read.
    pub fn to_value(&self) -> Value {
        Value::Array(
            self.0
                .items
                .with(|items| items.iter().map(StoreNode::to_value).collect()),
        )
    }

    /// True if both handles refer to the same list.
    pub fn ptr_eq(&self, other: &StoreListNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Addresses of the items and of every list item below them, recording the reads.
    pub(crate) fn item_ids(&self) -> Vec<usize> {
        let mut ids = Vec::new();
        self.collect_item_ids(&mut ids);
        ids
    }

    fn collect_item_ids(&self, ids: &mut Vec<usize>) {
        self.0.items.with(|items| {
            for item in items {
                ids.push(Rc::as_ptr(&item.0) as usize);
                item.collect_item_ids(ids);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{operation_entity, tree_entity};
    use serde_json::json;

    #[test]
    fn fields_start_at_their_default_value() {
        let node = StoreNode::new(&operation_entity());
        assert!(node.field("code").unwrap().value().is_null());
        assert_eq!(node.field("status").unwrap().value(), json!("DRAFT"));
        assert!(node.list("lines").unwrap().is_empty());
    }

    #[test]
    fn set_merges_only_present_keys() {
        let node = StoreNode::new(&operation_entity());
        node.set(&json!({"code": "ABC", "libelle": "first"}));
        node.set(&json!({"libelle": "second", "unknown": 1}));
        assert_eq!(node.field("code").unwrap().value(), json!("ABC"));
        assert_eq!(node.field("libelle").unwrap().value(), json!("second"));
    }

    #[test]
    fn set_recurses_into_objects_and_replaces_lists() {
        let node = StoreNode::new(&operation_entity());
        node.set(&json!({
            "address": {"city": "Paris"},
            "lines": [{"amount": 1}, {"amount": 2}]
        }));
        node.set(&json!({
            "address": {"street": "Main"},
            "lines": [{"amount": 3}]
        }));
        let address = node.object("address").unwrap();
        assert_eq!(address.field("city").unwrap().value(), json!("Paris"));
        assert_eq!(address.field("street").unwrap().value(), json!("Main"));
        let lines = node.list("lines").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines.get(0).unwrap().field("amount").unwrap().value(), json!(3));
    }

    #[test]
    fn replace_clears_missing_keys() {
        let node = StoreNode::new(&operation_entity());
        node.set(&json!({"code": "ABC", "libelle": "x"}));
        node.replace(&json!({"code": "DEF"}));
        assert_eq!(node.field("code").unwrap().value(), json!("DEF"));
        assert!(node.field("libelle").unwrap().value().is_null());
    }

    #[test]
    fn clear_is_recursive() {
        let node = StoreNode::new(&operation_entity());
        node.set(&json!({
            "code": "ABC",
            "address": {"city": "Paris"},
            "lines": [{"amount": 1}]
        }));
        node.clear();
        assert!(node.field("code").unwrap().value().is_null());
        assert!(node.field("status").unwrap().value().is_null());
        assert!(node.object("address").unwrap().field("city").unwrap().value().is_null());
        assert!(node.list("lines").unwrap().is_empty());
    }

    #[test]
    fn recursive_lists_share_the_enclosing_entity() {
        let entity = tree_entity();
        let root = StoreNode::new(&entity);
        let child = root.list("children").unwrap().push_node(&json!({"label": "child"}));
        let grandchild = child
            .list("children")
            .unwrap()
            .push_node(&json!({"label": "grandchild"}));
        assert!(root.list("children").unwrap().entity().ptr_eq(&entity));
        assert!(child.list("children").unwrap().entity().ptr_eq(&entity));
        assert!(grandchild.entity().ptr_eq(&entity));
        assert_eq!(
            root.to_value(),
            json!({"children": [{"label": "child", "children": [{"label": "grandchild", "children": []}]}]})
        );
    }

    #[test]
    fn list_operations() {
        let node = StoreNode::new(&operation_entity());
        let lines = node.list("lines").unwrap();
        lines.push_node(&json!({"amount": 1}));
        lines.push_node(&json!({"amount": 2}));
        assert_eq!(lines.len(), 2);
        let removed = lines.remove(0).unwrap();
        assert_eq!(removed.field("amount").unwrap().value(), json!(1));
        assert!(lines.remove(5).is_none());
        lines.set(&json!("not a list"));
        assert!(lines.is_empty());
    }
}
