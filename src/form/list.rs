use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::trace;

use crate::entity::Entity;
use crate::observable::{Computed, Observable, action, untracked};
use crate::store::{StoreListNode, StoreNode};

use super::builder::{FormNodeBuilder, NodeBuilderFn};
use super::{FormNode, NodeErrors};

pub(crate) struct ListData {
    source: StoreListNode,
    items: Observable<Vec<FormNode>>,
    node_builder: Option<NodeBuilderFn>,
    own_edit: Observable<bool>,
    is_edit: Computed<bool>,
    errors: Computed<Vec<NodeErrors>>,
    is_valid: Computed<bool>,
}

/// Editable clone of a [`StoreListNode`].
///
/// The item builder, if any, is kept on the list and applied to every item it
/// creates: on reset, on [`FormListNode::push_node`] and on
/// [`FormListNode::replace_nodes`].
#[derive(Clone)]
pub struct FormListNode(Rc<ListData>);

impl std::fmt::Debug for FormListNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormListNode")
            .field("entity", &self.0.source.entity().name())
            .field("items", &self.0.items)
            .finish_non_exhaustive()
    }
}

pub(crate) struct WeakFormListNode(Weak<ListData>);

impl WeakFormListNode {
    pub(crate) fn upgrade(&self) -> Option<FormListNode> {
        self.0.upgrade().map(FormListNode)
    }
}

impl FormListNode {
    pub(crate) fn downgrade(&self) -> WeakFormListNode {
        WeakFormListNode(Rc::downgrade(&self.0))
    }

    pub(crate) fn build(
        source: &StoreListNode,
        node_builder: Option<NodeBuilderFn>,
        edit: Option<bool>,
        parent_edit: Option<Computed<bool>>,
    ) -> FormListNode {
        let own_edit = Observable::new(edit.unwrap_or(parent_edit.is_some()));
        let data = Rc::new_cyclic(|weak: &Weak<ListData>| {
            let is_edit = {
                let own_edit = own_edit.clone();
                Computed::new(move || {
                    parent_edit.as_ref().is_none_or(|parent| parent.get()) && own_edit.get()
                })
            };
            let errors = {
                let weak = weak.clone();
                Computed::new(move || match weak.upgrade() {
                    Some(data) => data.items.get().iter().map(FormNode::errors).collect(),
                    None => Vec::new(),
                })
            };
            let is_valid = {
                let weak = weak.clone();
                Computed::new(move || {
                    weak.upgrade()
                        .is_some_and(|data| data.items.get().iter().all(FormNode::is_valid))
                })
            };
            ListData {
                source: source.clone(),
                items: Observable::new(Vec::new()),
                node_builder,
                own_edit,
                is_edit,
                errors,
                is_valid,
            }
        });
        let list = FormListNode(data);
        list.reset();
        list
    }

    fn make_item(&self, source: &StoreNode) -> FormNode {
        let builder = match &self.0.node_builder {
            Some(configure) => configure(FormNodeBuilder::default()),
            None => FormNodeBuilder::default(),
        };
        untracked(|| FormNode::build(source, builder, Some(self.0.is_edit.clone())))
    }

    fn detached_item(&self, data: &Value) -> FormNode {
        let item = self.make_item(&StoreNode::new(self.0.source.entity()));
        item.set(data);
        item
    }

    /// The store list this form list was cloned from.
    pub fn source(&self) -> &StoreListNode {
        &self.0.source
    }

    /// Entity of the items.
    pub fn entity(&self) -> &Entity {
        self.0.source.entity()
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
    pub fn get(&self, index: usize) -> Option<FormNode> {
        self.0.items.with(|items| items.get(index).cloned())
    }

    /// Snapshot of the items.
    pub fn nodes(&self) -> Vec<FormNode> {
        self.0.items.get()
    }

    /// True when the list and every enclosing node are in edit mode.
    pub fn is_edit(&self) -> bool {
        self.0.is_edit.get()
    }

    /// Sets this list's own edit flag.
    pub fn set_is_edit(&self, is_edit: bool) {
        self.0.own_edit.set(is_edit);
    }

    /// True when no item reports an error.
    pub fn is_valid(&self) -> bool {
        self.0.is_valid.get()
    }

    /// One error tree per item.
    pub fn errors(&self) -> Vec<NodeErrors> {
        self.0.errors.get()
    }

    /// Merges `data` into the items by position.
    ///
    /// Existing items are updated in place, extra elements are appended as new
    /// items and surplus items are dropped. Anything other than an array empties
    /// the list.
    pub fn set_nodes(&self, data: &Value) {
        let Some(data) = data.as_array() else {
            trace!("non-array data empties the form list");
            self.clear();
            return;
        };
        action(|| {
            let mut items = self.0.items.get_untracked();
            items.truncate(data.len());
            for (index, datum) in data.iter().enumerate() {
                match items.get(index) {
                    Some(item) => item.set(datum),
                    None => items.push(self.detached_item(datum)),
                }
            }
            self.0.items.replace(items);
        });
    }

    /// Appends a new item built from `data`.
    ///
    /// The item is backed by a fresh store node; the source list is not touched.
    pub fn push_node(&self, data: &Value) -> FormNode {
        let item = action(|| self.detached_item(data));
        self.0.items.update(|items| items.push(item.clone()));
        item
    }

    /// Replaces every item with new ones built from `data`.
    pub fn replace_nodes(&self, data: &Value) {
        let items: Vec<FormNode> = action(|| {
            data.as_array()
                .map(|items| items.iter().map(|datum| self.detached_item(datum)).collect())
                .unwrap_or_default()
        });
        self.0.items.replace(items);
    }

    /// Removes the item at `index`, if any.
    pub fn remove(&self, index: usize) -> Option<FormNode> {
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

    /// Rebuilds every item from the source list, discarding every edit.
    pub fn reset(&self) {
        let items: Vec<FormNode> = untracked(|| {
            self.0
                .source
                .nodes()
                .iter()
                .map(|node| self.make_item(node))
                .collect()
        });
        self.0.items.replace(items);
    }

    /// Flattens the list to a JSON array, recording every read.
    pub fn to_value(&self) -> Value {
        Value::Array(self.nodes().iter().map(FormNode::to_value).collect())
    }

    pub(crate) fn to_value_with_nulls(&self) -> Value {
        Value::Array(
            self.nodes()
                .iter()
                .map(FormNode::to_value_with_nulls)
                .collect(),
        )
    }

    /// True if both handles refer to the same list.
    pub fn ptr_eq(&self, other: &FormListNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
