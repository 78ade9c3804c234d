use std::rc::{Rc, Weak};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{trace, warn};

use crate::entity::{Entity, FieldEntry};
use crate::observable::{Computed, Observable, action};
use crate::store::{StoreEntry, StoreNode};

use super::builder::{EditPolicy, FormNodeBuilder};
use super::{EntryErrors, FormField, FormListNode, FormState, NodeErrors};

/// One entry of a form node.
#[derive(Clone, Debug)]
pub enum FormEntry {
    /// An editable field.
    Field(FormField),
    /// A nested form node.
    Object(FormNode),
    /// A nested form list.
    List(FormListNode),
}

pub(crate) struct NodeData {
    source: StoreNode,
    entries: IndexMap<String, FormEntry>,
    own_edit: Observable<bool>,
    is_edit: Computed<bool>,
    errors: Computed<NodeErrors>,
    is_valid: Computed<bool>,
}

/// Editable clone of a [`StoreNode`].
#[derive(Clone)]
pub struct FormNode(Rc<NodeData>);

impl std::fmt::Debug for FormNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormNode")
            .field("entity", &self.0.source.entity().name())
            .field("entries", &self.0.entries)
            .finish_non_exhaustive()
    }
}

pub(crate) struct WeakFormNode(Weak<NodeData>);

impl WeakFormNode {
    pub(crate) fn upgrade(&self) -> Option<FormNode> {
        self.0.upgrade().map(FormNode)
    }
}

impl FormNode {
    pub(crate) fn from_data(data: Rc<NodeData>) -> Self {
        FormNode(data)
    }

    pub(crate) fn downgrade(&self) -> WeakFormNode {
        WeakFormNode(Rc::downgrade(&self.0))
    }

    /// Clones `source` into a new form node.
    ///
    /// Field values are read without tracking. A node without parent starts out
    /// of edit mode, nested ones in edit mode.
    pub(crate) fn build(
        source: &StoreNode,
        mut builder: FormNodeBuilder,
        parent_edit: Option<Computed<bool>>,
    ) -> FormNode {
        let policy = builder.edit.take();
        let own_edit = Observable::new(match &policy {
            Some(EditPolicy::Fixed(is_edit)) => *is_edit,
            Some(EditPolicy::Derived(_)) => true,
            None => parent_edit.is_some(),
        });
        let data = Rc::new_cyclic(|weak: &Weak<NodeData>| {
            let is_edit = {
                let own_edit = own_edit.clone();
                let weak = weak.clone();
                let derived = match policy {
                    Some(EditPolicy::Derived(f)) => Some(f),
                    _ => None,
                };
                Computed::new(move || {
                    if let Some(parent) = &parent_edit {
                        if !parent.get() {
                            return false;
                        }
                    }
                    match &derived {
                        Some(f) => weak.upgrade().is_some_and(|data| f(&FormNode(data))),
                        None => own_edit.get(),
                    }
                })
            };

            let mut entries = IndexMap::new();
            for (key, entry) in source.entries() {
                if builder.removals.contains(key) {
                    continue;
                }
                let form_entry = match entry {
                    StoreEntry::Field(f) => FormEntry::Field(FormField::build(
                        f.field(),
                        f.cell().get_untracked(),
                        Some(f.clone()),
                        builder.patches.remove(key).unwrap_or_default(),
                        is_edit.clone(),
                        weak.clone(),
                    )),
                    StoreEntry::Object(o) => FormEntry::Object(FormNode::build(
                        o,
                        builder.objects.remove(key).unwrap_or_default(),
                        Some(is_edit.clone()),
                    )),
                    StoreEntry::List(l) => FormEntry::List(FormListNode::build(
                        l,
                        builder.lists.remove(key),
                        None,
                        Some(is_edit.clone()),
                    )),
                };
                entries.insert(key.to_string(), form_entry);
            }
            for (key, (domain, field_builder)) in builder.additions.drain(..) {
                let entry = Arc::new(FieldEntry {
                    domain,
                    is_required: true,
                    name: key.clone(),
                    label: key.clone(),
                    comment: None,
                    default_value: None,
                });
                let initial = field_builder.initial.clone().unwrap_or(Value::Null);
                let field = FormField::build(
                    &entry,
                    initial,
                    None,
                    field_builder,
                    is_edit.clone(),
                    weak.clone(),
                );
                entries.insert(key, FormEntry::Field(field));
            }
            let unused = builder
                .patches
                .keys()
                .chain(builder.objects.keys())
                .chain(builder.lists.keys());
            for key in unused {
                warn!(entity = ?source.entity().name(), entry = %key, "form customization targets an unknown entry");
            }

            let errors = {
                let weak = weak.clone();
                Computed::new(move || {
                    weak.upgrade()
                        .map(|data| FormNode(data).collect_errors())
                        .unwrap_or_default()
                })
            };
            let is_valid = {
                let weak = weak.clone();
                Computed::new(move || weak.upgrade().is_some_and(|data| FormNode(data).check_valid()))
            };
            NodeData {
                source: source.clone(),
                entries,
                own_edit,
                is_edit,
                errors,
                is_valid,
            }
        });
        FormNode(data)
    }

    fn collect_errors(&self) -> NodeErrors {
        self.0
            .entries
            .iter()
            .map(|(key, entry)| {
                let errors = match entry {
                    FormEntry::Field(f) => EntryErrors::Field(f.error()),
                    FormEntry::Object(o) => EntryErrors::Object(o.errors()),
                    FormEntry::List(l) => EntryErrors::List(l.errors()),
                };
                (key.clone(), errors)
            })
            .collect()
    }

    fn check_valid(&self) -> bool {
        self.0.entries.values().all(|entry| match entry {
            FormEntry::Field(f) => f.is_valid(),
            FormEntry::Object(o) => o.is_valid(),
            FormEntry::List(l) => l.is_valid(),
        })
    }

    /// The store node this form was cloned from.
    pub fn source(&self) -> &StoreNode {
        &self.0.source
    }

    /// Entity of the source node.
    pub fn entity(&self) -> &Entity {
        self.0.source.entity()
    }

    /// Entries in declaration order, added fields last.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &FormEntry)> {
        self.0.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Looks up an entry.
    pub fn entry(&self, key: &str) -> Option<&FormEntry> {
        self.0.entries.get(key)
    }

    /// Looks up a field.
    pub fn field(&self, key: &str) -> Option<&FormField> {
        match self.entry(key)? {
            FormEntry::Field(f) => Some(f),
            _ => None,
        }
    }

    /// Looks up a nested node.
    pub fn object(&self, key: &str) -> Option<&FormNode> {
        match self.entry(key)? {
            FormEntry::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Looks up a nested list.
    pub fn list(&self, key: &str) -> Option<&FormListNode> {
        match self.entry(key)? {
            FormEntry::List(l) => Some(l),
            _ => None,
        }
    }

    /// True when this node and every enclosing one are in edit mode.
    pub fn is_edit(&self) -> bool {
        self.0.is_edit.get()
    }

    /// Sets this node's own edit flag.
    pub fn set_is_edit(&self, is_edit: bool) {
        self.0.own_edit.set(is_edit);
    }

    /// True when no field of the subtree reports an error.
    pub fn is_valid(&self) -> bool {
        self.0.is_valid.get()
    }

    /// Error tree mirroring the entity shape.
    pub fn errors(&self) -> NodeErrors {
        self.0.errors.get()
    }

    /// Snapshot of the edit and validation state.
    pub fn form(&self) -> FormState {
        FormState {
            is_edit: self.is_edit(),
            is_valid: self.is_valid(),
            errors: self.errors(),
        }
    }

    /// Merges `data` into the form; the source is left untouched.
    ///
    /// Lists are replaced wholesale, like [`StoreNode::set`] does.
    pub fn set(&self, data: &Value) {
        let Some(data) = data.as_object() else {
            trace!("ignoring non-object data for form node set");
            return;
        };
        action(|| {
            for (key, value) in data {
                match self.0.entries.get(key) {
                    Some(FormEntry::Field(f)) => f.set_value(value.clone()),
                    Some(FormEntry::Object(o)) => {
                        if value.is_null() {
                            o.clear();
                        } else {
                            o.set(value);
                        }
                    }
                    Some(FormEntry::List(l)) => l.replace_nodes(value),
                    None => {}
                }
            }
        });
    }

    /// Replaces the whole content of the form; keys missing from `data` are cleared.
    pub fn replace(&self, data: &Value) {
        action(|| {
            self.clear();
            self.set(data);
        });
    }

    /// Resets every field to `null` and empties every list.
    pub fn clear(&self) {
        action(|| {
            for entry in self.0.entries.values() {
                match entry {
                    FormEntry::Field(f) => f.clear(),
                    FormEntry::Object(o) => o.clear(),
                    FormEntry::List(l) => l.clear(),
                }
            }
        });
    }

    /// Copies the source's current values back, discarding every edit.
    pub fn reset(&self) {
        action(|| {
            for entry in self.0.entries.values() {
                match entry {
                    FormEntry::Field(f) => f.reset(),
                    FormEntry::Object(o) => o.reset(),
                    FormEntry::List(l) => l.reset(),
                }
            }
        });
    }

    /// Flattens the form to a JSON object, added fields included.
    ///
    /// Fields holding `null` are omitted.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        for (key, entry) in &self.0.entries {
            match entry {
                FormEntry::Field(f) => {
                    let value = f.value();
                    if !value.is_null() {
                        map.insert(key.clone(), value);
                    }
                }
                FormEntry::Object(o) => {
                    map.insert(key.clone(), o.to_value());
                }
                FormEntry::List(l) => {
                    map.insert(key.clone(), l.to_value());
                }
            }
        }
        Value::Object(map)
    }

    /// Flattens the form like [`FormNode::to_value`], keeping cleared fields as `null`.
    pub(crate) fn to_value_with_nulls(&self) -> Value {
        let mut map = Map::new();
        for (key, entry) in &self.0.entries {
            let value = match entry {
                FormEntry::Field(f) => f.value(),
                FormEntry::Object(o) => o.to_value_with_nulls(),
                FormEntry::List(l) => l.to_value_with_nulls(),
            };
            map.insert(key.clone(), value);
        }
        Value::Object(map)
    }

    /// True if both handles refer to the same node.
    pub fn ptr_eq(&self, other: &FormNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
