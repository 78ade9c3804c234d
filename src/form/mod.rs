//! # Form Nodes
//!
//! A form node is an editable clone of a [`StoreNode`]. Edits made on the form
//! stay on the form; changes made to the source store node flow into the form
//! and discard whatever was being edited. The only way back to the store is an
//! explicit save (see [`FormActions`](crate::FormActions)).
//!
//! Every node, list and field of the form carries:
//!
//! - an edit flag: fixed, or derived from the node, and always `false` when an
//!   enclosing node is not in edit mode;
//! - a lazily computed validation error tree;
//! - a validity flag, true when no field in edit mode reports an error.
//!
//! The resync reaction is registered with the [`Scope`] passed to
//! [`make_form_node`]; disposing the scope stops it.
//!
//! ```rust
//! use focus4::{Domain, Entity, SchemaKind, Scope, StoreNode, field, make_form_node};
//! use serde_json::{Value, json};
//!
//! let text = Domain::builder(SchemaKind::String).build();
//! let entity = Entity::builder("Operation")
//!     .entry("code", field(&text, |f| f))
//!     .entry("libelle", field(&text, |f| f.optional()))
//!     .build();
//! let store = StoreNode::new(&entity);
//! store.set(&json!({"code": "ABC"}));
//!
//! let scope = Scope::new();
//! let form = make_form_node(&scope, &store, |b| b.edit(true));
//! form.field("libelle").unwrap().set_value("x");
//! assert!(store.field("libelle").unwrap().value().is_null());
//!
//! store.set(&json!({"code": "DEF"}));
//! assert_eq!(form.field("code").unwrap().value(), json!("DEF"));
//! assert_eq!(form.field("libelle").unwrap().value(), Value::Null);
//! ```

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::observable::{Scope, reaction, untracked};
use crate::store::{StoreListNode, StoreNode};

mod builder;
mod field;
mod list;
mod node;

pub use builder::{FormFieldBuilder, FormListNodeBuilder, FormNodeBuilder};
pub use field::FormField;
pub use list::FormListNode;
pub use node::{FormEntry, FormNode};

/// Errors of one entry of a form node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EntryErrors {
    /// The field's error, if any.
    Field(Option<String>),
    /// Errors of a nested node.
    Object(NodeErrors),
    /// Errors of each item of a nested list.
    List(Vec<NodeErrors>),
}

/// Error tree of a form node, keyed like its entries.
pub type NodeErrors = IndexMap<String, EntryErrors>;

/// Edit and validation state of a form node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormState {
    /// Whether the node is in edit mode.
    pub is_edit: bool,
    /// Whether no field reports an error.
    pub is_valid: bool,
    /// The error tree.
    pub errors: NodeErrors,
}

/// Flattens an error tree into `(path, message)` pairs, such as
/// `("lines[1].amount", "...")`.
pub fn flatten_errors(errors: &NodeErrors) -> Vec<(String, String)> {
    let mut flat = Vec::new();
    flatten_into(errors, "", &mut flat);
    flat
}

fn flatten_into(errors: &NodeErrors, prefix: &str, flat: &mut Vec<(String, String)>) {
    for (key, entry) in errors {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match entry {
            EntryErrors::Field(Some(message)) => flat.push((path, message.clone())),
            EntryErrors::Field(None) => {}
            EntryErrors::Object(nested) => flatten_into(nested, &path, flat),
            EntryErrors::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    flatten_into(item, &format!("{path}[{index}]"), flat);
                }
            }
        }
    }
}

/// Builds a form node over `source` and keeps it in sync with it.
///
/// Every change to the source resets the form, including list items replaced
/// by equal data. The reaction doing so is owned by `scope`.
pub fn make_form_node(
    scope: &Scope,
    source: &StoreNode,
    configure: impl FnOnce(FormNodeBuilder) -> FormNodeBuilder,
) -> FormNode {
    let builder = configure(FormNodeBuilder::default());
    let form = untracked(|| FormNode::build(source, builder, None));
    let target = form.downgrade();
    let watched = source.clone();
    scope.register(reaction(
        move || (watched.to_value(), watched.item_ids()),
        move |_| {
            if let Some(form) = target.upgrade() {
                debug!(entity = ?form.entity().name(), "source changed, resetting form node");
                form.reset();
            }
        },
    ));
    form
}

/// Builds a form list over `source` and keeps it in sync with it.
pub fn make_form_list_node(
    scope: &Scope,
    source: &StoreListNode,
    configure: impl FnOnce(FormListNodeBuilder) -> FormListNodeBuilder,
) -> FormListNode {
    let builder = configure(FormListNodeBuilder::default());
    let list = untracked(|| FormListNode::build(source, builder.items, builder.edit, None));
    let target = list.downgrade();
    let watched = source.clone();
    scope.register(reaction(
        move || (watched.to_value(), watched.item_ids()),
        move |_| {
            if let Some(list) = target.upgrade() {
                debug!(entity = ?list.entity().name(), "source changed, resetting form list");
                list.reset();
            }
        },
    ));
    list
}
