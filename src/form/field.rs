use std::rc::{Rc, Weak};
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::domain::Domain;
use crate::entity::FieldEntry;
use crate::observable::{Computed, Observable};
use crate::schema::{schema_output_to_string, string_to_schema_output};
use crate::store::StoreField;

use super::FormNode;
use super::builder::{EditPolicy, FieldSetter, FormFieldBuilder};
use super::node::NodeData;

#[derive(Clone)]
enum FieldValue {
    Cell(Observable<Value>),
    Computed {
        get: Computed<Value>,
        set: Option<FieldSetter>,
    },
}

impl FieldValue {
    fn get(&self) -> Value {
        match self {
            FieldValue::Cell(cell) => cell.get(),
            FieldValue::Computed { get, .. } => get.get(),
        }
    }
}

struct FormFieldData {
    field: Arc<FieldEntry>,
    value: FieldValue,
    initial: Value,
    source: Option<StoreField>,
    node: Weak<NodeData>,
    is_edit: Computed<bool>,
    error: Computed<Option<String>>,
}

/// An editable field of a form node.
///
/// Holds its own copy of the value: assigning it never touches the source store
/// field. Fields added with [`FormNodeBuilder::add`](super::FormNodeBuilder::add)
/// have no source; computed ones derive their value from the node.
#[derive(Clone)]
pub struct FormField(Rc<FormFieldData>);

impl std::fmt::Debug for FormField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormField")
            .field("name", &self.0.field.name)
            .field("computed", &self.is_computed())
            .field("has_source", &self.0.source.is_some())
            .finish_non_exhaustive()
    }
}

impl FormField {
    pub(crate) fn build(
        field: &Arc<FieldEntry>,
        initial: Value,
        source: Option<StoreField>,
        builder: FormFieldBuilder,
        node_edit: Computed<bool>,
        node: Weak<NodeData>,
    ) -> FormField {
        let field = builder.apply(field);
        let value = match builder.getter {
            Some(getter) => {
                let node = node.clone();
                FieldValue::Computed {
                    get: Computed::new(move || match node.upgrade() {
                        Some(data) => getter(&FormNode::from_data(data)),
                        None => Value::Null,
                    }),
                    set: builder.setter,
                }
            }
            None => FieldValue::Cell(Observable::new(initial.clone())),
        };
        let is_edit = {
            let policy = builder.edit;
            let node = node.clone();
            Computed::new(move || {
                node_edit.get()
                    && match &policy {
                        None => true,
                        Some(EditPolicy::Fixed(is_edit)) => *is_edit,
                        Some(EditPolicy::Derived(f)) => node
                            .upgrade()
                            .is_some_and(|data| f(&FormNode::from_data(data))),
                    }
            })
        };
        let error = {
            let field = Arc::clone(&field);
            let value = value.clone();
            let is_edit = is_edit.clone();
            Computed::new(move || {
                if !is_edit.get() {
                    return None;
                }
                field.domain.validate(&value.get(), field.is_required)
            })
        };
        FormField(Rc::new(FormFieldData {
            field,
            value,
            initial,
            source,
            node,
            is_edit,
            error,
        }))
    }

    /// Field metadata, patches applied.
    pub fn field(&self) -> &Arc<FieldEntry> {
        &self.0.field
    }

    /// Domain of the field.
    pub fn domain(&self) -> &Domain {
        &self.0.field.domain
    }

    /// Display label.
    pub fn label(&self) -> &str {
        &self.0.field.label
    }

    /// Whether an empty value is an error.
    pub fn is_required(&self) -> bool {
        self.0.field.is_required
    }

    /// Current value, recording the read.
    pub fn value(&self) -> Value {
        self.0.value.get()
    }

    /// Assigns the value.
    ///
    /// A computed field forwards the value to its setter; without one the
    /// assignment is dropped.
    pub fn set_value(&self, value: impl Into<Value>) {
        match &self.0.value {
            FieldValue::Cell(cell) => cell.set(value.into()),
            FieldValue::Computed { set: Some(set), .. } => {
                if let Some(data) = self.0.node.upgrade() {
                    set(&FormNode::from_data(data), value.into());
                }
            }
            FieldValue::Computed { set: None, .. } => {
                warn!(field = %self.0.field.name, "ignoring assignment to a read-only computed field");
            }
        }
    }

    /// The value as a text input would show it.
    pub fn text(&self) -> Option<String> {
        schema_output_to_string(&self.value(), self.0.field.domain.schema())
    }

    /// Parses `text` with the domain's schema and assigns the result.
    ///
    /// Empty or unparsable text assigns `null`.
    pub fn set_text(&self, text: Option<&str>) {
        let parsed = string_to_schema_output(text, self.0.field.domain.schema());
        self.set_value(parsed.unwrap_or(Value::Null));
    }

    /// The value formatted for display.
    pub fn display(&self) -> String {
        self.0.field.domain.format(&self.value())
    }

    /// Validation error, `None` when valid or not in edit mode.
    pub fn error(&self) -> Option<String> {
        self.0.error.get()
    }

    /// True when [`FormField::error`] is `None`.
    pub fn is_valid(&self) -> bool {
        self.error().is_none()
    }

    /// True when the field and every enclosing node are in edit mode.
    pub fn is_edit(&self) -> bool {
        self.0.is_edit.get()
    }

    /// True when the value is derived from the node.
    pub fn is_computed(&self) -> bool {
        matches!(self.0.value, FieldValue::Computed { .. })
    }

    /// The store field this field was cloned from.
    pub fn source(&self) -> Option<&StoreField> {
        self.0.source.as_ref()
    }

    pub(crate) fn reset(&self) {
        if let FieldValue::Cell(cell) = &self.0.value {
            let value = match &self.0.source {
                Some(source) => source.cell().get_untracked(),
                None => self.0.initial.clone(),
            };
            cell.set(value);
        }
    }

    pub(crate) fn clear(&self) {
        if let FieldValue::Cell(cell) = &self.0.value {
            cell.set(Value::Null);
        }
    }
}
