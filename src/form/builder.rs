use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::domain::Domain;
use crate::entity::FieldEntry;

use super::FormNode;

pub(crate) type EditFn = Rc<dyn Fn(&FormNode) -> bool>;
pub(crate) type NodeBuilderFn = Rc<dyn Fn(FormNodeBuilder) -> FormNodeBuilder>;
pub(crate) type FieldGetter = Rc<dyn Fn(&FormNode) -> Value>;
pub(crate) type FieldSetter = Rc<dyn Fn(&FormNode, Value)>;

/// How a node or field decides whether it is in edit mode.
#[derive(Clone)]
pub(crate) enum EditPolicy {
    Fixed(bool),
    Derived(EditFn),
}

/////////////////////////////////////////// FormNodeBuilder ///////////////////////////////////////////

/// Customizes a form node while it is being built.
///
/// Every method consumes and returns the builder so configurations chain:
///
/// ```rust
/// # use focus4::{Domain, FormNodeBuilder, SchemaKind};
/// # use serde_json::json;
/// let text = Domain::builder(SchemaKind::String).build();
/// let configure = |b: FormNodeBuilder| {
///     b.edit(true)
///         .patch("code", |f| f.label("Operation code"))
///         .add("summary", &text, |f| f.optional().value(|node| {
///             node.field("code").map(|c| c.value()).unwrap_or_default()
///         }))
///         .remove("status")
///         .items("lines", |item| item.edit_with(|line| line.field("amount").is_some()))
/// };
/// # let _ = configure;
/// ```
#[derive(Default)]
pub struct FormNodeBuilder {
    pub(crate) edit: Option<EditPolicy>,
    pub(crate) patches: HashMap<String, FormFieldBuilder>,
    pub(crate) additions: IndexMap<String, (Domain, FormFieldBuilder)>,
    pub(crate) removals: HashSet<String>,
    pub(crate) objects: HashMap<String, FormNodeBuilder>,
    pub(crate) lists: HashMap<String, NodeBuilderFn>,
}

impl FormNodeBuilder {
    /// Fixes the node's initial edit mode.
    pub fn edit(mut self, is_edit: bool) -> Self {
        self.edit = Some(EditPolicy::Fixed(is_edit));
        self
    }

    /// Derives the node's edit mode from the node itself.
    ///
    /// A derived edit mode ignores [`FormNode::set_is_edit`].
    pub fn edit_with(mut self, f: impl Fn(&FormNode) -> bool + 'static) -> Self {
        self.edit = Some(EditPolicy::Derived(Rc::new(f)));
        self
    }

    /// Overrides the metadata or behavior of an existing field.
    pub fn patch(
        mut self,
        name: impl Into<String>,
        configure: impl FnOnce(FormFieldBuilder) -> FormFieldBuilder,
    ) -> Self {
        let name = name.into();
        let current = self.patches.remove(&name).unwrap_or_default();
        self.patches.insert(name, configure(current));
        self
    }

    /// Adds a field that only exists on the form.
    pub fn add(
        mut self,
        name: impl Into<String>,
        domain: &Domain,
        configure: impl FnOnce(FormFieldBuilder) -> FormFieldBuilder,
    ) -> Self {
        self.additions.insert(
            name.into(),
            (domain.clone(), configure(FormFieldBuilder::default())),
        );
        self
    }

    /// Leaves an entry of the source out of the form.
    pub fn remove(mut self, name: impl Into<String>) -> Self {
        self.removals.insert(name.into());
        self
    }

    /// Customizes a nested object node.
    pub fn patch_object(
        mut self,
        name: impl Into<String>,
        configure: impl FnOnce(FormNodeBuilder) -> FormNodeBuilder,
    ) -> Self {
        let name = name.into();
        let current = self.objects.remove(&name).unwrap_or_default();
        self.objects.insert(name, configure(current));
        self
    }

    /// Customizes every item of a nested list, including items added later.
    pub fn items(
        mut self,
        name: impl Into<String>,
        configure: impl Fn(FormNodeBuilder) -> FormNodeBuilder + 'static,
    ) -> Self {
        self.lists.insert(name.into(), Rc::new(configure));
        self
    }
}

/////////////////////////////////////////// FormFieldBuilder //////////////////////////////////////////

/// Customizes one form field.
#[derive(Default)]
pub struct FormFieldBuilder {
    pub(crate) domain: Option<Domain>,
    pub(crate) label: Option<String>,
    pub(crate) comment: Option<String>,
    pub(crate) is_required: Option<bool>,
    pub(crate) initial: Option<Value>,
    pub(crate) edit: Option<EditPolicy>,
    pub(crate) getter: Option<FieldGetter>,
    pub(crate) setter: Option<FieldSetter>,
}

impl FormFieldBuilder {
    /// Replaces the field's domain.
    pub fn domain(mut self, domain: &Domain) -> Self {
        self.domain = Some(domain.clone());
        self
    }

    /// Replaces the field's label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Replaces the field's comment.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Sets whether an empty value is an error.
    pub fn required(mut self, is_required: bool) -> Self {
        self.is_required = Some(is_required);
        self
    }

    /// Shorthand for `required(false)`.
    pub fn optional(self) -> Self {
        self.required(false)
    }

    /// Initial value of an added field.
    pub fn initial_value(mut self, value: impl Into<Value>) -> Self {
        self.initial = Some(value.into());
        self
    }

    /// Fixes the field's edit mode; the field still needs its node in edit mode.
    pub fn edit(mut self, is_edit: bool) -> Self {
        self.edit = Some(EditPolicy::Fixed(is_edit));
        self
    }

    /// Derives the field's edit mode from its node.
    pub fn edit_with(mut self, f: impl Fn(&FormNode) -> bool + 'static) -> Self {
        self.edit = Some(EditPolicy::Derived(Rc::new(f)));
        self
    }

    /// Computes the value from the node instead of holding it.
    pub fn value(mut self, get: impl Fn(&FormNode) -> Value + 'static) -> Self {
        self.getter = Some(Rc::new(get));
        self
    }

    /// Handles assignments to a computed value.
    pub fn setter(mut self, set: impl Fn(&FormNode, Value) + 'static) -> Self {
        self.setter = Some(Rc::new(set));
        self
    }

    pub(crate) fn overrides_metadata(&self) -> bool {
        self.domain.is_some()
            || self.label.is_some()
            || self.comment.is_some()
            || self.is_required.is_some()
    }

    pub(crate) fn apply(&self, field: &Arc<FieldEntry>) -> Arc<FieldEntry> {
        if !self.overrides_metadata() {
            return Arc::clone(field);
        }
        let mut patched = FieldEntry::clone(field);
        if let Some(domain) = &self.domain {
            patched.domain = domain.clone();
        }
        if let Some(label) = &self.label {
            patched.label = label.clone();
        }
        if let Some(comment) = &self.comment {
            patched.comment = Some(comment.clone());
        }
        if let Some(is_required) = self.is_required {
            patched.is_required = is_required;
        }
        Arc::new(patched)
    }
}

///////////////////////////////////////// FormListNodeBuilder /////////////////////////////////////////

/// Customizes a form list node.
#[derive(Default)]
pub struct FormListNodeBuilder {
    pub(crate) edit: Option<bool>,
    pub(crate) items: Option<NodeBuilderFn>,
}

impl FormListNodeBuilder {
    /// Fixes the list's initial edit mode.
    pub fn edit(mut self, is_edit: bool) -> Self {
        self.edit = Some(is_edit);
        self
    }

    /// Customizes every item, including items added later.
    pub fn items(mut self, configure: impl Fn(FormNodeBuilder) -> FormNodeBuilder + 'static) -> Self {
        self.items = Some(Rc::new(configure));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaKind;

    #[test]
    fn patches_accumulate() {
        let builder = FormNodeBuilder::default()
            .patch("code", |f| f.label("Code"))
            .patch("code", |f| f.optional());
        let patch = &builder.patches["code"];
        assert_eq!(patch.label.as_deref(), Some("Code"));
        assert_eq!(patch.is_required, Some(false));
    }

    #[test]
    fn apply_keeps_the_entry_when_nothing_is_overridden() {
        let text = Domain::builder(SchemaKind::String).build();
        let entry = Arc::new(FieldEntry {
            domain: text,
            is_required: true,
            name: "code".to_string(),
            label: "code".to_string(),
            comment: None,
            default_value: None,
        });
        let same = FormFieldBuilder::default().edit(false).apply(&entry);
        assert!(Arc::ptr_eq(&same, &entry));
        let patched = FormFieldBuilder::default().label("Code").optional().apply(&entry);
        assert_eq!(patched.label, "Code");
        assert!(!patched.is_required);
        assert!(entry.is_required);
    }
}
