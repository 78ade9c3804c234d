//! # Entities
//!
//! An [`Entity`] is the immutable schema of a record: an ordered mapping from
//! entry names to [`Entry`] values. Entries are declared with [`field`],
//! [`object`], [`list`] and [`recursive_list`], each taking a configuration
//! callback that receives a chainable builder and returns it.
//!
//! ```rust
//! use focus4::{Domain, Entity, SchemaKind, field, recursive_list};
//!
//! let label = Domain::builder(SchemaKind::String).build();
//! let node = Entity::builder("Node")
//!     .entry("label", field(&label, |f| f.label("Label")))
//!     .entry("title", field(&label, |f| f.name("caption").optional()))
//!     .entry("children", recursive_list(|l| l))
//!     .build();
//!
//! let title = node.field("title").unwrap();
//! assert_eq!(title.name, "caption");
//! assert!(!title.is_required);
//! assert_eq!(node.field("label").unwrap().name, "label");
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::domain::Domain;

////////////////////////////////////////////// Entries ////////////////////////////////////////////////

/// A named leaf value bound to a [`Domain`].
#[derive(Debug, Clone)]
pub struct FieldEntry {
    /// Rules of the value.
    pub domain: Domain,
    /// Whether an empty value is an error.
    pub is_required: bool,
    /// Field name; the mapping key unless set explicitly.
    pub name: String,
    /// Display label; the name unless set explicitly.
    pub label: String,
    /// Free-form description.
    pub comment: Option<String>,
    /// Value of a freshly built store node.
    pub default_value: Option<Value>,
}

/// Metadata shared by object and list entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NestedMeta {
    /// Whether the nested record is required.
    pub is_required: bool,
    /// Display label.
    pub label: Option<String>,
    /// Free-form description.
    pub comment: Option<String>,
}

/// A single nested record.
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    /// Shape of the nested record.
    pub entity: Entity,
    /// Entry metadata.
    pub meta: NestedMeta,
}

/// A homogeneous sequence of nested records.
#[derive(Debug, Clone)]
pub struct ListEntry {
    /// Shape of each item.
    pub entity: Entity,
    /// Entry metadata.
    pub meta: NestedMeta,
}

/// A sequence of records of the entity that declares this entry.
///
/// The self-reference is resolved when store nodes are built.
#[derive(Debug, Clone)]
pub struct RecursiveListEntry {
    /// Entry metadata.
    pub meta: NestedMeta,
}

/// One entry of an [`Entity`].
#[derive(Debug, Clone)]
pub enum Entry {
    /// A leaf value.
    Field(Arc<FieldEntry>),
    /// A nested record.
    Object(ObjectEntry),
    /// A list of nested records.
    List(ListEntry),
    /// A list of records of the enclosing entity.
    RecursiveList(RecursiveListEntry),
}

impl Entry {
    /// Whether the entry is required.
    pub fn is_required(&self) -> bool {
        match self {
            Entry::Field(f) => f.is_required,
            Entry::Object(ObjectEntry { meta, .. })
            | Entry::List(ListEntry { meta, .. })
            | Entry::RecursiveList(RecursiveListEntry { meta }) => meta.is_required,
        }
    }

    /// The entry's label, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            Entry::Field(f) => Some(&f.label),
            Entry::Object(ObjectEntry { meta, .. })
            | Entry::List(ListEntry { meta, .. })
            | Entry::RecursiveList(RecursiveListEntry { meta }) => meta.label.as_deref(),
        }
    }
}

/////////////////////////////////////////////// Entity ////////////////////////////////////////////////

#[derive(Debug)]
struct EntityData {
    name: Option<String>,
    entries: IndexMap<String, Entry>,
}

/// Immutable record schema, shared by reference.
#[derive(Debug, Clone)]
pub struct Entity(Arc<EntityData>);

impl Entity {
    /// Starts a named entity.
    pub fn builder(name: impl Into<String>) -> EntityBuilder {
        EntityBuilder {
            name: Some(name.into()),
            entries: IndexMap::new(),
        }
    }

    /// Starts an anonymous entity.
    pub fn anonymous() -> EntityBuilder {
        EntityBuilder {
            name: None,
            entries: IndexMap::new(),
        }
    }

    /// Display name of the entity.
    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.0.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Looks up an entry by mapping key.
    pub fn entry(&self, key: &str) -> Option<&Entry> {
        self.0.entries.get(key)
    }

    /// Looks up a field entry by mapping key.
    pub fn field(&self, key: &str) -> Option<&Arc<FieldEntry>> {
        match self.entry(key)? {
            Entry::Field(f) => Some(f),
            _ => None,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.entries.len()
    }

    /// True when the entity declares no entry.
    pub fn is_empty(&self) -> bool {
        self.0.entries.is_empty()
    }

    /// True if both handles refer to the same entity.
    pub fn ptr_eq(&self, other: &Entity) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Collects entries into an [`Entity`].
pub struct EntityBuilder {
    name: Option<String>,
    entries: IndexMap<String, Entry>,
}

impl EntityBuilder {
    /// Attaches an entry under `key`.
    ///
    /// A field without an explicit name takes `key` as its name here, and only here.
    pub fn entry(mut self, key: impl Into<String>, definition: EntryDefinition) -> Self {
        let key = key.into();
        let entry = definition.attach(&key);
        self.entries.insert(key, entry);
        self
    }

    /// Freezes the entity.
    pub fn build(self) -> Entity {
        Entity(Arc::new(EntityData {
            name: self.name,
            entries: self.entries,
        }))
    }
}

////////////////////////////////////////////// Builders ///////////////////////////////////////////////

/// An entry that has not yet been attached to an entity.
pub enum EntryDefinition {
    /// See [`field`].
    Field(FieldEntryBuilder),
    /// See [`object`].
    Object(Entity, NestedEntryBuilder),
    /// See [`list`].
    List(Entity, NestedEntryBuilder),
    /// See [`recursive_list`].
    RecursiveList(NestedEntryBuilder),
}

impl EntryDefinition {
    fn attach(self, key: &str) -> Entry {
        match self {
            EntryDefinition::Field(builder) => Entry::Field(Arc::new(builder.build(key))),
            EntryDefinition::Object(entity, builder) => Entry::Object(ObjectEntry {
                entity,
                meta: builder.meta,
            }),
            EntryDefinition::List(entity, builder) => Entry::List(ListEntry {
                entity,
                meta: builder.meta,
            }),
            EntryDefinition::RecursiveList(builder) => {
                Entry::RecursiveList(RecursiveListEntry { meta: builder.meta })
            }
        }
    }
}

/// Chainable configuration of a field entry.
pub struct FieldEntryBuilder {
    domain: Domain,
    is_required: bool,
    name: Option<String>,
    label: Option<String>,
    comment: Option<String>,
    default_value: Option<Value>,
}

impl FieldEntryBuilder {
    /// Display label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Marks the field as optional.
    pub fn optional(mut self) -> Self {
        self.is_required = false;
        self
    }

    /// Free-form description.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Initial value of store nodes.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Explicit field name, kept regardless of the mapping key.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn build(self, key: &str) -> FieldEntry {
        let name = self.name.unwrap_or_else(|| key.to_string());
        FieldEntry {
            label: self.label.unwrap_or_else(|| name.clone()),
            name,
            domain: self.domain,
            is_required: self.is_required,
            comment: self.comment,
            default_value: self.default_value,
        }
    }
}

/// Chainable configuration of an object or list entry.
pub struct NestedEntryBuilder {
    meta: NestedMeta,
}

impl NestedEntryBuilder {
    fn new() -> Self {
        Self {
            meta: NestedMeta {
                is_required: true,
                label: None,
                comment: None,
            },
        }
    }

    /// Display label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.meta.label = Some(label.into());
        self
    }

    /// Marks the entry as optional.
    pub fn optional(mut self) -> Self {
        self.meta.is_required = false;
        self
    }

    /// Free-form description.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.meta.comment = Some(comment.into());
        self
    }
}

/// Declares a field bound to `domain`.
pub fn field(
    domain: &Domain,
    configure: impl FnOnce(FieldEntryBuilder) -> FieldEntryBuilder,
) -> EntryDefinition {
    EntryDefinition::Field(configure(FieldEntryBuilder {
        domain: domain.clone(),
        is_required: true,
        name: None,
        label: None,
        comment: None,
        default_value: None,
    }))
}

/// Declares a single nested record.
pub fn object(
    entity: &Entity,
    configure: impl FnOnce(NestedEntryBuilder) -> NestedEntryBuilder,
) -> EntryDefinition {
    EntryDefinition::Object(entity.clone(), configure(NestedEntryBuilder::new()))
}

/// Declares a list of nested records.
pub fn list(
    entity: &Entity,
    configure: impl FnOnce(NestedEntryBuilder) -> NestedEntryBuilder,
) -> EntryDefinition {
    EntryDefinition::List(entity.clone(), configure(NestedEntryBuilder::new()))
}

/// Declares a list of records of the enclosing entity.
pub fn recursive_list(
    configure: impl FnOnce(NestedEntryBuilder) -> NestedEntryBuilder,
) -> EntryDefinition {
    EntryDefinition::RecursiveList(configure(NestedEntryBuilder::new()))
}

/// Named entities.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: IndexMap<String, Entity>,
}

impl EntityRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `entity` under `name`.
    pub fn insert(&mut self, name: impl Into<String>, entity: Entity) -> Option<Entity> {
        self.entities.insert(name.into(), entity)
    }

    /// Looks up an entity.
    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    /// Iterates over entities in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entity)> {
        self.entities.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaKind;
    use serde_json::json;

    fn string_domain() -> Domain {
        Domain::builder(SchemaKind::String).build()
    }

    #[test]
    fn field_name_defaults_to_key() {
        let d = string_domain();
        let e = Entity::builder("E")
            .entry("code", field(&d, |f| f))
            .build();
        let code = e.field("code").unwrap();
        assert_eq!(code.name, "code");
        assert_eq!(code.label, "code");
        assert!(code.is_required);
    }

    #[test]
    fn explicit_name_is_kept() {
        let d = string_domain();
        let e = Entity::builder("E")
            .entry("code", field(&d, |f| f.name("x").label("Code")))
            .build();
        let code = e.field("code").unwrap();
        assert_eq!(code.name, "x");
        assert_eq!(code.label, "Code");
    }

    #[test]
    fn field_options() {
        let d = string_domain();
        let e = Entity::anonymous()
            .entry(
                "libelle",
                field(&d, |f| f.optional().comment("free text").default_value("n/a")),
            )
            .build();
        let libelle = e.field("libelle").unwrap();
        assert!(!libelle.is_required);
        assert_eq!(libelle.comment.as_deref(), Some("free text"));
        assert_eq!(libelle.default_value, Some(json!("n/a")));
        assert!(libelle.domain.ptr_eq(&d));
        assert_eq!(e.name(), None);
    }

    #[test]
    fn nested_entries_default_to_required() {
        let d = string_domain();
        let line = Entity::builder("Line").entry("id", field(&d, |f| f)).build();
        let e = Entity::builder("Order")
            .entry("main", object(&line, |o| o.label("Main line")))
            .entry("lines", list(&line, |l| l.optional()))
            .entry("children", recursive_list(|l| l.comment("sub-orders")))
            .build();
        assert!(e.entry("main").unwrap().is_required());
        assert_eq!(e.entry("main").unwrap().label(), Some("Main line"));
        assert!(!e.entry("lines").unwrap().is_required());
        assert!(matches!(e.entry("children"), Some(Entry::RecursiveList(_))));
        match e.entry("lines") {
            Some(Entry::List(l)) => assert!(l.entity.ptr_eq(&line)),
            other => panic!("expected a list entry, got {other:?}"),
        }
        assert_eq!(
            e.entries().map(|(k, _)| k).collect::<Vec<_>>(),
            vec!["main", "lines", "children"]
        );
    }
}
