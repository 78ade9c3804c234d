//! # Focus4: Reactive Entity Stores and Forms
//!
//! Focus4 binds typed business records to editable forms. A record's shape is
//! declared once, as an [`Entity`] built from [`Domain`]s, and the same
//! declaration drives the in-memory store, the form that edits it and the
//! validation of every field.
//!
//! This crate provides:
//!
//! - **Domains**: the type, validators, formatters and presentation hints shared
//!   by every field that uses them
//! - **Entities**: named collections of fields, nested objects and lists
//! - **Store nodes**: observable trees of values shaped after an entity, filled
//!   from and flattened back to JSON
//! - **Form nodes**: editable clones of store nodes with an edit mode, per-field
//!   errors and automatic resync when the store changes
//! - **Loads and actions**: asynchronous services that fill store nodes and save
//!   forms back
//! - **Models**: YAML declarations of domains and entities
//!
//! ## Core Concepts
//!
//! ### Reactivity
//! Every value lives in an [`Observable`]. Reads inside a [`Computed`] or a
//! [`reaction`] are recorded, and writes re-run what depends on them. Writes
//! grouped in an [`action`] notify once, when the outermost action ends.
//!
//! ### Values
//! Records travel as [`serde_json::Value`]. `null` stands for "no value": a
//! cleared field is `null`, and flattening a node omits its `null` fields.
//!
//! ### Forms
//! A form node owns a copy of its source's values. Edits stay in the form until
//! they are saved, while any change to the source replaces the form's values.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Loads and form actions (async services) │
//! ├─────────────────────────────────────────┤
//! │ Form nodes (edit mode, errors, resync)  │
//! ├─────────────────────────────────────────┤
//! │ Store nodes (observable value trees)    │
//! ├─────────────────────────────────────────┤
//! │ Entities and domains (YAML models)      │
//! ├─────────────────────────────────────────┤
//! │ Observables (computeds and reactions)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage Example
//!
//! ```rust
//! use focus4::{Domain, Entity, SchemaKind, Scope, StoreNode, Validator, field, list, make_form_node};
//! use serde_json::json;
//!
//! let code = Domain::builder(SchemaKind::String)
//!     .validator(Validator::string_length(None, Some(3)))
//!     .build();
//! let amount = Domain::builder(SchemaKind::Number).build();
//! let line = Entity::builder("Line").entry("amount", field(&amount, |f| f)).build();
//! let operation = Entity::builder("Operation")
//!     .entry("code", field(&code, |f| f.label("Code")))
//!     .entry("lines", list(&line, |l| l))
//!     .build();
//!
//! let store = StoreNode::new(&operation);
//! store.set(&json!({"code": "ABC", "lines": [{"amount": 10}]}));
//!
//! let scope = Scope::new();
//! let form = make_form_node(&scope, &store, |b| b.edit(true));
//! form.field("code").unwrap().set_value("ABCD");
//! assert!(!form.is_valid());
//! assert_eq!(store.field("code").unwrap().value(), json!("ABC"));
//!
//! store.set(&json!({"code": "XYZ"}));
//! assert_eq!(form.field("code").unwrap().value(), json!("XYZ"));
//! assert!(form.is_valid());
//! ```
//!
//! ## Command Line Tools
//!
//! - `validate-record`: checks JSON records against an entity of a YAML model

#![warn(missing_docs)]
mod actions;
mod config;
mod domain;
mod entity;
mod errors;
mod form;
mod load;
mod schema;
mod store;
#[cfg(test)]
mod test_utils;
mod validate;

/// Single-threaded reactive runtime.
///
/// This module provides observable cells, cached computed values, reactions and
/// the scopes that dispose them together.
pub mod observable;

// CLI utility modules

/// Command-line interface utilities for program termination and output formatting.
///
/// This module provides model loading, record reading and error reporting for the
/// focus4 binaries.
pub mod cli_utils;

pub use actions::{FormActions, FormActionsBuilder, SaveOutcome};
pub use config::{DomainConfig, EntryConfig, Model, ModelConfig, ValidatorConfig};
pub use domain::{DisplayFormatter, Domain, DomainBuilder, DomainComponents, DomainRegistry};
pub use entity::{
    Entity, EntityBuilder, EntityRegistry, Entry, EntryDefinition, FieldEntry, FieldEntryBuilder,
    ListEntry, NestedEntryBuilder, NestedMeta, ObjectEntry, RecursiveListEntry, field, list,
    object, recursive_list,
};
pub use errors::{ActionError, ConfigError, ServiceError};
pub use form::{
    EntryErrors, FormEntry, FormField, FormFieldBuilder, FormListNode, FormListNodeBuilder,
    FormNode, FormNodeBuilder, FormState, NodeErrors, flatten_errors, make_form_list_node,
    make_form_node,
};
pub use load::{
    LoadBuilder, LoadOutcome, LoadRegistration, LoadTarget, ServiceFuture, register_load,
};
pub use observable::{
    Computed, Disposer, Observable, Reaction, Scope, action, autorun, reaction, untracked,
};
pub use schema::{
    SchemaError, SchemaKind, schema_output_to_string, string_to_schema_output, value_type,
};
pub use store::{StoreEntry, StoreField, StoreListNode, StoreNode, build_node};
pub use validate::{
    ValidationMessages, Validator, ValidatorFn, is_empty_value, validate_field,
    validate_field_with,
};
