//! # Domains
//!
//! A [`Domain`] describes the rules shared by every field holding the same kind of
//! primitive value: its schema, its validators, how it is displayed and which
//! widgets render it. Domains are created once at configuration time and shared by
//! reference; [`Domain::extend`] derives a new domain instead of mutating one.
//!
//! ```rust
//! use focus4::{Domain, SchemaKind, Validator};
//! use serde_json::json;
//!
//! let code = Domain::builder(SchemaKind::String)
//!     .validator(Validator::string_length(None, Some(3)))
//!     .input_component("TextInput")
//!     .build();
//! let short_code = code.extend(|d| d.validator(Validator::string_length(Some(2), None)));
//!
//! assert_eq!(code.validators().len(), 1);
//! assert_eq!(short_code.validators().len(), 2);
//! assert_eq!(short_code.components().input.as_deref(), Some("TextInput"));
//! assert_eq!(code.format(&json!("ABC")), "ABC");
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::{SchemaKind, schema_output_to_string};
use crate::validate::{ValidationMessages, Validator, validate_field_with};

/// Renders a value for display.
pub type DisplayFormatter = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Names of the widgets used to render a domain's values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainComponents {
    /// Edit widget.
    pub input: Option<String>,
    /// Read-only widget.
    pub display: Option<String>,
    /// Label widget.
    pub label: Option<String>,
    /// Select widget, for values chosen from a list.
    pub select: Option<String>,
    /// Autocomplete widget.
    pub autocomplete: Option<String>,
}

struct DomainData {
    schema: SchemaKind,
    validators: Vec<Validator>,
    checks: Vec<Validator>,
    required_message: Option<String>,
    messages: Arc<ValidationMessages>,
    display_formatter: Option<DisplayFormatter>,
    components: DomainComponents,
    input_props: Map<String, Value>,
}

/// Shared validation, formatting and display rules for a primitive value.
#[derive(Clone)]
pub struct Domain(Arc<DomainData>);

impl std::fmt::Debug for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Domain")
            .field("schema", &self.0.schema)
            .field("validators", &self.0.validators)
            .field("components", &self.0.components)
            .finish_non_exhaustive()
    }
}

impl Domain {
    /// Starts a domain over values of `schema`.
    pub fn builder(schema: SchemaKind) -> DomainBuilder {
        DomainBuilder {
            schema,
            validators: Vec::new(),
            required_message: None,
            messages: Arc::new(ValidationMessages::default()),
            display_formatter: None,
            components: DomainComponents::default(),
            input_props: Map::new(),
        }
    }

    /// Derives a new domain from this one; this domain is left untouched.
    pub fn extend(&self, configure: impl FnOnce(DomainBuilder) -> DomainBuilder) -> Domain {
        let data = &self.0;
        configure(DomainBuilder {
            schema: data.schema.clone(),
            validators: data.validators.clone(),
            required_message: data.required_message.clone(),
            messages: Arc::clone(&data.messages),
            display_formatter: data.display_formatter.clone(),
            components: data.components.clone(),
            input_props: data.input_props.clone(),
        })
        .build()
    }

    /// Schema kind of the domain's values.
    pub fn schema(&self) -> &SchemaKind {
        &self.0.schema
    }

    /// Validators declared on the domain.
    pub fn validators(&self) -> &[Validator] {
        &self.0.validators
    }

    /// The schema type check followed by the declared validators.
    pub fn checks(&self) -> &[Validator] {
        &self.0.checks
    }

    /// Message reported when a required field of this domain is empty.
    pub fn required_message(&self) -> Option<&str> {
        self.0.required_message.as_deref()
    }

    /// Default messages of the validators.
    pub fn messages(&self) -> &ValidationMessages {
        &self.0.messages
    }

    /// Validates a value of this domain.
    pub fn validate(&self, value: &Value, is_required: bool) -> Option<String> {
        validate_field_with(
            value,
            is_required,
            &self.0.checks,
            &self.0.messages,
            self.0.required_message.as_deref(),
        )
    }

    /// Widget names.
    pub fn components(&self) -> &DomainComponents {
        &self.0.components
    }

    /// Extra properties handed to the input widget.
    pub fn input_props(&self) -> &Map<String, Value> {
        &self.0.input_props
    }

    /// Formats `value` for display.
    pub fn format(&self, value: &Value) -> String {
        match &self.0.display_formatter {
            Some(formatter) => formatter(value),
            None => schema_output_to_string(value, &self.0.schema).unwrap_or_default(),
        }
    }

    /// True if both handles refer to the same domain.
    pub fn ptr_eq(&self, other: &Domain) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Chainable configuration for a [`Domain`].
pub struct DomainBuilder {
    schema: SchemaKind,
    validators: Vec<Validator>,
    required_message: Option<String>,
    messages: Arc<ValidationMessages>,
    display_formatter: Option<DisplayFormatter>,
    components: DomainComponents,
    input_props: Map<String, Value>,
}

impl DomainBuilder {
    /// Appends a validator.
    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Replaces every validator.
    pub fn validators(mut self, validators: Vec<Validator>) -> Self {
        self.validators = validators;
        self
    }

    /// Message reported when a required field is empty.
    pub fn required_message(mut self, message: impl Into<String>) -> Self {
        self.required_message = Some(message.into());
        self
    }

    /// Default messages of the validators.
    pub fn messages(mut self, messages: ValidationMessages) -> Self {
        self.messages = Arc::new(messages);
        self
    }

    /// Display formatter.
    pub fn display_formatter(mut self, f: impl Fn(&Value) -> String + Send + Sync + 'static) -> Self {
        self.display_formatter = Some(Arc::new(f));
        self
    }

    /// Replaces every widget name.
    pub fn components(mut self, components: DomainComponents) -> Self {
        self.components = components;
        self
    }

    /// Edit widget.
    pub fn input_component(mut self, name: impl Into<String>) -> Self {
        self.components.input = Some(name.into());
        self
    }

    /// Read-only widget.
    pub fn display_component(mut self, name: impl Into<String>) -> Self {
        self.components.display = Some(name.into());
        self
    }

    /// Label widget.
    pub fn label_component(mut self, name: impl Into<String>) -> Self {
        self.components.label = Some(name.into());
        self
    }

    /// Select widget.
    pub fn select_component(mut self, name: impl Into<String>) -> Self {
        self.components.select = Some(name.into());
        self
    }

    /// Autocomplete widget.
    pub fn autocomplete_component(mut self, name: impl Into<String>) -> Self {
        self.components.autocomplete = Some(name.into());
        self
    }

    /// Sets one input widget property, merged over the existing ones.
    pub fn input_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.input_props.insert(key.into(), value.into());
        self
    }

    /// Freezes the domain.
    pub fn build(self) -> Domain {
        let mut checks = Vec::with_capacity(self.validators.len() + 1);
        if self.schema != SchemaKind::Any {
            checks.push(Validator::of_type(self.schema.clone()));
        }
        checks.extend(self.validators.iter().cloned());
        Domain(Arc::new(DomainData {
            schema: self.schema,
            validators: self.validators,
            checks,
            required_message: self.required_message,
            messages: self.messages,
            display_formatter: self.display_formatter,
            components: self.components,
            input_props: self.input_props,
        }))
    }
}

/// Named domains, shared across entity definitions.
#[derive(Debug, Clone, Default)]
pub struct DomainRegistry {
    domains: BTreeMap<String, Domain>,
}

impl DomainRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `domain` under `name`, returning the domain it replaced.
    pub fn insert(&mut self, name: impl Into<String>, domain: Domain) -> Option<Domain> {
        self.domains.insert(name.into(), domain)
    }

    /// Looks up a domain.
    pub fn get(&self, name: &str) -> Option<&Domain> {
        self.domains.get(name)
    }

    /// Iterates over domains in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Domain)> {
        self.domains.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of registered domains.
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn checks_prepend_the_schema_type() {
        let domain = Domain::builder(SchemaKind::Number)
            .validator(Validator::number(Some(0.0), None))
            .build();
        assert_eq!(domain.validators().len(), 1);
        assert_eq!(domain.checks().len(), 2);
        assert!(matches!(domain.checks()[0], Validator::Type { .. }));

        let any = Domain::builder(SchemaKind::Any).build();
        assert!(any.checks().is_empty());
    }

    #[test]
    fn extend_leaves_the_original_untouched() {
        let base = Domain::builder(SchemaKind::String)
            .input_prop("maxLength", 10)
            .build();
        let derived = base.extend(|d| d.input_prop("placeholder", "Code").required_message("Code?"));
        assert_eq!(base.input_props().len(), 1);
        assert_eq!(base.required_message(), None);
        assert_eq!(derived.input_props().len(), 2);
        assert_eq!(derived.input_props()["maxLength"], json!(10));
        assert_eq!(derived.required_message(), Some("Code?"));
        assert!(!base.ptr_eq(&derived));
    }

    #[test]
    fn format_uses_the_formatter_when_present() {
        let amount = Domain::builder(SchemaKind::Number)
            .display_formatter(|v| format!("{} €", v))
            .build();
        assert_eq!(amount.format(&json!(12.5)), "12.5 €");
        let plain = Domain::builder(SchemaKind::Boolean).build();
        assert_eq!(plain.format(&json!(true)), "true");
        assert_eq!(plain.format(&Value::Null), "");
    }

    #[test]
    fn validate_uses_domain_messages() {
        let code = Domain::builder(SchemaKind::String)
            .validator(Validator::string_length(None, Some(2)))
            .messages(ValidationMessages {
                max_length: "{max} max".to_string(),
                ..ValidationMessages::default()
            })
            .required_message("Code manquant")
            .build();
        assert_eq!(code.validate(&json!("abc"), true).as_deref(), Some("2 max"));
        assert_eq!(code.validate(&Value::Null, true).as_deref(), Some("Code manquant"));
        assert_eq!(code.validate(&json!(12), true).as_deref(), Some("Invalid value, expected string"));
        assert_eq!(code.validate(&json!("ab"), true), None);
    }

    #[test]
    fn registry_lookup() {
        let mut registry = DomainRegistry::new();
        assert!(registry.is_empty());
        registry.insert("CODE", Domain::builder(SchemaKind::String).build());
        assert!(registry.get("CODE").is_some());
        assert!(registry.get("LIBELLE").is_none());
        assert_eq!(registry.iter().map(|(k, _)| k).collect::<Vec<_>>(), vec!["CODE"]);
    }
}
