//! Model configuration.
//!
//! Domains and entities can be declared in a YAML file instead of code:
//!
//! ```yaml
//! messages:
//!   required: Champ obligatoire
//! domains:
//!   CODE:
//!     schema: string
//!     validators:
//!       - type: string_length
//!         max: 3
//!     components:
//!       input: TextInput
//!   LIBELLE:
//!     schema: string
//! entities:
//!   Operation:
//!     code:
//!       type: field
//!       domain: CODE
//!       label: Code
//!     libelle:
//!       type: field
//!       domain: LIBELLE
//!       optional: true
//!     children:
//!       type: recursive_list
//! ```
//!
//! [`ModelConfig::build`] resolves the declarations into a [`Model`]. Entity
//! references are resolved in dependency order; a loop between entities is an
//! error, only `recursive_list` may refer to its own entity.

use std::path::Path;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::domain::{Domain, DomainComponents, DomainRegistry};
use crate::entity::{
    Entity, EntityRegistry, EntryDefinition, NestedEntryBuilder, field, list, object, recursive_list,
};
use crate::errors::ConfigError;
use crate::schema::SchemaKind;
use crate::validate::{ValidationMessages, Validator};

/// Declaration of a validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidatorConfig {
    /// See [`Validator::Number`].
    Number {
        /// Inclusive lower bound.
        #[serde(default)]
        min: Option<f64>,
        /// Inclusive upper bound.
        #[serde(default)]
        max: Option<f64>,
        /// Reject values with a fractional part.
        #[serde(default)]
        integer: bool,
        /// Maximum number of decimal digits.
        #[serde(default)]
        max_decimals: Option<u32>,
        /// Message override.
        #[serde(default)]
        message: Option<String>,
    },
    /// See [`Validator::StringLength`].
    StringLength {
        /// Minimum length.
        #[serde(default)]
        min: Option<usize>,
        /// Maximum length.
        #[serde(default)]
        max: Option<usize>,
        /// Message override.
        #[serde(default)]
        message: Option<String>,
    },
    /// See [`Validator::Regex`].
    Regex {
        /// The expression.
        pattern: String,
        /// Message override.
        #[serde(default)]
        message: Option<String>,
    },
    /// See [`Validator::Email`].
    Email {
        /// Message override.
        #[serde(default)]
        message: Option<String>,
    },
    /// See [`Validator::Date`].
    Date {
        /// Message override.
        #[serde(default)]
        message: Option<String>,
    },
}

impl ValidatorConfig {
    fn build(&self, domain: &str) -> Result<Validator, ConfigError> {
        let (validator, message) = match self {
            ValidatorConfig::Number {
                min,
                max,
                integer,
                max_decimals,
                message,
            } => (
                Validator::Number {
                    min: *min,
                    max: *max,
                    is_integer: *integer,
                    max_decimals: *max_decimals,
                    message: None,
                },
                message,
            ),
            ValidatorConfig::StringLength { min, max, message } => {
                (Validator::string_length(*min, *max), message)
            }
            ValidatorConfig::Regex { pattern, message } => {
                let regex = Regex::new(pattern).map_err(|source| ConfigError::InvalidRegex {
                    domain: domain.to_string(),
                    source,
                })?;
                (Validator::regex(regex), message)
            }
            ValidatorConfig::Email { message } => (Validator::email(), message),
            ValidatorConfig::Date { message } => (Validator::date(), message),
        };
        Ok(match message {
            Some(message) => validator.with_message(message.clone()),
            None => validator,
        })
    }
}

/// Declaration of a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Kind of the values.
    pub schema: SchemaKind,
    /// Validators, in evaluation order.
    #[serde(default)]
    pub validators: Vec<ValidatorConfig>,
    /// Message reported when a required field is empty.
    #[serde(default)]
    pub required_message: Option<String>,
    /// Widget names.
    #[serde(default)]
    pub components: DomainComponents,
    /// Properties handed to the input widget.
    #[serde(default)]
    pub input_props: Map<String, Value>,
}

/// Declaration of an entity entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryConfig {
    /// A field bound to a domain.
    Field {
        /// Domain name.
        domain: String,
        /// The field may be empty.
        #[serde(default)]
        optional: bool,
        /// Explicit name.
        #[serde(default)]
        name: Option<String>,
        /// Display label.
        #[serde(default)]
        label: Option<String>,
        /// Free-form description.
        #[serde(default)]
        comment: Option<String>,
        /// Value of a fresh store node.
        #[serde(default)]
        default_value: Option<Value>,
    },
    /// A nested record.
    Object {
        /// Entity name.
        entity: String,
        /// The record may be absent.
        #[serde(default)]
        optional: bool,
        /// Display label.
        #[serde(default)]
        label: Option<String>,
        /// Free-form description.
        #[serde(default)]
        comment: Option<String>,
    },
    /// A list of nested records.
    List {
        /// Entity name.
        entity: String,
        /// The list may be empty.
        #[serde(default)]
        optional: bool,
        /// Display label.
        #[serde(default)]
        label: Option<String>,
        /// Free-form description.
        #[serde(default)]
        comment: Option<String>,
    },
    /// A list of records of the enclosing entity.
    RecursiveList {
        /// The list may be empty.
        #[serde(default)]
        optional: bool,
        /// Display label.
        #[serde(default)]
        label: Option<String>,
        /// Free-form description.
        #[serde(default)]
        comment: Option<String>,
    },
}

/// A whole model file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Default validation messages of every domain.
    pub messages: ValidationMessages,
    /// Domains by name.
    pub domains: IndexMap<String, DomainConfig>,
    /// Entities by name, entries in declaration order.
    pub entities: IndexMap<String, IndexMap<String, EntryConfig>>,
}

/// Domains and entities resolved from a [`ModelConfig`].
#[derive(Debug, Clone, Default)]
pub struct Model {
    /// Resolved domains.
    pub domains: DomainRegistry,
    /// Resolved entities.
    pub entities: EntityRegistry,
}

impl ModelConfig {
    /// Parses a YAML model.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Reads and parses a YAML model file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    /// Resolves domains and entities.
    pub fn build(&self) -> Result<Model, ConfigError> {
        let mut domains = DomainRegistry::new();
        for (name, config) in &self.domains {
            let validators = config
                .validators
                .iter()
                .map(|v| v.build(name))
                .collect::<Result<Vec<_>, _>>()?;
            let mut builder = Domain::builder(config.schema.clone())
                .validators(validators)
                .messages(self.messages.clone())
                .components(config.components.clone());
            if let Some(message) = &config.required_message {
                builder = builder.required_message(message.clone());
            }
            for (key, value) in &config.input_props {
                builder = builder.input_prop(key.clone(), value.clone());
            }
            domains.insert(name.clone(), builder.build());
        }

        let mut entities = EntityRegistry::new();
        for name in self.entities.keys() {
            let mut visiting = Vec::new();
            self.resolve_entity(name, &domains, &mut entities, &mut visiting)?;
        }
        info!(
            domains = domains.len(),
            entities = entities.len(),
            "model resolved"
        );
        Ok(Model { domains, entities })
    }

    fn resolve_entity(
        &self,
        name: &str,
        domains: &DomainRegistry,
        built: &mut EntityRegistry,
        visiting: &mut Vec<String>,
    ) -> Result<Entity, ConfigError> {
        if let Some(entity) = built.get(name) {
            return Ok(entity.clone());
        }
        if let Some(start) = visiting.iter().position(|n| n == name) {
            let mut entities = visiting[start..].to_vec();
            entities.push(name.to_string());
            return Err(ConfigError::Cycle { entities });
        }
        let Some(entries) = self.entities.get(name) else {
            return Err(ConfigError::UnknownEntity {
                entity: visiting.last().cloned().unwrap_or_default(),
                entry: String::new(),
                target: name.to_string(),
            });
        };

        visiting.push(name.to_string());
        let mut builder = Entity::builder(name);
        for (key, entry) in entries {
            let definition = self.resolve_entry(name, key, entry, domains, built, visiting)?;
            builder = builder.entry(key.clone(), definition);
        }
        visiting.pop();

        let entity = builder.build();
        debug!(entity = name, entries = entity.len(), "entity resolved");
        built.insert(name, entity.clone());
        Ok(entity)
    }

    fn resolve_entry(
        &self,
        entity: &str,
        key: &str,
        entry: &EntryConfig,
        domains: &DomainRegistry,
        built: &mut EntityRegistry,
        visiting: &mut Vec<String>,
    ) -> Result<EntryDefinition, ConfigError> {
        let mut nested = |target: &str| {
            if !self.entities.contains_key(target) {
                return Err(ConfigError::UnknownEntity {
                    entity: entity.to_string(),
                    entry: key.to_string(),
                    target: target.to_string(),
                });
            }
            self.resolve_entity(target, domains, built, visiting)
        };
        Ok(match entry {
            EntryConfig::Field {
                domain,
                optional,
                name,
                label,
                comment,
                default_value,
            } => {
                let Some(domain) = domains.get(domain) else {
                    return Err(ConfigError::UnknownDomain {
                        entity: entity.to_string(),
                        entry: key.to_string(),
                        domain: domain.clone(),
                    });
                };
                field(domain, |mut f| {
                    if *optional {
                        f = f.optional();
                    }
                    if let Some(name) = name {
                        f = f.name(name.clone());
                    }
                    if let Some(label) = label {
                        f = f.label(label.clone());
                    }
                    if let Some(comment) = comment {
                        f = f.comment(comment.clone());
                    }
                    if let Some(value) = default_value {
                        f = f.default_value(value.clone());
                    }
                    f
                })
            }
            EntryConfig::Object {
                entity: target,
                optional,
                label,
                comment,
            } => {
                let target = nested(target)?;
                object(&target, |o| nested_meta(o, *optional, label, comment))
            }
            EntryConfig::List {
                entity: target,
                optional,
                label,
                comment,
            } => {
                let target = nested(target)?;
                list(&target, |l| nested_meta(l, *optional, label, comment))
            }
            EntryConfig::RecursiveList {
                optional,
                label,
                comment,
            } => recursive_list(|l| nested_meta(l, *optional, label, comment)),
        })
    }
}

fn nested_meta(
    mut builder: NestedEntryBuilder,
    optional: bool,
    label: &Option<String>,
    comment: &Option<String>,
) -> NestedEntryBuilder {
    if optional {
        builder = builder.optional();
    }
    if let Some(label) = label {
        builder = builder.label(label.clone());
    }
    if let Some(comment) = comment {
        builder = builder.comment(comment.clone());
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entry;
    use crate::store::StoreNode;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const MODEL: &str = r#"
messages:
  required: Champ obligatoire
domains:
  CODE:
    schema: string
    validators:
      - type: string_length
        max: 3
      - type: regex
        pattern: "^[A-Z]+$"
        message: Majuscules uniquement
    components:
      input: TextInput
    input_props:
      maxLength: 3
  LIBELLE:
    schema: string
  MONTANT:
    schema: number
    validators:
      - type: number
        min: 0
        max_decimals: 2
entities:
  Operation:
    code:
      type: field
      domain: CODE
      label: Code
    libelle:
      type: field
      domain: LIBELLE
      optional: true
      name: label
    status:
      type: field
      domain: LIBELLE
      optional: true
      default_value: DRAFT
    lines:
      type: list
      entity: Line
      label: Lignes
  Line:
    amount:
      type: field
      domain: MONTANT
  Tree:
    label:
      type: field
      domain: LIBELLE
    children:
      type: recursive_list
      optional: true
"#;

    #[test]
    fn builds_domains_and_entities() {
        let model = ModelConfig::from_yaml(MODEL).unwrap().build().unwrap();
        assert_eq!(model.domains.len(), 3);
        assert_eq!(model.entities.len(), 3);

        let code = model.domains.get("CODE").unwrap();
        assert_eq!(code.components().input.as_deref(), Some("TextInput"));
        assert_eq!(code.input_props()["maxLength"], json!(3));
        assert_eq!(code.validate(&json!("ab"), true).as_deref(), Some("Majuscules uniquement"));
        assert_eq!(code.validate(&Value::Null, true).as_deref(), Some("Champ obligatoire"));

        let operation = model.entities.get("Operation").unwrap();
        let keys: Vec<&str> = operation.entries().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["code", "libelle", "status", "lines"]);
        let code = operation.field("code").unwrap();
        assert!(code.is_required);
        assert_eq!(code.label, "Code");
        let libelle = operation.field("libelle").unwrap();
        assert!(!libelle.is_required);
        assert_eq!(libelle.name, "label");
        assert!(matches!(operation.entry("lines"), Some(Entry::List(l)) if l.entity.ptr_eq(model.entities.get("Line").unwrap())));

        let store = StoreNode::new(operation);
        assert_eq!(store.field("status").unwrap().value(), json!("DRAFT"));
    }

    #[test]
    fn number_validators_keep_their_options() {
        let model = ModelConfig::from_yaml(MODEL).unwrap().build().unwrap();
        let amount = model.domains.get("MONTANT").unwrap();
        assert_eq!(amount.validate(&json!(1.25), true), None);
        assert_eq!(
            amount.validate(&json!(1.255), true).as_deref(),
            Some("Value must have at most 2 decimals")
        );
        assert_eq!(amount.validate(&json!(-1), true).as_deref(), Some("Value must be at least 0"));
    }

    #[test]
    fn unknown_domains_are_rejected() {
        let yaml = r#"
entities:
  Operation:
    code:
      type: field
      domain: MISSING
"#;
        let err = ModelConfig::from_yaml(yaml).unwrap().build().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDomain { ref domain, .. } if domain == "MISSING"));
    }

    #[test]
    fn unknown_entities_are_rejected() {
        let yaml = r#"
entities:
  Operation:
    address:
      type: object
      entity: Address
"#;
        let err = ModelConfig::from_yaml(yaml).unwrap().build().unwrap_err();
        assert_eq!(
            err.to_string(),
            "entity Operation, entry address: unknown entity Address"
        );
    }

    #[test]
    fn invalid_regexes_are_rejected() {
        let yaml = r#"
domains:
  CODE:
    schema: string
    validators:
      - type: regex
        pattern: "([A-Z"
"#;
        let err = ModelConfig::from_yaml(yaml).unwrap().build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRegex { ref domain, .. } if domain == "CODE"));
    }

    #[test]
    fn entity_cycles_are_rejected() {
        let yaml = r#"
entities:
  A:
    b:
      type: object
      entity: B
  B:
    a:
      type: list
      entity: A
"#;
        let err = ModelConfig::from_yaml(yaml).unwrap().build().unwrap_err();
        match err {
            ConfigError::Cycle { entities } => assert_eq!(entities, vec!["A", "B", "A"]),
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = ModelConfig::from_yaml("domains: [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        let err = ModelConfig::from_yaml("domains:\n  CODE:\n    schema: text\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
