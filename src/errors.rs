//! Error types for focus4 operations.
//!
//! Validation failures are data, not errors: they live in the form's error tree.
//! What is here is what callers must handle: failed service calls and broken
//! model configuration.

use std::path::PathBuf;

/// Error returned by a user-supplied load or save service.
pub type ServiceError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by load and save orchestration.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// The registration has no service for this action.
    #[error("no {action} service configured")]
    MissingService {
        /// The action that was attempted.
        action: &'static str,
    },
    /// The service call failed; the store node was left untouched.
    #[error("{action} service failed: {source}")]
    Service {
        /// The action that was attempted.
        action: &'static str,
        /// The service's error.
        #[source]
        source: ServiceError,
    },
}

/// Errors raised while loading a model configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("could not read {path}: {source}")]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The YAML does not describe a model.
    #[error("invalid model configuration: {0}")]
    Parse(#[from] serde_yml::Error),
    /// A validator's expression does not compile.
    #[error("domain {domain}: invalid regex: {source}")]
    InvalidRegex {
        /// The domain declaring the validator.
        domain: String,
        /// The compiler's error.
        #[source]
        source: regex::Error,
    },
    /// A field refers to a domain that is not declared.
    #[error("entity {entity}, entry {entry}: unknown domain {domain}")]
    UnknownDomain {
        /// The entity declaring the field.
        entity: String,
        /// The field.
        entry: String,
        /// The missing domain.
        domain: String,
    },
    /// An object or list entry refers to an entity that is not declared.
    #[error("entity {entity}, entry {entry}: unknown entity {target}")]
    UnknownEntity {
        /// The entity declaring the entry.
        entity: String,
        /// The entry.
        entry: String,
        /// The missing entity.
        target: String,
    },
    /// Entities refer to each other in a loop.
    #[error("entity reference cycle through {}", .entities.join(" -> "))]
    Cycle {
        /// Entities on the loop, in reference order.
        entities: Vec<String>,
    },
}
