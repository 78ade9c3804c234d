//! # Field Validation
//!
//! Pure validation of a single field value against its required-ness and an ordered
//! list of [`Validator`]s. Validation outcomes are data: an error message or `None`.
//!
//! Evaluation order:
//!
//! 1. A required field with an empty value (`null`, blank string, empty array)
//!    fails with the "required" message; no validator is evaluated.
//! 2. An optional field with an empty value passes; no validator is evaluated.
//! 3. Otherwise each validator runs in declaration order and the first failure's
//!    message is returned.
//!
//! ```rust
//! use focus4::{Validator, validate_field};
//! use serde_json::{Value, json};
//!
//! let validators = vec![Validator::string_length(None, Some(3))];
//! assert_eq!(validate_field(&json!("abc"), true, &validators), None);
//! assert!(validate_field(&json!("abcd"), true, &validators).is_some());
//! assert!(validate_field(&Value::Null, true, &validators).is_some());
//! assert_eq!(validate_field(&Value::Null, false, &validators), None);
//! ```

use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::SchemaKind;

/// A predicate run by [`Validator::Function`].
pub type ValidatorFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A rule deciding whether a present value is acceptable.
///
/// Every variant carries an optional message that replaces the default one from
/// [`ValidationMessages`].
#[derive(Clone)]
pub enum Validator {
    /// The value must have the shape of the schema kind.
    Type {
        /// Expected kind.
        kind: SchemaKind,
        /// Message override.
        message: Option<String>,
    },
    /// Numeric range and precision.
    Number {
        /// Inclusive lower bound.
        min: Option<f64>,
        /// Inclusive upper bound.
        max: Option<f64>,
        /// Reject values with a fractional part.
        is_integer: bool,
        /// Maximum number of decimal digits.
        max_decimals: Option<u32>,
        /// Message override.
        message: Option<String>,
    },
    /// String length, counted in characters.
    StringLength {
        /// Inclusive lower bound.
        min: Option<usize>,
        /// Inclusive upper bound.
        max: Option<usize>,
        /// Message override.
        message: Option<String>,
    },
    /// The string form of the value must match the expression.
    Regex {
        /// Expression to match.
        regex: Regex,
        /// Message override.
        message: Option<String>,
    },
    /// The value must look like an e-mail address.
    Email {
        /// Message override.
        message: Option<String>,
    },
    /// The value must be an RFC 3339 timestamp or a `YYYY-MM-DD` date.
    Date {
        /// Message override.
        message: Option<String>,
    },
    /// An arbitrary predicate.
    Function {
        /// Returns true when the value is acceptable.
        check: ValidatorFn,
        /// Message override.
        message: Option<String>,
    },
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Validator::Type { kind, .. } => f.debug_tuple("Type").field(kind).finish(),
            Validator::Number {
                min,
                max,
                is_integer,
                max_decimals,
                ..
            } => f
                .debug_struct("Number")
                .field("min", min)
                .field("max", max)
                .field("is_integer", is_integer)
                .field("max_decimals", max_decimals)
                .finish(),
            Validator::StringLength { min, max, .. } => f
                .debug_struct("StringLength")
                .field("min", min)
                .field("max", max)
                .finish(),
            Validator::Regex { regex, .. } => f.debug_tuple("Regex").field(regex).finish(),
            Validator::Email { .. } => f.write_str("Email"),
            Validator::Date { .. } => f.write_str("Date"),
            Validator::Function { .. } => f.write_str("Function"),
        }
    }
}

impl Validator {
    /// Type check against a schema kind.
    pub fn of_type(kind: SchemaKind) -> Self {
        Validator::Type {
            kind,
            message: None,
        }
    }

    /// Numeric range.
    pub fn number(min: Option<f64>, max: Option<f64>) -> Self {
        Validator::Number {
            min,
            max,
            is_integer: false,
            max_decimals: None,
            message: None,
        }
    }

    /// String length bounds.
    pub fn string_length(min: Option<usize>, max: Option<usize>) -> Self {
        Validator::StringLength {
            min,
            max,
            message: None,
        }
    }

    /// Regular expression match.
    pub fn regex(regex: Regex) -> Self {
        Validator::Regex {
            regex,
            message: None,
        }
    }

    /// E-mail shape.
    pub fn email() -> Self {
        Validator::Email { message: None }
    }

    /// Date shape.
    pub fn date() -> Self {
        Validator::Date { message: None }
    }

    /// Arbitrary predicate.
    pub fn function(check: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Validator::Function {
            check: Arc::new(check),
            message: None,
        }
    }

    /// Replaces the message reported when this validator fails.
    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        let text = Some(text.into());
        match &mut self {
            Validator::Type { message, .. }
            | Validator::Number { message, .. }
            | Validator::StringLength { message, .. }
            | Validator::Regex { message, .. }
            | Validator::Email { message }
            | Validator::Date { message }
            | Validator::Function { message, .. } => *message = text,
        }
        self
    }

    fn message(&self) -> Option<&str> {
        match self {
            Validator::Type { message, .. }
            | Validator::Number { message, .. }
            | Validator::StringLength { message, .. }
            | Validator::Regex { message, .. }
            | Validator::Email { message }
            | Validator::Date { message }
            | Validator::Function { message, .. } => message.as_deref(),
        }
    }

    /// Checks a present value, returning the failure message if it is rejected.
    pub fn check(&self, value: &Value, messages: &ValidationMessages) -> Option<String> {
        let failure = match self {
            Validator::Type { kind, .. } => kind
                .check(value)
                .err()
                .map(|_| messages.invalid_type.replace("{type}", &kind.type_name())),
            Validator::Number {
                min,
                max,
                is_integer,
                max_decimals,
                ..
            } => check_number(value, *min, *max, *is_integer, *max_decimals, messages),
            Validator::StringLength { min, max, .. } => check_length(value, *min, *max, messages),
            Validator::Regex { regex, .. } => match value {
                Value::String(s) if regex.is_match(s) => None,
                Value::Number(n) if regex.is_match(&n.to_string()) => None,
                _ => Some(messages.regex.clone()),
            },
            Validator::Email { .. } => match value {
                Value::String(s) if email_regex().is_match(s) => None,
                _ => Some(messages.email.clone()),
            },
            Validator::Date { .. } => match value {
                Value::String(s) if is_date(s) => None,
                _ => Some(messages.date.clone()),
            },
            Validator::Function { check, .. } => {
                if check(value) {
                    None
                } else {
                    Some(messages.function.clone())
                }
            }
        };
        failure.map(|default| self.message().map(str::to_string).unwrap_or(default))
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("e-mail expression is valid")
    });
    &EMAIL
}

fn is_date(text: &str) -> bool {
    DateTime::parse_from_rfc3339(text).is_ok() || NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
}

fn check_number(
    value: &Value,
    min: Option<f64>,
    max: Option<f64>,
    is_integer: bool,
    max_decimals: Option<u32>,
    messages: &ValidationMessages,
) -> Option<String> {
    let Some(number) = value.as_f64() else {
        return Some(messages.invalid_type.replace("{type}", "number"));
    };
    if is_integer && number.fract() != 0.0 {
        return Some(messages.integer.clone());
    }
    if let Some(decimals) = max_decimals {
        // f64's Display never switches to exponent notation.
        let text = number.to_string();
        let actual = text.split_once('.').map(|(_, d)| d.len()).unwrap_or(0);
        if actual > decimals as usize {
            return Some(messages.decimals.replace("{decimals}", &decimals.to_string()));
        }
    }
    if let Some(min) = min {
        if number < min {
            return Some(messages.min.replace("{min}", &min.to_string()));
        }
    }
    if let Some(max) = max {
        if number > max {
            return Some(messages.max.replace("{max}", &max.to_string()));
        }
    }
    None
}

fn check_length(
    value: &Value,
    min: Option<usize>,
    max: Option<usize>,
    messages: &ValidationMessages,
) -> Option<String> {
    let Some(text) = value.as_str() else {
        return Some(messages.invalid_type.replace("{type}", "string"));
    };
    let length = text.chars().count();
    match (min, max) {
        (Some(min), _) if length < min => Some(messages.min_length.replace("{min}", &min.to_string())),
        (_, Some(max)) if length > max => Some(messages.max_length.replace("{max}", &max.to_string())),
        _ => None,
    }
}

/// Default validation messages.
///
/// Messages may contain the placeholders `{min}`, `{max}`, `{decimals}` and
/// `{type}`, substituted by the failing validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationMessages {
    /// A required field has no value.
    pub required: String,
    /// The value does not have the domain's type.
    pub invalid_type: String,
    /// The number has a fractional part.
    pub integer: String,
    /// The number has too many decimal digits.
    pub decimals: String,
    /// The number is below the minimum.
    pub min: String,
    /// The number is above the maximum.
    pub max: String,
    /// The string is too short.
    pub min_length: String,
    /// The string is too long.
    pub max_length: String,
    /// The value does not match the expression.
    pub regex: String,
    /// The value is not an e-mail address.
    pub email: String,
    /// The value is not a date.
    pub date: String,
    /// A predicate rejected the value.
    pub function: String,
}

impl Default for ValidationMessages {
    fn default() -> Self {
        Self {
            required: "Required field".to_string(),
            invalid_type: "Invalid value, expected {type}".to_string(),
            integer: "Value must be an integer".to_string(),
            decimals: "Value must have at most {decimals} decimals".to_string(),
            min: "Value must be at least {min}".to_string(),
            max: "Value must be at most {max}".to_string(),
            min_length: "Value must contain at least {min} characters".to_string(),
            max_length: "Value must contain at most {max} characters".to_string(),
            regex: "Invalid format".to_string(),
            email: "Invalid e-mail address".to_string(),
            date: "Invalid date".to_string(),
            function: "Invalid value".to_string(),
        }
    }
}

/// True for `null`, a blank string or an empty array.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Validates a field value with the default messages.
pub fn validate_field(value: &Value, is_required: bool, validators: &[Validator]) -> Option<String> {
    validate_field_with(value, is_required, validators, &ValidationMessages::default(), None)
}

/// Validates a field value.
///
/// `required_message` overrides `messages.required` for this call.
pub fn validate_field_with(
    value: &Value,
    is_required: bool,
    validators: &[Validator],
    messages: &ValidationMessages,
    required_message: Option<&str>,
) -> Option<String> {
    if is_empty_value(value) {
        return if is_required {
            Some(
                required_message
                    .map(str::to_string)
                    .unwrap_or_else(|| messages.required.clone()),
            )
        } else {
            None
        };
    }
    validators
        .iter()
        .find_map(|validator| validator.check(value, messages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn required_short_circuits_validators() {
        let calls = Arc::new(AtomicUsize::new(0));
        let recorder = {
            let calls = Arc::clone(&calls);
            Validator::function(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                true
            })
        };
        let error = validate_field(&Value::Null, true, &[recorder.clone()]);
        assert_eq!(error.as_deref(), Some("Required field"));
        assert_eq!(validate_field(&json!("   "), true, &[recorder.clone()]).as_deref(), Some("Required field"));
        assert_eq!(validate_field(&json!([]), true, &[recorder]).as_deref(), Some("Required field"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_optional_value_skips_validators() {
        let never = Validator::function(|_| panic!("validator must not run"));
        assert_eq!(validate_field(&Value::Null, false, &[never]), None);
    }

    #[test]
    fn first_failing_validator_wins() {
        let validators = vec![
            Validator::string_length(Some(2), None).with_message("too short"),
            Validator::regex(Regex::new("^[A-Z]+$").unwrap()).with_message("uppercase only"),
        ];
        assert_eq!(validate_field(&json!("a"), true, &validators).as_deref(), Some("too short"));
        assert_eq!(validate_field(&json!("ab"), true, &validators).as_deref(), Some("uppercase only"));
        assert_eq!(validate_field(&json!("AB"), true, &validators), None);
    }

    #[test]
    fn number_rules() {
        let range = [Validator::number(Some(0.0), Some(10.0))];
        assert_eq!(validate_field(&json!(5), true, &range), None);
        assert_eq!(
            validate_field(&json!(-1), true, &range).as_deref(),
            Some("Value must be at least 0")
        );
        assert_eq!(
            validate_field(&json!(11.5), true, &range).as_deref(),
            Some("Value must be at most 10")
        );

        let integer = [Validator::Number {
            min: None,
            max: None,
            is_integer: true,
            max_decimals: None,
            message: None,
        }];
        assert_eq!(
            validate_field(&json!(1.5), true, &integer).as_deref(),
            Some("Value must be an integer")
        );

        let decimals = [Validator::Number {
            min: None,
            max: None,
            is_integer: false,
            max_decimals: Some(2),
            message: None,
        }];
        assert_eq!(validate_field(&json!(1.25), true, &decimals), None);
        assert!(validate_field(&json!(1.255), true, &decimals).is_some());
        assert_eq!(
            validate_field(&json!(0.0000001), true, &decimals).as_deref(),
            Some("Value must have at most 2 decimals")
        );
        assert_eq!(validate_field(&json!(1e21), true, &decimals), None);
    }

    #[test]
    fn string_length_counts_characters() {
        let validators = [Validator::string_length(None, Some(3))];
        assert_eq!(validate_field(&json!("été"), true, &validators), None);
        assert_eq!(
            validate_field(&json!("étés"), true, &validators).as_deref(),
            Some("Value must contain at most 3 characters")
        );
    }

    #[test]
    fn email_and_date_shapes() {
        let email = [Validator::email()];
        assert_eq!(validate_field(&json!("a@b.fr"), true, &email), None);
        assert!(validate_field(&json!("not-an-email"), true, &email).is_some());

        let date = [Validator::date()];
        assert_eq!(validate_field(&json!("2024-02-29"), true, &date), None);
        assert_eq!(validate_field(&json!("2024-02-29T10:00:00Z"), true, &date), None);
        assert!(validate_field(&json!("2023-02-29"), true, &date).is_some());
    }

    #[test]
    fn type_validator_reports_expected_kind() {
        let validators = [Validator::of_type(SchemaKind::Number)];
        assert_eq!(
            validate_field(&json!("12"), true, &validators).as_deref(),
            Some("Invalid value, expected number")
        );
    }

    #[test]
    fn custom_messages_and_required_override() {
        let messages = ValidationMessages {
            required: "Obligatoire".to_string(),
            ..ValidationMessages::default()
        };
        assert_eq!(
            validate_field_with(&Value::Null, true, &[], &messages, None).as_deref(),
            Some("Obligatoire")
        );
        assert_eq!(
            validate_field_with(&Value::Null, true, &[], &messages, Some("Code manquant")).as_deref(),
            Some("Code manquant")
        );
    }
}
