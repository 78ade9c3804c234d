use crate::domain::Domain;
use crate::entity::{Entity, field, list, object, recursive_list};
use crate::schema::SchemaKind;
use crate::validate::Validator;

/// Uppercase code of at most three characters.
pub(crate) fn code_domain() -> Domain {
    Domain::builder(SchemaKind::String)
        .validator(Validator::string_length(None, Some(3)))
        .input_component("TextInput")
        .build()
}

/// Free text.
pub(crate) fn libelle_domain() -> Domain {
    Domain::builder(SchemaKind::String)
        .validator(Validator::string_length(None, Some(100)))
        .build()
}

/// Non-negative amount.
pub(crate) fn amount_domain() -> Domain {
    Domain::builder(SchemaKind::Number)
        .validator(Validator::number(Some(0.0), None))
        .build()
}

pub(crate) fn address_entity() -> Entity {
    let libelle = libelle_domain();
    Entity::builder("Address")
        .entry("street", field(&libelle, |f| f.optional()))
        .entry("city", field(&libelle, |f| f.label("City")))
        .build()
}

pub(crate) fn line_entity() -> Entity {
    Entity::builder("Line")
        .entry("amount", field(&amount_domain(), |f| f.label("Amount")))
        .build()
}

/// `code` (required), `libelle` (optional), `status` (defaults to `DRAFT`),
/// an `address` object and a list of `lines`.
pub(crate) fn operation_entity() -> Entity {
    let code = code_domain();
    let libelle = libelle_domain();
    Entity::builder("Operation")
        .entry("code", field(&code, |f| f.label("Code")))
        .entry("libelle", field(&libelle, |f| f.optional().label("Libellé")))
        .entry(
            "status",
            field(&libelle, |f| f.optional().default_value("DRAFT")),
        )
        .entry("address", object(&address_entity(), |o| o.optional()))
        .entry("lines", list(&line_entity(), |l| l.label("Lines")))
        .build()
}

/// A labelled tree.
pub(crate) fn tree_entity() -> Entity {
    Entity::builder("Tree")
        .entry("label", field(&libelle_domain(), |f| f))
        .entry("children", recursive_list(|l| l.optional()))
        .build()
}
