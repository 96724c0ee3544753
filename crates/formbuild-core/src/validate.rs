//! Structural validation of posted form schemas.
//!
//! Rules:
//! - `title` must be non-empty.
//! - `fields` must contain at least one field.
//! - each field needs a non-empty `label`, a `type` from [`FieldType`], and a
//!   non-empty ASCII-alphanumeric `name`. `placeholder` is unconstrained.
//!
//! Every violation is reported; a form with any violation is rejected whole.

use crate::error::{ValidationError, Violation};
use crate::form::{Field, FieldDraft, FieldType, Form, FormDraft};

/// Validate a draft and convert it into a [`Form`].
///
/// # Errors
///
/// Returns [`ValidationError`] listing every broken rule.
pub fn validate(draft: FormDraft) -> Result<Form, ValidationError> {
    let mut violations = Vec::new();

    if draft.title.trim().is_empty() {
        violations.push(violation("title", "is required"));
    }
    if draft.fields.is_empty() {
        violations.push(violation("fields", "must contain at least one field"));
    }

    let mut fields = Vec::with_capacity(draft.fields.len());
    for (index, field) in draft.fields.into_iter().enumerate() {
        if let Some(field) = validate_field(index, field, &mut violations) {
            fields.push(field);
        }
    }

    if !violations.is_empty() {
        return Err(ValidationError { violations });
    }

    Ok(Form {
        title: draft.title,
        fields,
    })
}

fn validate_field(index: usize, draft: FieldDraft, out: &mut Vec<Violation>) -> Option<Field> {
    let before = out.len();

    if draft.label.trim().is_empty() {
        out.push(violation(&format!("fields[{index}].label"), "is required"));
    }

    let field_type = if draft.field_type.is_empty() {
        out.push(violation(&format!("fields[{index}].type"), "is required"));
        None
    } else if let Ok(t) = draft.field_type.parse::<FieldType>() {
        Some(t)
    } else {
        let allowed: Vec<&str> = FieldType::ALL.iter().map(|t| t.as_str()).collect();
        out.push(violation(
            &format!("fields[{index}].type"),
            &format!(
                "'{}' is not one of: {}",
                draft.field_type,
                allowed.join(", ")
            ),
        ));
        None
    };

    if draft.name.is_empty() {
        out.push(violation(&format!("fields[{index}].name"), "is required"));
    } else if !is_alphanumeric(&draft.name) {
        out.push(violation(
            &format!("fields[{index}].name"),
            "must contain only letters and digits",
        ));
    }

    let field_type = field_type?;
    if out.len() > before {
        return None;
    }

    Some(Field {
        label: draft.label,
        field_type,
        name: draft.name,
        placeholder: draft.placeholder,
    })
}

fn is_alphanumeric(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn violation(location: &str, rule: &str) -> Violation {
    Violation {
        location: location.to_owned(),
        rule: rule.to_owned(),
    }
}
