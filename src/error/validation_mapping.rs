use validator::{ValidationError, ValidationErrors, ValidationErrorsKind};

use super::app_error::ValidationIssue;

impl ValidationIssue {
    /// Flattens nested request errors into dotted field paths (`settings.name`,
    /// `participant_ids[2]`), ordered by field then code.
    pub(super) fn flatten(errors: &ValidationErrors) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let mut pending: Vec<(String, &ValidationErrors)> = vec![(String::new(), errors)];

        while let Some((prefix, errors)) = pending.pop() {
            for (field, kind) in errors.errors() {
                let path = if prefix.is_empty() {
                    field.to_string()
                } else {
                    format!("{prefix}.{field}")
                };
                match kind {
                    ValidationErrorsKind::Field(field_errors) => issues.extend(
                        field_errors
                            .iter()
                            .map(|error| ValidationIssue::from_field(&path, error)),
                    ),
                    ValidationErrorsKind::Struct(nested) => pending.push((path, nested)),
                    ValidationErrorsKind::List(items) => pending.extend(
                        items
                            .iter()
                            .map(|(index, nested)| (format!("{path}[{index}]"), &**nested)),
                    ),
                }
            }
        }

        issues.sort_by(|left, right| {
            left.field
                .cmp(&right.field)
                .then(left.code.cmp(&right.code))
        });
        issues
    }

    fn from_field(path: &str, error: &ValidationError) -> Self {
        let message = match (&error.message, error.code.as_ref()) {
            (Some(message), _) => message.to_string(),
            (None, "length") => format!("{path} has an invalid length"),
            (None, "range") => format!("{path} is out of range"),
            (None, "required") => format!("{path} is required"),
            (None, _) => format!("{path} is invalid"),
        };
        ValidationIssue {
            field: path.to_string(),
            message,
            code: error.code.to_string(),
        }
    }
}
