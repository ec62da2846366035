//! Error types for schema construction and normalization.

use miette::Diagnostic;
use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur while building, validating or normalizing a schema
/// document.
#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    /// An expression or type signature could not be parsed into canonical
    /// form. Fatal: reconciliation aborts rather than diffing an
    /// un-normalized document.
    #[error("cannot normalize `{entity}`: {message}")]
    #[diagnostic(code(strata::schema::normalization))]
    Normalization {
        /// Path of the entity whose expression failed to normalize.
        entity: String,
        /// What went wrong.
        message: String,
        /// The offending source text.
        #[source_code]
        src: String,
        /// Location of the problem within `src`.
        #[label("cannot canonicalize this")]
        span: miette::SourceSpan,
    },

    /// Duplicate definition within one entity kind.
    #[error("duplicate {kind} `{name}`")]
    #[diagnostic(code(strata::schema::duplicate))]
    Duplicate { kind: String, name: String },

    /// Invalid table definition.
    #[error("invalid table `{name}`: {message}")]
    #[diagnostic(code(strata::schema::invalid_table))]
    InvalidTable { name: String, message: String },

    /// Invalid field definition.
    #[error("invalid field `{table}.{field}`: {message}")]
    #[diagnostic(code(strata::schema::invalid_field))]
    InvalidField {
        table: String,
        field: String,
        message: String,
    },

    /// Invalid index definition.
    #[error("invalid index `{name}` on `{table}`: {message}")]
    #[diagnostic(code(strata::schema::invalid_index))]
    InvalidIndex {
        table: String,
        name: String,
        message: String,
    },

    /// Invalid trigger definition.
    #[error("invalid trigger `{name}` on `{table}`: {message}")]
    #[diagnostic(code(strata::schema::invalid_trigger))]
    InvalidTrigger {
        table: String,
        name: String,
        message: String,
    },

    /// A relation table references an endpoint that is not declared.
    #[error("relation `{relation}` references unknown table `{endpoint}`")]
    #[diagnostic(code(strata::schema::unknown_endpoint))]
    UnknownEndpoint { relation: String, endpoint: String },

    /// Validation failed with multiple issues.
    #[error("schema validation failed with {count} error(s)")]
    #[diagnostic(code(strata::schema::validation_failed))]
    ValidationFailed {
        count: usize,
        #[related]
        errors: Vec<SchemaError>,
    },
}

impl SchemaError {
    /// Create a normalization error with source location.
    pub fn normalization(
        entity: impl Into<String>,
        message: impl Into<String>,
        src: impl Into<String>,
        offset: usize,
        len: usize,
    ) -> Self {
        Self::Normalization {
            entity: entity.into(),
            message: message.into(),
            src: src.into(),
            span: (offset, len).into(),
        }
    }

    /// Create a duplicate-definition error.
    pub fn duplicate(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Duplicate {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create an invalid-table error.
    pub fn invalid_table(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTable {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-field error.
    pub fn invalid_field(
        table: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            table: table.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Wrap a list of errors into a single `ValidationFailed`.
    pub fn validation_failed(errors: Vec<SchemaError>) -> Self {
        Self::ValidationFailed {
            count: errors.len(),
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_display() {
        let err = SchemaError::normalization("user.age", "unexpected token", "1 ++ 2", 2, 2);
        let msg = err.to_string();
        assert!(msg.contains("user.age"));
        assert!(msg.contains("unexpected token"));
    }

    #[test]
    fn test_validation_failed_count() {
        let err = SchemaError::validation_failed(vec![
            SchemaError::duplicate("table", "user"),
            SchemaError::duplicate("param", "limit"),
        ]);
        assert!(err.to_string().contains("2 error(s)"));
    }
}
