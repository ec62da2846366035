//! Structural validation of schema documents.
//!
//! Runs after construction and before normalization. All problems are
//! collected and reported together as a `ValidationFailed`.

use std::collections::HashSet;

use crate::ast::{IndexKind, SchemaDocument, TableDefinition, TableKind};
use crate::error::{SchemaError, SchemaResult};

/// Validate a document, collecting every problem found.
pub fn validate(doc: &SchemaDocument) -> SchemaResult<()> {
    let mut errors = Vec::new();

    for table in doc.tables.values() {
        validate_table(doc, table, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::validation_failed(errors))
    }
}

fn validate_table(doc: &SchemaDocument, table: &TableDefinition, errors: &mut Vec<SchemaError>) {
    if let TableKind::Relation { from, to } = &table.kind {
        for endpoint in [from, to] {
            if !doc.tables.contains_key(endpoint) {
                errors.push(SchemaError::UnknownEndpoint {
                    relation: table.name.to_string(),
                    endpoint: endpoint.to_string(),
                });
            }
        }
    }

    let mut field_names = HashSet::new();
    for field in &table.fields {
        if !field_names.insert(field.name.clone()) {
            errors.push(SchemaError::duplicate(
                "field",
                format!("{}.{}", table.name, field.name),
            ));
        }
        // A nested field needs its parent declared, unless it is an array
        // element placeholder (those are synthesized and stripped later).
        if let Some(parent) = field.parent_path()
            && table.get_field(parent).is_none()
        {
            errors.push(SchemaError::invalid_field(
                table.name.as_str(),
                field.name.as_str(),
                format!("parent field `{parent}` is not declared"),
            ));
        }
    }

    let mut index_names = HashSet::new();
    for index in &table.indexes {
        if !index_names.insert(index.name.clone()) {
            errors.push(SchemaError::duplicate(
                "index",
                format!("{}.{}", table.name, index.name),
            ));
        }
        if index.columns.is_empty() {
            errors.push(SchemaError::InvalidIndex {
                table: table.name.to_string(),
                name: index.name.to_string(),
                message: "index has no columns".to_string(),
            });
        }
        if let IndexKind::Vector(opts) = &index.kind
            && opts.dimension == 0
        {
            errors.push(SchemaError::InvalidIndex {
                table: table.name.to_string(),
                name: index.name.to_string(),
                message: "vector index dimension must be non-zero".to_string(),
            });
        }
    }

    let mut trigger_names = HashSet::new();
    for trigger in &table.triggers {
        if !trigger_names.insert(trigger.name.clone()) {
            errors.push(SchemaError::duplicate(
                "trigger",
                format!("{}.{}", table.name, trigger.name),
            ));
        }
        if trigger.then_statements.is_empty() {
            errors.push(SchemaError::InvalidTrigger {
                table: table.name.to_string(),
                name: trigger.name.to_string(),
                message: "trigger has no actions".to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        DistanceMetric, FieldDefinition, IndexDefinition, TriggerDefinition, TriggerOperation,
        VectorOptions,
    };

    #[test]
    fn test_valid_document_passes() {
        let mut doc = SchemaDocument::new();
        doc.add_table(TableDefinition::new("user").field(FieldDefinition::new("email", "string")));
        doc.add_table(TableDefinition::new("post"));
        doc.add_table(TableDefinition::relation("likes", "user", "post"));
        assert!(validate(&doc).is_ok());
    }

    #[test]
    fn test_unknown_relation_endpoint() {
        let mut doc = SchemaDocument::new();
        doc.add_table(TableDefinition::new("user"));
        doc.add_table(TableDefinition::relation("likes", "user", "ghost"));
        let err = validate(&doc).unwrap_err();
        assert!(err.to_string().contains("1 error(s)"));
    }

    #[test]
    fn test_nested_field_without_parent() {
        let mut doc = SchemaDocument::new();
        doc.add_table(
            TableDefinition::new("user").field(FieldDefinition::new("address.city", "string")),
        );
        assert!(validate(&doc).is_err());
    }

    #[test]
    fn test_zero_dimension_vector_index() {
        let mut doc = SchemaDocument::new();
        doc.add_table(
            TableDefinition::new("doc").index(
                IndexDefinition::new("emb", vec!["embedding".into()]).kind(IndexKind::Vector(
                    VectorOptions::new(0, DistanceMetric::Cosine),
                )),
            ),
        );
        assert!(validate(&doc).is_err());
    }

    #[test]
    fn test_empty_trigger_rejected() {
        let mut doc = SchemaDocument::new();
        let mut trigger =
            TriggerDefinition::new("audit", TriggerOperation::Update, "UPDATE audit SET n += 1");
        trigger.then_statements.clear();
        doc.add_table(TableDefinition::new("user").trigger(trigger));
        assert!(validate(&doc).is_err());
    }
}
