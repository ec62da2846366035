//! Document normalization.
//!
//! `normalize` rewrites a [`SchemaDocument`] into canonical form so the
//! comparator never reports a difference between two spellings of the same
//! thing. It is pure and deterministic; an expression that cannot be
//! canonicalized aborts the whole run with [`SchemaError::Normalization`]
//! rather than slipping through and producing a false diff.

use tracing::debug;

use crate::ast::{
    AccessDefinition, Expression, FieldDefinition, Permissions, PermissionRule, SchemaDocument,
    TableDefinition, TriggerDefinition, TypeSignature,
};
use crate::error::{SchemaError, SchemaResult};
use crate::parser::{
    CanonError, canonicalize_duration, canonicalize_expression, canonicalize_type,
};

/// Produce the canonical form of a document.
pub fn normalize(doc: &SchemaDocument) -> SchemaResult<SchemaDocument> {
    let mut out = SchemaDocument::new();

    for table in doc.tables.values() {
        out.add_table(normalize_table(table)?);
    }
    for function in doc.functions.values() {
        let mut function = function.clone();
        function.body = Expression::new(function.body.as_str().trim());
        function.permissions =
            normalize_permissions(&function.permissions, &format!("fn::{}", function.name))?;
        out.add_function(function);
    }
    for analyzer in doc.analyzers.values() {
        out.add_analyzer(analyzer.clone());
    }
    for access in doc.accesses.values() {
        out.add_access(normalize_access(access)?);
    }
    for param in doc.params.values() {
        let mut param = param.clone();
        param.value = normalize_expression(&param.value, &format!("${}", param.name))?;
        out.add_param(param);
    }
    for sequence in doc.sequences.values() {
        out.add_sequence(sequence.clone());
    }

    debug!(tables = out.tables.len(), "normalized schema document");
    Ok(out)
}

fn normalize_table(table: &TableDefinition) -> SchemaResult<TableDefinition> {
    let mut out = table.clone();

    // Synthetic array-element placeholders injected by the authoring layer
    // are derivable from the parent field's type; strip them before
    // comparison so only one side declaring them is not a difference.
    out.fields.retain(|f| {
        !(f.is_array_element()
            && f.name
                .strip_suffix("[*]")
                .is_some_and(|base| table.get_field(base).is_some()))
    });

    for field in &mut out.fields {
        *field = normalize_field(field, &table.name)?;
    }
    for trigger in &mut out.triggers {
        *trigger = normalize_trigger(trigger, &table.name)?;
    }

    out.permissions = normalize_permissions(&out.permissions, &table.name)?;
    if let Some(query) = &out.view_query {
        out.view_query = Some(Expression::new(query.as_str().trim()));
    }
    if let Some(retention) = &out.retention_policy {
        let entity = format!("{}#retention", table.name);
        let canonical = canonicalize_duration(retention.as_str())
            .map_err(|e| canon_to_schema(&entity, retention.as_str(), e))?;
        out.retention_policy = Some(Expression::new(canonical));
    }

    Ok(out)
}

fn normalize_field(field: &FieldDefinition, table: &str) -> SchemaResult<FieldDefinition> {
    let entity = format!("{table}.{}", field.name);
    let mut out = field.clone();

    // Canonicalize the type, folding the `optional` flag into the type text
    // so `age: int (optional)` and `age: option<int>` converge.
    let mut canonical = canonicalize_type(out.type_signature.as_str())
        .map_err(|e| canon_to_schema(&entity, out.type_signature.as_str(), e))?;
    if out.optional && !canonical.starts_with("option<") {
        canonical = format!("option<{canonical}>");
    }
    out.optional = canonical.starts_with("option<");
    out.type_signature = TypeSignature::new(canonical);

    out.value = match &out.value {
        crate::ast::FieldValue::None => crate::ast::FieldValue::None,
        crate::ast::FieldValue::Default(expr) => {
            crate::ast::FieldValue::Default(normalize_expression(expr, &entity)?)
        }
        crate::ast::FieldValue::Computed(expr) => {
            crate::ast::FieldValue::Computed(normalize_expression(expr, &entity)?)
        }
    };

    for assertion in &mut out.assertions {
        *assertion = normalize_expression(assertion, &entity)?;
    }
    out.permissions = normalize_permissions(&out.permissions, &entity)?;

    Ok(out)
}

fn normalize_trigger(trigger: &TriggerDefinition, table: &str) -> SchemaResult<TriggerDefinition> {
    let entity = format!("{table}#{}", trigger.name);
    let mut out = trigger.clone();
    if let Some(when) = &out.when_expr {
        out.when_expr = Some(normalize_expression(when, &entity)?);
    }
    // Actions are full statements, outside the expression grammar; they pass
    // through with surrounding whitespace trimmed.
    for action in &mut out.then_statements {
        *action = Expression::new(action.as_str().trim());
    }
    Ok(out)
}

fn normalize_access(access: &AccessDefinition) -> SchemaResult<AccessDefinition> {
    let mut out = access.clone();
    if let Some(signin) = &out.signin {
        out.signin = Some(Expression::new(signin.as_str().trim()));
    }
    if let Some(signup) = &out.signup {
        out.signup = Some(Expression::new(signup.as_str().trim()));
    }
    if let Some(duration) = &out.session_duration {
        let entity = format!("{}#session", access.name);
        let canonical = canonicalize_duration(duration.as_str())
            .map_err(|e| canon_to_schema(&entity, duration.as_str(), e))?;
        out.session_duration = Some(Expression::new(canonical));
    }
    Ok(out)
}

fn normalize_permissions(perms: &Permissions, entity: &str) -> SchemaResult<Permissions> {
    let mut out = perms.clone();
    for rule in [
        &mut out.select,
        &mut out.create,
        &mut out.update,
        &mut out.delete,
    ] {
        if let PermissionRule::Where(expr) = rule {
            *expr = normalize_expression(expr, entity)?;
        }
    }
    Ok(out)
}

fn normalize_expression(expr: &Expression, entity: &str) -> SchemaResult<Expression> {
    let canonical = canonicalize_expression(expr.as_str())
        .map_err(|e| canon_to_schema(entity, expr.as_str(), e))?;
    Ok(Expression::new(canonical))
}

fn canon_to_schema(entity: &str, src: &str, err: CanonError) -> SchemaError {
    SchemaError::normalization(entity, err.message, src, err.offset, err.len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FieldValue, TableKind};
    use pretty_assertions::assert_eq;

    fn doc_with_field(field: FieldDefinition) -> SchemaDocument {
        let mut doc = SchemaDocument::new();
        doc.add_table(TableDefinition::new("user").field(field));
        doc
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let doc = doc_with_field(
            FieldDefinition::new("age", "number<int>").assert("$value >= 0 && $value <= 150"),
        );
        let a = normalize(&doc).unwrap();
        let b = normalize(&doc).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_optional_spellings_converge() {
        let via_flag = doc_with_field(FieldDefinition::new("name", "string").optional(true));
        let via_type = doc_with_field(FieldDefinition::new("name", "option<string>"));
        let via_union = doc_with_field(FieldDefinition::new("name", "string | none"));

        let a = normalize(&via_flag).unwrap();
        let b = normalize(&via_type).unwrap();
        let c = normalize(&via_union).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        let field = a.get_table("user").unwrap().get_field("name").unwrap();
        assert!(field.optional);
        assert_eq!(field.type_signature.as_str(), "option<string>");
    }

    #[test]
    fn test_assertion_spellings_converge() {
        let a = doc_with_field(
            FieldDefinition::new("age", "int").assert("$value >= 0 && $value <= 150"),
        );
        let b = doc_with_field(
            FieldDefinition::new("age", "int").assert("($value >= 0) AND ($value <= 150)"),
        );
        assert_eq!(normalize(&a).unwrap(), normalize(&b).unwrap());
    }

    #[test]
    fn test_default_expression_normalized() {
        let doc = doc_with_field(FieldDefinition::new("ttl", "duration").default_expr("90m"));
        let out = normalize(&doc).unwrap();
        let field = out.get_table("user").unwrap().get_field("ttl").unwrap();
        match &field.value {
            FieldValue::Default(expr) => assert_eq!(expr.as_str(), "1h30m"),
            other => panic!("expected default, got {other:?}"),
        }
    }

    #[test]
    fn test_synthetic_array_element_stripped() {
        let mut doc = SchemaDocument::new();
        doc.add_table(
            TableDefinition::new("post")
                .field(FieldDefinition::new("tags", "array<string>"))
                .field(FieldDefinition::new("tags[*]", "string")),
        );
        let out = normalize(&doc).unwrap();
        assert_eq!(out.get_table("post").unwrap().fields.len(), 1);
    }

    #[test]
    fn test_retention_policy_canonicalized() {
        let mut doc = SchemaDocument::new();
        doc.add_table(TableDefinition::new("session_log").retain("1440m"));
        let out = normalize(&doc).unwrap();
        let table = out.get_table("session_log").unwrap();
        assert_eq!(table.retention_policy.as_ref().unwrap().as_str(), "1d");
    }

    #[test]
    fn test_unparseable_assertion_is_fatal() {
        let doc = doc_with_field(FieldDefinition::new("age", "int").assert("$value >= >= 0"));
        let err = normalize(&doc).unwrap_err();
        assert!(matches!(err, SchemaError::Normalization { .. }));
        assert!(err.to_string().contains("user.age"));
    }

    #[test]
    fn test_relation_kind_untouched() {
        let mut doc = SchemaDocument::new();
        doc.add_table(TableDefinition::relation("likes", "user", "post"));
        let out = normalize(&doc).unwrap();
        assert!(matches!(
            out.get_table("likes").unwrap().kind,
            TableKind::Relation { .. }
        ));
    }
}
