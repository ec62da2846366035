//! Canonical DDL rendering.
//!
//! Plans, checksums and the ledger all operate on ordered statement text,
//! so every entity has exactly one canonical rendering. The dialect is
//! SurrealQL-flavored: `DEFINE …` creates, `DEFINE … OVERWRITE` fully
//! redefines, `REMOVE …` drops, and `ALTER … SET <property>` changes a
//! single property in place.

use std::fmt::Write as _;

use strata_schema::ast::{
    AccessDefinition, AnalyzerDefinition, FieldDefinition, FieldValue, FunctionDefinition,
    IndexDefinition, IndexKind, ParamDefinition, Permissions, SequenceDefinition,
    TableDefinition, TableKind, TriggerDefinition, TriggerOperation,
};

use crate::diff::{EntityDef, EntityPath, PropertyDiff};
use crate::error::{MigrateError, MigrateResult};

fn overwrite_kw(overwrite: bool) -> &'static str {
    if overwrite { " OVERWRITE" } else { "" }
}

/// Render the `DEFINE` statement for any captured entity.
///
/// Table definitions render the table header only; child fields, indexes
/// and triggers are separate statements (see [`define_field`] etc.).
pub fn define(def: &EntityDef, overwrite: bool) -> String {
    match def {
        EntityDef::Table(table) => define_table(table, overwrite),
        EntityDef::Field { table, def } => define_field(table, def, overwrite),
        EntityDef::Index { table, def } => define_index(table, def, overwrite),
        EntityDef::Trigger { table, def } => define_trigger(table, def, overwrite),
        EntityDef::Function(f) => define_function(f, overwrite),
        EntityDef::Analyzer(a) => define_analyzer(a, overwrite),
        EntityDef::Access(a) => define_access(a, overwrite),
        EntityDef::Param(p) => define_param(p, overwrite),
        EntityDef::Sequence(s) => define_sequence(s, overwrite),
    }
}

/// Render the `REMOVE` statement for an entity path.
pub fn remove(path: &EntityPath) -> String {
    match path {
        EntityPath::Table(name) => format!("REMOVE TABLE {name}"),
        EntityPath::Field { table, path } => format!("REMOVE FIELD {path} ON TABLE {table}"),
        EntityPath::Index { table, name } => format!("REMOVE INDEX {name} ON TABLE {table}"),
        EntityPath::Trigger { table, name } => format!("REMOVE EVENT {name} ON TABLE {table}"),
        EntityPath::Function(name) => format!("REMOVE FUNCTION fn::{name}"),
        EntityPath::Analyzer(name) => format!("REMOVE ANALYZER {name}"),
        EntityPath::Access(name) => format!("REMOVE ACCESS {name}"),
        EntityPath::Param(name) => format!("REMOVE PARAM ${name}"),
        EntityPath::Sequence(name) => format!("REMOVE SEQUENCE {name}"),
    }
}

/// Render the rename statement taking `from` to the path's current name.
pub fn rename(path: &EntityPath, from: &str) -> String {
    match path {
        EntityPath::Table(name) => format!("ALTER TABLE {from} RENAME TO {name}"),
        EntityPath::Field { table, path } => {
            format!("ALTER FIELD {from} ON TABLE {table} RENAME TO {path}")
        }
        EntityPath::Index { table, name } => {
            format!("ALTER INDEX {from} ON TABLE {table} RENAME TO {name}")
        }
        EntityPath::Trigger { table, name } => {
            format!("ALTER EVENT {from} ON TABLE {table} RENAME TO {name}")
        }
        EntityPath::Function(name) => format!("ALTER FUNCTION fn::{from} RENAME TO fn::{name}"),
        EntityPath::Analyzer(name) => format!("ALTER ANALYZER {from} RENAME TO {name}"),
        EntityPath::Access(name) => format!("ALTER ACCESS {from} RENAME TO {name}"),
        EntityPath::Param(name) => format!("ALTER PARAM ${from} RENAME TO ${name}"),
        EntityPath::Sequence(name) => format!("ALTER SEQUENCE {from} RENAME TO {name}"),
    }
}

fn alter_scope(path: &EntityPath) -> String {
    match path {
        EntityPath::Table(name) => format!("ALTER TABLE {name}"),
        EntityPath::Field { table, path } => format!("ALTER FIELD {path} ON TABLE {table}"),
        EntityPath::Index { table, name } => format!("ALTER INDEX {name} ON TABLE {table}"),
        EntityPath::Trigger { table, name } => format!("ALTER EVENT {name} ON TABLE {table}"),
        EntityPath::Function(name) => format!("ALTER FUNCTION fn::{name}"),
        EntityPath::Analyzer(name) => format!("ALTER ANALYZER {name}"),
        EntityPath::Access(name) => format!("ALTER ACCESS {name}"),
        EntityPath::Param(name) => format!("ALTER PARAM ${name}"),
        EntityPath::Sequence(name) => format!("ALTER SEQUENCE {name}"),
    }
}

/// Render one targeted single-property `ALTER` statement.
///
/// `target` is the snapshot the statement should converge on (the desired
/// side for up statements, the live side for down statements); `diff`
/// names the property being set.
pub fn alter(path: &EntityPath, target: &EntityDef, diff: &PropertyDiff) -> MigrateResult<String> {
    let scope = alter_scope(path);
    let clause = alter_clause(target, diff)?;
    Ok(format!("{scope} {clause}"))
}

fn alter_clause(target: &EntityDef, diff: &PropertyDiff) -> MigrateResult<String> {
    let prop = diff.property.as_str();
    let clause = match target {
        EntityDef::Table(table) => match prop {
            "schema_mode" => format!("SET {}", table.schema_mode.as_keyword()),
            "kind" => format!("SET {}", table_type_clause(&table.kind)),
            "view_query" => match &table.view_query {
                Some(q) => format!("SET AS {q}"),
                None => "DROP VIEW".to_string(),
            },
            "retention_policy" => match &table.retention_policy {
                Some(d) => format!("SET CHANGEFEED {d}"),
                None => "DROP CHANGEFEED".to_string(),
            },
            _ if prop.starts_with("permissions.") => {
                permission_clause(&table.permissions, prop)?
            }
            _ => return Err(unknown_property(prop)),
        },
        EntityDef::Field { def, .. } => match prop {
            "type" => format!("SET TYPE {}", def.type_signature),
            "readonly" => {
                if def.readonly {
                    "SET READONLY".to_string()
                } else {
                    "DROP READONLY".to_string()
                }
            }
            "value" => match &def.value {
                FieldValue::None => "DROP VALUE".to_string(),
                FieldValue::Default(e) => format!("SET DEFAULT {e}"),
                FieldValue::Computed(e) => format!("SET VALUE {e}"),
            },
            "assertions" => {
                if def.assertions.is_empty() {
                    "DROP ASSERT".to_string()
                } else {
                    format!("SET ASSERT {}", join_assertions(&def.assertions))
                }
            }
            _ if prop.starts_with("permissions.") => permission_clause(&def.permissions, prop)?,
            _ => return Err(unknown_property(prop)),
        },
        EntityDef::Index { def, .. } => match prop {
            "columns" => format!("SET FIELDS {}", def.columns.join(", ")),
            "kind" | "analyzer" | "bm25" | "highlights" | "dimension" | "metric"
            | "build_params" => format!("SET {}", index_kind_clause(&def.kind)),
            _ => return Err(unknown_property(prop)),
        },
        EntityDef::Trigger { def, .. } => match prop {
            "operation" | "when" => format!("SET WHEN {}", trigger_when(def)),
            "then" => format!("SET THEN {}", trigger_then(def)),
            _ => return Err(unknown_property(prop)),
        },
        EntityDef::Function(f) => match prop {
            "args" => format!("SET ARGS ({})", function_args(f)),
            "body" => format!("SET BODY {{ {} }}", f.body),
            _ if prop.starts_with("permissions.") => permission_clause(&f.permissions, prop)?,
            _ => return Err(unknown_property(prop)),
        },
        EntityDef::Analyzer(a) => match prop {
            "tokenizers" => format!("SET TOKENIZERS {}", a.tokenizers.join(",")),
            "filters" => {
                if a.filters.is_empty() {
                    "DROP FILTERS".to_string()
                } else {
                    format!("SET FILTERS {}", a.filters.join(","))
                }
            }
            _ => return Err(unknown_property(prop)),
        },
        EntityDef::Access(a) => match prop {
            "kind" => format!("SET TYPE {}", a.kind.as_keyword()),
            "signin" => match &a.signin {
                Some(e) => format!("SET SIGNIN ({e})"),
                None => "DROP SIGNIN".to_string(),
            },
            "signup" => match &a.signup {
                Some(e) => format!("SET SIGNUP ({e})"),
                None => "DROP SIGNUP".to_string(),
            },
            "session_duration" => match &a.session_duration {
                Some(d) => format!("SET DURATION FOR SESSION {d}"),
                None => "DROP DURATION".to_string(),
            },
            _ => return Err(unknown_property(prop)),
        },
        EntityDef::Param(p) => match prop {
            "value" => format!("SET VALUE {}", p.value),
            _ => return Err(unknown_property(prop)),
        },
        EntityDef::Sequence(s) => match prop {
            "start" => format!("SET START {}", s.start),
            "batch" => format!("SET BATCH {}", s.batch),
            _ => return Err(unknown_property(prop)),
        },
    };
    Ok(clause)
}

fn unknown_property(prop: &str) -> MigrateError {
    MigrateError::planner_invariant(format!("no targeted statement for property `{prop}`"))
}

fn permission_clause(permissions: &Permissions, prop: &str) -> MigrateResult<String> {
    let clause = prop
        .strip_prefix("permissions.")
        .ok_or_else(|| unknown_property(prop))?;
    let rule = permissions
        .clauses()
        .into_iter()
        .find(|(name, _)| *name == clause)
        .map(|(_, rule)| rule.render())
        .ok_or_else(|| unknown_property(prop))?;
    Ok(format!("SET PERMISSIONS FOR {clause} {rule}"))
}

// ---------------------------------------------------------------------------
// DEFINE statements
// ---------------------------------------------------------------------------

pub fn define_table(table: &TableDefinition, overwrite: bool) -> String {
    let mut out = format!("DEFINE TABLE{} {}", overwrite_kw(overwrite), table.name);
    let _ = write!(out, " {}", table_type_clause(&table.kind));
    let _ = write!(out, " {}", table.schema_mode.as_keyword());
    if let Some(view) = &table.view_query {
        let _ = write!(out, " AS {view}");
    }
    if let Some(retention) = &table.retention_policy {
        let _ = write!(out, " CHANGEFEED {retention}");
    }
    push_permissions(&mut out, &table.permissions);
    out
}

fn table_type_clause(kind: &TableKind) -> String {
    match kind {
        TableKind::Normal => "TYPE NORMAL".to_string(),
        TableKind::Relation { from, to } => format!("TYPE RELATION FROM {from} TO {to}"),
        TableKind::Any => "TYPE ANY".to_string(),
    }
}

pub fn define_field(table: &str, field: &FieldDefinition, overwrite: bool) -> String {
    let mut out = format!(
        "DEFINE FIELD{} {} ON TABLE {table} TYPE {}",
        overwrite_kw(overwrite),
        field.name,
        field.type_signature
    );
    if field.readonly {
        out.push_str(" READONLY");
    }
    match &field.value {
        FieldValue::None => {}
        FieldValue::Default(e) => {
            let _ = write!(out, " DEFAULT {e}");
        }
        FieldValue::Computed(e) => {
            let _ = write!(out, " VALUE {e}");
        }
    }
    if !field.assertions.is_empty() {
        let _ = write!(out, " ASSERT {}", join_assertions(&field.assertions));
    }
    push_permissions(&mut out, &field.permissions);
    out
}

fn join_assertions(assertions: &[strata_schema::ast::Expression]) -> String {
    if assertions.len() == 1 {
        assertions[0].to_string()
    } else {
        assertions
            .iter()
            .map(|a| format!("({a})"))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

pub fn define_index(table: &str, index: &IndexDefinition, overwrite: bool) -> String {
    let mut out = format!(
        "DEFINE INDEX{} {} ON TABLE {table} FIELDS {}",
        overwrite_kw(overwrite),
        index.name,
        index.columns.join(", ")
    );
    let kind = index_kind_clause(&index.kind);
    if !kind.is_empty() {
        let _ = write!(out, " {kind}");
    }
    out
}

fn index_kind_clause(kind: &IndexKind) -> String {
    match kind {
        IndexKind::Standard => String::new(),
        IndexKind::Unique => "UNIQUE".to_string(),
        IndexKind::Hash => "HASH".to_string(),
        IndexKind::FullText(opts) => {
            let mut clause = format!(
                "SEARCH ANALYZER {} BM25({},{})",
                opts.analyzer, opts.bm25_k1, opts.bm25_b
            );
            if opts.highlights {
                clause.push_str(" HIGHLIGHTS");
            }
            clause
        }
        IndexKind::Vector(opts) => format!(
            "HNSW DIMENSION {} DIST {} M {} EFC {}",
            opts.dimension,
            opts.metric.as_keyword(),
            opts.m,
            opts.ef_construction
        ),
    }
}

pub fn define_trigger(table: &str, trigger: &TriggerDefinition, overwrite: bool) -> String {
    format!(
        "DEFINE EVENT{} {} ON TABLE {table} WHEN {} THEN {}",
        overwrite_kw(overwrite),
        trigger.name,
        trigger_when(trigger),
        trigger_then(trigger)
    )
}

fn trigger_when(trigger: &TriggerDefinition) -> String {
    let event_guard = match trigger.operation {
        TriggerOperation::Create => Some("$event = 'CREATE'"),
        TriggerOperation::Update => Some("$event = 'UPDATE'"),
        TriggerOperation::Delete => Some("$event = 'DELETE'"),
        TriggerOperation::Any => None,
    };
    match (event_guard, &trigger.when_expr) {
        (Some(guard), Some(when)) => format!("{guard} AND ({when})"),
        (Some(guard), None) => guard.to_string(),
        (None, Some(when)) => when.to_string(),
        (None, None) => "true".to_string(),
    }
}

fn trigger_then(trigger: &TriggerDefinition) -> String {
    let body = trigger
        .then_statements
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    format!("{{ {body} }}")
}

pub fn define_function(function: &FunctionDefinition, overwrite: bool) -> String {
    let mut out = format!(
        "DEFINE FUNCTION{} fn::{}({}) {{ {} }}",
        overwrite_kw(overwrite),
        function.name,
        function_args(function),
        function.body
    );
    push_permissions(&mut out, &function.permissions);
    out
}

fn function_args(function: &FunctionDefinition) -> String {
    function
        .args
        .iter()
        .map(|a| format!("${}: {}", a.name, a.type_signature))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn define_analyzer(analyzer: &AnalyzerDefinition, overwrite: bool) -> String {
    let mut out = format!(
        "DEFINE ANALYZER{} {} TOKENIZERS {}",
        overwrite_kw(overwrite),
        analyzer.name,
        analyzer.tokenizers.join(",")
    );
    if !analyzer.filters.is_empty() {
        let _ = write!(out, " FILTERS {}", analyzer.filters.join(","));
    }
    out
}

pub fn define_access(access: &AccessDefinition, overwrite: bool) -> String {
    let mut out = format!(
        "DEFINE ACCESS{} {} TYPE {}",
        overwrite_kw(overwrite),
        access.name,
        access.kind.as_keyword()
    );
    if let Some(signup) = &access.signup {
        let _ = write!(out, " SIGNUP ({signup})");
    }
    if let Some(signin) = &access.signin {
        let _ = write!(out, " SIGNIN ({signin})");
    }
    if let Some(duration) = &access.session_duration {
        let _ = write!(out, " DURATION FOR SESSION {duration}");
    }
    out
}

pub fn define_param(param: &ParamDefinition, overwrite: bool) -> String {
    format!(
        "DEFINE PARAM{} ${} VALUE {}",
        overwrite_kw(overwrite),
        param.name,
        param.value
    )
}

pub fn define_sequence(sequence: &SequenceDefinition, overwrite: bool) -> String {
    format!(
        "DEFINE SEQUENCE{} {} START {} BATCH {}",
        overwrite_kw(overwrite),
        sequence.name,
        sequence.start,
        sequence.batch
    )
}

fn push_permissions(out: &mut String, permissions: &Permissions) {
    // FULL is the default; only a narrowed set is spelled out.
    if permissions.is_full() {
        return;
    }
    out.push_str(" PERMISSIONS");
    for (name, rule) in permissions.clauses() {
        let _ = write!(out, " FOR {name} {}", rule.render());
    }
}
