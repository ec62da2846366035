//! Schema comparison.
//!
//! [`SchemaComparator::diff`] computes a [`ChangeSet`] between two
//! normalized documents: a name-keyed set difference per entity kind,
//! structural field-by-field comparison for names present on both sides,
//! and collapse of add/remove pairs into renames driven by each entity's
//! explicit rename history. Entries are emitted in a fixed canonical order
//! so identical inputs always produce byte-identical change sets.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use strata_schema::ast::{
    AccessDefinition, AnalyzerDefinition, Expression, FieldDefinition, FieldValue,
    FunctionDefinition, IndexDefinition, IndexKind, ParamDefinition, Permissions,
    SchemaDocument, SequenceDefinition, TableDefinition, TableKind, TriggerDefinition,
};

use crate::error::{MigrateError, MigrateResult};

/// Typed path of an entity within a document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityPath {
    /// A top-level table.
    Table(SmolStr),
    /// A field on a table.
    Field { table: SmolStr, path: SmolStr },
    /// An index on a table.
    Index { table: SmolStr, name: SmolStr },
    /// A trigger on a table.
    Trigger { table: SmolStr, name: SmolStr },
    /// A user-defined function.
    Function(SmolStr),
    /// A full-text analyzer.
    Analyzer(SmolStr),
    /// An access method.
    Access(SmolStr),
    /// A named param.
    Param(SmolStr),
    /// An id sequence.
    Sequence(SmolStr),
}

impl EntityPath {
    /// The table this entity belongs to, if it is table-scoped.
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::Table(name) => Some(name),
            Self::Field { table, .. } | Self::Index { table, .. } | Self::Trigger { table, .. } => {
                Some(table)
            }
            _ => None,
        }
    }
}

impl fmt::Display for EntityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table(name) => write!(f, "table:{name}"),
            Self::Field { table, path } => write!(f, "field:{table}.{path}"),
            Self::Index { table, name } => write!(f, "index:{table}.{name}"),
            Self::Trigger { table, name } => write!(f, "trigger:{table}.{name}"),
            Self::Function(name) => write!(f, "function:{name}"),
            Self::Analyzer(name) => write!(f, "analyzer:{name}"),
            Self::Access(name) => write!(f, "access:{name}"),
            Self::Param(name) => write!(f, "param:{name}"),
            Self::Sequence(name) => write!(f, "sequence:{name}"),
        }
    }
}

/// What happened to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Present only in the desired document.
    Add,
    /// Present only in the live document.
    Remove,
    /// Present in both with structural differences.
    Modify,
    /// A remove/add pair collapsed via explicit rename history.
    Rename {
        /// The entity's name in the live document.
        from: SmolStr,
    },
}

/// A captured entity definition, used as before/after snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityDef {
    Table(TableDefinition),
    Field { table: SmolStr, def: FieldDefinition },
    Index { table: SmolStr, def: IndexDefinition },
    Trigger { table: SmolStr, def: TriggerDefinition },
    Function(FunctionDefinition),
    Analyzer(AnalyzerDefinition),
    Access(AccessDefinition),
    Param(ParamDefinition),
    Sequence(SequenceDefinition),
}

/// One changed sub-property of a modified entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDiff {
    /// Property name (e.g. `type`, `permissions.select`).
    pub property: SmolStr,
    /// Live-side rendering, if the property was set.
    pub before: Option<String>,
    /// Desired-side rendering, if the property is set.
    pub after: Option<String>,
}

impl PropertyDiff {
    fn changed(
        property: &str,
        before: Option<String>,
        after: Option<String>,
    ) -> Option<Self> {
        if before == after {
            None
        } else {
            Some(Self {
                property: SmolStr::new(property),
                before,
                after,
            })
        }
    }
}

/// One attributable difference between the two documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// Which entity changed.
    pub path: EntityPath,
    /// How it changed.
    pub kind: ChangeKind,
    /// Live-side snapshot (present for Remove/Modify/Rename).
    pub before: Option<EntityDef>,
    /// Desired-side snapshot (present for Add/Modify/Rename).
    pub after: Option<EntityDef>,
    /// Changed sub-properties, for Modify and residual Rename diffs.
    pub detail: Vec<PropertyDiff>,
}

/// The ordered structural diff between a desired and a live document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Entries in canonical order.
    pub entries: Vec<ChangeEntry>,
    /// Table names declared in the desired document.
    pub desired_tables: BTreeSet<SmolStr>,
    /// Table names declared in the live document.
    pub live_tables: BTreeSet<SmolStr>,
}

impl ChangeSet {
    /// Whether the documents are structurally identical.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries of a given kind.
    pub fn of_kind(&self, kind: &ChangeKind) -> impl Iterator<Item = &ChangeEntry> {
        self.entries
            .iter()
            .filter(move |e| std::mem::discriminant(&e.kind) == std::mem::discriminant(kind))
    }

    /// Get a human-readable summary of the change set.
    pub fn summary(&self) -> String {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for entry in &self.entries {
            let label = match entry.kind {
                ChangeKind::Add => "add",
                ChangeKind::Remove => "remove",
                ChangeKind::Modify => "modify",
                ChangeKind::Rename { .. } => "rename",
            };
            *counts.entry(label).or_default() += 1;
        }
        if counts.is_empty() {
            "no changes".to_string()
        } else {
            counts
                .iter()
                .map(|(label, count)| format!("{count} {label}"))
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

/// Compares two normalized documents.
pub struct SchemaComparator;

impl SchemaComparator {
    /// Compute the change set from `live` to `desired`.
    ///
    /// Both documents must already be normalized; un-normalized documents
    /// produce spurious differences. Entries come out in one canonical
    /// order regardless of declaration order: tables, then relations,
    /// then fields, indexes, triggers, then the global kinds starting
    /// with functions. Two runs over identical inputs are byte-identical.
    pub fn diff(desired: &SchemaDocument, live: &SchemaDocument) -> MigrateResult<ChangeSet> {
        let mut children = ChildEntries::default();
        let mut tables = Vec::new();
        diff_tables(desired, live, &mut tables, &mut children)?;

        let (normals, relations): (Vec<_>, Vec<_>) =
            tables.into_iter().partition(|e| !is_relation(e));

        let mut entries = normals;
        entries.extend(relations);
        entries.append(&mut children.fields);
        entries.append(&mut children.indexes);
        entries.append(&mut children.triggers);

        diff_kind(
            &desired.functions,
            &live.functions,
            &mut entries,
            |f: &FunctionDefinition| &f.rename_history[..],
            |name| EntityPath::Function(name.clone()),
            |f| EntityDef::Function(f.clone()),
            function_detail,
        )?;
        diff_kind(
            &desired.analyzers,
            &live.analyzers,
            &mut entries,
            |_: &AnalyzerDefinition| &[][..],
            |name| EntityPath::Analyzer(name.clone()),
            |a| EntityDef::Analyzer(a.clone()),
            analyzer_detail,
        )?;
        diff_kind(
            &desired.params,
            &live.params,
            &mut entries,
            |_: &ParamDefinition| &[][..],
            |name| EntityPath::Param(name.clone()),
            |p| EntityDef::Param(p.clone()),
            param_detail,
        )?;
        diff_kind(
            &desired.accesses,
            &live.accesses,
            &mut entries,
            |_: &AccessDefinition| &[][..],
            |name| EntityPath::Access(name.clone()),
            |a| EntityDef::Access(a.clone()),
            access_detail,
        )?;
        diff_kind(
            &desired.sequences,
            &live.sequences,
            &mut entries,
            |_: &SequenceDefinition| &[][..],
            |name| EntityPath::Sequence(name.clone()),
            |s| EntityDef::Sequence(s.clone()),
            sequence_detail,
        )?;

        Ok(ChangeSet {
            entries,
            desired_tables: desired.tables.keys().cloned().collect(),
            live_tables: live.tables.keys().cloned().collect(),
        })
    }
}

/// Name-keyed set difference with rename collapse, shared by every
/// entity kind. The callbacks supply the kind-specific pieces.
fn diff_kind<T>(
    desired: &IndexMap<SmolStr, T>,
    live: &IndexMap<SmolStr, T>,
    entries: &mut Vec<ChangeEntry>,
    history: impl Fn(&T) -> &[SmolStr],
    path: impl Fn(&SmolStr) -> EntityPath,
    def: impl Fn(&T) -> EntityDef,
    detail: impl Fn(&T, &T) -> Vec<PropertyDiff>,
) -> MigrateResult<()>
where
    T: Clone,
{
    let removals: BTreeSet<&SmolStr> = live
        .keys()
        .filter(|name| !desired.contains_key(*name))
        .collect();
    let mut claimed: BTreeMap<SmolStr, SmolStr> = BTreeMap::new();

    for (name, desired_entity) in desired {
        match live.get(name) {
            Some(live_entity) => {
                let diffs = detail(live_entity, desired_entity);
                if !diffs.is_empty() {
                    entries.push(ChangeEntry {
                        path: path(name),
                        kind: ChangeKind::Modify,
                        before: Some(def(live_entity)),
                        after: Some(def(desired_entity)),
                        detail: diffs,
                    });
                }
            }
            None => {
                // Candidate ADD; consult the explicit rename history first.
                // The earliest-declared matching name wins.
                let matched = history(desired_entity)
                    .iter()
                    .find(|past| removals.contains(past));
                match matched {
                    Some(from) => {
                        if let Some(other) = claimed.get(from) {
                            return Err(MigrateError::DiffAmbiguity {
                                entity: path(name).to_string(),
                                candidates: vec![other.to_string(), name.to_string()],
                            });
                        }
                        claimed.insert(from.clone(), name.clone());
                        let live_entity = &live[from];
                        entries.push(ChangeEntry {
                            path: path(name),
                            kind: ChangeKind::Rename { from: from.clone() },
                            before: Some(def(live_entity)),
                            after: Some(def(desired_entity)),
                            detail: detail(live_entity, desired_entity),
                        });
                    }
                    None => {
                        entries.push(ChangeEntry {
                            path: path(name),
                            kind: ChangeKind::Add,
                            before: None,
                            after: Some(def(desired_entity)),
                            detail: Vec::new(),
                        });
                    }
                }
            }
        }
    }

    for (name, live_entity) in live {
        if desired.contains_key(name) || claimed.contains_key(name) {
            continue;
        }
        entries.push(ChangeEntry {
            path: path(name),
            kind: ChangeKind::Remove,
            before: Some(def(live_entity)),
            after: None,
            detail: Vec::new(),
        });
    }

    Ok(())
}

/// Child entries accumulated per kind so the final change set can list
/// all fields before all indexes before all triggers.
#[derive(Default)]
struct ChildEntries {
    fields: Vec<ChangeEntry>,
    indexes: Vec<ChangeEntry>,
    triggers: Vec<ChangeEntry>,
}

fn is_relation(entry: &ChangeEntry) -> bool {
    let snapshot = entry.after.as_ref().or(entry.before.as_ref());
    matches!(
        snapshot,
        Some(EntityDef::Table(t)) if matches!(t.kind, TableKind::Relation { .. })
    )
}

fn diff_tables(
    desired: &SchemaDocument,
    live: &SchemaDocument,
    entries: &mut Vec<ChangeEntry>,
    children: &mut ChildEntries,
) -> MigrateResult<()> {
    let removals: BTreeSet<&SmolStr> = live
        .tables
        .keys()
        .filter(|name| !desired.tables.contains_key(*name))
        .collect();
    let mut claimed: BTreeMap<SmolStr, SmolStr> = BTreeMap::new();

    for (name, desired_table) in &desired.tables {
        match live.tables.get(name) {
            Some(live_table) => {
                let detail = table_detail(live_table, desired_table);
                if !detail.is_empty() {
                    entries.push(ChangeEntry {
                        path: EntityPath::Table(name.clone()),
                        kind: ChangeKind::Modify,
                        before: Some(EntityDef::Table(live_table.clone())),
                        after: Some(EntityDef::Table(desired_table.clone())),
                        detail,
                    });
                }
                diff_table_children(name, desired_table, live_table, children)?;
            }
            None => {
                let matched = desired_table
                    .rename_history
                    .iter()
                    .find(|past| removals.contains(past));
                match matched {
                    Some(from) => {
                        if let Some(other) = claimed.get(from) {
                            return Err(MigrateError::DiffAmbiguity {
                                entity: EntityPath::Table(name.clone()).to_string(),
                                candidates: vec![other.to_string(), name.to_string()],
                            });
                        }
                        claimed.insert(from.clone(), name.clone());
                        let live_table = &live.tables[from];
                        entries.push(ChangeEntry {
                            path: EntityPath::Table(name.clone()),
                            kind: ChangeKind::Rename { from: from.clone() },
                            before: Some(EntityDef::Table(live_table.clone())),
                            after: Some(EntityDef::Table(desired_table.clone())),
                            detail: table_detail(live_table, desired_table),
                        });
                        // Residual child differences attach under the new name.
                        diff_table_children(name, desired_table, live_table, children)?;
                    }
                    None => {
                        entries.push(ChangeEntry {
                            path: EntityPath::Table(name.clone()),
                            kind: ChangeKind::Add,
                            before: None,
                            after: Some(EntityDef::Table(desired_table.clone())),
                            detail: Vec::new(),
                        });
                    }
                }
            }
        }
    }

    for (name, live_table) in &live.tables {
        if desired.tables.contains_key(name) || claimed.contains_key(name) {
            continue;
        }
        entries.push(ChangeEntry {
            path: EntityPath::Table(name.clone()),
            kind: ChangeKind::Remove,
            before: Some(EntityDef::Table(live_table.clone())),
            after: None,
            detail: Vec::new(),
        });
    }

    Ok(())
}

fn diff_table_children(
    table: &SmolStr,
    desired: &TableDefinition,
    live: &TableDefinition,
    children: &mut ChildEntries,
) -> MigrateResult<()> {
    diff_kind(
        &by_name(&desired.fields, |f| f.name.clone()),
        &by_name(&live.fields, |f| f.name.clone()),
        &mut children.fields,
        |f: &FieldDefinition| &f.rename_history[..],
        |name| EntityPath::Field {
            table: table.clone(),
            path: name.clone(),
        },
        |f| EntityDef::Field {
            table: table.clone(),
            def: f.clone(),
        },
        field_detail,
    )?;
    diff_kind(
        &by_name(&desired.indexes, |i| i.name.clone()),
        &by_name(&live.indexes, |i| i.name.clone()),
        &mut children.indexes,
        |i: &IndexDefinition| &i.rename_history[..],
        |name| EntityPath::Index {
            table: table.clone(),
            name: name.clone(),
        },
        |i| EntityDef::Index {
            table: table.clone(),
            def: i.clone(),
        },
        index_detail,
    )?;
    diff_kind(
        &by_name(&desired.triggers, |t| t.name.clone()),
        &by_name(&live.triggers, |t| t.name.clone()),
        &mut children.triggers,
        |t: &TriggerDefinition| &t.rename_history[..],
        |name| EntityPath::Trigger {
            table: table.clone(),
            name: name.clone(),
        },
        |t| EntityDef::Trigger {
            table: table.clone(),
            def: t.clone(),
        },
        trigger_detail,
    )?;
    Ok(())
}

fn by_name<T: Clone>(items: &[T], name: impl Fn(&T) -> SmolStr) -> IndexMap<SmolStr, T> {
    items.iter().map(|item| (name(item), item.clone())).collect()
}

// ---------------------------------------------------------------------------
// Per-kind property comparisons
// ---------------------------------------------------------------------------

fn push_permissions(
    diffs: &mut Vec<PropertyDiff>,
    before: &Permissions,
    after: &Permissions,
) {
    for ((name, b), (_, a)) in before.clauses().iter().zip(after.clauses().iter()) {
        diffs.extend(PropertyDiff::changed(
            &format!("permissions.{name}"),
            Some(b.render()),
            Some(a.render()),
        ));
    }
}

fn opt_expr(expr: &Option<Expression>) -> Option<String> {
    expr.as_ref().map(|e| e.as_str().to_string())
}

fn table_detail(before: &TableDefinition, after: &TableDefinition) -> Vec<PropertyDiff> {
    let mut diffs = Vec::new();
    diffs.extend(PropertyDiff::changed(
        "schema_mode",
        Some(before.schema_mode.as_keyword().to_string()),
        Some(after.schema_mode.as_keyword().to_string()),
    ));
    diffs.extend(PropertyDiff::changed(
        "kind",
        Some(render_table_kind(&before.kind)),
        Some(render_table_kind(&after.kind)),
    ));
    diffs.extend(PropertyDiff::changed(
        "view_query",
        opt_expr(&before.view_query),
        opt_expr(&after.view_query),
    ));
    diffs.extend(PropertyDiff::changed(
        "retention_policy",
        opt_expr(&before.retention_policy),
        opt_expr(&after.retention_policy),
    ));
    push_permissions(&mut diffs, &before.permissions, &after.permissions);
    diffs
}

fn render_table_kind(kind: &TableKind) -> String {
    match kind {
        TableKind::Normal => "normal".to_string(),
        TableKind::Relation { from, to } => format!("relation({from} -> {to})"),
        TableKind::Any => "any".to_string(),
    }
}

fn field_detail(before: &FieldDefinition, after: &FieldDefinition) -> Vec<PropertyDiff> {
    let mut diffs = Vec::new();
    diffs.extend(PropertyDiff::changed(
        "type",
        Some(before.type_signature.as_str().to_string()),
        Some(after.type_signature.as_str().to_string()),
    ));
    diffs.extend(PropertyDiff::changed(
        "readonly",
        Some(before.readonly.to_string()),
        Some(after.readonly.to_string()),
    ));
    diffs.extend(PropertyDiff::changed(
        "value",
        Some(render_field_value(&before.value)),
        Some(render_field_value(&after.value)),
    ));
    diffs.extend(PropertyDiff::changed(
        "assertions",
        Some(render_assertions(&before.assertions)),
        Some(render_assertions(&after.assertions)),
    ));
    push_permissions(&mut diffs, &before.permissions, &after.permissions);
    diffs
}

fn render_field_value(value: &FieldValue) -> String {
    match value {
        FieldValue::None => "-".to_string(),
        FieldValue::Default(expr) => format!("DEFAULT {expr}"),
        FieldValue::Computed(expr) => format!("VALUE {expr}"),
    }
}

fn render_assertions(assertions: &[Expression]) -> String {
    if assertions.is_empty() {
        "-".to_string()
    } else {
        assertions
            .iter()
            .map(|a| a.as_str())
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

fn index_detail(before: &IndexDefinition, after: &IndexDefinition) -> Vec<PropertyDiff> {
    let mut diffs = Vec::new();
    diffs.extend(PropertyDiff::changed(
        "columns",
        Some(before.columns.join(", ")),
        Some(after.columns.join(", ")),
    ));
    match (&before.kind, &after.kind) {
        (IndexKind::FullText(b), IndexKind::FullText(a)) => {
            diffs.extend(PropertyDiff::changed(
                "analyzer",
                Some(b.analyzer.to_string()),
                Some(a.analyzer.to_string()),
            ));
            diffs.extend(PropertyDiff::changed(
                "bm25",
                Some(format!("{},{}", b.bm25_k1, b.bm25_b)),
                Some(format!("{},{}", a.bm25_k1, a.bm25_b)),
            ));
            diffs.extend(PropertyDiff::changed(
                "highlights",
                Some(b.highlights.to_string()),
                Some(a.highlights.to_string()),
            ));
        }
        (IndexKind::Vector(b), IndexKind::Vector(a)) => {
            diffs.extend(PropertyDiff::changed(
                "dimension",
                Some(b.dimension.to_string()),
                Some(a.dimension.to_string()),
            ));
            diffs.extend(PropertyDiff::changed(
                "metric",
                Some(b.metric.as_keyword().to_string()),
                Some(a.metric.as_keyword().to_string()),
            ));
            diffs.extend(PropertyDiff::changed(
                "build_params",
                Some(format!("m={},efc={}", b.m, b.ef_construction)),
                Some(format!("m={},efc={}", a.m, a.ef_construction)),
            ));
        }
        (b, a) => {
            diffs.extend(PropertyDiff::changed(
                "kind",
                Some(b.label().to_string()),
                Some(a.label().to_string()),
            ));
        }
    }
    diffs
}

fn trigger_detail(before: &TriggerDefinition, after: &TriggerDefinition) -> Vec<PropertyDiff> {
    let mut diffs = Vec::new();
    diffs.extend(PropertyDiff::changed(
        "operation",
        Some(before.operation.as_keyword().to_string()),
        Some(after.operation.as_keyword().to_string()),
    ));
    diffs.extend(PropertyDiff::changed(
        "when",
        opt_expr(&before.when_expr),
        opt_expr(&after.when_expr),
    ));
    diffs.extend(PropertyDiff::changed(
        "then",
        Some(render_statements(&before.then_statements)),
        Some(render_statements(&after.then_statements)),
    ));
    diffs
}

fn render_statements(statements: &[Expression]) -> String {
    statements
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

fn function_detail(before: &FunctionDefinition, after: &FunctionDefinition) -> Vec<PropertyDiff> {
    let mut diffs = Vec::new();
    let render_args = |f: &FunctionDefinition| {
        f.args
            .iter()
            .map(|a| format!("${}: {}", a.name, a.type_signature))
            .collect::<Vec<_>>()
            .join(", ")
    };
    diffs.extend(PropertyDiff::changed(
        "args",
        Some(render_args(before)),
        Some(render_args(after)),
    ));
    diffs.extend(PropertyDiff::changed(
        "body",
        Some(before.body.as_str().to_string()),
        Some(after.body.as_str().to_string()),
    ));
    push_permissions(&mut diffs, &before.permissions, &after.permissions);
    diffs
}

fn analyzer_detail(before: &AnalyzerDefinition, after: &AnalyzerDefinition) -> Vec<PropertyDiff> {
    let mut diffs = Vec::new();
    diffs.extend(PropertyDiff::changed(
        "tokenizers",
        Some(before.tokenizers.join(",")),
        Some(after.tokenizers.join(",")),
    ));
    diffs.extend(PropertyDiff::changed(
        "filters",
        Some(before.filters.join(",")),
        Some(after.filters.join(",")),
    ));
    diffs
}

fn access_detail(before: &AccessDefinition, after: &AccessDefinition) -> Vec<PropertyDiff> {
    let mut diffs = Vec::new();
    diffs.extend(PropertyDiff::changed(
        "kind",
        Some(before.kind.as_keyword().to_string()),
        Some(after.kind.as_keyword().to_string()),
    ));
    diffs.extend(PropertyDiff::changed(
        "signin",
        opt_expr(&before.signin),
        opt_expr(&after.signin),
    ));
    diffs.extend(PropertyDiff::changed(
        "signup",
        opt_expr(&before.signup),
        opt_expr(&after.signup),
    ));
    diffs.extend(PropertyDiff::changed(
        "session_duration",
        opt_expr(&before.session_duration),
        opt_expr(&after.session_duration),
    ));
    diffs
}

fn param_detail(before: &ParamDefinition, after: &ParamDefinition) -> Vec<PropertyDiff> {
    PropertyDiff::changed(
        "value",
        Some(before.value.as_str().to_string()),
        Some(after.value.as_str().to_string()),
    )
    .into_iter()
    .collect()
}

fn sequence_detail(before: &SequenceDefinition, after: &SequenceDefinition) -> Vec<PropertyDiff> {
    let mut diffs = Vec::new();
    diffs.extend(PropertyDiff::changed(
        "start",
        Some(before.start.to_string()),
        Some(after.start.to_string()),
    ));
    diffs.extend(PropertyDiff::changed(
        "batch",
        Some(before.batch.to_string()),
        Some(after.batch.to_string()),
    ));
    diffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_schema::ast::{FieldDefinition, TableDefinition};

    fn table_with_fields(name: &str, fields: Vec<FieldDefinition>) -> TableDefinition {
        let mut table = TableDefinition::new(name);
        table.fields = fields;
        table
    }

    fn doc(tables: Vec<TableDefinition>) -> SchemaDocument {
        let mut doc = SchemaDocument::new();
        for table in tables {
            doc.add_table(table);
        }
        doc
    }

    #[test]
    fn test_identical_documents_diff_empty() {
        let a = doc(vec![table_with_fields(
            "user",
            vec![FieldDefinition::new("email", "string")],
        )]);
        let changes = SchemaComparator::diff(&a, &a.clone()).unwrap();
        assert!(changes.is_empty());
        assert_eq!(changes.summary(), "no changes");
    }

    #[test]
    fn test_added_field_reported() {
        let desired = doc(vec![table_with_fields(
            "user",
            vec![
                FieldDefinition::new("email", "string"),
                FieldDefinition::new("name", "string"),
            ],
        )]);
        let live = doc(vec![table_with_fields(
            "user",
            vec![FieldDefinition::new("email", "string")],
        )]);

        let changes = SchemaComparator::diff(&desired, &live).unwrap();
        assert_eq!(changes.entries.len(), 1);
        let entry = &changes.entries[0];
        assert_eq!(entry.kind, ChangeKind::Add);
        assert_eq!(
            entry.path,
            EntityPath::Field {
                table: "user".into(),
                path: "name".into()
            }
        );
    }

    #[test]
    fn test_rename_collapses_add_remove_pair() {
        let desired = doc(vec![table_with_fields(
            "user",
            vec![FieldDefinition::new("age", "int").was("yearsOld")],
        )]);
        let live = doc(vec![table_with_fields(
            "user",
            vec![FieldDefinition::new("yearsOld", "int")],
        )]);

        let changes = SchemaComparator::diff(&desired, &live).unwrap();
        assert_eq!(changes.entries.len(), 1);
        let entry = &changes.entries[0];
        assert_eq!(
            entry.kind,
            ChangeKind::Rename {
                from: "yearsOld".into()
            }
        );
        assert!(entry.detail.is_empty());
    }

    #[test]
    fn test_rename_with_residual_diff() {
        let desired = doc(vec![table_with_fields(
            "user",
            vec![FieldDefinition::new("age", "option<int>").was("yearsOld")],
        )]);
        let live = doc(vec![table_with_fields(
            "user",
            vec![FieldDefinition::new("yearsOld", "int")],
        )]);

        let changes = SchemaComparator::diff(&desired, &live).unwrap();
        assert_eq!(changes.entries.len(), 1);
        let entry = &changes.entries[0];
        assert!(matches!(entry.kind, ChangeKind::Rename { .. }));
        assert_eq!(entry.detail.len(), 1);
        assert_eq!(entry.detail[0].property, "type");
    }

    #[test]
    fn test_earliest_history_name_wins() {
        // Both `old_a` and `old_b` were removed; history declares old_a first.
        let desired = doc(vec![table_with_fields(
            "user",
            vec![FieldDefinition::new("n", "int").was("old_a").was("old_b")],
        )]);
        let live = doc(vec![table_with_fields(
            "user",
            vec![
                FieldDefinition::new("old_a", "int"),
                FieldDefinition::new("old_b", "int"),
            ],
        )]);

        let changes = SchemaComparator::diff(&desired, &live).unwrap();
        let rename = changes
            .entries
            .iter()
            .find(|e| matches!(e.kind, ChangeKind::Rename { .. }))
            .unwrap();
        assert_eq!(rename.kind, ChangeKind::Rename { from: "old_a".into() });
        // old_b is a plain removal.
        assert_eq!(changes.of_kind(&ChangeKind::Remove).count(), 1);
    }

    #[test]
    fn test_ambiguous_rename_claim_is_an_error() {
        // Two desired fields both claim the same removed field.
        let desired = doc(vec![table_with_fields(
            "user",
            vec![
                FieldDefinition::new("a", "int").was("old"),
                FieldDefinition::new("b", "int").was("old"),
            ],
        )]);
        let live = doc(vec![table_with_fields(
            "user",
            vec![FieldDefinition::new("old", "int")],
        )]);

        let err = SchemaComparator::diff(&desired, &live).unwrap_err();
        assert!(matches!(err, MigrateError::DiffAmbiguity { .. }));
    }

    #[test]
    fn test_modify_detail_granularity() {
        let desired = doc(vec![table_with_fields(
            "user",
            vec![
                FieldDefinition::new("age", "int")
                    .readonly(true)
                    .default_expr("0"),
            ],
        )]);
        let live = doc(vec![table_with_fields(
            "user",
            vec![FieldDefinition::new("age", "string")],
        )]);

        let changes = SchemaComparator::diff(&desired, &live).unwrap();
        let entry = &changes.entries[0];
        assert_eq!(entry.kind, ChangeKind::Modify);
        let props: Vec<_> = entry.detail.iter().map(|d| d.property.as_str()).collect();
        assert_eq!(props, vec!["type", "readonly", "value"]);
    }

    #[test]
    fn test_canonical_order_is_stable() {
        // Declared in a deliberately scrambled order.
        let mut desired = SchemaDocument::new();
        desired.add_param(ParamDefinition::new("limit", "10"));
        desired.add_analyzer(AnalyzerDefinition::new("simple").tokenizer("blank"));
        desired.add_table(TableDefinition::relation("follows", "user", "user"));
        desired.add_table(table_with_fields(
            "user",
            vec![FieldDefinition::new("email", "string")],
        ));
        desired.add_table(TableDefinition::new("post"));
        let live = doc(vec![TableDefinition::new("user")]);

        let a = SchemaComparator::diff(&desired, &live).unwrap();
        let b = SchemaComparator::diff(&desired, &live).unwrap();
        assert_eq!(a, b);
        // Tables, then relations, then children, then the global kinds.
        let paths: Vec<String> = a.entries.iter().map(|e| e.path.to_string()).collect();
        assert_eq!(
            paths,
            vec![
                "table:post",
                "table:follows",
                "field:user.email",
                "analyzer:simple",
                "param:limit",
            ]
        );
    }

    #[test]
    fn test_table_remove_is_single_entry() {
        let desired = doc(vec![]);
        let live = doc(vec![table_with_fields(
            "legacy",
            vec![FieldDefinition::new("a", "int")],
        )]);
        let changes = SchemaComparator::diff(&desired, &live).unwrap();
        assert_eq!(changes.entries.len(), 1);
        assert_eq!(changes.entries[0].kind, ChangeKind::Remove);
    }
}
