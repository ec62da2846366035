//! Migration planning.
//!
//! [`MigrationPlanner::plan`] turns a [`ChangeSet`] into an ordered
//! [`MigrationPlan`]: forward statements in dependency order, inverse
//! statements in exact reverse order, and a checksum over the forward
//! statement text that pins the plan to the change set it was derived
//! from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use strata_schema::ast::{TableDefinition, TableKind};

use crate::diff::{ChangeEntry, ChangeKind, ChangeSet, EntityDef, EntityPath};
use crate::error::{MigrateError, MigrateResult};
use crate::render;

/// Number of changed properties at which a MODIFY stops emitting targeted
/// single-property statements and redefines the whole entity instead.
///
/// Below the threshold targeted statements are cheaper and preserve
/// unrelated state; at or above it one full redefinition costs less than
/// the pile of targeted statements it replaces. Uniform across entity
/// kinds.
pub const REDEFINE_THRESHOLD: usize = 4;

/// An ordered, reversible migration derived from one change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPlan {
    /// Timestamp-derived identifier, unique per planning run.
    pub id: String,
    /// Hex sha256 over the up statements joined by `\n`.
    pub checksum: String,
    /// Forward statements in dependency order.
    pub up: Vec<String>,
    /// Inverse statements, exact reverse of `up` order.
    pub down: Vec<String>,
    /// When the plan was produced.
    pub created_at: DateTime<Utc>,
}

impl MigrationPlan {
    /// Whether the plan has no statements to run.
    pub fn is_empty(&self) -> bool {
        self.up.is_empty()
    }

    /// Checksum of an ordered statement list.
    ///
    /// The identifier and timestamp are deliberately excluded so two runs
    /// over the same change set produce the same checksum.
    pub fn checksum_of(statements: &[String]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(statements.join("\n").as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Fail with [`MigrateError::NoChanges`] if there is nothing to run.
    ///
    /// Callers that treat an already-converged target as an error (a CLI
    /// `migrate` command, say) chain this after planning.
    pub fn require_changes(self) -> MigrateResult<Self> {
        if self.is_empty() {
            return Err(MigrateError::NoChanges);
        }
        Ok(self)
    }

    /// Get a human-readable summary of the plan.
    pub fn summary(&self) -> String {
        format!(
            "migration {} with {} statement(s)",
            self.id,
            self.up.len()
        )
    }
}

/// One forward statement paired with its inverse.
///
/// Most statements invert one-to-one; re-creating a removed table takes
/// several statements, so the inverse side is a list.
struct Step {
    up: String,
    down: Vec<String>,
}

impl Step {
    fn new(up: String, down: String) -> Self {
        Self { up, down: vec![down] }
    }
}

/// Turns change sets into migration plans.
pub struct MigrationPlanner;

impl MigrationPlanner {
    /// Plan the migration for `changes`.
    ///
    /// An empty change set yields an empty plan. Ordering violations and
    /// un-renderable entries surface as [`MigrateError::PlannerInvariant`].
    pub fn plan(changes: &ChangeSet) -> MigrateResult<MigrationPlan> {
        let mut steps: Vec<Step> = Vec::new();

        // Global entity additions first.
        for entry in adds(changes, is_global) {
            push_add(&mut steps, entry)?;
        }

        // Renames next: they act on live names, and every later addition
        // that targets a renamed container (a field on a renamed table, a
        // relation whose endpoint was renamed) must see the new name.
        for entry in changes.entries.iter() {
            if let ChangeKind::Rename { from } = &entry.kind {
                push_rename(&mut steps, entry, from)?;
            }
        }

        // Table additions (relations after their endpoints), then
        // children of surviving tables.
        for entry in adds(changes, is_normal_table) {
            check_endpoints(changes, entry)?;
            push_table_add(&mut steps, entry)?;
        }
        for entry in adds(changes, is_relation_table) {
            check_endpoints(changes, entry)?;
            push_table_add(&mut steps, entry)?;
        }
        for entry in adds(changes, is_child) {
            push_add(&mut steps, entry)?;
        }

        // In-place changes.
        for entry in changes.entries.iter() {
            if entry.kind == ChangeKind::Modify {
                push_modify(&mut steps, entry)?;
            }
        }

        // Removals mirror the addition order: children, then relation
        // tables, then normal tables, then global entities in reverse
        // definition order.
        for entry in removes(changes, is_child) {
            push_remove(&mut steps, entry)?;
        }
        for entry in removes(changes, is_relation_table) {
            push_table_remove(&mut steps, entry)?;
        }
        for entry in removes(changes, is_normal_table) {
            push_table_remove(&mut steps, entry)?;
        }
        let mut globals: Vec<&ChangeEntry> = removes(changes, is_global).collect();
        globals.sort_by_key(|e| std::cmp::Reverse(global_rank(&e.path)));
        for entry in globals {
            push_remove(&mut steps, entry)?;
        }

        let up: Vec<String> = steps.iter().map(|s| s.up.clone()).collect();
        let down: Vec<String> = steps
            .iter()
            .rev()
            .flat_map(|s| s.down.iter().cloned())
            .collect();

        let created_at = Utc::now();
        Ok(MigrationPlan {
            id: created_at.format("%Y%m%d%H%M%S%3f").to_string(),
            checksum: MigrationPlan::checksum_of(&up),
            up,
            down,
            created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Entry classification
// ---------------------------------------------------------------------------

fn adds<'a>(
    changes: &'a ChangeSet,
    select: fn(&ChangeEntry) -> bool,
) -> impl Iterator<Item = &'a ChangeEntry> {
    changes
        .entries
        .iter()
        .filter(move |e| e.kind == ChangeKind::Add && select(e))
}

fn removes<'a>(
    changes: &'a ChangeSet,
    select: fn(&ChangeEntry) -> bool,
) -> impl Iterator<Item = &'a ChangeEntry> {
    changes
        .entries
        .iter()
        .filter(move |e| e.kind == ChangeKind::Remove && select(e))
}

fn is_global(entry: &ChangeEntry) -> bool {
    matches!(
        entry.path,
        EntityPath::Analyzer(_)
            | EntityPath::Function(_)
            | EntityPath::Param(_)
            | EntityPath::Access(_)
            | EntityPath::Sequence(_)
    )
}

fn is_child(entry: &ChangeEntry) -> bool {
    matches!(
        entry.path,
        EntityPath::Field { .. } | EntityPath::Index { .. } | EntityPath::Trigger { .. }
    )
}

fn table_def(entry: &ChangeEntry) -> Option<&TableDefinition> {
    let snapshot = entry.after.as_ref().or(entry.before.as_ref())?;
    match snapshot {
        EntityDef::Table(table) => Some(table),
        _ => None,
    }
}

fn is_normal_table(entry: &ChangeEntry) -> bool {
    table_def(entry).is_some_and(|t| !matches!(t.kind, TableKind::Relation { .. }))
}

fn is_relation_table(entry: &ChangeEntry) -> bool {
    table_def(entry).is_some_and(|t| matches!(t.kind, TableKind::Relation { .. }))
}

// Mirrors the change set's global emission order so removals can run in
// the exact reverse of definition order.
fn global_rank(path: &EntityPath) -> u8 {
    match path {
        EntityPath::Function(_) => 0,
        EntityPath::Analyzer(_) => 1,
        EntityPath::Param(_) => 2,
        EntityPath::Access(_) => 3,
        EntityPath::Sequence(_) => 4,
        _ => u8::MAX,
    }
}

fn check_endpoints(changes: &ChangeSet, entry: &ChangeEntry) -> MigrateResult<()> {
    let Some(table) = table_def(entry) else {
        return Ok(());
    };
    if let TableKind::Relation { from, to } = &table.kind {
        for endpoint in [from, to] {
            if !changes.desired_tables.contains(endpoint) {
                return Err(MigrateError::planner_invariant(format!(
                    "relation table `{}` references undeclared endpoint `{endpoint}`",
                    table.name
                )));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Step construction
// ---------------------------------------------------------------------------

fn snapshot<'a>(
    side: &'a Option<EntityDef>,
    entry: &ChangeEntry,
    which: &str,
) -> MigrateResult<&'a EntityDef> {
    side.as_ref().ok_or_else(|| {
        MigrateError::planner_invariant(format!(
            "{} entry for {} is missing its {which} snapshot",
            kind_label(&entry.kind),
            entry.path
        ))
    })
}

fn kind_label(kind: &ChangeKind) -> &'static str {
    match kind {
        ChangeKind::Add => "ADD",
        ChangeKind::Remove => "REMOVE",
        ChangeKind::Modify => "MODIFY",
        ChangeKind::Rename { .. } => "RENAME",
    }
}

fn push_add(steps: &mut Vec<Step>, entry: &ChangeEntry) -> MigrateResult<()> {
    let after = snapshot(&entry.after, entry, "after")?;
    steps.push(Step::new(
        render::define(after, false),
        render::remove(&entry.path),
    ));
    Ok(())
}

/// An added table becomes one statement for the table header plus one per
/// child, each paired with its own removal.
fn push_table_add(steps: &mut Vec<Step>, entry: &ChangeEntry) -> MigrateResult<()> {
    let EntityDef::Table(table) = snapshot(&entry.after, entry, "after")? else {
        return Err(MigrateError::planner_invariant(format!(
            "table entry {} holds a non-table snapshot",
            entry.path
        )));
    };
    steps.push(Step::new(
        render::define_table(table, false),
        render::remove(&entry.path),
    ));
    for field in &table.fields {
        steps.push(Step::new(
            render::define_field(&table.name, field, false),
            render::remove(&EntityPath::Field {
                table: table.name.clone(),
                path: field.name.clone(),
            }),
        ));
    }
    for index in &table.indexes {
        steps.push(Step::new(
            render::define_index(&table.name, index, false),
            render::remove(&EntityPath::Index {
                table: table.name.clone(),
                name: index.name.clone(),
            }),
        ));
    }
    for trigger in &table.triggers {
        steps.push(Step::new(
            render::define_trigger(&table.name, trigger, false),
            render::remove(&EntityPath::Trigger {
                table: table.name.clone(),
                name: trigger.name.clone(),
            }),
        ));
    }
    Ok(())
}

fn push_remove(steps: &mut Vec<Step>, entry: &ChangeEntry) -> MigrateResult<()> {
    let before = snapshot(&entry.before, entry, "before")?;
    steps.push(Step::new(
        render::remove(&entry.path),
        render::define(before, false),
    ));
    Ok(())
}

/// Removing a table is one statement; re-creating it on the way down
/// takes the full table plus all captured children.
fn push_table_remove(steps: &mut Vec<Step>, entry: &ChangeEntry) -> MigrateResult<()> {
    let EntityDef::Table(table) = snapshot(&entry.before, entry, "before")? else {
        return Err(MigrateError::planner_invariant(format!(
            "table entry {} holds a non-table snapshot",
            entry.path
        )));
    };
    let mut down = vec![render::define_table(table, false)];
    for field in &table.fields {
        down.push(render::define_field(&table.name, field, false));
    }
    for index in &table.indexes {
        down.push(render::define_index(&table.name, index, false));
    }
    for trigger in &table.triggers {
        down.push(render::define_trigger(&table.name, trigger, false));
    }
    steps.push(Step {
        up: render::remove(&entry.path),
        down,
    });
    Ok(())
}

fn push_rename(steps: &mut Vec<Step>, entry: &ChangeEntry, from: &str) -> MigrateResult<()> {
    let old_path = path_with_name(&entry.path, from);
    let new_name = path_name(&entry.path);
    steps.push(Step::new(
        render::rename(&entry.path, from),
        render::rename(&old_path, new_name),
    ));
    // Residual structural differences apply after the rename.
    push_property_changes(steps, entry)
}

fn push_modify(steps: &mut Vec<Step>, entry: &ChangeEntry) -> MigrateResult<()> {
    push_property_changes(steps, entry)
}

/// Emit targeted statements below [`REDEFINE_THRESHOLD`], one full
/// redefinition at or above it.
fn push_property_changes(steps: &mut Vec<Step>, entry: &ChangeEntry) -> MigrateResult<()> {
    if entry.detail.is_empty() {
        return Ok(());
    }
    let before = snapshot(&entry.before, entry, "before")?;
    let after = snapshot(&entry.after, entry, "after")?;
    if entry.detail.len() < REDEFINE_THRESHOLD {
        for diff in &entry.detail {
            steps.push(Step::new(
                render::alter(&entry.path, after, diff)?,
                render::alter(&entry.path, before, diff)?,
            ));
        }
    } else {
        steps.push(Step::new(
            render::define(after, true),
            render::define(before, true),
        ));
    }
    Ok(())
}

fn path_name(path: &EntityPath) -> &str {
    match path {
        EntityPath::Table(name)
        | EntityPath::Function(name)
        | EntityPath::Analyzer(name)
        | EntityPath::Access(name)
        | EntityPath::Param(name)
        | EntityPath::Sequence(name) => name,
        EntityPath::Field { path, .. } => path,
        EntityPath::Index { name, .. } | EntityPath::Trigger { name, .. } => name,
    }
}

fn path_with_name(path: &EntityPath, name: &str) -> EntityPath {
    match path {
        EntityPath::Table(_) => EntityPath::Table(name.into()),
        EntityPath::Field { table, .. } => EntityPath::Field {
            table: table.clone(),
            path: name.into(),
        },
        EntityPath::Index { table, .. } => EntityPath::Index {
            table: table.clone(),
            name: name.into(),
        },
        EntityPath::Trigger { table, .. } => EntityPath::Trigger {
            table: table.clone(),
            name: name.into(),
        },
        EntityPath::Function(_) => EntityPath::Function(name.into()),
        EntityPath::Analyzer(_) => EntityPath::Analyzer(name.into()),
        EntityPath::Access(_) => EntityPath::Access(name.into()),
        EntityPath::Param(_) => EntityPath::Param(name.into()),
        EntityPath::Sequence(_) => EntityPath::Sequence(name.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::SchemaComparator;
    use strata_schema::ast::{FieldDefinition, SchemaDocument, TableDefinition};

    fn diff(desired: &SchemaDocument, live: &SchemaDocument) -> ChangeSet {
        SchemaComparator::diff(desired, live).unwrap()
    }

    fn user_doc(fields: Vec<FieldDefinition>) -> SchemaDocument {
        let mut doc = SchemaDocument::new();
        let mut table = TableDefinition::new("user");
        table.fields = fields;
        doc.add_table(table);
        doc
    }

    #[test]
    fn test_empty_changeset_yields_empty_plan() {
        let doc = user_doc(vec![FieldDefinition::new("email", "string")]);
        let plan = MigrationPlanner::plan(&diff(&doc, &doc.clone())).unwrap();
        assert!(plan.is_empty());
        assert!(plan.down.is_empty());
        assert!(matches!(
            plan.require_changes(),
            Err(MigrateError::NoChanges)
        ));
    }

    #[test]
    fn test_table_created_before_children() {
        let desired = user_doc(vec![FieldDefinition::new("email", "string")]);
        let live = SchemaDocument::new();
        let plan = MigrationPlanner::plan(&diff(&desired, &live)).unwrap();
        assert_eq!(plan.up.len(), 2);
        assert!(plan.up[0].starts_with("DEFINE TABLE user"));
        assert!(plan.up[1].starts_with("DEFINE FIELD email"));
        // Down drops in reverse.
        assert_eq!(plan.down[0], "REMOVE FIELD email ON TABLE user");
        assert_eq!(plan.down[1], "REMOVE TABLE user");
    }

    #[test]
    fn test_relation_table_ordered_after_endpoints() {
        let mut desired = SchemaDocument::new();
        // Declared relation-first to prove ordering is by dependency, not
        // declaration.
        desired.add_table(TableDefinition::relation("follows", "user", "user"));
        desired.add_table(TableDefinition::new("user"));
        let plan = MigrationPlanner::plan(&diff(&desired, &SchemaDocument::new())).unwrap();
        assert!(plan.up[0].starts_with("DEFINE TABLE user"));
        assert!(plan.up[1].starts_with("DEFINE TABLE follows"));
        // Dropped in the opposite order.
        assert_eq!(plan.down[0], "REMOVE TABLE follows");
        assert_eq!(plan.down[1], "REMOVE TABLE user");
    }

    #[test]
    fn test_relation_with_missing_endpoint_is_planner_invariant() {
        let mut desired = SchemaDocument::new();
        desired.add_table(TableDefinition::relation("follows", "user", "ghost"));
        desired.add_table(TableDefinition::new("user"));
        let err = MigrationPlanner::plan(&diff(&desired, &SchemaDocument::new())).unwrap_err();
        assert!(matches!(err, MigrateError::PlannerInvariant(_)));
    }

    #[test]
    fn test_below_threshold_emits_targeted_statements() {
        // 3 changed properties: type, readonly, value.
        let desired = user_doc(vec![
            FieldDefinition::new("age", "option<int>")
                .readonly(true)
                .default_expr("0"),
        ]);
        let live = user_doc(vec![FieldDefinition::new("age", "int")]);
        let plan = MigrationPlanner::plan(&diff(&desired, &live)).unwrap();
        assert_eq!(plan.up.len(), 3);
        assert!(plan.up.iter().all(|s| s.starts_with("ALTER FIELD age")));
        assert!(plan.up.iter().any(|s| s.ends_with("SET TYPE option<int>")));
    }

    #[test]
    fn test_at_threshold_emits_single_redefinition() {
        // 4 changed properties: type, readonly, value, assertions.
        let desired = user_doc(vec![
            FieldDefinition::new("age", "option<int>")
                .readonly(true)
                .default_expr("0")
                .assert("value >= 0"),
        ]);
        let live = user_doc(vec![FieldDefinition::new("age", "int")]);
        let plan = MigrationPlanner::plan(&diff(&desired, &live)).unwrap();
        assert_eq!(plan.up.len(), 1);
        assert!(plan.up[0].starts_with("DEFINE FIELD OVERWRITE age"));
        assert_eq!(plan.down.len(), 1);
        assert!(plan.down[0].starts_with("DEFINE FIELD OVERWRITE age"));
    }

    #[test]
    fn test_rename_emits_reversible_pair() {
        let desired = user_doc(vec![FieldDefinition::new("age", "int").was("yearsOld")]);
        let live = user_doc(vec![FieldDefinition::new("yearsOld", "int")]);
        let plan = MigrationPlanner::plan(&diff(&desired, &live)).unwrap();
        assert_eq!(
            plan.up,
            vec!["ALTER FIELD yearsOld ON TABLE user RENAME TO age"]
        );
        assert_eq!(
            plan.down,
            vec!["ALTER FIELD age ON TABLE user RENAME TO yearsOld"]
        );
    }

    #[test]
    fn test_renamed_table_gains_field_after_rename() {
        let mut desired = SchemaDocument::new();
        let mut table = TableDefinition::new("user").was("person");
        table.fields = vec![FieldDefinition::new("nick", "string")];
        desired.add_table(table);
        let mut live = SchemaDocument::new();
        live.add_table(TableDefinition::new("person"));

        let plan = MigrationPlanner::plan(&diff(&desired, &live)).unwrap();
        // The rename lands first so the new field targets `user`, not the
        // defunct `person`.
        assert_eq!(
            plan.up,
            vec![
                "ALTER TABLE person RENAME TO user",
                "DEFINE FIELD nick ON TABLE user TYPE string",
            ]
        );
        assert_eq!(
            plan.down,
            vec![
                "REMOVE FIELD nick ON TABLE user",
                "ALTER TABLE user RENAME TO person",
            ]
        );
    }

    #[test]
    fn test_checksum_stable_across_runs() {
        let desired = user_doc(vec![FieldDefinition::new("email", "string")]);
        let live = SchemaDocument::new();
        let a = MigrationPlanner::plan(&diff(&desired, &live)).unwrap();
        let b = MigrationPlanner::plan(&diff(&desired, &live)).unwrap();
        assert_eq!(a.up, b.up);
        assert_eq!(a.checksum, b.checksum);
    }

    #[test]
    fn test_removed_table_recreated_in_down() {
        let desired = SchemaDocument::new();
        let live = user_doc(vec![FieldDefinition::new("email", "string")]);
        let plan = MigrationPlanner::plan(&diff(&desired, &live)).unwrap();
        assert_eq!(plan.up, vec!["REMOVE TABLE user"]);
        assert_eq!(plan.down.len(), 2);
        assert!(plan.down[0].starts_with("DEFINE TABLE user"));
        assert!(plan.down[1].starts_with("DEFINE FIELD email"));
    }

    #[test]
    fn test_down_is_exact_reverse_of_up() {
        let mut desired = user_doc(vec![FieldDefinition::new("email", "string")]);
        desired.add_param(strata_schema::ast::ParamDefinition::new("limit", "10"));
        let plan = MigrationPlanner::plan(&diff(&desired, &SchemaDocument::new())).unwrap();
        // param is defined first (global phase) so its removal comes last.
        assert!(plan.up[0].starts_with("DEFINE PARAM"));
        assert_eq!(plan.down.last().map(String::as_str), Some("REMOVE PARAM $limit"));
    }
}
