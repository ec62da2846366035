//! Table definitions.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{
    Expression, FieldDefinition, IndexDefinition, Permissions, TriggerDefinition,
};

/// A table in a schema document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Table name.
    pub name: SmolStr,
    /// Strict or flexible schema enforcement.
    pub schema_mode: SchemaMode,
    /// Normal table, relation table, or unconstrained.
    pub kind: TableKind,
    /// Fields in declaration order.
    pub fields: Vec<FieldDefinition>,
    /// Indexes in declaration order.
    pub indexes: Vec<IndexDefinition>,
    /// Triggers in declaration order.
    pub triggers: Vec<TriggerDefinition>,
    /// Table-level permissions.
    pub permissions: Permissions,
    /// For view tables, the defining query.
    pub view_query: Option<Expression>,
    /// Automatic record expiry, canonicalized to a duration literal.
    pub retention_policy: Option<Expression>,
    /// Previous names, oldest first, from explicit "was" hints.
    pub rename_history: Vec<SmolStr>,
}

impl TableDefinition {
    /// Create a strict normal table.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            schema_mode: SchemaMode::Strict,
            kind: TableKind::Normal,
            fields: Vec::new(),
            indexes: Vec::new(),
            triggers: Vec::new(),
            permissions: Permissions::full(),
            view_query: None,
            retention_policy: None,
            rename_history: Vec::new(),
        }
    }

    /// Create a relation table between two endpoints.
    pub fn relation(
        name: impl Into<SmolStr>,
        from: impl Into<SmolStr>,
        to: impl Into<SmolStr>,
    ) -> Self {
        let mut table = Self::new(name);
        table.kind = TableKind::Relation {
            from: from.into(),
            to: to.into(),
        };
        table
    }

    /// Table name as a string.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is a relation table.
    pub fn is_relation(&self) -> bool {
        matches!(self.kind, TableKind::Relation { .. })
    }

    /// Set the schema mode.
    pub fn schema_mode(mut self, mode: SchemaMode) -> Self {
        self.schema_mode = mode;
        self
    }

    /// Append a field.
    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Append an index.
    pub fn index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    /// Append a trigger.
    pub fn trigger(mut self, trigger: TriggerDefinition) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// Set table permissions.
    pub fn permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Set the view query.
    pub fn view(mut self, query: impl Into<Expression>) -> Self {
        self.view_query = Some(query.into());
        self
    }

    /// Set the retention policy.
    pub fn retain(mut self, duration: impl Into<Expression>) -> Self {
        self.retention_policy = Some(duration.into());
        self
    }

    /// Record a previous name (oldest first).
    pub fn was(mut self, previous: impl Into<SmolStr>) -> Self {
        self.rename_history.push(previous.into());
        self
    }

    /// Look up a field by its dot-path name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up an index by name.
    pub fn get_index(&self, name: &str) -> Option<&IndexDefinition> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Look up a trigger by name.
    pub fn get_trigger(&self, name: &str) -> Option<&TriggerDefinition> {
        self.triggers.iter().find(|t| t.name == name)
    }
}

/// How strictly a table enforces its declared fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SchemaMode {
    /// Only declared fields are allowed.
    #[default]
    Strict,
    /// Undeclared fields are allowed alongside declared ones.
    Flexible,
}

impl SchemaMode {
    /// Canonical keyword used in statements.
    pub fn as_keyword(&self) -> &'static str {
        match self {
            Self::Strict => "SCHEMAFULL",
            Self::Flexible => "SCHEMALESS",
        }
    }
}

/// What kind of table this is.
///
/// A relation table always declares exactly two endpoints; the closed enum
/// makes a one- or three-endpoint relation unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TableKind {
    /// Ordinary record table.
    #[default]
    Normal,
    /// Edge table linking two endpoint tables.
    Relation {
        /// Source endpoint table.
        from: SmolStr,
        /// Target endpoint table.
        to: SmolStr,
    },
    /// No constraint on how records are written.
    Any,
}

impl TableKind {
    /// Short label used in diffs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Relation { .. } => "relation",
            Self::Any => "any",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_endpoints() {
        let table = TableDefinition::relation("likes", "user", "post");
        assert!(table.is_relation());
        match &table.kind {
            TableKind::Relation { from, to } => {
                assert_eq!(from, "user");
                assert_eq!(to, "post");
            }
            _ => panic!("expected relation"),
        }
    }

    #[test]
    fn test_field_lookup() {
        let table = TableDefinition::new("user")
            .field(FieldDefinition::new("email", "string"))
            .field(FieldDefinition::new("name", "string"));

        assert!(table.get_field("email").is_some());
        assert!(table.get_field("missing").is_none());
    }

    #[test]
    fn test_schema_mode_keyword() {
        assert_eq!(SchemaMode::Strict.as_keyword(), "SCHEMAFULL");
        assert_eq!(SchemaMode::Flexible.as_keyword(), "SCHEMALESS");
    }
}
