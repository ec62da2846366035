//! Permission rules attached to tables, fields and functions.

use serde::{Deserialize, Serialize};

use super::Expression;

/// Permissions for the four statement classes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Permissions {
    /// Who may select.
    pub select: PermissionRule,
    /// Who may create.
    pub create: PermissionRule,
    /// Who may update.
    pub update: PermissionRule,
    /// Who may delete.
    pub delete: PermissionRule,
}

impl Permissions {
    /// Full permissions on every clause.
    pub fn full() -> Self {
        Self::default()
    }

    /// No permissions on any clause.
    pub fn none() -> Self {
        Self {
            select: PermissionRule::None,
            create: PermissionRule::None,
            update: PermissionRule::None,
            delete: PermissionRule::None,
        }
    }

    /// The same rule on every clause.
    pub fn uniform(rule: PermissionRule) -> Self {
        Self {
            select: rule.clone(),
            create: rule.clone(),
            update: rule.clone(),
            delete: rule,
        }
    }

    /// Whether every clause is `Full`.
    pub fn is_full(&self) -> bool {
        self.select == PermissionRule::Full
            && self.create == PermissionRule::Full
            && self.update == PermissionRule::Full
            && self.delete == PermissionRule::Full
    }

    /// Iterate the clauses with their names, in fixed order.
    pub fn clauses(&self) -> [(&'static str, &PermissionRule); 4] {
        [
            ("select", &self.select),
            ("create", &self.create),
            ("update", &self.update),
            ("delete", &self.delete),
        ]
    }
}

/// A single permission rule.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PermissionRule {
    /// Always allowed.
    #[default]
    Full,
    /// Never allowed.
    None,
    /// Allowed when the condition holds.
    Where(Expression),
}

impl PermissionRule {
    /// Render the rule as canonical text.
    pub fn render(&self) -> String {
        match self {
            Self::Full => "FULL".to_string(),
            Self::None => "NONE".to_string(),
            Self::Where(expr) => format!("WHERE {expr}"),
        }
    }
}
