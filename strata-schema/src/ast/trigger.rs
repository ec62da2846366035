//! Trigger definitions.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::Expression;

/// A trigger on a table, fired on write operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerDefinition {
    /// Trigger name.
    pub name: SmolStr,
    /// Which operation fires the trigger.
    pub operation: TriggerOperation,
    /// Optional condition; the trigger only runs when it holds.
    pub when_expr: Option<Expression>,
    /// Actions to run, in order. Never empty.
    pub then_statements: Vec<Expression>,
    /// Previous names, oldest first.
    pub rename_history: Vec<SmolStr>,
}

impl TriggerDefinition {
    /// Create a trigger with a single action.
    pub fn new(
        name: impl Into<SmolStr>,
        operation: TriggerOperation,
        action: impl Into<Expression>,
    ) -> Self {
        Self {
            name: name.into(),
            operation,
            when_expr: None,
            then_statements: vec![action.into()],
            rename_history: Vec::new(),
        }
    }

    /// Trigger name as a string.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the firing condition.
    pub fn when(mut self, expr: impl Into<Expression>) -> Self {
        self.when_expr = Some(expr.into());
        self
    }

    /// Append an action.
    pub fn then(mut self, action: impl Into<Expression>) -> Self {
        self.then_statements.push(action.into());
        self
    }

    /// Record a previous name.
    pub fn was(mut self, previous: impl Into<SmolStr>) -> Self {
        self.rename_history.push(previous.into());
        self
    }
}

/// Operation that fires a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerOperation {
    /// Record creation.
    Create,
    /// Record update.
    Update,
    /// Record deletion.
    Delete,
    /// Any write operation.
    Any,
}

impl TriggerOperation {
    /// Canonical keyword used in statements.
    pub fn as_keyword(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Any => "ANY",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_builder() {
        let trigger = TriggerDefinition::new(
            "audit",
            TriggerOperation::Update,
            "CREATE audit_log SET table = 'user'",
        )
        .when("$before != $after");

        assert_eq!(trigger.name(), "audit");
        assert!(trigger.when_expr.is_some());
        assert_eq!(trigger.then_statements.len(), 1);
    }

    #[test]
    fn test_operation_keyword() {
        assert_eq!(TriggerOperation::Any.as_keyword(), "ANY");
    }
}
