//! Field definitions.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{Expression, Permissions, TypeSignature};

/// A field on a table.
///
/// Field names are dot-paths; `address.city` is a nested field of
/// `address`, and `tags[*]` is the element type of the array field `tags`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field name (dot-path).
    pub name: SmolStr,
    /// Declared type.
    pub type_signature: TypeSignature,
    /// Whether the field may be absent / none.
    pub optional: bool,
    /// Whether the field may only be written on creation.
    pub readonly: bool,
    /// Stored default or derived value, mutually exclusive by construction.
    pub value: FieldValue,
    /// Boolean conditions combined with logical AND, order preserved.
    pub assertions: Vec<Expression>,
    /// Per-field permissions.
    pub permissions: Permissions,
    /// Previous names, oldest first, from explicit "was" hints.
    pub rename_history: Vec<SmolStr>,
}

impl FieldDefinition {
    /// Create a field with the given name and type, no options set.
    pub fn new(name: impl Into<SmolStr>, type_signature: impl Into<TypeSignature>) -> Self {
        Self {
            name: name.into(),
            type_signature: type_signature.into(),
            optional: false,
            readonly: false,
            value: FieldValue::None,
            assertions: Vec::new(),
            permissions: Permissions::full(),
            rename_history: Vec::new(),
        }
    }

    /// Field name as a string.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is a nested field (`a.b` or deeper).
    pub fn is_nested(&self) -> bool {
        self.name.contains('.')
    }

    /// Whether this is a synthetic array-element placeholder (`tags[*]`).
    pub fn is_array_element(&self) -> bool {
        self.name.ends_with("[*]")
    }

    /// The parent path of a nested field, if any.
    pub fn parent_path(&self) -> Option<&str> {
        let trimmed = self.name.strip_suffix("[*]").unwrap_or(&self.name);
        trimmed.rsplit_once('.').map(|(parent, _)| parent)
    }

    /// Set optionality.
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Mark the field readonly.
    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    /// Set a stored default expression.
    pub fn default_expr(mut self, expr: impl Into<Expression>) -> Self {
        self.value = FieldValue::Default(expr.into());
        self
    }

    /// Set a derived (computed) value expression.
    pub fn computed_expr(mut self, expr: impl Into<Expression>) -> Self {
        self.value = FieldValue::Computed(expr.into());
        self
    }

    /// Append an assertion.
    pub fn assert(mut self, expr: impl Into<Expression>) -> Self {
        self.assertions.push(expr.into());
        self
    }

    /// Set permissions.
    pub fn permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Record a previous name (oldest first).
    pub fn was(mut self, previous: impl Into<SmolStr>) -> Self {
        self.rename_history.push(previous.into());
        self
    }
}

/// Stored default vs derived value for a field.
///
/// A field either has no value clause, a stored `DEFAULT`, or a derived
/// `VALUE`; the closed enum rules out declaring both.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FieldValue {
    /// No value clause.
    #[default]
    None,
    /// Stored default, evaluated once on write when absent.
    Default(Expression),
    /// Derived value, recomputed on every write.
    Computed(Expression),
}

impl FieldValue {
    /// The inner expression, if any.
    pub fn expression(&self) -> Option<&Expression> {
        match self {
            Self::None => None,
            Self::Default(expr) | Self::Computed(expr) => Some(expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let field = FieldDefinition::new("age", "int")
            .optional(false)
            .assert("$value >= 0")
            .default_expr("0");

        assert_eq!(field.name(), "age");
        assert_eq!(field.assertions.len(), 1);
        assert!(matches!(field.value, FieldValue::Default(_)));
    }

    #[test]
    fn test_nested_paths() {
        let field = FieldDefinition::new("address.city", "string");
        assert!(field.is_nested());
        assert_eq!(field.parent_path(), Some("address"));

        let elem = FieldDefinition::new("tags[*]", "string");
        assert!(elem.is_array_element());
    }

    #[test]
    fn test_value_exclusivity() {
        // Setting computed after default replaces it; both can never coexist.
        let field = FieldDefinition::new("total", "int")
            .default_expr("0")
            .computed_expr("price * quantity");
        assert!(matches!(field.value, FieldValue::Computed(_)));
    }

    #[test]
    fn test_rename_history_order() {
        let field = FieldDefinition::new("age", "int").was("yearsOld").was("years");
        assert_eq!(field.rename_history, vec!["yearsOld", "years"]);
    }
}
