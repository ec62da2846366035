//! Opaque expression values.
//!
//! Expressions (assertions, defaults, permissions clauses, trigger
//! conditions) are carried through the IR as text. The comparator only ever
//! sees documents that went through [`crate::normalize`], where each
//! expression has been re-emitted in canonical form, so equality here is
//! plain text equality.

use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A single expression, stored as source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expression(SmolStr);

impl Expression {
    /// Create an expression from source text.
    pub fn new(text: impl Into<SmolStr>) -> Self {
        Self(text.into())
    }

    /// The expression text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the expression is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Expression {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Expression {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// A type signature, stored as text.
///
/// Like [`Expression`], the text is canonicalized during normalization;
/// `int` and `number<int>` compare equal only after that pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeSignature(SmolStr);

impl TypeSignature {
    /// Create a type signature from source text.
    pub fn new(text: impl Into<SmolStr>) -> Self {
        Self(text.into())
    }

    /// The signature text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeSignature {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}
