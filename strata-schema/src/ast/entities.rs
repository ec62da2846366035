//! Top-level non-table entities: functions, analyzers, accesses, params and
//! sequences.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{Expression, Permissions};

/// A user-defined function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name (without the `fn::` prefix).
    pub name: SmolStr,
    /// Typed arguments, in order.
    pub args: Vec<FunctionArg>,
    /// Function body.
    pub body: Expression,
    /// Who may call the function.
    pub permissions: Permissions,
    /// Previous names, oldest first.
    pub rename_history: Vec<SmolStr>,
}

impl FunctionDefinition {
    /// Create a function.
    pub fn new(name: impl Into<SmolStr>, body: impl Into<Expression>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            body: body.into(),
            permissions: Permissions::full(),
            rename_history: Vec::new(),
        }
    }

    /// Append a typed argument.
    pub fn arg(mut self, name: impl Into<SmolStr>, ty: impl Into<SmolStr>) -> Self {
        self.args.push(FunctionArg {
            name: name.into(),
            type_signature: ty.into(),
        });
        self
    }

    /// Record a previous name.
    pub fn was(mut self, previous: impl Into<SmolStr>) -> Self {
        self.rename_history.push(previous.into());
        self
    }
}

/// A typed function argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionArg {
    /// Argument name (without the `$` sigil).
    pub name: SmolStr,
    /// Argument type text.
    pub type_signature: SmolStr,
}

/// A full-text analyzer: a tokenizer chain plus a filter chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerDefinition {
    /// Analyzer name.
    pub name: SmolStr,
    /// Tokenizers applied in order.
    pub tokenizers: Vec<SmolStr>,
    /// Filters applied in order.
    pub filters: Vec<SmolStr>,
}

impl AnalyzerDefinition {
    /// Create an analyzer.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            tokenizers: Vec::new(),
            filters: Vec::new(),
        }
    }

    /// Append a tokenizer.
    pub fn tokenizer(mut self, t: impl Into<SmolStr>) -> Self {
        self.tokenizers.push(t.into());
        self
    }

    /// Append a filter.
    pub fn filter(mut self, f: impl Into<SmolStr>) -> Self {
        self.filters.push(f.into());
        self
    }
}

/// An access method (authentication entry point).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessDefinition {
    /// Access name.
    pub name: SmolStr,
    /// JWT- or record-based access.
    pub kind: AccessKind,
    /// Signin expression, for record access.
    pub signin: Option<Expression>,
    /// Signup expression, for record access.
    pub signup: Option<Expression>,
    /// Session lifetime as a duration literal.
    pub session_duration: Option<Expression>,
}

impl AccessDefinition {
    /// Create an access method.
    pub fn new(name: impl Into<SmolStr>, kind: AccessKind) -> Self {
        Self {
            name: name.into(),
            kind,
            signin: None,
            signup: None,
            session_duration: None,
        }
    }

    /// Set the signin expression.
    pub fn signin(mut self, expr: impl Into<Expression>) -> Self {
        self.signin = Some(expr.into());
        self
    }

    /// Set the signup expression.
    pub fn signup(mut self, expr: impl Into<Expression>) -> Self {
        self.signup = Some(expr.into());
        self
    }

    /// Set the session duration.
    pub fn session(mut self, duration: impl Into<Expression>) -> Self {
        self.session_duration = Some(duration.into());
        self
    }
}

/// Kinds of access methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessKind {
    /// Token-verified access.
    Jwt,
    /// Record-backed signup/signin access.
    Record,
}

impl AccessKind {
    /// Canonical keyword used in statements.
    pub fn as_keyword(&self) -> &'static str {
        match self {
            Self::Jwt => "JWT",
            Self::Record => "RECORD",
        }
    }
}

/// A named constant available to queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDefinition {
    /// Param name (without the `$` sigil).
    pub name: SmolStr,
    /// Param value expression.
    pub value: Expression,
}

impl ParamDefinition {
    /// Create a param.
    pub fn new(name: impl Into<SmolStr>, value: impl Into<Expression>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A monotonic id sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceDefinition {
    /// Sequence name.
    pub name: SmolStr,
    /// First value handed out.
    pub start: i64,
    /// Values reserved per allocation batch.
    pub batch: u32,
}

impl SequenceDefinition {
    /// Create a sequence starting at 0 with a batch of 1000.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            start: 0,
            batch: 1000,
        }
    }

    /// Set the start value.
    pub fn start(mut self, start: i64) -> Self {
        self.start = start;
        self
    }

    /// Set the batch size.
    pub fn batch(mut self, batch: u32) -> Self {
        self.batch = batch;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_args_ordered() {
        let func = FunctionDefinition::new("greet", "RETURN string::concat('hi ', $name)")
            .arg("name", "string")
            .arg("loud", "bool");
        assert_eq!(func.args[0].name, "name");
        assert_eq!(func.args[1].name, "loud");
    }

    #[test]
    fn test_analyzer_chains() {
        let analyzer = AnalyzerDefinition::new("english")
            .tokenizer("class")
            .filter("lowercase")
            .filter("snowball(english)");
        assert_eq!(analyzer.tokenizers.len(), 1);
        assert_eq!(analyzer.filters.len(), 2);
    }

    #[test]
    fn test_sequence_defaults() {
        let seq = SequenceDefinition::new("order_id").start(100);
        assert_eq!(seq.start, 100);
        assert_eq!(seq.batch, 1000);
    }
}
