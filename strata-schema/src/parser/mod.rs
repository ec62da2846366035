//! Canonicalization of expressions, type signatures and durations.
//!
//! The comparator works by text equality, so every fragment that can be
//! spelled more than one way is parsed here and re-emitted in exactly one
//! canonical spelling:
//!
//! - types: `str` vs `string`, `option<int>` vs `int | none` vs `int?`
//! - durations: `90m` vs `1h30m` vs `5400s`
//! - boolean expressions: `a=1 && b=2` vs `(a = 1) AND (b = 2)`

mod grammar;

use pest::Parser;
use pest::iterators::Pair;
use smol_str::SmolStr;

pub use grammar::{Rule, StrataParser};

/// A canonicalization failure, positioned within the source text.
#[derive(Debug, Clone)]
pub struct CanonError {
    /// What went wrong.
    pub message: String,
    /// Byte offset of the problem.
    pub offset: usize,
    /// Length of the offending span.
    pub len: usize,
}

impl CanonError {
    fn from_pest(src: &str, err: pest::error::Error<Rule>) -> Self {
        let (offset, len) = match err.location {
            pest::error::InputLocation::Pos(p) => (p.min(src.len()), 1),
            pest::error::InputLocation::Span((s, e)) => (s, e.saturating_sub(s).max(1)),
        };
        Self {
            message: err.variant.message().into_owned(),
            offset,
            len,
        }
    }
}

type CanonResult<T> = Result<T, CanonError>;

// ---------------------------------------------------------------------------
// Durations
// ---------------------------------------------------------------------------

const NANOS_PER: &[(&str, u128)] = &[
    ("y", 365 * 86_400 * 1_000_000_000),
    ("w", 7 * 86_400 * 1_000_000_000),
    ("d", 86_400 * 1_000_000_000),
    ("h", 3_600 * 1_000_000_000),
    ("m", 60 * 1_000_000_000),
    ("s", 1_000_000_000),
    ("ms", 1_000_000),
    ("us", 1_000),
    ("ns", 1),
];

/// Canonical output units, largest first. `w` and `y` fold into days.
const CANONICAL_UNITS: &[(&str, u128)] = &[
    ("d", 86_400 * 1_000_000_000),
    ("h", 3_600 * 1_000_000_000),
    ("m", 60 * 1_000_000_000),
    ("s", 1_000_000_000),
    ("ms", 1_000_000),
    ("us", 1_000),
    ("ns", 1),
];

/// Canonicalize a duration literal: `90m` and `5400s` both become `1h30m`.
pub fn canonicalize_duration(src: &str) -> CanonResult<String> {
    StrataParser::parse(Rule::duration_input, src)
        .map_err(|e| CanonError::from_pest(src, e))?;
    Ok(render_duration(duration_nanos(src)?))
}

/// Total nanoseconds in an already-validated duration literal.
///
/// Components that do not fit in `u128` nanoseconds are an error, not a
/// silent wrap.
fn duration_nanos(src: &str) -> CanonResult<u128> {
    let mut total: u128 = 0;
    let mut rest = src;
    while !rest.is_empty() {
        let start = src.len() - rest.len();
        let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let digits = &rest[..digits_end];
        let value: u128 = digits.parse().map_err(|_| CanonError {
            message: format!("duration component `{digits}` is out of range"),
            offset: start,
            len: digits_end.max(1),
        })?;
        rest = &rest[digits_end..];
        let unit_end = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        rest = &rest[unit_end..];
        let scale = NANOS_PER
            .iter()
            .find(|(u, _)| *u == unit)
            .map(|(_, n)| *n)
            .unwrap_or(0);
        total = value
            .checked_mul(scale)
            .and_then(|nanos| total.checked_add(nanos))
            .ok_or_else(|| CanonError {
                message: format!("duration `{src}` is out of range"),
                offset: 0,
                len: src.len(),
            })?;
    }
    Ok(total)
}

fn render_duration(mut nanos: u128) -> String {
    if nanos == 0 {
        return "0s".to_string();
    }
    let mut out = String::new();
    for (unit, scale) in CANONICAL_UNITS {
        let count = nanos / scale;
        if count > 0 {
            out.push_str(&count.to_string());
            out.push_str(unit);
            nanos -= count * scale;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Type signatures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum TypeExpr {
    Simple {
        name: SmolStr,
        param: Option<Box<TypeExpr>>,
    },
    Record(Vec<SmolStr>),
    Array {
        inner: Option<Box<TypeExpr>>,
        max: Option<u64>,
    },
    Set {
        inner: Option<Box<TypeExpr>>,
        max: Option<u64>,
    },
    Optional(Box<TypeExpr>),
    Union(Vec<TypeExpr>),
}

/// Canonicalize a type signature: collapse aliases and nullable-wrapper
/// spellings so that `option<int>`, `int | none` and `int?` compare equal.
pub fn canonicalize_type(src: &str) -> CanonResult<String> {
    let mut pairs = StrataParser::parse(Rule::type_input, src)
        .map_err(|e| CanonError::from_pest(src, e))?;
    let input = pairs.next().expect("type_input pair");
    let ty_pair = input.into_inner().next().expect("ty pair");
    let parsed = build_type(ty_pair);
    Ok(render_type(&normalize_type(parsed)))
}

fn build_type(pair: Pair<'_, Rule>) -> TypeExpr {
    debug_assert_eq!(pair.as_rule(), Rule::ty);
    let mut members = Vec::new();
    let mut optional = false;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ty_atom => members.push(build_type_atom(inner)),
            Rule::opt_mark => optional = true,
            _ => {}
        }
    }
    let base = if members.len() == 1 {
        members.pop().expect("single member")
    } else {
        TypeExpr::Union(members)
    };
    if optional {
        TypeExpr::Optional(Box::new(base))
    } else {
        base
    }
}

fn build_type_atom(pair: Pair<'_, Rule>) -> TypeExpr {
    let inner = pair.into_inner().next().expect("ty_atom inner");
    match inner.as_rule() {
        Rule::ty_option => {
            let ty = inner.into_inner().next().expect("option inner");
            TypeExpr::Optional(Box::new(build_type(ty)))
        }
        Rule::ty_array | Rule::ty_set => {
            let is_set = inner.as_rule() == Rule::ty_set;
            let mut elem = None;
            let mut max = None;
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::ty => elem = Some(Box::new(build_type(part))),
                    Rule::integer => max = part.as_str().parse().ok(),
                    _ => {}
                }
            }
            if is_set {
                TypeExpr::Set { inner: elem, max }
            } else {
                TypeExpr::Array { inner: elem, max }
            }
        }
        Rule::ty_record => {
            let targets = inner
                .into_inner()
                .filter(|p| p.as_rule() == Rule::ident)
                .map(|p| SmolStr::new(p.as_str()))
                .collect();
            TypeExpr::Record(targets)
        }
        Rule::ty_simple => {
            let mut parts = inner.into_inner();
            let name = SmolStr::new(parts.next().expect("simple name").as_str());
            let param = parts.next().map(|p| Box::new(build_type(p)));
            TypeExpr::Simple { name, param }
        }
        other => unreachable!("unexpected type atom rule {other:?}"),
    }
}

/// Map alias spellings of scalar names onto one canonical name.
fn canonical_scalar(name: &str) -> &str {
    match name {
        "str" | "text" => "string",
        "boolean" => "bool",
        "double" => "float",
        "integer" => "int",
        other => other,
    }
}

fn is_none_type(t: &TypeExpr) -> bool {
    matches!(
        t,
        TypeExpr::Simple { name, param: None } if name == "none" || name == "null"
    )
}

fn normalize_type(t: TypeExpr) -> TypeExpr {
    match t {
        TypeExpr::Simple { name, param } => {
            let name = SmolStr::new(canonical_scalar(&name));
            // `number<int>` is an alias for the plain scalar.
            if name == "number"
                && let Some(param) = &param
                && let TypeExpr::Simple { name: inner, param: None } = param.as_ref()
                && matches!(canonical_scalar(inner), "int" | "float" | "decimal")
            {
                return TypeExpr::Simple {
                    name: SmolStr::new(canonical_scalar(inner)),
                    param: None,
                };
            }
            TypeExpr::Simple {
                name,
                param: param.map(|p| Box::new(normalize_type(*p))),
            }
        }
        TypeExpr::Record(mut targets) => {
            targets.sort();
            targets.dedup();
            TypeExpr::Record(targets)
        }
        TypeExpr::Array { inner, max } => TypeExpr::Array {
            inner: inner.map(|i| Box::new(normalize_type(*i))),
            max,
        },
        TypeExpr::Set { inner, max } => TypeExpr::Set {
            inner: inner.map(|i| Box::new(normalize_type(*i))),
            max,
        },
        TypeExpr::Optional(inner) => {
            let inner = normalize_type(*inner);
            match inner {
                TypeExpr::Optional(i) => TypeExpr::Optional(i),
                other => TypeExpr::Optional(Box::new(other)),
            }
        }
        TypeExpr::Union(members) => {
            let mut optional = false;
            let mut flat = Vec::new();
            for member in members {
                let member = normalize_type(member);
                match member {
                    TypeExpr::Union(nested) => flat.extend(nested),
                    m if is_none_type(&m) => optional = true,
                    TypeExpr::Optional(inner) => {
                        optional = true;
                        flat.push(*inner);
                    }
                    m => flat.push(m),
                }
            }
            let mut rendered: Vec<(String, TypeExpr)> =
                flat.into_iter().map(|m| (render_type(&m), m)).collect();
            rendered.sort_by(|a, b| a.0.cmp(&b.0));
            rendered.dedup_by(|a, b| a.0 == b.0);
            let mut members: Vec<TypeExpr> = rendered.into_iter().map(|(_, m)| m).collect();
            let base = match members.len() {
                0 => TypeExpr::Simple {
                    name: SmolStr::new("none"),
                    param: None,
                },
                1 => members.pop().expect("single member"),
                _ => TypeExpr::Union(members),
            };
            if optional && !is_none_type(&base) {
                TypeExpr::Optional(Box::new(base))
            } else {
                base
            }
        }
    }
}

fn render_type(t: &TypeExpr) -> String {
    match t {
        TypeExpr::Simple { name, param } => match param {
            Some(p) => format!("{name}<{}>", render_type(p)),
            None => name.to_string(),
        },
        TypeExpr::Record(targets) => {
            if targets.is_empty() {
                "record".to_string()
            } else {
                format!("record<{}>", targets.join(" | "))
            }
        }
        TypeExpr::Array { inner, max } => render_collection("array", inner.as_deref(), *max),
        TypeExpr::Set { inner, max } => render_collection("set", inner.as_deref(), *max),
        TypeExpr::Optional(inner) => format!("option<{}>", render_type(inner)),
        TypeExpr::Union(members) => members
            .iter()
            .map(render_type)
            .collect::<Vec<_>>()
            .join(" | "),
    }
}

fn render_collection(kw: &str, inner: Option<&TypeExpr>, max: Option<u64>) -> String {
    match (inner, max) {
        (None, _) => kw.to_string(),
        (Some(i), None) => format!("{kw}<{}>", render_type(i)),
        (Some(i), Some(n)) => format!("{kw}<{}, {n}>", render_type(i)),
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum ExprNode {
    Or(Vec<ExprNode>),
    And(Vec<ExprNode>),
    Not(Box<ExprNode>),
    Cmp {
        op: SmolStr,
        lhs: Box<ExprNode>,
        rhs: Box<ExprNode>,
    },
    Binary {
        op: SmolStr,
        lhs: Box<ExprNode>,
        rhs: Box<ExprNode>,
    },
    Call {
        name: SmolStr,
        args: Vec<ExprNode>,
    },
    Path(SmolStr),
    Number(SmolStr),
    Str(String),
    Duration(String),
    Bool(bool),
    NoneLit,
}

impl ExprNode {
    fn is_leaf(&self) -> bool {
        matches!(
            self,
            Self::Call { .. }
                | Self::Path(_)
                | Self::Number(_)
                | Self::Str(_)
                | Self::Duration(_)
                | Self::Bool(_)
                | Self::NoneLit
        )
    }
}

/// Canonicalize a boolean/value expression.
///
/// The canonical form uppercases `AND`/`OR`, rewrites `&&`/`||`/`NOT`,
/// collapses `==` to `=`, flattens associative chains and re-parenthesizes
/// with exactly one rule: every non-leaf sub-expression is wrapped, the top
/// level is not.
pub fn canonicalize_expression(src: &str) -> CanonResult<String> {
    let mut pairs = StrataParser::parse(Rule::expr_input, src)
        .map_err(|e| CanonError::from_pest(src, e))?;
    let input = pairs.next().expect("expr_input pair");
    let expr = input.into_inner().next().expect("expr pair");
    let node = flatten(build_expr(expr));
    Ok(render_expr(&node, true))
}

fn build_expr(pair: Pair<'_, Rule>) -> ExprNode {
    match pair.as_rule() {
        Rule::expr => build_expr(pair.into_inner().next().expect("or_expr")),
        Rule::or_expr => build_chain(pair, ExprNode::Or),
        Rule::and_expr => build_chain(pair, ExprNode::And),
        Rule::unary_expr => {
            let mut negations = 0usize;
            let mut node = None;
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::not_op => negations += 1,
                    _ => node = Some(build_expr(inner)),
                }
            }
            let mut node = node.expect("comparison under unary");
            for _ in 0..negations {
                node = ExprNode::Not(Box::new(node));
            }
            node
        }
        Rule::comparison => {
            let mut inner = pair.into_inner();
            let lhs = build_expr(inner.next().expect("lhs"));
            match (inner.next(), inner.next()) {
                (Some(op), Some(rhs)) => ExprNode::Cmp {
                    op: canonical_cmp_op(op.as_str()),
                    lhs: Box::new(lhs),
                    rhs: Box::new(build_expr(rhs)),
                },
                _ => lhs,
            }
        }
        Rule::additive | Rule::term => {
            let mut inner = pair.into_inner();
            let mut node = build_expr(inner.next().expect("first operand"));
            while let (Some(op), Some(rhs)) = (inner.next(), inner.next()) {
                node = ExprNode::Binary {
                    op: SmolStr::new(op.as_str()),
                    lhs: Box::new(node),
                    rhs: Box::new(build_expr(rhs)),
                };
            }
            node
        }
        Rule::factor => build_expr(pair.into_inner().next().expect("factor inner")),
        Rule::paren => build_expr(pair.into_inner().next().expect("paren inner")),
        Rule::func_call => {
            let mut inner = pair.into_inner();
            let name = SmolStr::new(inner.next().expect("func name").as_str());
            let args = inner.map(build_expr).collect();
            ExprNode::Call { name, args }
        }
        Rule::path => ExprNode::Path(SmolStr::new(pair.as_str())),
        Rule::number => ExprNode::Number(SmolStr::new(pair.as_str())),
        Rule::string_lit => {
            let text = pair.as_str();
            ExprNode::Str(text[1..text.len() - 1].to_string())
        }
        Rule::duration => ExprNode::Duration(render_duration(
            duration_nanos(pair.as_str()).expect("duration validated by grammar"),
        )),
        Rule::bool_lit => ExprNode::Bool(pair.as_str() == "true"),
        Rule::none_lit => ExprNode::NoneLit,
        other => unreachable!("unexpected expression rule {other:?}"),
    }
}

fn build_chain(pair: Pair<'_, Rule>, make: fn(Vec<ExprNode>) -> ExprNode) -> ExprNode {
    let operands: Vec<ExprNode> = pair
        .into_inner()
        .filter(|p| !matches!(p.as_rule(), Rule::or_op | Rule::and_op))
        .map(build_expr)
        .collect();
    if operands.len() == 1 {
        operands.into_iter().next().expect("single operand")
    } else {
        make(operands)
    }
}

fn canonical_cmp_op(op: &str) -> SmolStr {
    SmolStr::new(match op {
        "==" => "=",
        other => other,
    })
}

/// Flatten associative And/Or chains so `(a AND b) AND c` equals
/// `a AND b AND c`.
fn flatten(node: ExprNode) -> ExprNode {
    match node {
        ExprNode::Or(members) => ExprNode::Or(flatten_members(members, true)),
        ExprNode::And(members) => ExprNode::And(flatten_members(members, false)),
        ExprNode::Not(inner) => ExprNode::Not(Box::new(flatten(*inner))),
        ExprNode::Cmp { op, lhs, rhs } => ExprNode::Cmp {
            op,
            lhs: Box::new(flatten(*lhs)),
            rhs: Box::new(flatten(*rhs)),
        },
        ExprNode::Binary { op, lhs, rhs } => ExprNode::Binary {
            op,
            lhs: Box::new(flatten(*lhs)),
            rhs: Box::new(flatten(*rhs)),
        },
        ExprNode::Call { name, args } => ExprNode::Call {
            name,
            args: args.into_iter().map(flatten).collect(),
        },
        leaf => leaf,
    }
}

fn flatten_members(members: Vec<ExprNode>, or: bool) -> Vec<ExprNode> {
    let mut out = Vec::with_capacity(members.len());
    for member in members {
        match flatten(member) {
            ExprNode::Or(nested) if or => out.extend(nested),
            ExprNode::And(nested) if !or => out.extend(nested),
            other => out.push(other),
        }
    }
    out
}

fn render_expr(node: &ExprNode, top: bool) -> String {
    let text = match node {
        ExprNode::Or(members) => members
            .iter()
            .map(|m| render_expr(m, false))
            .collect::<Vec<_>>()
            .join(" OR "),
        ExprNode::And(members) => members
            .iter()
            .map(|m| render_expr(m, false))
            .collect::<Vec<_>>()
            .join(" AND "),
        ExprNode::Not(inner) => return format!("!{}", render_expr(inner, false)),
        ExprNode::Cmp { op, lhs, rhs } => {
            format!("{} {op} {}", render_expr(lhs, false), render_expr(rhs, false))
        }
        ExprNode::Binary { op, lhs, rhs } => {
            format!("{} {op} {}", render_expr(lhs, false), render_expr(rhs, false))
        }
        ExprNode::Call { name, args } => {
            let args = args
                .iter()
                .map(|a| render_expr(a, true))
                .collect::<Vec<_>>()
                .join(", ");
            return format!("{name}({args})");
        }
        ExprNode::Path(p) => return p.to_string(),
        ExprNode::Number(n) => return n.to_string(),
        ExprNode::Str(s) => return format!("\"{s}\""),
        ExprNode::Duration(d) => return d.clone(),
        ExprNode::Bool(b) => return b.to_string(),
        ExprNode::NoneLit => return "NONE".to_string(),
    };
    if top || node.is_leaf() {
        text
    } else {
        format!("({text})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_duration_canonical_forms_agree() {
        assert_eq!(canonicalize_duration("90m").unwrap(), "1h30m");
        assert_eq!(canonicalize_duration("5400s").unwrap(), "1h30m");
        assert_eq!(canonicalize_duration("1h30m").unwrap(), "1h30m");
        assert_eq!(canonicalize_duration("1w").unwrap(), "7d");
        assert_eq!(canonicalize_duration("1500ms").unwrap(), "1s500ms");
    }

    #[test]
    fn test_duration_out_of_range_is_rejected() {
        // One digit past u128::MAX.
        assert!(canonicalize_duration("340282366920938463463374607431768211456ns").is_err());
        // Fits in u128 but overflows once scaled to nanoseconds.
        assert!(canonicalize_duration("999999999999999999999999999y").is_err());
        // Sum of components overflows even though each scales cleanly.
        let max_ns = format!("{}ns", u128::MAX);
        assert!(canonicalize_duration(&format!("1s{max_ns}")).is_err());
    }

    #[test]
    fn test_type_alias_collapse() {
        assert_eq!(canonicalize_type("str").unwrap(), "string");
        assert_eq!(canonicalize_type("number<int>").unwrap(), "int");
        assert_eq!(canonicalize_type("bool").unwrap(), "bool");
    }

    #[test]
    fn test_nullable_wrapper_spellings_agree() {
        let canonical = "option<int>";
        assert_eq!(canonicalize_type("option<int>").unwrap(), canonical);
        assert_eq!(canonicalize_type("int | none").unwrap(), canonical);
        assert_eq!(canonicalize_type("int?").unwrap(), canonical);
        assert_eq!(canonicalize_type("option<option<int>>").unwrap(), canonical);
    }

    #[test]
    fn test_union_members_sorted() {
        assert_eq!(
            canonicalize_type("string | int").unwrap(),
            canonicalize_type("int | string").unwrap()
        );
        assert_eq!(
            canonicalize_type("record<post | user>").unwrap(),
            canonicalize_type("record<user | post>").unwrap()
        );
    }

    #[test]
    fn test_nested_collection_types() {
        assert_eq!(
            canonicalize_type("array<record<user>, 10>").unwrap(),
            "array<record<user>, 10>"
        );
        assert_eq!(canonicalize_type("set<str>").unwrap(), "set<string>");
    }

    #[test]
    fn test_expression_reparenthesization_is_stable() {
        let a = canonicalize_expression("a = 1 && b = 2").unwrap();
        let b = canonicalize_expression("(a = 1) AND (b = 2)").unwrap();
        let c = canonicalize_expression("a == 1 AND b == 2").unwrap();
        assert_eq!(a, "(a = 1) AND (b = 2)");
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_associative_chains_flatten() {
        let a = canonicalize_expression("a AND b AND c").unwrap();
        let b = canonicalize_expression("(a AND b) AND c").unwrap();
        let c = canonicalize_expression("a AND (b AND c)").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_expression_with_function_and_duration() {
        assert_eq!(
            canonicalize_expression("string::len($value) > 3").unwrap(),
            "string::len($value) > 3"
        );
        assert_eq!(
            canonicalize_expression("session::age() < 90m").unwrap(),
            "session::age() < 1h30m"
        );
    }

    #[test]
    fn test_not_and_precedence() {
        assert_eq!(
            canonicalize_expression("NOT a = 1 OR b = 2").unwrap(),
            "!(a = 1) OR (b = 2)"
        );
    }

    #[test]
    fn test_unparseable_expression_is_an_error() {
        let err = canonicalize_expression("a = = 1").unwrap_err();
        assert!(!err.message.is_empty());
    }
}
