//! Pest grammar for canonicalizable fragments.

use pest_derive::Parser;

/// Parser for expressions, type signatures and duration literals.
#[derive(Parser)]
#[grammar = "parser/strata.pest"]
pub struct StrataParser;

#[cfg(test)]
mod tests {
    use super::*;
    use pest::Parser;

    #[test]
    fn test_parse_comparison() {
        assert!(StrataParser::parse(Rule::expr_input, "$value >= 0").is_ok());
    }

    #[test]
    fn test_parse_boolean_combination() {
        assert!(StrataParser::parse(Rule::expr_input, "a = 1 AND (b = 2 OR c = 3)").is_ok());
        assert!(StrataParser::parse(Rule::expr_input, "a = 1 && b != 2").is_ok());
    }

    #[test]
    fn test_parse_function_call() {
        assert!(StrataParser::parse(Rule::expr_input, "string::len($value) > 3").is_ok());
        assert!(StrataParser::parse(Rule::expr_input, "time::now()").is_ok());
    }

    #[test]
    fn test_parse_type_signatures() {
        for input in [
            "int",
            "option<string>",
            "string | none",
            "array<record<user>, 10>",
            "set<int>",
            "number<int>",
            "datetime?",
        ] {
            assert!(
                StrataParser::parse(Rule::type_input, input).is_ok(),
                "failed to parse type `{input}`"
            );
        }
    }

    #[test]
    fn test_parse_duration() {
        assert!(StrataParser::parse(Rule::duration_input, "1h30m").is_ok());
        assert!(StrataParser::parse(Rule::duration_input, "90m").is_ok());
        assert!(StrataParser::parse(Rule::duration_input, "1w2d").is_ok());
    }

    #[test]
    fn test_reject_garbage() {
        assert!(StrataParser::parse(Rule::expr_input, "AND AND").is_err());
        assert!(StrataParser::parse(Rule::duration_input, "h1").is_err());
    }
}
