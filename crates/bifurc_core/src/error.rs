//! Typed errors surfaced to callers that display them directly.
//!
//! Positions are 1-based character offsets into the original input so a
//! front-end can point at the offending token.

use thiserror::Error;

/// Why an expression string was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("expression is empty")]
    Empty,
    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedChar { ch: char, position: usize },
    #[error("invalid number '{text}' at position {position}")]
    InvalidNumber { text: String, position: usize },
    #[error("unexpected '{token}' at position {position}, expected {expected}")]
    UnexpectedToken {
        token: String,
        position: usize,
        expected: &'static str,
    },
    #[error("unexpected end of expression, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
    #[error("unknown identifier '{name}' at position {position}")]
    UnknownIdentifier { name: String, position: usize },
    #[error("unknown function '{name}' at position {position}")]
    UnknownFunction { name: String, position: usize },
    #[error("function '{name}' at position {position} must be called with an argument, e.g. {name}(x)")]
    MissingCall { name: String, position: usize },
    #[error("expression is nested more than {limit} levels deep at position {position}")]
    TooDeep { position: usize, limit: usize },
    #[error("symbol '{name}' is declared more than once")]
    DuplicateSymbol { name: String },
    #[error("cannot differentiate with respect to '{name}': it is not a declared variable")]
    UnknownVariable { name: String },
}

/// Why a numeric evaluation did not produce a usable value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("'{expression}' is not finite at {point} (got {value})")]
    NonFinite {
        expression: String,
        value: f64,
        point: String,
    },
    #[error("no value supplied for '{name}'")]
    MissingBinding { name: String },
    #[error("expected {expected} values, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_token() {
        let err = ParseError::UnknownIdentifier {
            name: "z".to_string(),
            position: 5,
        };
        assert_eq!(err.to_string(), "unknown identifier 'z' at position 5");

        let err = ParseError::UnexpectedToken {
            token: ")".to_string(),
            position: 3,
            expected: "an operand",
        };
        assert!(err.to_string().contains("')' at position 3"));
    }

    #[test]
    fn evaluation_errors_convert_into_anyhow() {
        let err: anyhow::Error = EvaluationError::MissingBinding {
            name: "r".to_string(),
        }
        .into();
        assert!(err.to_string().contains("'r'"));
        assert!(err.downcast_ref::<EvaluationError>().is_some());
    }
}
