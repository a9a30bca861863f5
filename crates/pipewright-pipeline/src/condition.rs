//! Edge condition language: parser and evaluator.
//!
//! String form:
//! ```text
//! ConditionExpr  ::= Clause ( '&&' Clause )*
//! Clause         ::= Path Operator Literal
//! Path           ::= segment ( '.' segment )*
//! Operator       ::= '==' | '=' | '!='
//! Literal        ::= QuotedString | BareWord
//! ```
//!
//! Structured form: `{ "equals": { "path": "status", "value": "ok" } }`.
//!
//! A condition that cannot be parsed evaluates to `false`.

use serde_json::Value;

use pipewright_types::{Payload, PipewrightError, Result};

/// A parsed string expression: one or more clauses joined by `&&`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionExpr {
    pub clauses: Vec<Clause>,
}

/// A single comparison clause: `path op value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub path: String,
    pub operator: Operator,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
}

/// A compiled edge condition.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeCondition {
    Expr(ConditionExpr),
    Equals { path: String, value: Value },
    /// Unparseable input; never matches.
    Invalid(String),
}

impl EdgeCondition {
    /// Compile a raw JSON condition. `null` and blank strings mean "no condition".
    pub fn compile(raw: &Value) -> Option<Self> {
        match raw {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(match parse_condition(s) {
                Ok(expr) => EdgeCondition::Expr(expr),
                Err(e) => EdgeCondition::Invalid(e.to_string()),
            }),
            Value::Object(map) => {
                let equals = map.get("equals").and_then(Value::as_object);
                let path = equals.and_then(|e| e.get("path")).and_then(Value::as_str);
                Some(match (path, equals.and_then(|e| e.get("value"))) {
                    (Some(path), Some(value)) if !path.trim().is_empty() => EdgeCondition::Equals {
                        path: path.trim().to_string(),
                        value: value.clone(),
                    },
                    _ => EdgeCondition::Invalid(format!("unsupported condition object: {raw}")),
                })
            }
            other => Some(EdgeCondition::Invalid(format!("unsupported condition: {other}"))),
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, EdgeCondition::Invalid(_))
    }

    pub fn evaluate(&self, payload: &Payload) -> bool {
        match self {
            EdgeCondition::Expr(expr) => {
                evaluate_condition(expr, &|path| payload.lookup(path).map(render).unwrap_or_default())
            }
            EdgeCondition::Equals { path, value } => match payload.lookup(path) {
                Some(actual) => actual == value || render(actual) == render(value),
                None => value.is_null(),
            },
            EdgeCondition::Invalid(_) => false,
        }
    }
}

/// Render a JSON value for comparison against a literal: strings bare, the rest
/// as compact JSON.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Parse a condition string into a [`ConditionExpr`].
pub fn parse_condition(input: &str) -> Result<ConditionExpr> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(make_error("empty condition"));
    }

    let clauses = trimmed
        .split("&&")
        .map(|part| parse_clause(part.trim()))
        .collect::<Result<Vec<_>>>()?;

    Ok(ConditionExpr { clauses })
}

fn parse_clause(input: &str) -> Result<Clause> {
    if input.is_empty() {
        return Err(make_error("empty clause"));
    }

    let (path_end, operator, op_len) = find_operator(input)?;

    let path = input[..path_end].trim().to_string();
    if path.is_empty() {
        return Err(make_error("missing path before operator"));
    }
    for seg in path.split('.') {
        if seg.is_empty() || !seg.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
            return Err(make_error(&format!("invalid path segment: '{seg}'")));
        }
    }

    let raw_value = input[path_end + op_len..].trim();
    if raw_value.is_empty() {
        return Err(make_error(&format!("missing value in '{input}'")));
    }

    Ok(Clause {
        path,
        operator,
        value: strip_quotes(raw_value),
    })
}

fn find_operator(input: &str) -> Result<(usize, Operator, usize)> {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                let quote = bytes[i];
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                i += 1;
            }
            b'!' if bytes.get(i + 1) == Some(&b'=') => return Ok((i, Operator::NotEq, 2)),
            b'=' if bytes.get(i + 1) == Some(&b'=') => return Ok((i, Operator::Eq, 2)),
            b'=' => return Ok((i, Operator::Eq, 1)),
            _ => i += 1,
        }
    }
    Err(make_error(&format!("no operator found in '{input}'")))
}

fn strip_quotes(s: &str) -> String {
    let bytes = s.as_bytes();
    if bytes.len() >= 2
        && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\''))
    {
        return s[1..s.len() - 1].to_string();
    }
    s.to_string()
}

fn make_error(msg: &str) -> PipewrightError {
    PipewrightError::Structure(format!("condition parse error: {msg}"))
}

/// Evaluate an expression, resolving each path to its rendered value (empty when
/// the path is absent).
pub fn evaluate_condition(expr: &ConditionExpr, resolve: &dyn Fn(&str) -> String) -> bool {
    expr.clauses.iter().all(|clause| {
        let actual = resolve(&clause.path);
        match clause.operator {
            Operator::Eq => actual == clause.value,
            Operator::NotEq => actual != clause.value,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        Payload::from_value(value).unwrap()
    }

    #[test]
    fn double_equals() {
        let expr = parse_condition("status==ok").unwrap();
        assert_eq!(expr.clauses[0].path, "status");
        assert_eq!(expr.clauses[0].operator, Operator::Eq);
        assert_eq!(expr.clauses[0].value, "ok");
    }

    #[test]
    fn string_condition_against_payload() {
        let cond = EdgeCondition::compile(&json!("status==ok")).unwrap();
        assert!(cond.evaluate(&payload(json!({"status": "ok"}))));
        assert!(!cond.evaluate(&payload(json!({"status": "needs_revision"}))));
        assert!(!cond.evaluate(&payload(json!({}))));
    }

    #[test]
    fn nested_paths_and_non_strings() {
        let p = payload(json!({"style_guard": {"passed": true, "score": 3}}));
        assert!(EdgeCondition::compile(&json!("style_guard.passed==true")).unwrap().evaluate(&p));
        assert!(EdgeCondition::compile(&json!("style_guard.score != 4")).unwrap().evaluate(&p));
    }

    #[test]
    fn compound_and_quoted() {
        let cond = EdgeCondition::compile(&json!(r#"status == "ok" && human_gate.decision=approved"#)).unwrap();
        let p = payload(json!({"status": "ok", "human_gate": {"decision": "approved"}}));
        assert!(cond.evaluate(&p));
    }

    #[test]
    fn structured_equals() {
        let cond = EdgeCondition::compile(&json!({"equals": {"path": "count", "value": 2}})).unwrap();
        assert!(cond.evaluate(&payload(json!({"count": 2}))));
        assert!(cond.evaluate(&payload(json!({"count": "2"}))));
        assert!(!cond.evaluate(&payload(json!({"count": 3}))));
    }

    #[test]
    fn malformed_conditions_never_match() {
        for raw in [json!("status"), json!("==ok"), json!({"contains": {}}), json!(42)] {
            let cond = EdgeCondition::compile(&raw).unwrap();
            assert!(!cond.is_valid(), "{raw}");
            assert!(!cond.evaluate(&payload(json!({"status": "ok"}))));
        }
    }

    #[test]
    fn blank_means_unconditional() {
        assert!(EdgeCondition::compile(&json!("  ")).is_none());
        assert!(EdgeCondition::compile(&Value::Null).is_none());
    }
}
