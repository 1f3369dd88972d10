//! Rule evaluation against an [`EvaluationContext`].

use thiserror::Error;

use super::{CompareOp, Rule};
use crate::candidate::{EvaluationContext, FieldValue};

const FIELD_NAMESPACES: [&str; 4] = ["candidate.", "quality.", "release.", "media."];

/// Why a rule could not be evaluated. The rule is treated as non-matching.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuleError {
    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("operator {op} needs numeric operands, got {left:?} and {right:?}")]
    TypeMismatch {
        op: CompareOp,
        left: String,
        right: String,
    },
}

/// Evaluate a rule tree. `and`/`or` short-circuit.
pub fn evaluate_rule(rule: &Rule, ctx: &EvaluationContext) -> Result<bool, RuleError> {
    match rule {
        Rule::Compare { left, op, right } => {
            let left = resolve_operand(left, ctx)?;
            let right = resolve_operand(right, ctx)?;
            compare(&left, *op, &right)
        }
        Rule::And { rules } => {
            for rule in rules {
                if !evaluate_rule(rule, ctx)? {
                    return Ok(false);
                }
            }
            Ok(!rules.is_empty())
        }
        Rule::Or { rules } => {
            for rule in rules {
                if evaluate_rule(rule, ctx)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Rule::Not { rule } => Ok(!evaluate_rule(rule, ctx)?),
    }
}

/// Whether an operand names a context field rather than a literal.
pub fn is_field_path(operand: &str) -> bool {
    FIELD_NAMESPACES.iter().any(|ns| operand.starts_with(ns))
}

fn resolve_operand(operand: &str, ctx: &EvaluationContext) -> Result<FieldValue, RuleError> {
    let operand = operand.trim();
    if is_field_path(operand) {
        return ctx
            .get_field(operand)
            .map_err(|_| RuleError::UnknownField(operand.to_string()));
    }
    Ok(parse_literal(operand))
}

fn parse_literal(literal: &str) -> FieldValue {
    if let Ok(v) = literal.parse::<i64>() {
        return FieldValue::Int(v);
    }
    if let Ok(v) = literal.parse::<f64>() {
        return FieldValue::Float(v);
    }
    FieldValue::Text(literal.to_string())
}

fn compare(left: &FieldValue, op: CompareOp, right: &FieldValue) -> Result<bool, RuleError> {
    match op {
        CompareOp::Eq => Ok(equals(left, right)),
        CompareOp::Ne => Ok(!equals(left, right)),
        CompareOp::Gt => numeric(left, op, right).map(|(l, r)| l > r),
        CompareOp::Gte => numeric(left, op, right).map(|(l, r)| l >= r),
        CompareOp::Lt => numeric(left, op, right).map(|(l, r)| l < r),
        CompareOp::Lte => numeric(left, op, right).map(|(l, r)| l <= r),
        CompareOp::Contains => Ok(left.to_string().contains(&right.to_string())),
        CompareOp::In => Ok(member_of(left, right)),
        CompareOp::NotIn => Ok(!member_of(left, right)),
    }
}

fn equals(left: &FieldValue, right: &FieldValue) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => l == r,
        _ => left.to_string() == right.to_string(),
    }
}

fn numeric(left: &FieldValue, op: CompareOp, right: &FieldValue) -> Result<(f64, f64), RuleError> {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => Ok((l, r)),
        _ => Err(RuleError::TypeMismatch {
            op,
            left: left.to_string(),
            right: right.to_string(),
        }),
    }
}

/// `in`: the right side is a list field or a comma-separated literal.
/// A list on the left matches when any element is a member.
fn member_of(left: &FieldValue, right: &FieldValue) -> bool {
    let set: Vec<String> = match right {
        FieldValue::List(items) => items.iter().map(|s| s.trim().to_string()).collect(),
        other => other
            .to_string()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    };

    match left {
        FieldValue::List(items) => items.iter().any(|item| set.iter().any(|s| s == item)),
        other => {
            let needle = other.to_string();
            set.iter().any(|s| *s == needle)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{DownloadCandidate, MediaRef, Protocol};

    fn ctx() -> EvaluationContext {
        EvaluationContext::new(DownloadCandidate {
            protocol: Protocol::Torrent,
            title: "Movie.Title.2012.1080p.BluRay.x264-SPARKS".to_string(),
            link: "http://x".to_string(),
            indexer: "Tracker One".to_string(),
            indexer_id: 4,
            guid: "g".to_string(),
            seeders: 25,
            peers: 3,
            size: 4_000_000_000,
            age: 100,
            age_hours: 0.5,
            grabs: 9,
            categories: vec!["2000".to_string(), "2040".to_string()],
            publish_date: None,
        })
        .with_media(MediaRef::movie("Movie Title", Some(2012)))
    }

    fn eval(left: &str, op: CompareOp, right: &str) -> Result<bool, RuleError> {
        evaluate_rule(&Rule::compare(left, op, right), &ctx())
    }

    #[test]
    fn test_equality() {
        assert!(eval("quality.resolution", CompareOp::Eq, "1080p").unwrap());
        assert!(eval("release.release_group", CompareOp::Eq, "SPARKS").unwrap());
        assert!(eval("candidate.seeders", CompareOp::Eq, "25.0").unwrap());
        assert!(eval("quality.source", CompareOp::Ne, "HDTV").unwrap());
        assert!(eval("quality.is_remux", CompareOp::Eq, "false").unwrap());
    }

    #[test]
    fn test_numeric_ordering() {
        assert!(eval("candidate.seeders", CompareOp::Gt, "10").unwrap());
        assert!(eval("candidate.seeders", CompareOp::Gte, "25").unwrap());
        assert!(!eval("candidate.seeders", CompareOp::Lt, "25").unwrap());
        assert!(eval("candidate.age_hours", CompareOp::Lte, "0.5").unwrap());
        assert!(eval("media.year", CompareOp::Gte, "2010").unwrap());
    }

    #[test]
    fn test_type_mismatch() {
        assert!(matches!(
            eval("quality.resolution", CompareOp::Gt, "720"),
            Err(RuleError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_field() {
        assert_eq!(
            eval("candidate.bogus", CompareOp::Eq, "1"),
            Err(RuleError::UnknownField("candidate.bogus".to_string()))
        );
    }

    #[test]
    fn test_contains_and_in() {
        assert!(eval("candidate.title", CompareOp::Contains, "BluRay").unwrap());
        assert!(!eval("candidate.title", CompareOp::Contains, "bluray").unwrap());
        assert!(eval("candidate.indexer", CompareOp::In, "Tracker One, Other").unwrap());
        assert!(eval("candidate.indexer", CompareOp::NotIn, "Other,Third").unwrap());
        assert!(eval("candidate.categories", CompareOp::In, "5000, 2040").unwrap());
        assert!(eval("candidate.categories", CompareOp::Contains, "2040").unwrap());
    }

    #[test]
    fn test_logical_operators() {
        let c = ctx();
        let rule = Rule::and(vec![
            Rule::compare("candidate.seeders", CompareOp::Gt, "10"),
            Rule::or(vec![
                Rule::compare("quality.resolution", CompareOp::Eq, "2160p"),
                Rule::compare("quality.resolution", CompareOp::Eq, "1080p"),
            ]),
            Rule::not(Rule::compare("candidate.protocol", CompareOp::Eq, "usenet")),
        ]);
        assert!(evaluate_rule(&rule, &c).unwrap());
        assert!(!evaluate_rule(&Rule::and(vec![]), &c).unwrap());
        assert!(!evaluate_rule(&Rule::or(vec![]), &c).unwrap());
    }

    #[test]
    fn test_short_circuit_skips_errors() {
        let rule = Rule::or(vec![
            Rule::compare("candidate.seeders", CompareOp::Gt, "1"),
            Rule::compare("candidate.bogus", CompareOp::Eq, "1"),
        ]);
        assert!(evaluate_rule(&rule, &ctx()).unwrap());
    }
}
