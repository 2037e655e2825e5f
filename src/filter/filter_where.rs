use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::error::FilterError;
use super::types::{FilterOp, WhereClause};

/// Evaluates a [`WhereClause`] against a single row
pub struct FilterWhere;

impl FilterWhere {
    pub fn matches(clause: &WhereClause, row: &Map<String, Value>) -> Result<bool, FilterError> {
        for (field, condition) in &clause.fields {
            if !Self::matches_field(row.get(field), condition)? {
                return Ok(false);
            }
        }

        if let Some(and) = &clause.and {
            for sub in and {
                if !Self::matches(sub, row)? {
                    return Ok(false);
                }
            }
        }

        if let Some(or) = &clause.or {
            // Empty OR matches nothing
            let mut any = false;
            for sub in or {
                if Self::matches(sub, row)? {
                    any = true;
                    break;
                }
            }
            if !any {
                return Ok(false);
            }
        }

        if let Some(not) = &clause.not {
            for sub in not {
                if Self::matches(sub, row)? {
                    return Ok(false);
                }
            }
        }

        Ok(true)
    }

    fn matches_field(actual: Option<&Value>, condition: &Value) -> Result<bool, FilterError> {
        match condition {
            Value::Object(ops) => {
                for (op_key, op_val) in ops {
                    let op = FilterOp::parse(op_key)
                        .ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
                    if !Self::apply(op, actual, op_val)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            // Implicit equality: { field: value }
            other => Ok(Self::equals(actual, other)),
        }
    }

    fn apply(op: FilterOp, actual: Option<&Value>, data: &Value) -> Result<bool, FilterError> {
        Ok(match op {
            FilterOp::Equals => Self::equals(actual, data),
            FilterOp::Not => match data {
                Value::Object(_) => !Self::matches_field(actual, data)?,
                other => !Self::equals(actual, other),
            },
            FilterOp::In => Self::list(op, data)?.iter().any(|v| Self::equals(actual, v)),
            FilterOp::NotIn => !Self::list(op, data)?.iter().any(|v| Self::equals(actual, v)),
            FilterOp::Lt => Self::compare(actual, data) == Some(Ordering::Less),
            FilterOp::Lte => matches!(Self::compare(actual, data), Some(Ordering::Less | Ordering::Equal)),
            FilterOp::Gt => Self::compare(actual, data) == Some(Ordering::Greater),
            FilterOp::Gte => matches!(Self::compare(actual, data), Some(Ordering::Greater | Ordering::Equal)),
            FilterOp::Contains => Self::text(op, actual, data)?.map_or(false, |(a, d)| a.contains(d)),
            FilterOp::StartsWith => Self::text(op, actual, data)?.map_or(false, |(a, d)| a.starts_with(d)),
            FilterOp::EndsWith => Self::text(op, actual, data)?.map_or(false, |(a, d)| a.ends_with(d)),
        })
    }

    // Missing attribute compares equal to null
    fn equals(actual: Option<&Value>, expected: &Value) -> bool {
        match actual {
            Some(value) => value == expected,
            None => expected.is_null(),
        }
    }

    fn list(op: FilterOp, data: &Value) -> Result<&Vec<Value>, FilterError> {
        data.as_array()
            .ok_or_else(|| FilterError::InvalidOperatorData(format!("{:?} requires array", op)))
    }

    fn text<'a>(op: FilterOp, actual: Option<&'a Value>, data: &'a Value) -> Result<Option<(&'a str, &'a str)>, FilterError> {
        let needle = data
            .as_str()
            .ok_or_else(|| FilterError::InvalidOperatorData(format!("{:?} requires string", op)))?;
        Ok(actual.and_then(Value::as_str).map(|haystack| (haystack, needle)))
    }

    /// Ordering between two scalars of the same kind; `None` when incomparable
    pub fn compare(actual: Option<&Value>, data: &Value) -> Option<Ordering> {
        match (actual?, data) {
            (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}
