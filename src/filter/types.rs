use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Row filter in the data-access client's shape:
/// `{ field: value | { op: value }, AND: [...], OR: [...], NOT: [...] }`.
///
/// The logical members are explicit so that tenant scoping can reason about
/// conjunctions and disjunctions without probing untyped maps. Sibling
/// members combine with implicit AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WhereClause {
    #[serde(rename = "AND", default, skip_serializing_if = "Option::is_none", deserialize_with = "one_or_many")]
    pub and: Option<Vec<WhereClause>>,

    #[serde(rename = "OR", default, skip_serializing_if = "Option::is_none", deserialize_with = "one_or_many")]
    pub or: Option<Vec<WhereClause>>,

    #[serde(rename = "NOT", default, skip_serializing_if = "Option::is_none", deserialize_with = "one_or_many")]
    pub not: Option<Vec<WhereClause>>,

    /// Field conditions keyed by column name
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl WhereClause {
    /// Single equality condition `{ field: value }`
    pub fn field(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut fields = Map::new();
        fields.insert(name.into(), value.into());
        Self {
            fields,
            ..Default::default()
        }
    }

    /// Conjunction `{ AND: clauses }`
    pub fn all(clauses: Vec<WhereClause>) -> Self {
        Self {
            and: Some(clauses),
            ..Default::default()
        }
    }

    /// Disjunction `{ OR: clauses }`
    pub fn any(clauses: Vec<WhereClause>) -> Self {
        Self {
            or: Some(clauses),
            ..Default::default()
        }
    }

    /// Add a sibling field condition (chainable)
    pub fn and_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.and.is_none() && self.or.is_none() && self.not.is_none() && self.fields.is_empty()
    }

    /// Condition given for `field` at the top level, if any
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<WhereClause>),
    One(Box<WhereClause>),
}

// AND / OR / NOT accept either a single clause or a list of clauses
fn one_or_many<'de, D>(deserializer: D) -> Result<Option<Vec<WhereClause>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<OneOrMany> = Option::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        OneOrMany::Many(list) => list,
        OneOrMany::One(clause) => vec![*clause],
    }))
}

/// Comparison operators recognized inside `{ field: { op: value } }`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equals,
    Not,
    In,
    NotIn,
    Lt,
    Lte,
    Gt,
    Gte,
    Contains,
    StartsWith,
    EndsWith,
}

impl FilterOp {
    pub fn parse(key: &str) -> Option<Self> {
        Some(match key {
            "equals" => FilterOp::Equals,
            "not" => FilterOp::Not,
            "in" => FilterOp::In,
            "notIn" => FilterOp::NotIn,
            "lt" => FilterOp::Lt,
            "lte" => FilterOp::Lte,
            "gt" => FilterOp::Gt,
            "gte" => FilterOp::Gte,
            "contains" => FilterOp::Contains,
            "startsWith" => FilterOp::StartsWith,
            "endsWith" => FilterOp::EndsWith,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}
