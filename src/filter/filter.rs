use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterOrderInfo, WhereClause};

/// In-memory query over a slice of rows: where, order, skip/take, select
#[derive(Debug, Clone, Default)]
pub struct Filter {
    where_data: Option<WhereClause>,
    order_data: Vec<FilterOrderInfo>,
    skip: usize,
    take: Option<usize>,
    select: Option<Map<String, Value>>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_clause(&mut self, conditions: Option<WhereClause>) -> &mut Self {
        self.where_data = conditions;
        self
    }

    pub fn order(&mut self, order_spec: Option<&Value>) -> Result<&mut Self, FilterError> {
        self.order_data = match order_spec {
            Some(spec) => FilterOrder::validate_and_parse(spec)?,
            None => vec![],
        };
        Ok(self)
    }

    pub fn limit(&mut self, take: Option<i64>, skip: Option<i64>) -> Result<&mut Self, FilterError> {
        if let Some(t) = take {
            if t < 0 { return Err(FilterError::InvalidPagination("take must be non-negative".to_string())); }
        }
        if let Some(s) = skip {
            if s < 0 { return Err(FilterError::InvalidPagination("skip must be non-negative".to_string())); }
        }
        self.take = take.map(|t| t as usize);
        self.skip = skip.unwrap_or(0) as usize;
        Ok(self)
    }

    pub fn select(&mut self, select: Option<Map<String, Value>>) -> &mut Self {
        self.select = select;
        self
    }

    pub fn matches(&self, row: &Map<String, Value>) -> Result<bool, FilterError> {
        match &self.where_data {
            Some(clause) => FilterWhere::matches(clause, row),
            None => Ok(true),
        }
    }

    /// Matching rows in storage order
    pub fn find<'a>(&self, rows: &'a [Map<String, Value>]) -> Result<Vec<&'a Map<String, Value>>, FilterError> {
        let mut matched = Vec::new();
        for row in rows {
            if self.matches(row)? {
                matched.push(row);
            }
        }
        Ok(matched)
    }

    /// Matching rows, ordered, paged and projected
    pub fn apply(&self, rows: &[Map<String, Value>]) -> Result<Vec<Map<String, Value>>, FilterError> {
        let mut matched: Vec<Map<String, Value>> = self.find(rows)?.into_iter().cloned().collect();
        FilterOrder::sort(&mut matched, &self.order_data);

        let paged = matched.into_iter().skip(self.skip);
        let paged: Vec<Map<String, Value>> = match self.take {
            Some(take) => paged.take(take).collect(),
            None => paged.collect(),
        };

        Ok(paged.into_iter().map(|row| Self::project(self.select.as_ref(), row)).collect())
    }

    /// Keep only fields selected with `true`; no selection keeps everything
    pub fn project(select: Option<&Map<String, Value>>, row: Map<String, Value>) -> Map<String, Value> {
        match select {
            Some(fields) => row
                .into_iter()
                .filter(|(key, _)| fields.get(key).and_then(Value::as_bool).unwrap_or(false))
                .collect(),
            None => row,
        }
    }
}
