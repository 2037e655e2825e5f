use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter_where::FilterWhere;
use super::types::{FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    pub fn validate_and_parse(order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        match order {
            Value::Null => Ok(vec![]),
            Value::String(s) => Ok(Self::parse_order_string(s)),
            Value::Array(arr) => {
                // [{ "createTime": "desc" }, { "userId": "asc" }] or ["createTime desc"]
                let mut out = Vec::new();
                for v in arr {
                    out.extend(Self::validate_and_parse(v)?);
                }
                Ok(out)
            }
            Value::Object(obj) => {
                let mut out = Vec::new();
                for (k, v) in obj {
                    let sort = match v.as_str().map(str::to_ascii_lowercase).as_deref() {
                        Some("desc") => SortDirection::Desc,
                        Some("asc") => SortDirection::Asc,
                        _ => return Err(FilterError::InvalidOrder(format!("{}: expected \"asc\" or \"desc\"", k))),
                    };
                    out.push(FilterOrderInfo { column: k.clone(), sort });
                }
                Ok(out)
            }
            other => Err(FilterError::InvalidOrder(format!("unsupported order spec: {}", other))),
        }
    }

    /// `"createTime desc, userId"`: comma separated, direction defaults to asc
    fn parse_order_string(s: &str) -> Vec<FilterOrderInfo> {
        s.split(',')
            .filter_map(|part| {
                let mut tokens = part.split_whitespace();
                let column = tokens.next()?;
                let sort = match tokens.next() {
                    Some(dir) if dir.eq_ignore_ascii_case("desc") => SortDirection::Desc,
                    _ => SortDirection::Asc,
                };
                Some(FilterOrderInfo { column: column.to_string(), sort })
            })
            .collect()
    }

    /// Stable sort; rows missing a column sort before rows that have it
    pub fn sort(rows: &mut [Map<String, Value>], infos: &[FilterOrderInfo]) {
        if infos.is_empty() { return; }
        rows.sort_by(|a, b| {
            for info in infos {
                let ordering = match (a.get(&info.column), b.get(&info.column)) {
                    (None, None) => Ordering::Equal,
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (Some(x), Some(y)) => FilterWhere::compare(Some(x), y).unwrap_or(Ordering::Equal),
                };
                let ordering = match info.sort {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }
}
