use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Number, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::error::StoreError;
use super::store::DataStore;
use crate::filter::{Filter, FilterError};
use crate::query::{Action, CreateArgs, CreateManyArgs, FilterArgs, Operation, UpsertArgs, WriteArgs};

type Row = Map<String, Value>;

const PRIMARY_KEY: &str = "id";
const CREATED_AT: &str = "createdAt";

/// In-memory store that evaluates operations the way the data-access client
/// would: `where` clauses, ordering, paging, projections, aggregates.
///
/// Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, Vec<Row>>>>,
    unique_keys: HashMap<String, Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `field` unique within `model`, in addition to `id`
    pub fn with_unique_key(mut self, model: impl Into<String>, field: impl Into<String>) -> Self {
        self.unique_keys.entry(model.into()).or_default().push(field.into());
        self
    }

    /// Insert rows as given, without defaults or constraint checks
    pub async fn seed(&self, model: &str, rows: Vec<Row>) {
        let mut tables = self.tables.write().await;
        tables.entry(model.to_string()).or_default().extend(rows);
    }

    /// Raw table contents in storage order
    pub async fn rows(&self, model: &str) -> Vec<Row> {
        let tables = self.tables.read().await;
        tables.get(model).cloned().unwrap_or_default()
    }

    // ========================================
    // Reads
    // ========================================

    async fn find_many(&self, model: &str, args: &FilterArgs) -> Result<Vec<Row>, StoreError> {
        let filter = query_filter(args)?;
        let tables = self.tables.read().await;
        let rows = tables.get(model).map(Vec::as_slice).unwrap_or_default();
        Ok(filter.apply(rows)?)
    }

    async fn find_first(&self, model: &str, args: &FilterArgs) -> Result<Option<Row>, StoreError> {
        Ok(self.find_many(model, args).await?.into_iter().next())
    }

    async fn matching(&self, model: &str, args: &FilterArgs) -> Result<Vec<Row>, StoreError> {
        let mut filter = Filter::new();
        filter.where_clause(args.where_clause.clone());

        let tables = self.tables.read().await;
        let rows = tables.get(model).map(Vec::as_slice).unwrap_or_default();
        Ok(filter.find(rows)?.into_iter().cloned().collect())
    }

    async fn aggregate(&self, model: &str, args: &FilterArgs) -> Result<Value, StoreError> {
        let rows = self.matching(model, args).await?;
        Ok(Value::Object(aggregate_rows(&rows, &args.extra)?))
    }

    async fn group_by(&self, model: &str, args: &FilterArgs) -> Result<Value, StoreError> {
        let by: Vec<String> = match args.extra.get("by") {
            Some(Value::String(field)) => vec![field.clone()],
            Some(Value::Array(fields)) => fields
                .iter()
                .map(|f| {
                    f.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| StoreError::InvalidArguments("groupBy `by` entries must be strings".to_string()))
                })
                .collect::<Result<_, _>>()?,
            _ => return Err(StoreError::InvalidArguments("groupBy requires `by`".to_string())),
        };

        let rows = self.matching(model, args).await?;

        // Groups in order of first appearance
        let mut groups: Vec<(Vec<Value>, Vec<Row>)> = Vec::new();
        for row in rows {
            let key: Vec<Value> = by.iter().map(|f| row.get(f).cloned().unwrap_or(Value::Null)).collect();
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(row),
                None => groups.push((key, vec![row])),
            }
        }

        let mut result = Vec::with_capacity(groups.len());
        for (key, members) in groups {
            let mut group: Row = by.iter().cloned().zip(key).collect();
            group.extend(aggregate_rows(&members, &args.extra)?);
            result.push(Value::Object(group));
        }
        Ok(Value::Array(result))
    }

    // ========================================
    // Writes
    // ========================================

    async fn create(&self, model: &str, args: CreateArgs) -> Result<Value, StoreError> {
        let mut row = args.data;
        prepare_row(&mut row);

        let mut tables = self.tables.write().await;
        let table = tables.entry(model.to_string()).or_default();
        self.check_unique(model, table, &row, None)?;
        table.push(row.clone());

        Ok(Value::Object(Filter::project(args.select.as_ref(), row)))
    }

    async fn create_many(&self, model: &str, args: CreateManyArgs) -> Result<Value, StoreError> {
        let skip_duplicates = args.skip_duplicates.unwrap_or(false);

        let mut tables = self.tables.write().await;
        let table = tables.entry(model.to_string()).or_default();

        // Staged so a violation leaves the table untouched
        let mut staged: Vec<Row> = Vec::with_capacity(args.data.len());
        for mut row in args.data {
            prepare_row(&mut row);
            let conflict = self
                .check_unique(model, table, &row, None)
                .and_then(|_| self.check_unique(model, &staged, &row, None));
            match conflict {
                Ok(()) => staged.push(row),
                Err(StoreError::UniqueViolation { .. }) if skip_duplicates => continue,
                Err(err) => return Err(err),
            }
        }

        let count = staged.len();
        table.extend(staged);
        Ok(count_result(count))
    }

    async fn update(&self, model: &str, args: WriteArgs) -> Result<Value, StoreError> {
        let mut filter = Filter::new();
        filter.where_clause(args.where_clause);

        let mut tables = self.tables.write().await;
        let table = tables.entry(model.to_string()).or_default();

        let Some(index) = position(table, &filter)? else {
            return Ok(Value::Null);
        };

        let mut updated = table[index].clone();
        updated.extend(args.data);
        self.check_unique(model, table, &updated, Some(index))?;
        table[index] = updated.clone();

        Ok(Value::Object(Filter::project(args.select.as_ref(), updated)))
    }

    async fn update_many(&self, model: &str, args: WriteArgs) -> Result<Value, StoreError> {
        let mut filter = Filter::new();
        filter.where_clause(args.where_clause);

        let mut tables = self.tables.write().await;
        let table = tables.entry(model.to_string()).or_default();

        let hits = matches_of(table, &filter)?;
        for (row, hit) in table.iter_mut().zip(&hits) {
            if *hit {
                row.extend(args.data.clone());
            }
        }
        Ok(count_result(hits.iter().filter(|hit| **hit).count()))
    }

    async fn upsert(&self, model: &str, args: UpsertArgs) -> Result<Value, StoreError> {
        let mut filter = Filter::new();
        filter.where_clause(args.where_clause);

        let mut tables = self.tables.write().await;
        let table = tables.entry(model.to_string()).or_default();

        let row = match position(table, &filter)? {
            Some(index) => {
                let mut updated = table[index].clone();
                updated.extend(args.update);
                self.check_unique(model, table, &updated, Some(index))?;
                table[index] = updated.clone();
                updated
            }
            None => {
                let mut created = args.create;
                prepare_row(&mut created);
                self.check_unique(model, table, &created, None)?;
                table.push(created.clone());
                created
            }
        };

        Ok(Value::Object(Filter::project(args.select.as_ref(), row)))
    }

    async fn delete(&self, model: &str, args: FilterArgs) -> Result<Value, StoreError> {
        let mut filter = Filter::new();
        filter.where_clause(args.where_clause);

        let mut tables = self.tables.write().await;
        let table = tables.entry(model.to_string()).or_default();

        Ok(match position(table, &filter)? {
            Some(index) => Value::Object(Filter::project(args.select.as_ref(), table.remove(index))),
            None => Value::Null,
        })
    }

    async fn delete_many(&self, model: &str, args: FilterArgs) -> Result<Value, StoreError> {
        let mut filter = Filter::new();
        filter.where_clause(args.where_clause);

        let mut tables = self.tables.write().await;
        let table = tables.entry(model.to_string()).or_default();

        let hits = matches_of(table, &filter)?;
        let mut flags = hits.iter();
        table.retain(|_| !flags.next().copied().unwrap_or(false));

        Ok(count_result(hits.iter().filter(|hit| **hit).count()))
    }

    /// Reject `row` if a unique column collides with another row of `table`
    fn check_unique(&self, model: &str, table: &[Row], row: &Row, skip: Option<usize>) -> Result<(), StoreError> {
        let extra = self.unique_keys.get(model).map(Vec::as_slice).unwrap_or_default();
        let fields = std::iter::once(PRIMARY_KEY).chain(extra.iter().map(String::as_str));

        for field in fields {
            let Some(value) = row.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let collides = table
                .iter()
                .enumerate()
                .any(|(i, other)| Some(i) != skip && other.get(field) == Some(value));
            if collides {
                return Err(StoreError::UniqueViolation {
                    model: model.to_string(),
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    type Error = StoreError;

    async fn execute(&self, operation: Operation) -> Result<Value, StoreError> {
        let kind = operation.kind();
        let Some(model) = operation.model else {
            return Err(StoreError::Unsupported(format!("{} without a model", kind)));
        };

        tracing::trace!("MemoryStore: model={}, action={}", model, kind);

        match operation.action {
            Action::FindMany(args) => Ok(rows_value(self.find_many(&model, &args).await?)),
            Action::FindFirst(args) | Action::FindUnique(args) => {
                Ok(self.find_first(&model, &args).await?.map(Value::Object).unwrap_or(Value::Null))
            }
            Action::FindFirstOrThrow(args) => self
                .find_first(&model, &args)
                .await?
                .map(Value::Object)
                .ok_or_else(|| StoreError::NotFound(format!("No {} found", model))),
            Action::Count(args) => Ok(Value::from(self.matching(&model, &args).await?.len())),
            Action::Aggregate(args) => self.aggregate(&model, &args).await,
            Action::GroupBy(args) => self.group_by(&model, &args).await,
            Action::Create(args) => self.create(&model, args).await,
            Action::CreateMany(args) => self.create_many(&model, args).await,
            Action::Update(args) => self.update(&model, args).await,
            Action::UpdateMany(args) => self.update_many(&model, args).await,
            Action::Upsert(args) => self.upsert(&model, args).await,
            Action::Delete(args) => self.delete(&model, args).await,
            Action::DeleteMany(args) => self.delete_many(&model, args).await,
            Action::ExecuteRaw(_) | Action::QueryRaw(_) => {
                Err(StoreError::Unsupported(format!("{} on {}", kind, model)))
            }
        }
    }
}

fn query_filter(args: &FilterArgs) -> Result<Filter, FilterError> {
    let mut filter = Filter::new();
    filter
        .where_clause(args.where_clause.clone())
        .order(args.order_by.as_ref())?
        .limit(args.take, args.skip)?
        .select(args.select.clone());
    Ok(filter)
}

fn position(rows: &[Row], filter: &Filter) -> Result<Option<usize>, FilterError> {
    for (index, row) in rows.iter().enumerate() {
        if filter.matches(row)? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

fn matches_of(rows: &[Row], filter: &Filter) -> Result<Vec<bool>, FilterError> {
    rows.iter().map(|row| filter.matches(row)).collect()
}

/// Defaults the store assigns on insert
fn prepare_row(row: &mut Row) {
    if row.get(PRIMARY_KEY).map_or(true, Value::is_null) {
        row.insert(PRIMARY_KEY.to_string(), Value::String(Uuid::new_v4().to_string()));
    }
    if !row.contains_key(CREATED_AT) {
        row.insert(CREATED_AT.to_string(), Value::String(Utc::now().to_rfc3339()));
    }
}

fn rows_value(rows: Vec<Row>) -> Value {
    Value::Array(rows.into_iter().map(Value::Object).collect())
}

fn count_result(count: usize) -> Value {
    let mut result = Map::new();
    result.insert("count".to_string(), Value::from(count));
    Value::Object(result)
}

/// `_count`, `_sum` and `_avg` over `rows`, as requested in `spec`
fn aggregate_rows(rows: &[Row], spec: &Map<String, Value>) -> Result<Row, StoreError> {
    let mut result = Map::new();

    for (key, request) in spec {
        let value = match key.as_str() {
            "_count" => match request {
                Value::Bool(true) => Value::from(rows.len()),
                Value::Object(fields) => Value::Object(
                    selected(fields)
                        .map(|field| {
                            let count = match field {
                                "_all" => rows.len(),
                                _ => rows.iter().filter(|r| r.get(field).map_or(false, |v| !v.is_null())).count(),
                            };
                            (field.to_string(), Value::from(count))
                        })
                        .collect(),
                ),
                _ => return Err(StoreError::InvalidArguments(format!("invalid _count: {}", request))),
            },
            "_sum" | "_avg" => {
                let Value::Object(fields) = request else {
                    return Err(StoreError::InvalidArguments(format!("invalid {}: {}", key, request)));
                };
                Value::Object(
                    selected(fields)
                        .map(|field| {
                            let numbers: Vec<&Value> = rows.iter().filter_map(|r| r.get(field)).filter(|v| v.is_number()).collect();
                            let value = if key == "_sum" { sum(&numbers) } else { average(&numbers) };
                            (field.to_string(), value)
                        })
                        .collect(),
                )
            }
            k if k.starts_with('_') => {
                return Err(StoreError::Unsupported(format!("aggregate {}", k)));
            }
            _ => continue,
        };
        result.insert(key.clone(), value);
    }

    Ok(result)
}

fn selected(fields: &Map<String, Value>) -> impl Iterator<Item = &str> {
    fields
        .iter()
        .filter(|(_, on)| on.as_bool().unwrap_or(false))
        .map(|(field, _)| field.as_str())
}

fn sum(numbers: &[&Value]) -> Value {
    if numbers.is_empty() {
        return Value::Null;
    }
    if numbers.iter().all(|n| n.is_i64()) {
        return Value::from(numbers.iter().filter_map(|n| n.as_i64()).sum::<i64>());
    }
    let total: f64 = numbers.iter().filter_map(|n| n.as_f64()).sum();
    Number::from_f64(total).map(Value::Number).unwrap_or(Value::Null)
}

fn average(numbers: &[&Value]) -> Value {
    if numbers.is_empty() {
        return Value::Null;
    }
    let total: f64 = numbers.iter().filter_map(|n| n.as_f64()).sum();
    Number::from_f64(total / numbers.len() as f64).map(Value::Number).unwrap_or(Value::Null)
}
