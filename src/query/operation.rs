use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::OperationError;
use crate::filter::WhereClause;

/// Arguments of filtered reads, aggregates, single deletes and bulk deletes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterArgs {
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<WhereClause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take: Option<i64>,
    /// Remaining arguments (`by`, `_count`, `_sum`, `include`, ...), forwarded untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Arguments of single and bulk updates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteArgs {
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<WhereClause>,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateArgs {
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateManyArgs {
    #[serde(default)]
    pub data: Vec<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_duplicates: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsertArgs {
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<WhereClause>,
    #[serde(default)]
    pub create: Map<String, Value>,
    #[serde(default)]
    pub update: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Argument shapes that carry a `where` clause
pub trait WhereArgs {
    fn where_clause_mut(&mut self) -> &mut Option<WhereClause>;
}

impl WhereArgs for FilterArgs {
    fn where_clause_mut(&mut self) -> &mut Option<WhereClause> {
        &mut self.where_clause
    }
}

impl WhereArgs for WriteArgs {
    fn where_clause_mut(&mut self) -> &mut Option<WhereClause> {
        &mut self.where_clause
    }
}

impl WhereArgs for UpsertArgs {
    fn where_clause_mut(&mut self) -> &mut Option<WhereClause> {
        &mut self.where_clause
    }
}

/// Data-access actions, named as the client names them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    FindUnique,
    FindFirst,
    FindFirstOrThrow,
    FindMany,
    Count,
    Aggregate,
    GroupBy,
    Create,
    CreateMany,
    Update,
    UpdateMany,
    Upsert,
    Delete,
    DeleteMany,
    ExecuteRaw,
    QueryRaw,
}

/// How the tenant pipeline treats an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionBucket {
    /// Reads, aggregates and bulk writes: inject the tenant filter
    Filter,
    /// Single update/delete: inject the tenant filter, zero rows on mismatch
    ScopedModify,
    Create,
    CreateMany,
    Upsert,
    /// Fetch by unique key: audit the returned row
    PointLookup,
    /// No entity binding: never touched
    Raw,
}

impl ActionKind {
    pub const ALL: [ActionKind; 16] = [
        ActionKind::FindUnique,
        ActionKind::FindFirst,
        ActionKind::FindFirstOrThrow,
        ActionKind::FindMany,
        ActionKind::Count,
        ActionKind::Aggregate,
        ActionKind::GroupBy,
        ActionKind::Create,
        ActionKind::CreateMany,
        ActionKind::Update,
        ActionKind::UpdateMany,
        ActionKind::Upsert,
        ActionKind::Delete,
        ActionKind::DeleteMany,
        ActionKind::ExecuteRaw,
        ActionKind::QueryRaw,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::FindUnique => "findUnique",
            ActionKind::FindFirst => "findFirst",
            ActionKind::FindFirstOrThrow => "findFirstOrThrow",
            ActionKind::FindMany => "findMany",
            ActionKind::Count => "count",
            ActionKind::Aggregate => "aggregate",
            ActionKind::GroupBy => "groupBy",
            ActionKind::Create => "create",
            ActionKind::CreateMany => "createMany",
            ActionKind::Update => "update",
            ActionKind::UpdateMany => "updateMany",
            ActionKind::Upsert => "upsert",
            ActionKind::Delete => "delete",
            ActionKind::DeleteMany => "deleteMany",
            ActionKind::ExecuteRaw => "executeRaw",
            ActionKind::QueryRaw => "queryRaw",
        }
    }

    pub fn bucket(&self) -> ActionBucket {
        use ActionKind::*;

        match self {
            FindMany | FindFirst | FindFirstOrThrow | Count | Aggregate | GroupBy | UpdateMany | DeleteMany => {
                ActionBucket::Filter
            }
            Update | Delete => ActionBucket::ScopedModify,
            Create => ActionBucket::Create,
            CreateMany => ActionBucket::CreateMany,
            Upsert => ActionBucket::Upsert,
            FindUnique => ActionBucket::PointLookup,
            ExecuteRaw | QueryRaw => ActionBucket::Raw,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| OperationError::UnknownAction(s.to_string()))
    }
}

/// One variant per action, each carrying its typed arguments
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    FindUnique(FilterArgs),
    FindFirst(FilterArgs),
    FindFirstOrThrow(FilterArgs),
    FindMany(FilterArgs),
    Count(FilterArgs),
    Aggregate(FilterArgs),
    GroupBy(FilterArgs),
    Create(CreateArgs),
    CreateMany(CreateManyArgs),
    Update(WriteArgs),
    UpdateMany(WriteArgs),
    Upsert(UpsertArgs),
    Delete(FilterArgs),
    DeleteMany(FilterArgs),
    ExecuteRaw(Value),
    QueryRaw(Value),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::FindUnique(_) => ActionKind::FindUnique,
            Action::FindFirst(_) => ActionKind::FindFirst,
            Action::FindFirstOrThrow(_) => ActionKind::FindFirstOrThrow,
            Action::FindMany(_) => ActionKind::FindMany,
            Action::Count(_) => ActionKind::Count,
            Action::Aggregate(_) => ActionKind::Aggregate,
            Action::GroupBy(_) => ActionKind::GroupBy,
            Action::Create(_) => ActionKind::Create,
            Action::CreateMany(_) => ActionKind::CreateMany,
            Action::Update(_) => ActionKind::Update,
            Action::UpdateMany(_) => ActionKind::UpdateMany,
            Action::Upsert(_) => ActionKind::Upsert,
            Action::Delete(_) => ActionKind::Delete,
            Action::DeleteMany(_) => ActionKind::DeleteMany,
            Action::ExecuteRaw(_) => ActionKind::ExecuteRaw,
            Action::QueryRaw(_) => ActionKind::QueryRaw,
        }
    }

    /// Build from the client's loosely typed arguments. A `null` argument
    /// object is read as `{}`.
    pub fn parse(kind: ActionKind, args: Value) -> Result<Self, OperationError> {
        let args = if args.is_null() { Value::Object(Map::new()) } else { args };

        Ok(match kind {
            ActionKind::FindUnique => Action::FindUnique(decode(kind, args)?),
            ActionKind::FindFirst => Action::FindFirst(decode(kind, args)?),
            ActionKind::FindFirstOrThrow => Action::FindFirstOrThrow(decode(kind, args)?),
            ActionKind::FindMany => Action::FindMany(decode(kind, args)?),
            ActionKind::Count => Action::Count(decode(kind, args)?),
            ActionKind::Aggregate => Action::Aggregate(decode(kind, args)?),
            ActionKind::GroupBy => Action::GroupBy(decode(kind, args)?),
            ActionKind::Create => Action::Create(decode(kind, args)?),
            ActionKind::CreateMany => Action::CreateMany(decode(kind, args)?),
            ActionKind::Update => Action::Update(decode(kind, args)?),
            ActionKind::UpdateMany => Action::UpdateMany(decode(kind, args)?),
            ActionKind::Upsert => Action::Upsert(decode(kind, args)?),
            ActionKind::Delete => Action::Delete(decode(kind, args)?),
            ActionKind::DeleteMany => Action::DeleteMany(decode(kind, args)?),
            ActionKind::ExecuteRaw => Action::ExecuteRaw(args),
            ActionKind::QueryRaw => Action::QueryRaw(args),
        })
    }

    /// Arguments back in the client's shape
    pub fn args_json(&self) -> Result<Value, OperationError> {
        let value = match self {
            Action::FindUnique(a)
            | Action::FindFirst(a)
            | Action::FindFirstOrThrow(a)
            | Action::FindMany(a)
            | Action::Count(a)
            | Action::Aggregate(a)
            | Action::GroupBy(a)
            | Action::Delete(a)
            | Action::DeleteMany(a) => serde_json::to_value(a)?,
            Action::Create(a) => serde_json::to_value(a)?,
            Action::CreateMany(a) => serde_json::to_value(a)?,
            Action::Update(a) | Action::UpdateMany(a) => serde_json::to_value(a)?,
            Action::Upsert(a) => serde_json::to_value(a)?,
            Action::ExecuteRaw(v) | Action::QueryRaw(v) => v.clone(),
        };
        Ok(value)
    }
}

fn decode<T: DeserializeOwned>(kind: ActionKind, args: Value) -> Result<T, OperationError> {
    serde_json::from_value(args).map_err(|source| OperationError::InvalidArguments {
        action: kind.as_str(),
        source,
    })
}

/// Unit of work handed to the data-access layer: `{ model, action, args }`
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Entity type; `None` for raw statements without an entity binding
    pub model: Option<String>,
    pub action: Action,
}

impl Operation {
    pub fn new(model: impl Into<String>, action: Action) -> Self {
        Self {
            model: Some(model.into()),
            action,
        }
    }

    /// Operation without an entity binding
    pub fn unbound(action: Action) -> Self {
        Self { model: None, action }
    }

    pub fn parse(model: Option<&str>, action: &str, args: Value) -> Result<Self, OperationError> {
        let kind: ActionKind = action.parse()?;
        Ok(Self {
            model: model.map(str::to_string),
            action: Action::parse(kind, args)?,
        })
    }

    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }

    pub fn args_json(&self) -> Result<Value, OperationError> {
        self.action.args_json()
    }

    // ========================================
    // Convenience constructors
    // ========================================

    pub fn find_many(model: impl Into<String>, where_clause: Option<WhereClause>) -> Self {
        Self::new(model, Action::FindMany(FilterArgs { where_clause, ..Default::default() }))
    }

    pub fn find_first(model: impl Into<String>, where_clause: Option<WhereClause>) -> Self {
        Self::new(model, Action::FindFirst(FilterArgs { where_clause, ..Default::default() }))
    }

    pub fn find_unique(model: impl Into<String>, where_clause: WhereClause) -> Self {
        Self::new(model, Action::FindUnique(FilterArgs { where_clause: Some(where_clause), ..Default::default() }))
    }

    pub fn count(model: impl Into<String>, where_clause: Option<WhereClause>) -> Self {
        Self::new(model, Action::Count(FilterArgs { where_clause, ..Default::default() }))
    }

    pub fn create(model: impl Into<String>, data: Map<String, Value>) -> Self {
        Self::new(model, Action::Create(CreateArgs { data, ..Default::default() }))
    }

    pub fn create_many(model: impl Into<String>, data: Vec<Map<String, Value>>) -> Self {
        Self::new(model, Action::CreateMany(CreateManyArgs { data, skip_duplicates: None }))
    }

    pub fn update(model: impl Into<String>, where_clause: WhereClause, data: Map<String, Value>) -> Self {
        Self::new(model, Action::Update(WriteArgs { where_clause: Some(where_clause), data, ..Default::default() }))
    }

    pub fn update_many(model: impl Into<String>, where_clause: Option<WhereClause>, data: Map<String, Value>) -> Self {
        Self::new(model, Action::UpdateMany(WriteArgs { where_clause, data, ..Default::default() }))
    }

    pub fn upsert(
        model: impl Into<String>,
        where_clause: WhereClause,
        create: Map<String, Value>,
        update: Map<String, Value>,
    ) -> Self {
        Self::new(
            model,
            Action::Upsert(UpsertArgs { where_clause: Some(where_clause), create, update, ..Default::default() }),
        )
    }

    pub fn delete(model: impl Into<String>, where_clause: WhereClause) -> Self {
        Self::new(model, Action::Delete(FilterArgs { where_clause: Some(where_clause), ..Default::default() }))
    }

    pub fn delete_many(model: impl Into<String>, where_clause: Option<WhereClause>) -> Self {
        Self::new(model, Action::DeleteMany(FilterArgs { where_clause, ..Default::default() }))
    }
}
