// Tenant interception pipeline: classify each operation, rewrite it, forward
// it to the store, and audit point-lookup results on the way back.

use std::future::Future;
use std::time::Instant;

use serde_json::Value;

use crate::query::{
    add_tenant_filter, set_tenant_id, set_tenant_id_for_many, set_tenant_id_for_upsert, tenant_field,
    validate_tenant_ownership, Action, ActionBucket, FilterArgs, Operation,
};
use crate::tenant::{has_tenant_field, TenantContext};

/// Single entry point the data-access layer calls for every operation.
///
/// The middleware has no error channel of its own: it only rewrites
/// arguments and suppresses foreign point-lookup rows. Whatever `next`
/// returns as an error is handed back unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TenantMiddleware;

pub fn create_middleware() -> TenantMiddleware {
    TenantMiddleware::new()
}

impl TenantMiddleware {
    pub fn new() -> Self {
        Self
    }

    /// Run `operation` through the pipeline, forwarding to `next`
    pub async fn handle<F, Fut, E>(&self, mut operation: Operation, next: F) -> Result<Value, E>
    where
        F: FnOnce(Operation) -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        let kind = operation.kind();

        let Some(model) = operation.model.clone() else {
            tracing::trace!("Tenant pipeline pass-through: unbound {}", kind);
            return next(operation).await;
        };

        let bucket = kind.bucket();
        let start_time = Instant::now();

        if bucket != ActionBucket::PointLookup {
            let rewritten = self.rewrite(operation);
            tracing::debug!(
                "Tenant pipeline: model={}, action={}, bucket={:?}, rewritten in {:?}",
                model, kind, bucket, start_time.elapsed()
            );
            return next(rewritten).await;
        }

        let widened = match &mut operation.action {
            Action::FindUnique(args) => Self::widen_projection(&model, args),
            _ => false,
        };

        let result = next(operation).await?;
        let result = validate_tenant_ownership(&model, result);

        tracing::debug!(
            "Tenant pipeline: model={}, action={}, bucket={:?}, found={}, widened={}",
            model, kind, bucket, !result.is_null(), widened
        );

        Ok(if widened { Self::strip_tenant_field(result) } else { result })
    }

    /// Rewrite phase only: the operation as it would be forwarded.
    /// Point lookups are returned as is (they are audited after the fetch).
    pub fn rewrite(&self, operation: Operation) -> Operation {
        let Operation { model, action } = operation;
        let Some(model) = model else {
            return Operation { model: None, action };
        };

        let action = match action {
            // Filtered reads, aggregates and bulk writes
            Action::FindMany(args) => Action::FindMany(add_tenant_filter(&model, args)),
            Action::FindFirst(args) => Action::FindFirst(add_tenant_filter(&model, args)),
            Action::FindFirstOrThrow(args) => Action::FindFirstOrThrow(add_tenant_filter(&model, args)),
            Action::Count(args) => Action::Count(add_tenant_filter(&model, args)),
            Action::Aggregate(args) => Action::Aggregate(add_tenant_filter(&model, args)),
            Action::GroupBy(args) => Action::GroupBy(add_tenant_filter(&model, args)),
            Action::UpdateMany(args) => Action::UpdateMany(add_tenant_filter(&model, args)),
            Action::DeleteMany(args) => Action::DeleteMany(add_tenant_filter(&model, args)),

            // Single update/delete: a foreign target simply matches nothing
            Action::Update(args) => Action::Update(add_tenant_filter(&model, args)),
            Action::Delete(args) => Action::Delete(add_tenant_filter(&model, args)),

            Action::Create(args) => Action::Create(set_tenant_id(&model, args)),
            Action::CreateMany(args) => Action::CreateMany(set_tenant_id_for_many(&model, args)),
            Action::Upsert(args) => Action::Upsert(set_tenant_id_for_upsert(&model, args)),

            other @ (Action::FindUnique(_) | Action::ExecuteRaw(_) | Action::QueryRaw(_)) => other,
        };

        Operation { model: Some(model), action }
    }

    /// A projection that leaves out the tenant column would make the row
    /// unauditable; add the column and report that it must be stripped.
    fn widen_projection(model: &str, args: &mut FilterArgs) -> bool {
        if !has_tenant_field(model) || TenantContext::isolating_tenant().is_none() {
            return false;
        }

        let field = tenant_field();
        match args.select.as_mut() {
            Some(select) if !select.get(field).and_then(Value::as_bool).unwrap_or(false) => {
                select.insert(field.to_string(), Value::Bool(true));
                true
            }
            _ => false,
        }
    }

    fn strip_tenant_field(mut result: Value) -> Value {
        if let Value::Object(row) = &mut result {
            row.remove(tenant_field());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::WhereClause;
    use crate::query::ActionKind;
    use serde_json::json;
    use std::convert::Infallible;
    use std::sync::Mutex;

    /// Captures the forwarded operation and answers with a canned result
    struct Recorder {
        seen: Mutex<Option<Operation>>,
        result: Value,
    }

    impl Recorder {
        fn new(result: Value) -> Self {
            Self { seen: Mutex::new(None), result }
        }

        async fn next(&self, operation: Operation) -> Result<Value, Infallible> {
            *self.seen.lock().unwrap() = Some(operation);
            Ok(self.result.clone())
        }

        fn seen(&self) -> Operation {
            self.seen.lock().unwrap().clone().unwrap()
        }
    }

    fn filter_where(operation: &Operation) -> Option<WhereClause> {
        match &operation.action {
            Action::FindMany(a) | Action::Count(a) | Action::Delete(a) | Action::DeleteMany(a) => a.where_clause.clone(),
            Action::Update(a) | Action::UpdateMany(a) => a.where_clause.clone(),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_every_filtered_action_is_scoped() {
        let middleware = create_middleware();
        for action in ["findMany", "findFirst", "findFirstOrThrow", "count", "aggregate", "groupBy", "updateMany", "deleteMany", "update", "delete"] {
            let recorder = Recorder::new(json!([]));
            let op = Operation::parse(Some("SysUser"), action, json!({ "where": { "status": "0" } })).unwrap();
            TenantContext::run(TenantContext::new("100001"), middleware.handle(op, |op| recorder.next(op)))
                .await
                .unwrap();

            let args = recorder.seen().args_json().unwrap();
            assert_eq!(args["where"]["tenantId"], json!("100001"), "action {}", action);
            assert_eq!(args["where"]["status"], json!("0"), "action {}", action);
        }
    }

    #[tokio::test]
    async fn test_unbound_operation_passes_through() {
        let middleware = create_middleware();
        let recorder = Recorder::new(json!(1));
        let op = Operation::unbound(Action::ExecuteRaw(json!({ "sql": "SELECT 1" })));
        TenantContext::run(TenantContext::new("100001"), middleware.handle(op.clone(), |op| recorder.next(op)))
            .await
            .unwrap();
        assert_eq!(recorder.seen(), op);
    }

    #[tokio::test]
    async fn test_unclassified_model_untouched() {
        let middleware = create_middleware();
        let recorder = Recorder::new(json!([]));
        let op = Operation::find_many("GenTable", Some(WhereClause::field("tableName", "sys_user")));
        TenantContext::run(TenantContext::new("100001"), middleware.handle(op.clone(), |op| recorder.next(op)))
            .await
            .unwrap();
        assert_eq!(recorder.seen(), op);
    }

    #[tokio::test]
    async fn test_point_lookup_suppresses_foreign_row() {
        let middleware = create_middleware();
        let recorder = Recorder::new(json!({ "userId": 1, "tenantId": "100002" }));
        let op = Operation::find_unique("SysUser", WhereClause::field("userId", 1));

        let result = TenantContext::run(TenantContext::new("100001"), middleware.handle(op.clone(), |op| recorder.next(op)))
            .await
            .unwrap();
        assert_eq!(result, Value::Null);
        // Lookup arguments are forwarded unmodified
        assert_eq!(recorder.seen(), op);
    }

    #[tokio::test]
    async fn test_point_lookup_widens_and_strips_projection() {
        let middleware = create_middleware();
        let recorder = Recorder::new(json!({ "userName": "admin", "tenantId": "100001" }));
        let op = Operation::parse(
            Some("SysUser"),
            "findUnique",
            json!({ "where": { "userId": 1 }, "select": { "userName": true } }),
        )
        .unwrap();

        let result = TenantContext::run(TenantContext::new("100001"), middleware.handle(op, |op| recorder.next(op)))
            .await
            .unwrap();
        assert_eq!(result, json!({ "userName": "admin" }));
        assert_eq!(
            recorder.seen().args_json().unwrap()["select"],
            json!({ "userName": true, "tenantId": true })
        );
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let middleware = create_middleware();
        let op = Operation::find_many("SysUser", None);
        let err = TenantContext::run(
            TenantContext::new("100001"),
            middleware.handle(op, |_| async { Err::<Value, _>("connection reset") }),
        )
        .await
        .unwrap_err();
        assert_eq!(err, "connection reset");
    }

    #[test]
    fn test_rewrite_matches_dispatch_table() {
        let middleware = TenantMiddleware::new();
        TenantContext::run_sync(TenantContext::new("100001"), || {
            let create = middleware.rewrite(Operation::create("SysUser", json!({ "userName": "a" }).as_object().cloned().unwrap()));
            assert_eq!(create.args_json().unwrap()["data"]["tenantId"], json!("100001"));

            let lookup = Operation::find_unique("SysUser", WhereClause::field("userId", 1));
            assert_eq!(middleware.rewrite(lookup.clone()), lookup);

            let delete = middleware.rewrite(Operation::delete("SysUser", WhereClause::field("userId", 9)));
            assert_eq!(delete.kind(), ActionKind::Delete);
            assert_eq!(
                filter_where(&delete),
                Some(WhereClause::field("userId", 9).and_field("tenantId", "100001"))
            );
        });
    }
}
