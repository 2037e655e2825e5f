//! Tenant scoping rewrites, one per operation shape.
//!
//! Every function here is pure given its arguments and the ambient
//! [`TenantContext`]. Filters and ownership checks leave their input
//! untouched for unclassified entities, for the super tenant, when isolation
//! is ignored, or when no scope is established at all. Create defaults only
//! skip unclassified entities and unscoped code: a bypass scope still stamps
//! its own tenant, so platform-created rows never end up untagged.

use serde_json::{Map, Value};

use super::operation::{CreateArgs, CreateManyArgs, UpsertArgs, WhereArgs};
use crate::config::config;
use crate::filter::WhereClause;
use crate::tenant::{has_tenant_field, TenantContext};

/// Column holding the tenant identifier
pub fn tenant_field() -> &'static str {
    &config().tenancy.tenant_field
}

/// Tenant to confine `model` to, if any
fn isolating_tenant(model: &str) -> Option<String> {
    if !has_tenant_field(model) {
        return None;
    }
    TenantContext::isolating_tenant()
}

/// Tenant to stamp on rows created for `model`, bypass scopes included
fn stamping_tenant(model: &str) -> Option<String> {
    if !has_tenant_field(model) {
        return None;
    }
    TenantContext::current().map(|context| context.tenant_id)
}

/// Conjoin `field = tenant_id` with `clause`.
///
/// - an existing `AND` list gets the constraint appended (once);
/// - an `OR` without `AND` is wrapped as `AND [constraint, clause]`, since a
///   sibling key would leave the individual branches unscoped;
/// - otherwise the constraint becomes a sibling key, replacing any
///   caller-supplied condition on `field`.
pub fn scope_where(clause: Option<WhereClause>, field: &str, tenant_id: &str) -> WhereClause {
    let constraint = WhereClause::field(field, tenant_id);
    let mut clause = clause.unwrap_or_default();

    if let Some(and) = clause.and.as_mut() {
        if !and.contains(&constraint) {
            and.push(constraint);
        }
        clause
    } else if clause.or.is_some() {
        WhereClause::all(vec![constraint, clause])
    } else {
        clause.fields.insert(field.to_string(), Value::String(tenant_id.to_string()));
        clause
    }
}

pub fn add_tenant_filter<A: WhereArgs>(model: &str, mut args: A) -> A {
    let Some(tenant_id) = isolating_tenant(model) else {
        return args;
    };

    let slot = args.where_clause_mut();
    *slot = Some(scope_where(slot.take(), tenant_field(), &tenant_id));

    if config().audit.log_rewrites {
        tracing::debug!("Tenant filter applied: model={}, tenant={}", model, tenant_id);
    }
    args
}

/// Fill `field` when absent, null or empty. Returns whether it was filled.
fn fill_tenant_id(data: &mut Map<String, Value>, field: &str, tenant_id: &str) -> bool {
    let absent = match data.get(field) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    };
    if absent {
        data.insert(field.to_string(), Value::String(tenant_id.to_string()));
    }
    absent
}

pub fn set_tenant_id(model: &str, mut args: CreateArgs) -> CreateArgs {
    let Some(tenant_id) = stamping_tenant(model) else {
        return args;
    };

    let filled = fill_tenant_id(&mut args.data, tenant_field(), &tenant_id);
    if config().audit.log_rewrites {
        tracing::debug!("Tenant id on create: model={}, tenant={}, filled={}", model, tenant_id, filled);
    }
    args
}

pub fn set_tenant_id_for_many(model: &str, mut args: CreateManyArgs) -> CreateManyArgs {
    let Some(tenant_id) = stamping_tenant(model) else {
        return args;
    };

    let field = tenant_field();
    let filled = args
        .data
        .iter_mut()
        .map(|item| fill_tenant_id(item, field, &tenant_id))
        .filter(|filled| *filled)
        .count();

    if config().audit.log_rewrites {
        tracing::debug!(
            "Tenant id on createMany: model={}, tenant={}, filled={}/{}",
            model, tenant_id, filled, args.data.len()
        );
    }
    args
}

/// An upsert may resolve to either branch, so both are scoped
pub fn set_tenant_id_for_upsert(model: &str, mut args: UpsertArgs) -> UpsertArgs {
    let Some(tenant_id) = stamping_tenant(model) else {
        return args;
    };

    fill_tenant_id(&mut args.create, tenant_field(), &tenant_id);
    add_tenant_filter(model, args)
}

/// Post-fetch audit of a point lookup: a row owned by another tenant is
/// reported as not found (`null`). Rows without a tenant attribute pass.
pub fn validate_tenant_ownership(model: &str, result: Value) -> Value {
    if result.is_null() {
        return result;
    }
    let Some(tenant_id) = isolating_tenant(model) else {
        return result;
    };

    match result.get(tenant_field()) {
        None | Some(Value::Null) => result,
        Some(owner) if owner.as_str() == Some(tenant_id.as_str()) => result,
        Some(owner) => {
            if config().audit.log_denials {
                tracing::warn!(
                    "Cross-tenant point lookup suppressed: model={}, tenant={}, owner={}",
                    model, tenant_id, owner
                );
            }
            Value::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::operation::{FilterArgs, WriteArgs};
    use serde_json::json;

    fn ctx(tenant: &str) -> TenantContext {
        TenantContext::new(tenant)
    }

    fn where_of(value: Value) -> Option<WhereClause> {
        Some(serde_json::from_value(value).unwrap())
    }

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_filter_injects_sibling_key() {
        let args = TenantContext::run_sync(ctx("100001"), || {
            add_tenant_filter("SysUser", FilterArgs { where_clause: where_of(json!({ "status": "0" })), ..Default::default() })
        });
        assert_eq!(args.where_clause, where_of(json!({ "status": "0", "tenantId": "100001" })));
    }

    #[test]
    fn test_filter_creates_missing_where() {
        let args = TenantContext::run_sync(ctx("100001"), || add_tenant_filter("SysUser", FilterArgs::default()));
        assert_eq!(args.where_clause, Some(WhereClause::field("tenantId", "100001")));
    }

    #[test]
    fn test_filter_overrides_caller_tenant() {
        let args = TenantContext::run_sync(ctx("100001"), || {
            add_tenant_filter("SysUser", FilterArgs { where_clause: where_of(json!({ "tenantId": "100002" })), ..Default::default() })
        });
        assert_eq!(args.where_clause, Some(WhereClause::field("tenantId", "100001")));
    }

    #[test]
    fn test_filter_appends_to_and() {
        let args = TenantContext::run_sync(ctx("100001"), || {
            add_tenant_filter(
                "SysUser",
                FilterArgs { where_clause: where_of(json!({ "AND": [{ "status": "0" }, { "delFlag": "0" }] })), ..Default::default() },
            )
        });
        assert_eq!(
            args.where_clause,
            where_of(json!({ "AND": [{ "status": "0" }, { "delFlag": "0" }, { "tenantId": "100001" }] }))
        );
    }

    #[test]
    fn test_filter_wraps_or() {
        let args = TenantContext::run_sync(ctx("100001"), || {
            add_tenant_filter(
                "SysUser",
                FilterArgs { where_clause: where_of(json!({ "OR": [{ "userName": "admin" }, { "userName": "test" }] })), ..Default::default() },
            )
        });
        let clause = args.where_clause.unwrap();
        assert!(clause.get("tenantId").is_none());
        assert!(clause.or.is_none());
        assert_eq!(
            clause.and,
            Some(vec![
                WhereClause::field("tenantId", "100001"),
                WhereClause::any(vec![WhereClause::field("userName", "admin"), WhereClause::field("userName", "test")]),
            ])
        );
    }

    #[test]
    fn test_filter_wrap_keeps_or_siblings() {
        let args = TenantContext::run_sync(ctx("100001"), || {
            add_tenant_filter(
                "SysUser",
                FilterArgs { where_clause: where_of(json!({ "status": "0", "OR": [{ "userName": "a" }] })), ..Default::default() },
            )
        });
        assert_eq!(
            args.where_clause,
            where_of(json!({ "AND": [{ "tenantId": "100001" }, { "status": "0", "OR": [{ "userName": "a" }] }] }))
        );
    }

    #[test]
    fn test_filter_is_idempotent() {
        TenantContext::run_sync(ctx("100001"), || {
            for initial in [json!({}), json!({ "AND": [{ "status": "0" }] }), json!({ "OR": [{ "status": "0" }] })] {
                let once = add_tenant_filter("SysRole", FilterArgs { where_clause: where_of(initial), ..Default::default() });
                let twice = add_tenant_filter("SysRole", once.clone());
                assert_eq!(once, twice);
            }
        });
    }

    #[test]
    fn test_filter_skips_unclassified_super_and_ignored() {
        let original = FilterArgs { where_clause: where_of(json!({ "status": "0" })), ..Default::default() };

        let unclassified = TenantContext::run_sync(ctx("100001"), || add_tenant_filter("SysTenant", original.clone()));
        assert_eq!(unclassified, original);

        let superuser = TenantContext::run_sync(TenantContext::super_tenant(), || add_tenant_filter("SysUser", original.clone()));
        assert_eq!(superuser, original);

        let ignored = TenantContext::run_sync(ctx("100001").with_ignore_tenant(true), || {
            add_tenant_filter("SysUser", original.clone())
        });
        assert_eq!(ignored, original);

        assert_eq!(add_tenant_filter("SysUser", original.clone()), original);
    }

    #[test]
    fn test_filter_applies_to_write_args() {
        let args = TenantContext::run_sync(ctx("100001"), || {
            add_tenant_filter(
                "SysUser",
                WriteArgs { where_clause: where_of(json!({ "userId": 999 })), data: data(json!({ "nickName": "x" })), ..Default::default() },
            )
        });
        assert_eq!(args.where_clause, where_of(json!({ "userId": 999, "tenantId": "100001" })));
        assert_eq!(args.data, data(json!({ "nickName": "x" })));
    }

    #[test]
    fn test_create_defaults_but_never_overrides() {
        TenantContext::run_sync(ctx("100001"), || {
            let filled = set_tenant_id("SysUser", CreateArgs { data: data(json!({ "userName": "a" })), ..Default::default() });
            assert_eq!(filled.data["tenantId"], json!("100001"));

            let explicit = set_tenant_id(
                "SysUser",
                CreateArgs { data: data(json!({ "userName": "a", "tenantId": "100002" })), ..Default::default() },
            );
            assert_eq!(explicit.data["tenantId"], json!("100002"));

            let null = set_tenant_id("SysUser", CreateArgs { data: data(json!({ "tenantId": null })), ..Default::default() });
            assert_eq!(null.data["tenantId"], json!("100001"));

            let empty = set_tenant_id("SysUser", CreateArgs::default());
            assert_eq!(empty.data["tenantId"], json!("100001"));
        });
    }

    #[test]
    fn test_create_without_scope_is_untouched() {
        let args = set_tenant_id("SysUser", CreateArgs { data: data(json!({ "userName": "a" })), ..Default::default() });
        assert!(args.data.get("tenantId").is_none());
    }

    #[test]
    fn test_bypass_scopes_still_stamp_creates() {
        let superuser = TenantContext::run_sync(TenantContext::super_tenant(), || {
            set_tenant_id("SysUser", CreateArgs { data: data(json!({ "userName": "root" })), ..Default::default() })
        });
        assert_eq!(superuser.data["tenantId"], json!("000000"));

        let ignored = TenantContext::run_sync(ctx("100009").with_ignore_tenant(true), || {
            set_tenant_id_for_many("SysUser", CreateManyArgs { data: vec![data(json!({}))], skip_duplicates: None })
        });
        assert_eq!(ignored.data[0]["tenantId"], json!("100009"));

        let upsert = TenantContext::run_sync(TenantContext::super_tenant(), || {
            set_tenant_id_for_upsert(
                "SysUser",
                UpsertArgs { where_clause: where_of(json!({ "userId": 1 })), create: data(json!({})), ..Default::default() },
            )
        });
        assert_eq!(upsert.create["tenantId"], json!("000000"));
        assert_eq!(upsert.where_clause, where_of(json!({ "userId": 1 })));

        let unclassified = TenantContext::run_sync(TenantContext::super_tenant(), || {
            set_tenant_id("SysTenant", CreateArgs { data: data(json!({ "name": "x" })), ..Default::default() })
        });
        assert!(unclassified.data.get("tenantId").is_none());
    }

    #[test]
    fn test_create_many_each_item_independent() {
        let args = TenantContext::run_sync(ctx("100001"), || {
            set_tenant_id_for_many(
                "SysPost",
                CreateManyArgs {
                    data: vec![data(json!({ "postCode": "a" })), data(json!({ "postCode": "b", "tenantId": "100009" }))],
                    skip_duplicates: None,
                },
            )
        });
        assert_eq!(args.data[0]["tenantId"], json!("100001"));
        assert_eq!(args.data[1]["tenantId"], json!("100009"));
    }

    #[test]
    fn test_upsert_scopes_both_branches() {
        let args = TenantContext::run_sync(ctx("100001"), || {
            set_tenant_id_for_upsert(
                "SysUser",
                UpsertArgs {
                    where_clause: where_of(json!({ "userId": 1 })),
                    create: data(json!({ "userName": "new" })),
                    update: data(json!({ "nickName": "upd" })),
                    ..Default::default()
                },
            )
        });
        assert_eq!(args.create["tenantId"], json!("100001"));
        assert_eq!(args.where_clause, where_of(json!({ "userId": 1, "tenantId": "100001" })));
        assert!(args.update.get("tenantId").is_none());
    }

    #[test]
    fn test_ownership_validation() {
        let row = json!({ "userId": 1, "tenantId": "100002" });
        TenantContext::run_sync(ctx("100001"), || {
            assert_eq!(validate_tenant_ownership("SysUser", row.clone()), Value::Null);
            assert_eq!(validate_tenant_ownership("SysTenant", row.clone()), row);
            assert_eq!(validate_tenant_ownership("SysUser", Value::Null), Value::Null);
            let untagged = json!({ "userId": 1 });
            assert_eq!(validate_tenant_ownership("SysUser", untagged.clone()), untagged);
        });
        TenantContext::run_sync(ctx("100002"), || {
            assert_eq!(validate_tenant_ownership("SysUser", row.clone()), row);
        });
        TenantContext::run_sync(TenantContext::super_tenant(), || {
            assert_eq!(validate_tenant_ownership("SysUser", row.clone()), row);
        });
    }
}
