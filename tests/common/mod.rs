#![allow(dead_code)]

use serde_json::{Map, Value};
use tenant_isolation::{MemoryStore, TenantContext};

pub const TENANT_A: &str = "100001";
pub const TENANT_B: &str = "100002";
pub const TENANT_C: &str = "100003";

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

pub fn tenant(id: &str) -> TenantContext {
    TenantContext::new(id)
}

/// Two users in tenant A, one in tenant B, one untagged legacy row,
/// plus a code-generator table that is not tenant scoped
pub async fn seeded_store() -> MemoryStore {
    tenant_isolation::testing::init_tracing();

    let store = MemoryStore::new();
    store
        .seed(
            "SysUser",
            vec![
                object(serde_json::json!({ "userId": 1, "userName": "admin", "deptId": 100, "status": "0", "tenantId": TENANT_A })),
                object(serde_json::json!({ "userId": 2, "userName": "ry", "deptId": 101, "status": "0", "tenantId": TENANT_A })),
                object(serde_json::json!({ "userId": 3, "userName": "guest", "deptId": 100, "status": "0", "tenantId": TENANT_B })),
                object(serde_json::json!({ "userId": 4, "userName": "legacy", "deptId": 100, "status": "0", "tenantId": null })),
            ],
        )
        .await;
    store
        .seed(
            "GenTable",
            vec![
                object(serde_json::json!({ "tableId": 1, "tableName": "sys_user" })),
                object(serde_json::json!({ "tableId": 2, "tableName": "sys_role" })),
            ],
        )
        .await;
    store
}

pub fn user_names(result: &Value) -> Vec<String> {
    let mut names: Vec<String> = result
        .as_array()
        .map(|rows| {
            rows.iter()
                .filter_map(|row| row["userName"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
