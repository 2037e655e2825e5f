use std::future::Future;

use serde_json::{json, Map, Value};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::database::{DataStore, IsolatedStore, MemoryStore};
use crate::query::Operation;
use crate::tenant::TenantContext;

/// Install a test-friendly subscriber once; later calls are no-ops.
/// Verbosity follows `RUST_LOG` (default `warn`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Test utilities for tenant creation and isolated data access
pub struct TestContext {
    backing: MemoryStore,
    store: IsolatedStore<MemoryStore>,
    created_tenants: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TestTenant {
    pub tenant_id: String,
}

impl TestTenant {
    pub fn context(&self) -> TenantContext {
        TenantContext::new(self.tenant_id.clone())
    }
}

impl TestContext {
    pub fn new() -> Self {
        init_tracing();
        let backing = MemoryStore::new().with_unique_key("SysUser", "userName");
        Self {
            store: IsolatedStore::new(backing.clone()),
            backing,
            created_tenants: Vec::new(),
        }
    }

    /// Store every test should go through
    pub fn store(&self) -> &IsolatedStore<MemoryStore> {
        &self.store
    }

    /// Unscoped view of the same tables, for seeding and inspection
    pub fn backing(&self) -> &MemoryStore {
        &self.backing
    }

    /// Register a tenant with a unique identifier
    pub fn create_test_tenant(&mut self) -> TestTenant {
        let tenant_id = format!("test_{}", &Uuid::new_v4().simple().to_string()[..8]);
        self.created_tenants.push(tenant_id.clone());
        TestTenant { tenant_id }
    }

    pub fn created_tenants(&self) -> &[String] {
        &self.created_tenants
    }

    /// Run `fut` as `tenant`
    pub async fn run_as<F: Future>(&self, tenant: &TestTenant, fut: F) -> F::Output {
        TenantContext::run(tenant.context(), fut).await
    }

    /// Create `SysUser` rows through the isolated store, scoped to `tenant`
    pub async fn create_users(&self, tenant: &TestTenant, names: &[&str]) -> anyhow::Result<Vec<Value>> {
        let mut created = Vec::with_capacity(names.len());
        for name in names {
            let data = user_data(&format!("{}_{}", tenant.tenant_id, name));
            let row = self
                .run_as(tenant, self.store.execute(Operation::create("SysUser", data)))
                .await?;
            created.push(row);
        }
        Ok(created)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

fn user_data(user_name: &str) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("userName".to_string(), json!(user_name));
    data.insert("status".to_string(), json!("0"));
    data
}
