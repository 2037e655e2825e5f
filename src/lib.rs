pub mod config;
pub mod database;
pub mod filter;
pub mod middleware;
pub mod pipeline;
pub mod query;
pub mod tenant;
pub mod testing;

pub use database::{DataStore, IsolatedStore, MemoryStore, StoreError};
pub use middleware::{tenant_scope, tenant_scope_with, ResolvedTenant, ScopePolicy};
pub use pipeline::{create_middleware, TenantMiddleware};
pub use query::{Action, ActionKind, Operation, OperationError};
pub use tenant::{has_tenant_field, TenantContext};
