pub mod tenant_scope;

pub use tenant_scope::{tenant_scope, tenant_scope_with, ResolvedTenant, ScopePolicy};
