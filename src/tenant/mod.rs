pub mod context;
pub mod registry;

pub use context::{super_tenant_id, TenantContext, DEFAULT_SUPER_TENANT_ID};
pub use registry::{has_tenant_field, registry, RegistryDrift, TenantRegistry, DEFAULT_TENANT_ENTITIES};
