pub mod error;
pub mod operation;
pub mod rewrite;

pub use error::OperationError;
pub use operation::*;
pub use rewrite::{
    add_tenant_filter, scope_where, set_tenant_id, set_tenant_id_for_many, set_tenant_id_for_upsert, tenant_field,
    validate_tenant_ownership,
};
