// Interception pipeline invoked by the data-access layer

pub mod tenant_middleware;

pub use tenant_middleware::*;
