use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::config;
use crate::tenant::{super_tenant_id, TenantContext};

/// Tenant identity resolved upstream (e.g. by an auth layer) for this request
#[derive(Clone, Debug)]
pub struct ResolvedTenant(pub TenantContext);

/// How the request boundary finds the tenant of a request
#[derive(Clone, Debug)]
pub struct ScopePolicy {
    pub header_name: String,
    /// Fall back to the tenant header when no [`ResolvedTenant`] is present
    pub trust_header: bool,
}

impl ScopePolicy {
    pub fn from_config() -> Self {
        let tenancy = &config().tenancy;
        Self {
            header_name: tenancy.header_name.clone(),
            trust_header: tenancy.trust_header,
        }
    }

    pub fn trusting_header(mut self, trust_header: bool) -> Self {
        self.trust_header = trust_header;
        self
    }
}

impl Default for ScopePolicy {
    fn default() -> Self {
        Self::from_config()
    }
}

/// Middleware that runs the rest of the request inside a tenant scope,
/// using the [`ScopePolicy`] from the global config.
///
/// The scope comes from a [`ResolvedTenant`] extension when present,
/// otherwise from the tenant header if the policy trusts it. The header can
/// never select the super tenant. A request that resolves no tenant is
/// rejected with `401` instead of running unscoped.
pub async fn tenant_scope(request: Request, next: Next) -> Response {
    scope_request(&ScopePolicy::from_config(), request, next).await
}

/// [`tenant_scope`] with an explicit policy, for `from_fn_with_state`
pub async fn tenant_scope_with(State(policy): State<ScopePolicy>, request: Request, next: Next) -> Response {
    scope_request(&policy, request, next).await
}

async fn scope_request(policy: &ScopePolicy, request: Request, next: Next) -> Response {
    match resolve(policy, &request) {
        Some(context) => {
            tracing::debug!(
                "Tenant scope: tenant={}, ignore={}, path={}",
                context.tenant_id,
                context.ignore_tenant,
                request.uri().path()
            );
            TenantContext::run(context, next.run(request)).await
        }
        None => {
            tracing::warn!("Tenant scope: no tenant resolved for {}, rejecting", request.uri().path());
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}

fn resolve(policy: &ScopePolicy, request: &Request) -> Option<TenantContext> {
    if let Some(ResolvedTenant(context)) = request.extensions().get::<ResolvedTenant>() {
        return Some(context.clone());
    }

    if !policy.trust_header {
        return None;
    }

    let header_name = policy.header_name.as_str();
    let value = request.headers().get(header_name)?;

    match value.to_str().map(str::trim) {
        Ok(tenant_id) if tenant_id == super_tenant_id() => {
            tracing::warn!("Refusing super tenant from {} header on {}", header_name, request.uri().path());
            None
        }
        Ok(tenant_id) if !tenant_id.is_empty() => Some(TenantContext::new(tenant_id)),
        _ => {
            tracing::warn!("Ignoring invalid {} header on {}", header_name, request.uri().path());
            None
        }
    }
}
