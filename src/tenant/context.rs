use std::cell::Cell;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::config::config;

/// Built-in identifier of the platform operator tenant
pub const DEFAULT_SUPER_TENANT_ID: &str = "000000";

tokio::task_local! {
    static CURRENT: TenantScope;
}

/// Live value stored in the task-local slot. The flag is a `Cell` so that
/// `set_ignore_tenant` can update the current scope without opening a new one.
#[derive(Debug)]
struct TenantScope {
    tenant_id: String,
    ignore_tenant: Cell<bool>,
}

impl From<TenantContext> for TenantScope {
    fn from(context: TenantContext) -> Self {
        Self {
            tenant_id: context.tenant_id,
            ignore_tenant: Cell::new(context.ignore_tenant),
        }
    }
}

impl TenantScope {
    fn snapshot(&self) -> TenantContext {
        TenantContext {
            tenant_id: self.tenant_id.clone(),
            ignore_tenant: self.ignore_tenant.get(),
        }
    }
}

/// Ambient tenant for the dynamic extent of a call chain.
///
/// The context travels with the future (Tokio task-local storage), not with
/// the OS thread, so interleaved requests on one worker never observe each
/// other's tenant. Scopes nest: an inner `run` shadows the outer value until
/// it returns, after which the outer value is visible again.
///
/// ```ignore
/// let users = TenantContext::run(TenantContext::new("100001"), async {
///     store.execute(Operation::find_many("SysUser", None)).await
/// }).await?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantContext {
    pub tenant_id: String,
    #[serde(default)]
    pub ignore_tenant: bool,
}

impl TenantContext {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            ignore_tenant: false,
        }
    }

    /// Context for the configured super tenant
    pub fn super_tenant() -> Self {
        Self::new(super_tenant_id())
    }

    pub fn with_ignore_tenant(mut self, ignore_tenant: bool) -> Self {
        self.ignore_tenant = ignore_tenant;
        self
    }

    pub fn is_super(&self) -> bool {
        self.tenant_id == super_tenant_id()
    }

    /// True when operations issued under this context are not rewritten
    pub fn bypasses_isolation(&self) -> bool {
        self.ignore_tenant || self.is_super()
    }

    // ========================================
    // Scope entry
    // ========================================

    /// Run `fut` with `context` as the ambient tenant. The enclosing context
    /// (if any) is restored when the future completes or is dropped.
    pub async fn run<F>(context: TenantContext, fut: F) -> F::Output
    where
        F: Future,
    {
        CURRENT.scope(TenantScope::from(context), fut).await
    }

    /// Synchronous form of [`TenantContext::run`]. The enclosing context is
    /// restored on return and on unwind.
    pub fn run_sync<R>(context: TenantContext, f: impl FnOnce() -> R) -> R {
        CURRENT.sync_scope(TenantScope::from(context), f)
    }

    /// Run `fut` for the current tenant with isolation switched off.
    /// Outside any scope there is nothing to bypass and `fut` runs as is.
    pub async fn ignoring<F>(fut: F) -> F::Output
    where
        F: Future,
    {
        match Self::current() {
            Some(context) => Self::run(context.with_ignore_tenant(true), fut).await,
            None => fut.await,
        }
    }

    /// Spawn a task that inherits a snapshot of the ambient context.
    /// A plain `tokio::spawn` starts with no context at all.
    pub fn spawn<F>(fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        match Self::current() {
            Some(context) => tokio::spawn(Self::run(context, fut)),
            None => tokio::spawn(fut),
        }
    }

    // ========================================
    // Ambient accessors
    // ========================================

    /// Snapshot of the ambient context, `None` outside any scope
    pub fn current() -> Option<TenantContext> {
        CURRENT.try_with(TenantScope::snapshot).ok()
    }

    pub fn is_scoped() -> bool {
        CURRENT.try_with(|_| ()).is_ok()
    }

    /// Ambient tenant identifier. Code running outside any scope (startup,
    /// migrations) is treated as the super tenant.
    pub fn tenant_id() -> String {
        CURRENT
            .try_with(|scope| scope.tenant_id.clone())
            .unwrap_or_else(|_| super_tenant_id().to_string())
    }

    pub fn is_super_tenant() -> bool {
        Self::tenant_id() == super_tenant_id()
    }

    pub fn is_ignore_tenant() -> bool {
        CURRENT
            .try_with(|scope| scope.ignore_tenant.get())
            .unwrap_or(false)
    }

    /// Update the ignore flag for the remainder of the current scope only
    pub fn set_ignore_tenant(ignore_tenant: bool) {
        let updated = CURRENT
            .try_with(|scope| scope.ignore_tenant.set(ignore_tenant))
            .is_ok();

        if !updated {
            tracing::debug!(
                "set_ignore_tenant({}) called outside a tenant scope - ignoring",
                ignore_tenant
            );
        }
    }

    /// Tenant that operations must be confined to, or `None` when the
    /// ambient scope is absent, super, or ignoring isolation.
    pub fn isolating_tenant() -> Option<String> {
        CURRENT
            .try_with(|scope| {
                if scope.ignore_tenant.get() || scope.tenant_id == super_tenant_id() {
                    None
                } else {
                    Some(scope.tenant_id.clone())
                }
            })
            .ok()
            .flatten()
    }
}

pub fn super_tenant_id() -> &'static str {
    &config().tenancy.super_tenant_id
}
