use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;

use crate::pipeline::TenantMiddleware;
use crate::query::Operation;

/// Physical store behind the data-access layer
#[async_trait]
pub trait DataStore: Send + Sync {
    type Error: Send + 'static;

    async fn execute(&self, operation: Operation) -> Result<Value, Self::Error>;
}

/// Store wrapper that sends every operation through the tenant pipeline.
/// The inner store is owned and never handed out.
pub struct IsolatedStore<S> {
    inner: S,
    middleware: TenantMiddleware,
}

impl<S: DataStore> IsolatedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            middleware: TenantMiddleware::new(),
        }
    }

    /// Execute independent operations concurrently within the current scope
    pub async fn execute_many(&self, operations: Vec<Operation>) -> Result<Vec<Value>, S::Error> {
        try_join_all(operations.into_iter().map(|operation| self.execute(operation))).await
    }
}

#[async_trait]
impl<S: DataStore> DataStore for IsolatedStore<S> {
    type Error = S::Error;

    async fn execute(&self, operation: Operation) -> Result<Value, Self::Error> {
        self.middleware
            .handle(operation, |operation| self.inner.execute(operation))
            .await
    }
}
