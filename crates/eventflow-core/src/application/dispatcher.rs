//! Seam between the executor and the transport that reaches function routes.

use crate::domain::service_name::validate_service_name;
use crate::types::{TaskRequest, TaskResponse};
use crate::CoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, error, info};

/// Delivers a request to a named function route and returns its response.
///
/// The executor wraps every call in its own timeout, so implementations may ignore `timeout` or
/// pass it on to a remote transport.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Send `request` to `route`
    async fn dispatch(
        &self,
        route: &str,
        request: TaskRequest,
        timeout: Duration,
    ) -> Result<TaskResponse, CoreError>;
}

/// A function served by the [`LocalDispatcher`]
#[async_trait]
pub trait TaskFunction: Send + Sync {
    /// Handle one request
    async fn handle(&self, request: TaskRequest) -> Result<TaskResponse, CoreError>;
}

struct FnTask<F> {
    func: F,
}

#[async_trait]
impl<F, Fut> TaskFunction for FnTask<F>
where
    F: Fn(TaskRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<TaskResponse, CoreError>> + Send,
{
    async fn handle(&self, request: TaskRequest) -> Result<TaskResponse, CoreError> {
        (self.func)(request).await
    }
}

/// Stops the spawned function when the dispatch future is dropped, e.g. on timeout
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// In-process route table
#[derive(Default, Clone)]
pub struct LocalDispatcher {
    routes: Arc<DashMap<String, Arc<dyn TaskFunction>>>,
}

impl fmt::Debug for LocalDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalDispatcher")
            .field("routes", &self.routes())
            .finish()
    }
}

impl LocalDispatcher {
    /// Create an empty route table
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `function` on `route`, replacing any previous function
    pub fn register(&self, route: &str, function: Arc<dyn TaskFunction>) -> Result<(), CoreError> {
        validate_service_name(route)?;
        if self.routes.insert(route.to_string(), function).is_some() {
            info!(route, "Function replaced");
        } else {
            debug!(route, "Function registered");
        }
        Ok(())
    }

    /// Serve an async closure on `route`
    pub fn register_fn<F, Fut>(&self, route: &str, func: F) -> Result<(), CoreError>
    where
        F: Fn(TaskRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TaskResponse, CoreError>> + Send + 'static,
    {
        self.register(route, Arc::new(FnTask { func }))
    }

    /// Stop serving `route`
    pub fn unregister(&self, route: &str) -> bool {
        self.routes.remove(route).is_some()
    }

    /// Returns true when `route` is served
    pub fn contains(&self, route: &str) -> bool {
        self.routes.contains_key(route)
    }

    /// Sorted list of served routes
    pub fn routes(&self) -> Vec<String> {
        let mut routes: Vec<String> = self.routes.iter().map(|e| e.key().clone()).collect();
        routes.sort_unstable();
        routes
    }
}

#[async_trait]
impl Dispatcher for LocalDispatcher {
    async fn dispatch(
        &self,
        route: &str,
        request: TaskRequest,
        _timeout: Duration,
    ) -> Result<TaskResponse, CoreError> {
        // clone out of the map so no shard lock is held across the await
        let function = self
            .routes
            .get(route)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CoreError::RouteNotFound(route.to_string()))?;

        // a panicking function must not take the instance down with it
        let handle = tokio::spawn(async move { function.handle(request).await });
        let _guard = AbortOnDrop(handle.abort_handle());
        match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!(route, "Function did not complete: {}", e);
                Err(CoreError::DispatchError {
                    route: route.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }
}
