//! The ephemeral-execution adapter.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use rfp_core::{AdapterConfig, AdapterError, InvocationId, LifecycleObserver, LifecyclePhase};
use rfp_db::{DatabaseConnector, DatabaseTarget, SqlxConnector};
use rfp_storage::{open_backend, DurableStorage};
use tracing::Instrument;

use crate::observer::Observers;
use crate::InvocationContext;

/// State shared by the adapter and every context it creates.
#[derive(Clone)]
pub(crate) struct Shared {
    pub(crate) config: AdapterConfig,
    pub(crate) connector: Arc<dyn DatabaseConnector>,
    pub(crate) storage: Option<Arc<dyn DurableStorage>>,
    pub(crate) observers: Observers,
}

/// Provisions and releases per-invocation resources.
///
/// Cheap to clone. Holds only configuration and backend clients; all
/// per-request state lives in [`InvocationContext`].
///
/// # Example
///
/// ```rust,ignore
/// let adapter = EphemeralAdapter::from_config(AdapterConfig::from_env()?).await?;
///
/// let location = adapter
///     .run(|ctx| {
///         async move {
///             let target = ctx.resolve_storage("proposals/Q-1/rfp.pdf").await?;
///             target.write(b"%PDF-1.7").await?;
///             Ok(target.location())
///         }
///         .boxed()
///     })
///     .await?;
/// ```
#[derive(Clone)]
pub struct EphemeralAdapter {
    shared: Arc<Shared>,
}

impl EphemeralAdapter {
    /// Validate `config` and open the configured storage backend.
    pub async fn from_config(config: AdapterConfig) -> Result<Self, AdapterError> {
        config.validate()?;
        let storage = match &config.storage {
            Some(settings) => Some(open_backend(settings).await?),
            None => None,
        };

        tracing::debug!(
            mode = config.mode.as_str(),
            storage = config.storage.as_ref().map(|s| s.backend_name()).unwrap_or("none"),
            "Adapter configured"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                connector: Arc::new(SqlxConnector),
                storage,
                observers: Observers::default(),
            }),
        })
    }

    fn shared_mut(&mut self) -> &mut Shared {
        Arc::make_mut(&mut self.shared)
    }

    /// Replace the database connector.
    pub fn with_connector(mut self, connector: Arc<dyn DatabaseConnector>) -> Self {
        self.shared_mut().connector = connector;
        self
    }

    /// Replace the storage backend, e.g. with a client shared across adapters.
    pub fn with_storage(mut self, storage: Arc<dyn DurableStorage>) -> Self {
        self.shared_mut().storage = Some(storage);
        self
    }

    /// Attach a lifecycle observer.
    pub fn with_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.shared_mut().observers.push(observer);
        self
    }

    /// The adapter configuration.
    pub fn config(&self) -> &AdapterConfig {
        &self.shared.config
    }

    /// Allocate a scratch directory and connect the database.
    ///
    /// Fails before any handler logic runs if the database cannot be
    /// resolved or reached; the scratch directory is removed in that case.
    pub async fn begin_invocation(&self) -> Result<InvocationContext, AdapterError> {
        let id = InvocationId::generate();
        let config = &self.shared.config;

        let root = config.scratch_root();
        tokio::fs::create_dir_all(&root).await?;
        let prefix = format!("{}-", id);
        let scratch = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix(&prefix).tempdir_in(&root)
        })
        .await
        .map_err(std::io::Error::other)??;

        let mut ctx = InvocationContext::new(id, scratch, self.shared.clone());
        tracing::debug!(
            invocation = %ctx.id(),
            scratch = %ctx.scratch_path().display(),
            "Invocation created"
        );

        let (target, warning) = DatabaseTarget::resolve(config)?;
        if let Some(warning) = warning {
            ctx.warn(warning);
        }

        let database = self
            .shared
            .connector
            .connect(&target, config.limits.db_connect_timeout())
            .await
            .map_err(|e| {
                tracing::error!(invocation = %ctx.id(), db = %target, error = %e, "Database unavailable");
                AdapterError::from(e)
            })?;

        ctx.activate(database);
        Ok(ctx)
    }

    /// Run `handler` inside a fresh invocation.
    ///
    /// The invocation is released on every path. The wall-clock limit is
    /// measured from the start of the invocation. A panicking handler is
    /// resumed after release. An `AdapterError` returned through `anyhow`
    /// keeps its category.
    pub async fn run<F, T>(&self, handler: F) -> Result<T, AdapterError>
    where
        F: for<'a> FnOnce(&'a mut InvocationContext) -> BoxFuture<'a, anyhow::Result<T>>,
    {
        let mut ctx = self.begin_invocation().await?;
        let span = tracing::info_span!("invocation", id = %ctx.id());
        let limit = self.shared.config.limits.execution_timeout();
        let remaining = ctx.remaining(limit);

        let outcome = {
            let fut = AssertUnwindSafe(handler(&mut ctx)).catch_unwind();
            tokio::time::timeout(remaining, fut)
                .instrument(span.clone())
                .await
        };

        let result = match outcome {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => Err(match e.downcast::<AdapterError>() {
                Ok(adapter_error) => adapter_error,
                Err(other) => AdapterError::Handler(other),
            }),
            Ok(Err(panic)) => {
                span.in_scope(|| tracing::error!("Handler panicked; releasing invocation"));
                ctx.end_invocation().await;
                std::panic::resume_unwind(panic);
            }
            Err(_) => {
                span.in_scope(|| {
                    tracing::warn!(limit_ms = limit.as_millis() as u64, "Invocation timed out")
                });
                ctx.emit(LifecyclePhase::TimedOut);
                Err(AdapterError::TimeoutCancellation { limit })
            }
        };

        ctx.end_invocation().instrument(span).await;
        result
    }
}

impl fmt::Debug for EphemeralAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralAdapter")
            .field("mode", &self.shared.config.mode)
            .field("connector", &self.shared.connector)
            .field("storage", &self.shared.storage)
            .field("observers", &self.shared.observers)
            .finish()
    }
}
