//! The per-invocation context.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rfp_core::{
    AdapterError, Backend, InvocationId, InvocationState, LifecyclePhase, ProvisionWarning,
    TimingContext, UploadSummary, UploadTracker,
};
use rfp_db::DatabaseHandle;
use rfp_storage::{DurableStorage, FsStorage, StorageKey};
use serde::Serialize;
use tempfile::TempDir;

use crate::adapter::Shared;
use crate::DurableStorageTarget;

/// Result of [`InvocationContext::end_invocation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// Resources were released by this call.
    Released {
        /// Time from creation to release.
        elapsed: Duration,
        /// Durable writes made by the invocation.
        uploads: UploadSummary,
        /// Whether the scratch directory is gone.
        scratch_removed: bool,
    },
    /// The context had already been released.
    AlreadyClosed,
}

/// Everything one invocation may touch.
///
/// Created by [`EphemeralAdapter::begin_invocation`](crate::EphemeralAdapter::begin_invocation).
/// The scratch directory and database handle belong to this invocation
/// alone. Nothing in the scratch directory survives the invocation; data
/// meant for later requests goes through [`resolve_storage`](Self::resolve_storage)
/// or the database.
///
/// Dropping a context that was never ended releases it synchronously.
pub struct InvocationContext {
    id: InvocationId,
    state: InvocationState,
    scratch: Option<TempDir>,
    scratch_path: PathBuf,
    database: Option<DatabaseHandle>,
    storage: Option<Arc<dyn DurableStorage>>,
    closed: Arc<AtomicBool>,
    warnings: Vec<ProvisionWarning>,
    timing: TimingContext,
    uploads: Arc<UploadTracker>,
    shared: Arc<Shared>,
}

impl InvocationContext {
    pub(crate) fn new(id: InvocationId, scratch: TempDir, shared: Arc<Shared>) -> Self {
        let ctx = Self {
            id,
            state: InvocationState::Created,
            scratch_path: scratch.path().to_path_buf(),
            scratch: Some(scratch),
            database: None,
            storage: None,
            closed: Arc::new(AtomicBool::new(false)),
            warnings: Vec::new(),
            timing: TimingContext::new(),
            uploads: Arc::new(UploadTracker::new()),
            shared,
        };
        ctx.emit(LifecyclePhase::Created);
        ctx
    }

    pub(crate) fn activate(&mut self, database: DatabaseHandle) {
        self.database = Some(database);
        self.transition(InvocationState::Active);
        self.timing.mark("active");
        self.emit(LifecyclePhase::Activated);
    }

    pub(crate) fn warn(&mut self, warning: ProvisionWarning) {
        tracing::warn!(invocation = %self.id, "{}", warning);
        self.emit(LifecyclePhase::Warning(warning.clone()));
        self.warnings.push(warning);
    }

    pub(crate) fn emit(&self, phase: LifecyclePhase) {
        self.shared
            .observers
            .emit(&self.id, phase, self.timing.elapsed());
    }

    fn transition(&mut self, next: InvocationState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }

    /// The invocation id.
    pub fn id(&self) -> &InvocationId {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> InvocationState {
        self.state
    }

    /// Whether the context has been released.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Warnings raised while provisioning this invocation.
    pub fn warnings(&self) -> &[ProvisionWarning] {
        &self.warnings
    }

    /// Timing marks for this invocation.
    pub fn timing(&self) -> &TimingContext {
        &self.timing
    }

    /// Durable writes made so far.
    pub fn uploads(&self) -> UploadSummary {
        self.uploads.summary()
    }

    /// The private scratch directory. Unique to this invocation and removed
    /// when it ends.
    pub fn scratch_path(&self) -> &Path {
        &self.scratch_path
    }

    fn ensure_open(&self) -> Result<(), AdapterError> {
        if self.is_closed() {
            return Err(AdapterError::ContextClosed(self.id.clone()));
        }
        Ok(())
    }

    /// The invocation's exclusive database handle.
    pub fn database_mut(&mut self) -> Result<&mut DatabaseHandle, AdapterError> {
        self.ensure_open()?;
        self.database
            .as_mut()
            .ok_or_else(|| AdapterError::ContextClosed(self.id.clone()))
    }

    /// Map a logical key to a location in durable storage.
    ///
    /// In production an unconfigured backend is a configuration error; in
    /// development a local directory stands in and a warning is recorded.
    /// The first call per invocation checks that the backend is reachable.
    pub async fn resolve_storage(&mut self, key: &str) -> Result<DurableStorageTarget, AdapterError> {
        self.ensure_open()?;
        let key = StorageKey::parse(key)?;
        let backend = self.storage_backend().await?;

        let target = DurableStorageTarget::new(
            key,
            backend,
            self.id.clone(),
            self.closed.clone(),
            self.uploads.clone(),
            self.shared.config.limits.clone(),
        );
        self.emit(LifecyclePhase::StorageResolved(target.location()));
        Ok(target)
    }

    /// Resolve and probe the storage backend without binding a key.
    pub(crate) async fn storage_backend(&mut self) -> Result<Arc<dyn DurableStorage>, AdapterError> {
        if let Some(backend) = &self.storage {
            return Ok(backend.clone());
        }

        let shared = self.shared.clone();
        let backend = match &shared.storage {
            Some(backend) => backend.clone(),
            None if shared.config.mode.is_production() => {
                return Err(AdapterError::configuration(
                    "no durable storage backend configured; set STORAGE_BACKEND",
                ));
            }
            None => {
                let dir = shared.config.local_storage_dir.clone();
                self.warn(ProvisionWarning::LocalStorageFallback { dir: dir.clone() });
                Arc::new(FsStorage::local_fallback(dir)) as Arc<dyn DurableStorage>
            }
        };

        let limit = shared.config.limits.storage_probe_timeout();
        match tokio::time::timeout(limit, backend.probe()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(AdapterError::connectivity(
                    Backend::Storage,
                    format!("{} probe timed out after {:?}", backend.kind(), limit),
                ))
            }
        }

        self.storage = Some(backend.clone());
        Ok(backend)
    }

    /// Flush a file from the scratch directory to durable storage.
    ///
    /// Returns only after the durable write succeeded.
    pub async fn persist_scratch_file(
        &mut self,
        relative_path: impl AsRef<Path>,
        key: &str,
    ) -> Result<DurableStorageTarget, AdapterError> {
        self.ensure_open()?;
        let relative = relative_path.as_ref();
        if relative.as_os_str().is_empty()
            || !relative.components().all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(AdapterError::configuration(format!(
                "scratch path {} must be relative to the scratch directory",
                relative.display()
            )));
        }

        let path = self.scratch_path.join(relative);
        let size = tokio::fs::metadata(&path).await?.len();
        self.uploads.admit(size, &self.shared.config.limits)?;
        let data = tokio::fs::read(&path).await?;

        let target = self.resolve_storage(key).await?;
        target.write(&data).await?;
        Ok(target)
    }

    /// Release the scratch directory and close the database connection.
    ///
    /// Safe to call more than once; later calls return
    /// [`ReleaseOutcome::AlreadyClosed`]. Release problems are logged, never
    /// returned, so callers on error paths can always call this.
    pub async fn end_invocation(&mut self) -> ReleaseOutcome {
        if self.closed.swap(true, Ordering::SeqCst) {
            return ReleaseOutcome::AlreadyClosed;
        }

        // Scratch first: it is local and cannot hang on a stalled backend.
        self.remove_scratch().await;
        if let Some(mut database) = self.database.take() {
            let limit = self.shared.config.limits.db_connect_timeout();
            match tokio::time::timeout(limit, database.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(invocation = %self.id, error = %e, "Failed to close database cleanly")
                }
                Err(_) => tracing::warn!(
                    invocation = %self.id,
                    limit_ms = limit.as_millis() as u64,
                    "Database close timed out; dropping connection"
                ),
            }
        }
        self.transition(InvocationState::Closed);

        let scratch_removed = matches!(tokio::fs::try_exists(&self.scratch_path).await, Ok(false));
        let outcome = ReleaseOutcome::Released {
            elapsed: self.timing.elapsed(),
            uploads: self.uploads.summary(),
            scratch_removed,
        };
        tracing::info!(
            invocation = %self.id,
            elapsed_ms = self.timing.elapsed().as_millis() as u64,
            uploads = self.uploads.summary().count,
            "Invocation released"
        );
        self.emit(LifecyclePhase::Released);
        outcome
    }

    async fn remove_scratch(&mut self) {
        let Some(scratch) = self.scratch.take() else {
            return;
        };
        let removed = tokio::task::spawn_blocking(move || scratch.close()).await;
        let error = match removed {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(e) => e.to_string(),
        };
        tracing::warn!(invocation = %self.id, error = %error, "Failed to remove scratch directory");
        let _ = tokio::fs::remove_dir_all(&self.scratch_path).await;
    }

    fn release_scratch(&mut self) {
        if let Some(scratch) = self.scratch.take() {
            if let Err(e) = scratch.close() {
                tracing::warn!(invocation = %self.id, error = %e, "Failed to remove scratch directory");
                let _ = std::fs::remove_dir_all(&self.scratch_path);
            }
        }
    }

    pub(crate) fn remaining(&self, limit: Duration) -> Duration {
        limit.saturating_sub(self.timing.elapsed())
    }
}

impl Drop for InvocationContext {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Dropping the handle drops the connection without a goodbye.
        self.database.take();
        self.release_scratch();
        self.state = InvocationState::Closed;
        tracing::debug!(invocation = %self.id, "Invocation released on drop");
        self.emit(LifecyclePhase::Released);
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("scratch", &self.scratch_path)
            .field("database", &self.database.as_ref().map(|d| d.target()))
            .field("warnings", &self.warnings)
            .finish()
    }
}
