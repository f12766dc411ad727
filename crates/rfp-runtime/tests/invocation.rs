//! End-to-end invocation lifecycle tests.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use rfp_core::{
    AdapterConfig, AdapterError, ErrorKind, ExecutionLimits, InvocationState, LifecycleObserver,
    LifecyclePhase, ProvisionWarning, StorageSettings,
};
use rfp_db::{DatabaseConnection, DatabaseConnector, DatabaseHandle, DatabaseTarget, DbError};
use rfp_runtime::{EphemeralAdapter, HealthStatus, ReleaseOutcome};
use rfp_storage::{BackendKind, DurableStorage, MemoryStorage, StorageError, StorageKey};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::ConnectOptions;
use tempfile::TempDir;

/// Stands in for a network database: reports the durable target it was
/// asked for while serving an in-memory SQLite connection.
#[derive(Debug, Default)]
struct InMemoryConnector {
    seen: Mutex<Vec<DatabaseTarget>>,
}

#[async_trait]
impl DatabaseConnector for InMemoryConnector {
    async fn connect(
        &self,
        target: &DatabaseTarget,
        _timeout: Duration,
    ) -> Result<DatabaseHandle, DbError> {
        self.seen.lock().unwrap().push(target.clone());
        let conn = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| DbError::Connect(e.to_string()))?
            .connect()
            .await
            .map_err(|e| DbError::Connect(e.to_string()))?;
        Ok(DatabaseHandle::new(
            target.clone(),
            DatabaseConnection::Sqlite(conn),
        ))
    }
}

/// Serves SQLite handles on a file whose write lock another connection
/// takes as soon as the handle is handed out. Statements on the handle then
/// sit in SQLite's busy handler, and closing it waits for them.
struct LockedFileConnector {
    path: PathBuf,
    holder: tokio::sync::Mutex<SqliteConnection>,
}

impl std::fmt::Debug for LockedFileConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockedFileConnector")
            .field("path", &self.path)
            .finish()
    }
}

impl LockedFileConnector {
    async fn new(path: PathBuf) -> Self {
        let mut holder = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .connect()
            .await
            .unwrap();
        sqlx::query("CREATE TABLE bids (amount INTEGER)")
            .execute(&mut holder)
            .await
            .unwrap();
        Self {
            path,
            holder: tokio::sync::Mutex::new(holder),
        }
    }
}

#[async_trait]
impl DatabaseConnector for LockedFileConnector {
    async fn connect(
        &self,
        target: &DatabaseTarget,
        _timeout: Duration,
    ) -> Result<DatabaseHandle, DbError> {
        let conn = SqliteConnectOptions::new()
            .filename(&self.path)
            .busy_timeout(Duration::from_secs(30))
            .connect()
            .await?;
        let mut holder = self.holder.lock().await;
        sqlx::query("BEGIN EXCLUSIVE").execute(&mut *holder).await?;
        Ok(DatabaseHandle::new(
            target.clone(),
            DatabaseConnection::Sqlite(conn),
        ))
    }
}

/// A backend whose reachability check never answers.
#[derive(Debug)]
struct SilentStorage;

#[async_trait]
impl DurableStorage for SilentStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::S3
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn location(&self, key: &StorageKey) -> String {
        format!("s3://silent/{key}")
    }

    async fn probe(&self) -> Result<(), StorageError> {
        futures::future::pending().await
    }

    async fn put(&self, _key: &StorageKey, _data: &[u8]) -> Result<(), StorageError> {
        Ok(())
    }

    async fn get(&self, _key: &StorageKey) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(None)
    }

    async fn delete(&self, _key: &StorageKey) -> Result<(), StorageError> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingObserver {
    phases: Mutex<Vec<LifecyclePhase>>,
}

impl LifecycleObserver for RecordingObserver {
    fn on_phase(&self, _invocation: &str, phase: &LifecyclePhase, _elapsed: Duration) {
        self.phases.lock().unwrap().push(phase.clone());
    }
}

fn dev_config(tmp: &TempDir) -> AdapterConfig {
    AdapterConfig::development()
        .with_scratch_root(tmp.path().join("scratch"))
        .with_local_database_path(tmp.path().join("rfp_local.db"))
        .with_local_storage_dir(tmp.path().join("local-storage"))
}

fn prod_config(tmp: &TempDir) -> AdapterConfig {
    AdapterConfig::production()
        .with_secret_key("test-secret")
        .with_database_url("postgres://rfp:pw@db.internal:5432/rfp")
        .with_scratch_root(tmp.path().join("scratch"))
        .with_local_storage_dir(tmp.path().join("local-storage"))
}

async fn prod_adapter(config: AdapterConfig) -> (EphemeralAdapter, Arc<InMemoryConnector>) {
    let connector = Arc::new(InMemoryConnector::default());
    let adapter = EphemeralAdapter::from_config(config)
        .await
        .unwrap()
        .with_connector(connector.clone());
    (adapter, connector)
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[tokio::test]
async fn test_scratch_directories_never_collide() {
    let tmp = TempDir::new().unwrap();
    let adapter = EphemeralAdapter::from_config(dev_config(&tmp))
        .await
        .unwrap();

    let contexts = futures::future::try_join_all((0..16).map(|_| adapter.begin_invocation()))
        .await
        .unwrap();

    let mut paths: Vec<PathBuf> = contexts
        .iter()
        .map(|c| c.scratch_path().to_path_buf())
        .collect();
    assert!(paths.iter().all(|p| p.is_dir()));
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 16);

    for mut ctx in contexts {
        ctx.end_invocation().await;
    }
    assert_eq!(entries(&tmp.path().join("scratch")), 0);
}

#[tokio::test]
async fn test_end_invocation_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let adapter = EphemeralAdapter::from_config(dev_config(&tmp))
        .await
        .unwrap();
    let mut ctx = adapter.begin_invocation().await.unwrap();
    assert_eq!(ctx.state(), InvocationState::Active);
    let scratch = ctx.scratch_path().to_path_buf();

    let first = ctx.end_invocation().await;
    assert!(matches!(
        first,
        ReleaseOutcome::Released {
            scratch_removed: true,
            ..
        }
    ));
    assert_eq!(ctx.end_invocation().await, ReleaseOutcome::AlreadyClosed);
    assert_eq!(ctx.state(), InvocationState::Closed);
    assert!(!scratch.exists());

    let err = ctx.resolve_storage("proposals/1.json").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ContextClosed);
    assert_eq!(
        ctx.database_mut().unwrap_err().kind(),
        ErrorKind::ContextClosed
    );
}

#[tokio::test]
async fn test_production_without_storage_is_a_configuration_error() {
    let tmp = TempDir::new().unwrap();
    let (adapter, _) = prod_adapter(prod_config(&tmp)).await;
    let mut ctx = adapter.begin_invocation().await.unwrap();

    for _ in 0..3 {
        let err = ctx.resolve_storage("uploads/rfp.pdf").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
    assert!(!tmp.path().join("local-storage").exists());
    assert!(ctx.warnings().is_empty());
    ctx.end_invocation().await;
}

#[tokio::test]
async fn test_production_rejects_missing_database_url() {
    let tmp = TempDir::new().unwrap();
    let mut config = prod_config(&tmp);
    config.database_url = None;
    let adapter = EphemeralAdapter::from_config(config).await.unwrap();

    let err = adapter.begin_invocation().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(entries(&tmp.path().join("scratch")), 0);
}

#[tokio::test]
async fn test_legacy_postgres_scheme_is_normalized_before_connecting() {
    let tmp = TempDir::new().unwrap();
    let (adapter, connector) = prod_adapter(prod_config(&tmp)).await;

    let mut ctx = adapter.begin_invocation().await.unwrap();
    assert!(ctx.database_mut().unwrap().is_durable());
    ctx.end_invocation().await;

    let seen = connector.seen.lock().unwrap();
    assert_eq!(
        seen[0],
        DatabaseTarget::Durable {
            url: "postgresql://rfp:pw@db.internal:5432/rfp".to_string()
        }
    );
}

#[tokio::test]
async fn test_write_is_visible_to_a_later_invocation() {
    let tmp = TempDir::new().unwrap();
    let config = prod_config(&tmp).with_storage(StorageSettings::Fs {
        root: tmp.path().join("volume"),
    });

    // Two adapters model two separate execution environments.
    let (first, _) = prod_adapter(config.clone()).await;
    let (second, _) = prod_adapter(config).await;

    let mut ctx = first.begin_invocation().await.unwrap();
    let target = ctx.resolve_storage("proposals/Q-1/summary.json").await.unwrap();
    target.write(br#"{"total":1250}"#).await.unwrap();
    assert!(target.is_durable());
    ctx.end_invocation().await;

    let mut ctx = second.begin_invocation().await.unwrap();
    let target = ctx.resolve_storage("proposals/Q-1/summary.json").await.unwrap();
    assert_eq!(
        target.read().await.unwrap().as_deref(),
        Some(&br#"{"total":1250}"#[..])
    );
    ctx.end_invocation().await;
}

#[tokio::test]
async fn test_target_is_unusable_after_release() {
    let tmp = TempDir::new().unwrap();
    let storage = MemoryStorage::new();
    let adapter = EphemeralAdapter::from_config(dev_config(&tmp))
        .await
        .unwrap()
        .with_storage(Arc::new(storage.clone()));

    let mut ctx = adapter.begin_invocation().await.unwrap();
    let target = ctx.resolve_storage("late/write.txt").await.unwrap();
    ctx.end_invocation().await;

    let err = target.write(b"too late").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ContextClosed);
    assert!(storage.is_empty().await);
}

#[tokio::test]
async fn test_hanging_handler_is_cancelled_and_released() {
    let tmp = TempDir::new().unwrap();
    let config = dev_config(&tmp).with_limits(
        ExecutionLimits::default().with_execution_timeout(Duration::from_millis(200)),
    );
    let observer = Arc::new(RecordingObserver::default());
    let adapter = EphemeralAdapter::from_config(config)
        .await
        .unwrap()
        .with_observer(observer.clone());

    let seen: Arc<Mutex<Option<PathBuf>>> = Arc::default();
    let slot = seen.clone();
    let result = adapter
        .run(move |ctx| {
            async move {
                let path = ctx.scratch_path().join("draft.xlsx");
                tokio::fs::write(&path, b"partial").await?;
                *slot.lock().unwrap() = Some(ctx.scratch_path().to_path_buf());
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            }
            .boxed()
        })
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, AdapterError::TimeoutCancellation { .. }));
    assert_eq!(err.client_error().code, "invocation_timeout");

    let scratch = seen.lock().unwrap().clone().unwrap();
    assert!(!scratch.exists());

    let phases = observer.phases.lock().unwrap();
    assert!(phases.contains(&LifecyclePhase::TimedOut));
    assert_eq!(phases.last(), Some(&LifecyclePhase::Released));
}

#[tokio::test]
async fn test_missing_database_url_falls_back_in_development() {
    let tmp = TempDir::new().unwrap();
    let adapter = EphemeralAdapter::from_config(dev_config(&tmp))
        .await
        .unwrap();

    let mut ctx = adapter.begin_invocation().await.unwrap();
    assert!(matches!(
        ctx.warnings(),
        [ProvisionWarning::LocalDatabaseFallback { .. }]
    ));

    let db = ctx.database_mut().unwrap();
    assert!(!db.is_durable());
    db.execute("CREATE TABLE IF NOT EXISTS readiness (score INTEGER)", &[])
        .await
        .unwrap();
    ctx.end_invocation().await;

    assert!(tmp.path().join("rfp_local.db").is_file());
}

#[tokio::test]
async fn test_unreachable_database_fails_before_handler() {
    let tmp = TempDir::new().unwrap();
    let config = dev_config(&tmp)
        .with_database_url("postgres://rfp:pw@127.0.0.1:1/rfp")
        .with_limits(ExecutionLimits::default().with_db_connect_timeout_ms(2000));
    let adapter = EphemeralAdapter::from_config(config).await.unwrap();

    let ran = Arc::new(Mutex::new(false));
    let flag = ran.clone();
    let err = adapter
        .run(move |_ctx| {
            async move {
                *flag.lock().unwrap() = true;
                Ok(())
            }
            .boxed()
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Connectivity);
    assert_eq!(err.client_error().status.as_u16(), 503);
    assert!(!*ran.lock().unwrap());
    assert_eq!(entries(&tmp.path().join("scratch")), 0);
}

#[tokio::test]
async fn test_dropping_run_future_releases_scratch() {
    let tmp = TempDir::new().unwrap();
    let adapter = EphemeralAdapter::from_config(dev_config(&tmp))
        .await
        .unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel::<PathBuf>();
    let run = adapter.run(move |ctx| {
        async move {
            let _ = tx.send(ctx.scratch_path().to_path_buf());
            futures::future::pending::<()>().await;
            Ok(())
        }
        .boxed()
    });

    let outer = tokio::time::timeout(Duration::from_millis(300), run).await;
    assert!(outer.is_err());

    let scratch = rx.await.unwrap();
    assert!(!scratch.exists());
    assert_eq!(entries(&tmp.path().join("scratch")), 0);
}

#[tokio::test]
async fn test_panicking_handler_still_releases() {
    let tmp = TempDir::new().unwrap();
    let adapter = EphemeralAdapter::from_config(dev_config(&tmp))
        .await
        .unwrap();

    let result = std::panic::AssertUnwindSafe(adapter.run(|_ctx| {
        async move {
            if true {
                panic!("handler bug");
            }
            Ok(())
        }
        .boxed()
    }))
    .catch_unwind()
    .await;

    assert!(result.is_err());
    assert_eq!(entries(&tmp.path().join("scratch")), 0);
}

#[tokio::test]
async fn test_invalid_keys_and_oversize_uploads_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let storage = MemoryStorage::new();
    let config = dev_config(&tmp)
        .with_limits(ExecutionLimits::default().with_max_upload_bytes(8));
    let adapter = EphemeralAdapter::from_config(config)
        .await
        .unwrap()
        .with_storage(Arc::new(storage.clone()));

    let mut ctx = adapter.begin_invocation().await.unwrap();
    for key in ["../etc/passwd", "/abs/path", "uploads/../../x", ""] {
        let err = ctx.resolve_storage(key).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration, "key {key:?}");
    }

    let target = ctx.resolve_storage("uploads/big.bin").await.unwrap();
    let err = target.write(&[0u8; 9]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LimitExceeded);
    assert_eq!(err.client_error().code, "payload_too_large");
    target.write(&[0u8; 8]).await.unwrap();

    let uploads = ctx.uploads();
    assert_eq!(uploads.count, 1);
    assert_eq!(uploads.rejected, 1);
    assert_eq!(storage.len().await, 1);
    ctx.end_invocation().await;
}

#[tokio::test]
async fn test_persist_scratch_file_flushes_to_storage() {
    let tmp = TempDir::new().unwrap();
    let storage = MemoryStorage::new();
    let adapter = EphemeralAdapter::from_config(dev_config(&tmp))
        .await
        .unwrap()
        .with_storage(Arc::new(storage.clone()));

    let location = adapter
        .run(|ctx| {
            async move {
                tokio::fs::create_dir_all(ctx.scratch_path().join("out")).await?;
                tokio::fs::write(ctx.scratch_path().join("out/proposal.docx"), b"docx").await?;
                let target = ctx
                    .persist_scratch_file("out/proposal.docx", "proposals/Q-7/proposal.docx")
                    .await?;
                assert_eq!(target.key().as_str(), "proposals/Q-7/proposal.docx");
                assert!(ctx.timing().time_to_active().is_some());
                Ok(target.location())
            }
            .boxed()
        })
        .await
        .unwrap();
    assert_eq!(location, "memory://proposals/Q-7/proposal.docx");

    let mut ctx = adapter.begin_invocation().await.unwrap();
    let target = ctx
        .resolve_storage("proposals/Q-7/proposal.docx")
        .await
        .unwrap();
    assert_eq!(target.read().await.unwrap().unwrap(), b"docx");

    let err = ctx
        .persist_scratch_file("../escape.txt", "x")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    ctx.end_invocation().await;
}

#[tokio::test]
async fn test_development_storage_fallback_stays_out_of_scratch() {
    let tmp = TempDir::new().unwrap();
    let adapter = EphemeralAdapter::from_config(dev_config(&tmp))
        .await
        .unwrap();

    let mut ctx = adapter.begin_invocation().await.unwrap();
    let target = ctx.resolve_storage("uploads/rfp.pdf").await.unwrap();
    target.write(b"%PDF").await.unwrap();
    assert!(!target.is_durable());
    assert!(ctx
        .warnings()
        .iter()
        .any(|w| matches!(w, ProvisionWarning::LocalStorageFallback { .. })));
    ctx.end_invocation().await;

    assert!(tmp.path().join("local-storage/uploads/rfp.pdf").is_file());
}

#[tokio::test]
async fn test_adapter_errors_keep_their_category_through_handlers() {
    let tmp = TempDir::new().unwrap();
    let (adapter, _) = prod_adapter(prod_config(&tmp)).await;

    let err = adapter
        .run(|ctx| {
            async move {
                ctx.resolve_storage("uploads/rfp.pdf").await?;
                Ok(())
            }
            .boxed()
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let err = adapter
        .run::<_, ()>(|_ctx| async move { Err(anyhow::anyhow!("pricing sheet malformed")) }.boxed())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Handler);
    assert_eq!(err.client_error().detail, "Internal server error");
}

#[tokio::test]
async fn test_lifecycle_phases_in_order() {
    let tmp = TempDir::new().unwrap();
    let observer = Arc::new(RecordingObserver::default());
    let adapter = EphemeralAdapter::from_config(dev_config(&tmp))
        .await
        .unwrap()
        .with_storage(Arc::new(MemoryStorage::new()))
        .with_observer(observer.clone());

    let mut ctx = adapter.begin_invocation().await.unwrap();
    ctx.resolve_storage("a.txt").await.unwrap();
    ctx.end_invocation().await;
    ctx.end_invocation().await;
    drop(ctx);

    let phases = observer.phases.lock().unwrap();
    assert_eq!(phases[0], LifecyclePhase::Created);
    assert!(matches!(phases[1], LifecyclePhase::Warning(_)));
    assert_eq!(phases[2], LifecyclePhase::Activated);
    assert_eq!(
        phases[3],
        LifecyclePhase::StorageResolved("memory://a.txt".to_string())
    );
    assert_eq!(phases[4], LifecyclePhase::Released);
    assert_eq!(phases.len(), 5);
}

#[tokio::test]
async fn test_health_reports_degraded_on_local_fallbacks() {
    let tmp = TempDir::new().unwrap();
    let adapter = EphemeralAdapter::from_config(dev_config(&tmp))
        .await
        .unwrap();

    let report = adapter.health().await;
    assert_eq!(report.status, HealthStatus::Degraded);
    assert!(!report.database.durable);
    assert!(!report.gemini_configured);
    assert_eq!(report.warnings.len(), 2);
    assert_eq!(entries(&tmp.path().join("scratch")), 0);

    let json: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["mode"], "development");
}

#[tokio::test]
async fn test_health_reports_unhealthy_when_database_unreachable() {
    let tmp = TempDir::new().unwrap();
    let config = dev_config(&tmp)
        .with_database_url("postgres://rfp:pw@127.0.0.1:1/rfp")
        .with_limits(ExecutionLimits::default().with_db_connect_timeout_ms(2000));
    let adapter = EphemeralAdapter::from_config(config).await.unwrap();

    let report = adapter.health().await;
    assert_eq!(report.status, HealthStatus::Unhealthy);
    assert_eq!(report.database.status, rfp_runtime::ComponentStatus::Unreachable);
    assert_eq!(report.storage.status, rfp_runtime::ComponentStatus::Skipped);
}

#[tokio::test]
async fn test_health_is_healthy_on_durable_backends() {
    let tmp = TempDir::new().unwrap();
    let mut config = prod_config(&tmp).with_storage(StorageSettings::Fs {
        root: tmp.path().join("volume"),
    });
    config.gemini_api_key = Some(rfp_core::Secret::new("g-key"));
    let (adapter, _) = prod_adapter(config).await;

    let report = adapter.health().await;
    assert_eq!(report.status, HealthStatus::Healthy);
    assert!(report.database.durable);
    assert!(report.storage.durable);
    assert!(report.warnings.is_empty());
}

#[tokio::test]
async fn test_stalled_database_does_not_hold_back_scratch_removal() {
    let tmp = TempDir::new().unwrap();
    let connector = Arc::new(LockedFileConnector::new(tmp.path().join("locked.db")).await);
    let config = dev_config(&tmp).with_limits(
        ExecutionLimits::default()
            .with_execution_timeout(Duration::from_millis(300))
            .with_db_connect_timeout_ms(300),
    );
    let adapter = EphemeralAdapter::from_config(config)
        .await
        .unwrap()
        .with_connector(connector.clone());

    let seen: Arc<Mutex<Option<PathBuf>>> = Arc::default();
    let slot = seen.clone();
    let started = std::time::Instant::now();
    let err = adapter
        .run(move |ctx| {
            async move {
                *slot.lock().unwrap() = Some(ctx.scratch_path().to_path_buf());
                ctx.database_mut()?
                    .execute("INSERT INTO bids (amount) VALUES (1250)", &[])
                    .await?;
                Ok(())
            }
            .boxed()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AdapterError::TimeoutCancellation { .. }));
    // The statement is still waiting on the lock; release must not.
    assert!(started.elapsed() < Duration::from_secs(10));
    let scratch = seen.lock().unwrap().clone().unwrap();
    assert!(!scratch.exists());
    assert_eq!(entries(&tmp.path().join("scratch")), 0);
}

#[tokio::test]
async fn test_key_collision_is_a_conflict_not_an_outage() {
    let tmp = TempDir::new().unwrap();
    let config = prod_config(&tmp).with_storage(StorageSettings::Fs {
        root: tmp.path().join("volume"),
    });
    let (adapter, _) = prod_adapter(config).await;

    let mut ctx = adapter.begin_invocation().await.unwrap();
    ctx.resolve_storage("proposals/Q-1")
        .await
        .unwrap()
        .write(b"quote")
        .await
        .unwrap();

    let nested = ctx.resolve_storage("proposals/Q-1/att.pdf").await.unwrap();
    let err = nested.write(b"%PDF").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let client = err.client_error();
    assert_eq!(client.status.as_u16(), 409);
    assert_eq!(client.code, "storage_conflict");
    assert_eq!(nested.read().await.unwrap(), None);
    ctx.end_invocation().await;
}

#[tokio::test]
async fn test_unreachable_storage_fails_fast_without_local_fallback() {
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("not-a-dir");
    std::fs::write(&blocker, b"").unwrap();
    let config = prod_config(&tmp).with_storage(StorageSettings::Fs {
        root: blocker.join("volume"),
    });
    let (adapter, _) = prod_adapter(config).await;

    let mut ctx = adapter.begin_invocation().await.unwrap();
    let err = ctx.resolve_storage("uploads/rfp.pdf").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connectivity);
    assert_eq!(err.client_error().status.as_u16(), 503);
    assert!(!tmp.path().join("local-storage").exists());
    assert!(ctx.warnings().is_empty());
    ctx.end_invocation().await;
}

#[tokio::test]
async fn test_silent_storage_reachability_check_is_bounded() {
    let tmp = TempDir::new().unwrap();
    let config = prod_config(&tmp)
        .with_limits(ExecutionLimits::default().with_storage_probe_timeout_ms(100));
    let (adapter, _) = prod_adapter(config).await;
    let adapter = adapter.with_storage(Arc::new(SilentStorage));

    let mut ctx = adapter.begin_invocation().await.unwrap();
    let started = std::time::Instant::now();
    let err = ctx.resolve_storage("uploads/rfp.pdf").await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(err.kind(), ErrorKind::Connectivity);
    assert!(err.to_string().contains("probe timed out"), "{err}");
    assert!(!tmp.path().join("local-storage").exists());
    ctx.end_invocation().await;
}
