//! Health probe.

use chrono::{DateTime, Utc};
use rfp_core::{AdapterError, ErrorKind, RuntimeMode};
use serde::Serialize;

use crate::EphemeralAdapter;

/// Overall service health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Durable backends reachable and fully configured.
    Healthy,
    /// Serving, but on a local fallback or without optional credentials.
    Degraded,
    /// A backend is unreachable or misconfigured.
    Unhealthy,
}

/// Status of one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Ok,
    Fallback,
    Unconfigured,
    Unreachable,
    Skipped,
}

/// Health of one backend.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    pub durable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ComponentHealth {
    fn ok(durable: bool, detail: String) -> Self {
        Self {
            status: if durable {
                ComponentStatus::Ok
            } else {
                ComponentStatus::Fallback
            },
            durable,
            detail: Some(detail),
        }
    }

    fn failed(error: &AdapterError) -> Self {
        let status = match error.kind() {
            ErrorKind::Configuration => ComponentStatus::Unconfigured,
            _ => ComponentStatus::Unreachable,
        };
        Self {
            status,
            durable: false,
            detail: Some(error.to_string()),
        }
    }

    fn skipped() -> Self {
        Self {
            status: ComponentStatus::Skipped,
            durable: false,
            detail: None,
        }
    }

    fn is_failed(&self) -> bool {
        matches!(
            self.status,
            ComponentStatus::Unconfigured | ComponentStatus::Unreachable
        )
    }
}

/// Health report, shaped like the service's `/api/health` body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub mode: RuntimeMode,
    pub database: ComponentHealth,
    pub storage: ComponentHealth,
    pub gemini_configured: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl HealthReport {
    /// Format as a JSON response body.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"status\":\"{:?}\"}}", self.status))
    }
}

impl EphemeralAdapter {
    /// Run a full begin, ping, probe, end cycle and report what happened.
    ///
    /// Never fails; problems are reported in the returned body.
    pub async fn health(&self) -> HealthReport {
        let config = self.config();
        let gemini_configured = config.gemini_api_key.is_some();
        let mut warnings = Vec::new();

        let (database, storage) = match self.begin_invocation().await {
            Err(e) => (ComponentHealth::failed(&e), ComponentHealth::skipped()),
            Ok(mut ctx) => {
                let database = match ctx.database_mut() {
                    Ok(db) => {
                        let durable = db.is_durable();
                        let detail = db.target().to_string();
                        match db.ping().await {
                            Ok(()) => ComponentHealth::ok(durable, detail),
                            Err(e) => ComponentHealth::failed(&AdapterError::from(e)),
                        }
                    }
                    Err(e) => ComponentHealth::failed(&e),
                };

                let storage = match ctx.storage_backend().await {
                    Ok(backend) => ComponentHealth::ok(backend.is_durable(), backend.kind().to_string()),
                    Err(e) => ComponentHealth::failed(&e),
                };

                warnings.extend(ctx.warnings().iter().map(ToString::to_string));
                ctx.end_invocation().await;
                (database, storage)
            }
        };

        let status = if database.is_failed() || storage.is_failed() {
            HealthStatus::Unhealthy
        } else if !database.durable || !storage.durable || !gemini_configured {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        tracing::info!(?status, "Health probe complete");

        HealthReport {
            status,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode: config.mode,
            database,
            storage,
            gemini_configured,
            warnings,
        }
    }
}
