//! Health probe command.

use anyhow::{bail, Result};
use rfp_runtime::{ComponentHealth, EphemeralAdapter, HealthStatus};

use super::ProbeArgs;
use crate::context::Context;
use crate::output::status_badge;

/// Run the probe command.
pub async fn run(args: ProbeArgs, ctx: &Context) -> Result<()> {
    let adapter = EphemeralAdapter::from_config(ctx.config.clone()).await?;
    let report = adapter.health().await;

    if ctx.output.is_json() {
        ctx.output.json(&report);
    } else {
        ctx.output.header("Health");
        let status = format!("{:?}", report.status).to_lowercase();
        ctx.output.kv("status", &status_badge(&status));
        ctx.output.kv("mode", report.mode.as_str());
        ctx.output.kv("version", &report.version);
        show_component(ctx, "database", &report.database);
        show_component(ctx, "storage", &report.storage);
        ctx.output
            .kv("gemini_configured", &report.gemini_configured.to_string());
        for warning in &report.warnings {
            ctx.output.warn(warning);
        }
    }

    match report.status {
        HealthStatus::Unhealthy => bail!("Service is unhealthy"),
        HealthStatus::Degraded if args.strict => bail!("Service is degraded"),
        _ => Ok(()),
    }
}

fn show_component(ctx: &Context, name: &str, health: &ComponentHealth) {
    let mut line = status_badge(&format!("{:?}", health.status).to_lowercase());
    if let Some(detail) = &health.detail {
        line.push_str(&format!(" ({})", detail));
    }
    ctx.output.kv(name, &line);
}
