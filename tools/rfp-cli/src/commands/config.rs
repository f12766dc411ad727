//! Configuration commands.

use anyhow::{bail, Result};
use rfp_core::{AdapterConfig, StorageSettings};

use super::{ConfigArgs, ConfigCommand};
use crate::context::Context;
use crate::output::format_bytes;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx),
        ConfigCommand::Validate { strict } => validate_config(ctx, strict),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    ctx.output.header("Current Configuration");

    if ctx.output.is_json() {
        ctx.output.json(config);
        return Ok(());
    }

    ctx.output.kv("source", &ctx.source.to_string());
    ctx.output.kv("mode", config.mode.as_str());
    ctx.output.kv("secret_key", set_or_unset(config.secret_key.is_some()));
    ctx.output
        .kv("gemini_api_key", set_or_unset(config.gemini_api_key.is_some()));

    ctx.output.info("");
    ctx.output.info("[database]");
    match &config.database_url {
        Some(_) => ctx.output.kv("database_url", "***"),
        None => ctx.output.kv(
            "local_database_path",
            &config.local_database_path.display().to_string(),
        ),
    }

    ctx.output.info("");
    ctx.output.info("[storage]");
    show_storage(ctx, config);
    ctx.output
        .kv("scratch_root", &config.scratch_root().display().to_string());

    ctx.output.info("");
    ctx.output.info("[limits]");
    let limits = &config.limits;
    ctx.output
        .kv("execution_timeout_ms", &limits.execution_timeout_ms.to_string());
    ctx.output
        .kv("max_upload_bytes", &format_bytes(limits.max_upload_bytes));
    ctx.output
        .kv("db_connect_timeout_ms", &limits.db_connect_timeout_ms.to_string());
    ctx.output.kv(
        "storage_probe_timeout_ms",
        &limits.storage_probe_timeout_ms.to_string(),
    );

    Ok(())
}

fn show_storage(ctx: &Context, config: &AdapterConfig) {
    match &config.storage {
        Some(StorageSettings::S3 {
            bucket,
            prefix,
            region,
        }) => {
            ctx.output.kv("backend", "s3");
            ctx.output.kv("bucket", bucket);
            if !prefix.is_empty() {
                ctx.output.kv("prefix", prefix);
            }
            if let Some(region) = region {
                ctx.output.kv("region", region);
            }
        }
        Some(StorageSettings::Fs { root }) => {
            ctx.output.kv("backend", "fs");
            ctx.output.kv("root", &root.display().to_string());
        }
        Some(StorageSettings::Memory) => ctx.output.kv("backend", "memory"),
        None => ctx.output.kv(
            "local_storage_dir",
            &config.local_storage_dir.display().to_string(),
        ),
    }
}

fn set_or_unset(set: bool) -> &'static str {
    if set {
        "set"
    } else {
        "unset"
    }
}

fn validate_config(ctx: &Context, strict: bool) -> Result<()> {
    ctx.output.header("Validating configuration");

    let error = ctx.config.validate().err().map(|e| e.to_string());
    let advisories = ctx.config.advisories();

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({
            "valid": error.is_none(),
            "error": error,
            "advisories": advisories,
        }));
    } else {
        if let Some(error) = &error {
            ctx.output.error(&format!("Error: {}", error));
        }
        for advisory in &advisories {
            ctx.output.warn(&format!("Warning: {}", advisory));
        }
    }

    if error.is_some() {
        bail!("Configuration is invalid");
    }
    if strict && !advisories.is_empty() {
        bail!("Configuration has {} advisory(ies)", advisories.len());
    }

    if advisories.is_empty() {
        ctx.output.success("Configuration is valid");
    } else {
        ctx.output.success("Configuration is valid (with warnings)");
    }
    Ok(())
}
