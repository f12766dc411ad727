//! Cross-invocation durability check.

use anyhow::{bail, Result};
use futures::FutureExt;
use rfp_runtime::EphemeralAdapter;

use super::SmokeArgs;
use crate::context::Context;
use crate::output::{format_bytes, format_millis};

/// Run the smoke command.
pub async fn run(args: SmokeArgs, ctx: &Context) -> Result<()> {
    ctx.output.header("Smoke test");
    let adapter = EphemeralAdapter::from_config(ctx.config.clone()).await?;
    let payload = payload(args.bytes);
    let started = std::time::Instant::now();

    ctx.output.step(1, 3, "Writing from the first invocation");
    let key = args.key.clone();
    let data = payload.clone();
    let (location, durable, provisioning) = adapter
        .run(move |inv| {
            async move {
                let scratch_copy = inv.scratch_path().join("payload.bin");
                tokio::fs::write(&scratch_copy, &data).await?;
                let target = inv.persist_scratch_file("payload.bin", &key).await?;
                let provisioning = inv.timing().time_to_active().unwrap_or_default();
                Ok((target.location(), target.is_durable(), provisioning))
            }
            .boxed()
        })
        .await?;
    ctx.output.debug(&format!("Wrote {}", location));
    let provisioning = format_millis(provisioning.as_millis() as u64);

    ctx.output.step(2, 3, "Reading from a second invocation");
    let key = args.key.clone();
    let read_back = adapter
        .run(move |inv| {
            async move {
                let target = inv.resolve_storage(&key).await?;
                Ok(target.read().await?)
            }
            .boxed()
        })
        .await?;

    let Some(read_back) = read_back else {
        bail!("{} was not visible to the second invocation", location);
    };
    if read_back != payload {
        bail!("{} changed between invocations", location);
    }

    ctx.output.step(3, 3, "Cleaning up");
    if !args.keep {
        let key = args.key.clone();
        adapter
            .run(move |inv| {
                async move {
                    inv.resolve_storage(&key).await?.delete().await?;
                    Ok(())
                }
                .boxed()
            })
            .await?;
    }

    let elapsed = format_millis(started.elapsed().as_millis() as u64);
    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({
            "location": location,
            "bytes": payload.len(),
            "durable": durable,
            "kept": args.keep,
            "provisioning": provisioning,
            "elapsed": elapsed,
        }));
    } else {
        ctx.output.kv("location", &location);
        ctx.output.kv("size", &format_bytes(payload.len() as u64));
        ctx.output.kv("provisioning", &provisioning);
        ctx.output.kv("elapsed", &elapsed);
        if !durable {
            ctx.output
                .list_item("storage is a local fallback; data will not survive redeploys");
        }
    }
    ctx.output.success("Write was visible to a later invocation");
    Ok(())
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
