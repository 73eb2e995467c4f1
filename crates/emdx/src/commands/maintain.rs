//! `emdx maintain` -- database and executor maintenance.

use std::time::Duration;

use anyhow::{Context, Result};

use emdx_exec::reconcile_stale_executions;
use emdx_search::Embedder;

use crate::cli::{MaintainArgs, MaintainCommands};
use crate::context::RuntimeContext;
use crate::embedder::HashingEmbedder;
use crate::output::output_json;

/// Execute the `emdx maintain` command family.
pub fn run(ctx: &RuntimeContext, args: &MaintainArgs) -> Result<()> {
    match args.command {
        MaintainCommands::Migrate => {
            // Opening runs migrations to head; report where we landed.
            let store = ctx.open_store()?;
            let version = store.schema_version()?;
            if ctx.json {
                output_json(&serde_json::json!({ "schema_version": version }));
            } else if !ctx.quiet {
                println!("Schema at version {version}");
            }
        }
        MaintainCommands::Backup { ref dest } => {
            let src = &ctx.config.db_path;
            let dest = dest.clone().unwrap_or_else(|| {
                src.with_extension(format!(
                    "db.bak-{}",
                    chrono::Utc::now().format("%Y%m%d%H%M%S")
                ))
            });
            std::fs::copy(src, &dest)
                .with_context(|| format!("copying {} to {}", src.display(), dest.display()))?;
            if ctx.json {
                output_json(&serde_json::json!({ "backup": dest }));
            } else if !ctx.quiet {
                println!("Backed up to {}", dest.display());
            }
        }
        MaintainCommands::Cleanup { age } => {
            let store = ctx.open_store()?;
            let threshold = age
                .map(|minutes| Duration::from_secs(minutes * 60))
                .unwrap_or(emdx_exec::recovery::DEFAULT_STALE_THRESHOLD);
            let reconciled = reconcile_stale_executions(&store, threshold)?;
            if ctx.json {
                output_json(&serde_json::json!({ "reconciled": reconciled }));
            } else if !ctx.quiet {
                if reconciled.is_empty() {
                    println!("Nothing to reconcile.");
                } else {
                    println!("Reconciled: {}", reconciled.join(", "));
                }
            }
        }
        MaintainCommands::Embed => {
            let store = ctx.open_store()?;
            let embedder = HashingEmbedder;
            let missing = store.documents_missing_embedding(embedder.model_id())?;
            let mut embedded = 0usize;
            for id in &missing {
                let doc = store.get_document(*id)?;
                let text = format!("{}\n{}", doc.title, doc.content);
                let vector = embedder
                    .embed_text(&text)
                    .map_err(emdx_storage::StorageError::invalid_input)?;
                store.upsert_embedding(*id, embedder.model_id(), &vector)?;
                embedded += 1;
            }
            if ctx.json {
                output_json(&serde_json::json!({
                    "model": embedder.model_id(),
                    "embedded": embedded,
                }));
            } else if !ctx.quiet {
                println!("Embedded {embedded} document(s)");
            }
        }
    }
    Ok(())
}
