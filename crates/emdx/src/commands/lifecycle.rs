//! Trash and archive lifecycle commands.

use anyhow::Result;

use crate::cli::{ArchiveArgs, IdArg};
use crate::context::RuntimeContext;
use crate::output::output_json;

fn report(ctx: &RuntimeContext, id: i64, action: &str) {
    if ctx.json {
        output_json(&serde_json::json!({ "id": id, "action": action }));
    } else if !ctx.quiet {
        println!("{action} #{id}");
    }
}

/// `emdx delete` -- move to trash.
pub fn run_delete(ctx: &RuntimeContext, args: &IdArg) -> Result<()> {
    let store = ctx.open_store()?;
    let id = store.resolve_document_ref(&args.id_or_title)?;
    store.soft_delete_document(id)?;
    report(ctx, id, "trashed");
    Ok(())
}

/// `emdx restore` -- bring back from trash.
pub fn run_restore(ctx: &RuntimeContext, args: &IdArg) -> Result<()> {
    let store = ctx.open_store()?;
    // Trashed documents do not resolve by title; accept ids only here.
    let id: i64 = args
        .id_or_title
        .parse()
        .map_err(|_| emdx_storage::StorageError::invalid_input("restore takes a numeric id"))?;
    store.restore_document(id)?;
    report(ctx, id, "restored");
    Ok(())
}

/// `emdx purge` -- permanently delete a trashed document.
pub fn run_purge(ctx: &RuntimeContext, args: &IdArg) -> Result<()> {
    let store = ctx.open_store()?;
    let id: i64 = args
        .id_or_title
        .parse()
        .map_err(|_| emdx_storage::StorageError::invalid_input("purge takes a numeric id"))?;
    store.purge_document(id)?;
    report(ctx, id, "purged");
    Ok(())
}

/// `emdx archive`.
pub fn run_archive(ctx: &RuntimeContext, args: &ArchiveArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let id = store.resolve_document_ref(&args.id_or_title)?;
    store.archive_document(id, args.cascade)?;
    report(ctx, id, "archived");
    Ok(())
}

/// `emdx unarchive`.
pub fn run_unarchive(ctx: &RuntimeContext, args: &IdArg) -> Result<()> {
    let store = ctx.open_store()?;
    let id = store.resolve_document_ref(&args.id_or_title)?;
    store.unarchive_document(id)?;
    report(ctx, id, "unarchived");
    Ok(())
}
