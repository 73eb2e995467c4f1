//! `emdx view` and `emdx edit`.

use anyhow::Result;

use emdx_storage::DocumentUpdates;

use crate::cli::{EditArgs, ViewArgs};
use crate::context::RuntimeContext;
use crate::output::{format_document_detail, output_json};

/// Execute the `emdx view` command.
///
/// Viewing is the user-facing read: it bumps access tracking unless
/// `--no-touch` asks for the internal variant.
pub fn run(ctx: &RuntimeContext, args: &ViewArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let id = store.resolve_document_ref(&args.id_or_title)?;
    let doc = if args.no_touch {
        store.get_document(id)?
    } else {
        store.get_and_touch_document(id)?
    };

    if ctx.json {
        output_json(&doc);
    } else {
        println!("{}", format_document_detail(&doc));
    }
    Ok(())
}

/// Execute the `emdx edit` command.
pub fn run_edit(ctx: &RuntimeContext, args: &EditArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let id = store.resolve_document_ref(&args.id_or_title)?;

    let project = if args.clear_project {
        Some(None)
    } else {
        args.project.clone().map(Some)
    };
    store.update_document(
        id,
        &DocumentUpdates {
            title: args.title.clone(),
            content: args.content.clone(),
            project,
        },
    )?;

    if ctx.json {
        output_json(&serde_json::json!({ "id": id, "updated": true }));
    } else if !ctx.quiet {
        println!("Updated #{id}");
    }
    Ok(())
}
