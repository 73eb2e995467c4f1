//! `emdx save` -- create a new document.

use std::io::Read;

use anyhow::{Context, Result};

use emdx_storage::SaveOptions;

use crate::cli::SaveArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `emdx save` command.
pub fn run(ctx: &RuntimeContext, args: &SaveArgs) -> Result<()> {
    let content = resolve_content(args)?;
    let store = ctx.open_store()?;

    let opts = SaveOptions {
        project: args.project.clone(),
        tags: args.tags.clone(),
        parent_id: args.parent_id,
        supersede: args.supersede,
        source: None,
    };
    let id = store.save_document(&args.title, &content, &opts)?;

    if ctx.json {
        output_json(&serde_json::json!({ "id": id, "title": args.title }));
    } else if !ctx.quiet {
        println!("Saved #{id}: {}", args.title);
    }
    Ok(())
}

/// Content precedence: --content, then --file, then stdin.
fn resolve_content(args: &SaveArgs) -> Result<String> {
    if let Some(ref content) = args.content {
        return Ok(content.clone());
    }
    if let Some(ref path) = args.file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()));
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("reading content from stdin")?;
    Ok(buf)
}
