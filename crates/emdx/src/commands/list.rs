//! `emdx list`, `emdx recent`, and `emdx similar`.

use anyhow::Result;

use emdx_core::filter::{DocumentFilter, TaskFilter};

use crate::cli::{ContextArgs, ListArgs, RecentArgs, SimilarArgs};
use crate::context::RuntimeContext;
use crate::output::{
    format_document_compact, format_document_detail, output_json, output_table, truncate,
};

/// Execute the `emdx list` command.
pub fn run(ctx: &RuntimeContext, args: &ListArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let mut filter = ctx.document_filter(&args.filter)?;
    filter.include_deleted = args.include_deleted;

    let docs = store.list_documents(&filter)?;
    if ctx.json {
        output_json(&docs);
        return Ok(());
    }

    let rows: Vec<Vec<String>> = docs
        .iter()
        .map(|doc| {
            vec![
                doc.id.to_string(),
                truncate(&doc.title, 40),
                doc.project.clone().unwrap_or_default(),
                doc.created_at.format("%Y-%m-%d").to_string(),
                doc.tags.join(","),
            ]
        })
        .collect();
    output_table(&["ID", "TITLE", "PROJECT", "CREATED", "TAGS"], &rows);
    Ok(())
}

/// Execute the `emdx recent` command.
pub fn run_recent(ctx: &RuntimeContext, args: &RecentArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let docs = store.list_documents(&DocumentFilter {
        limit: Some(args.limit),
        ..Default::default()
    })?;

    if ctx.json {
        output_json(&docs);
        return Ok(());
    }
    for doc in &docs {
        println!("{}", format_document_compact(doc));
    }
    Ok(())
}

/// Execute the `emdx similar` command.
pub fn run_similar(ctx: &RuntimeContext, args: &SimilarArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let id = store.resolve_document_ref(&args.id_or_title)?;
    let related = store.get_related_documents(id, args.limit)?;

    if ctx.json {
        let payload: Vec<serde_json::Value> = related
            .iter()
            .map(|(doc, score)| {
                serde_json::json!({ "document": doc, "score": score })
            })
            .collect();
        output_json(&payload);
        return Ok(());
    }
    if related.is_empty() && !ctx.quiet {
        println!("No related documents.");
        return Ok(());
    }
    for (doc, score) in &related {
        println!("{:.2}  {}", score, format_document_compact(doc));
    }
    Ok(())
}

/// Execute the `emdx context` command: one document plus everything
/// hanging off it -- related documents and tasks carved from it.
pub fn run_context(ctx: &RuntimeContext, args: &ContextArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let id = store.resolve_document_ref(&args.id_or_title)?;
    let doc = store.get_document(id)?;
    let related = store.get_related_documents(id, args.limit)?;
    let tasks = store.list_tasks(&TaskFilter {
        source_doc_id: Some(id),
        ..Default::default()
    })?;

    if ctx.json {
        let related_view: Vec<serde_json::Value> = related
            .iter()
            .map(|(doc, score)| serde_json::json!({ "document": doc, "score": score }))
            .collect();
        output_json(&serde_json::json!({
            "document": doc,
            "related": related_view,
            "tasks": tasks,
        }));
        return Ok(());
    }

    println!("{}", format_document_detail(&doc));
    if !related.is_empty() {
        println!("\nRelated:");
        for (doc, score) in &related {
            println!("  {:.2}  {}", score, format_document_compact(doc));
        }
    }
    if !tasks.is_empty() {
        println!("\nTasks:");
        for task in &tasks {
            println!("  #{} [{}] {}", task.id, task.status, task.title);
        }
    }
    Ok(())
}
