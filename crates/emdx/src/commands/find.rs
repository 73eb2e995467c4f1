//! `emdx find` -- search in any mode.

use anyhow::{bail, Result};

use emdx_core::filter::DocumentFilter;
use emdx_search::{SearchEngine, SearchMode};

use crate::cli::{AskArgs, FindArgs};
use crate::context::RuntimeContext;
use crate::embedder::HashingEmbedder;
use crate::output::{format_document_compact, output_json};

/// Execute the `emdx find` command.
pub fn run(ctx: &RuntimeContext, args: &FindArgs) -> Result<()> {
    let mode = match args.mode.as_str() {
        "keyword" => SearchMode::Keyword,
        "fuzzy" => SearchMode::Fuzzy,
        "semantic" => SearchMode::Semantic,
        "hybrid" => SearchMode::Hybrid,
        other => bail!("unknown search mode '{other}' (keyword|fuzzy|semantic|hybrid)"),
    };

    let store = ctx.open_store()?;
    let filter = ctx.document_filter(&args.filter)?;
    let embedder = HashingEmbedder;
    let engine = SearchEngine::new(&store, Some(&embedder));

    let results = if mode == SearchMode::Keyword && args.snippets {
        engine.keyword(&args.query, &filter, true)?
    } else {
        engine.search(&args.query, mode, &filter)?
    };

    if ctx.json {
        output_json(&results);
        return Ok(());
    }
    if results.is_empty() {
        if !ctx.quiet {
            println!("No matches.");
        }
        return Ok(());
    }
    for result in &results {
        println!("{}", format_document_compact(&result.document));
        if let Some(ref snippet) = result.snippet {
            println!("    {snippet}");
        }
    }
    Ok(())
}

/// Execute the `emdx ask` command: hybrid search tuned for questions.
pub fn run_ask(ctx: &RuntimeContext, args: &AskArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let filter = DocumentFilter {
        limit: Some(args.limit),
        ..Default::default()
    };
    let embedder = HashingEmbedder;
    let engine = SearchEngine::new(&store, Some(&embedder));
    let results = engine.hybrid(&args.question, &filter, args.alpha)?;

    if ctx.json {
        output_json(&results);
        return Ok(());
    }
    if results.is_empty() {
        if !ctx.quiet {
            println!("No matches.");
        }
        return Ok(());
    }
    for result in &results {
        println!("{}", format_document_compact(&result.document));
    }
    Ok(())
}
