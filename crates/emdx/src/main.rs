//! `emdx` -- local-first knowledge base and delegate runner CLI.
//!
//! Parses arguments with clap, resolves the runtime context, and dispatches
//! to command handlers. Errors map onto the documented exit codes: 0
//! success, 1 generic failure, 2 invalid input, 124 timeout, 130 cancelled.

mod cli;
mod commands;
mod context;
mod embedder;
mod output;

use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

use cli::{Cli, Commands};
use context::RuntimeContext;

/// Tracks whether a Ctrl+C has already been received.
static CTRLC_RECEIVED: AtomicBool = AtomicBool::new(false);

fn main() {
    // First Ctrl+C: exit with the cancelled code. Second: force exit.
    let _ = ctrlc::set_handler(|| {
        if CTRLC_RECEIVED.swap(true, Ordering::SeqCst) {
            std::process::exit(1);
        }
        std::process::exit(130);
    });

    let cli = Cli::parse();

    let ctx = match RuntimeContext::from_global_args(&cli.global) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };

    if ctx.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("emdx=debug")
            .with_writer(std::io::stderr)
            .init();
    }

    let result = match cli.command {
        Commands::Save(args) => commands::save::run(&ctx, &args),
        Commands::View(args) => commands::view::run(&ctx, &args),
        Commands::Edit(args) => commands::view::run_edit(&ctx, &args),
        Commands::Delete(args) => commands::lifecycle::run_delete(&ctx, &args),
        Commands::Restore(args) => commands::lifecycle::run_restore(&ctx, &args),
        Commands::Purge(args) => commands::lifecycle::run_purge(&ctx, &args),
        Commands::Archive(args) => commands::lifecycle::run_archive(&ctx, &args),
        Commands::Unarchive(args) => commands::lifecycle::run_unarchive(&ctx, &args),
        Commands::Find(args) => commands::find::run(&ctx, &args),
        Commands::Ask(args) => commands::find::run_ask(&ctx, &args),
        Commands::Context(args) => commands::list::run_context(&ctx, &args),
        Commands::List(args) => commands::list::run(&ctx, &args),
        Commands::Recent(args) => commands::list::run_recent(&ctx, &args),
        Commands::Similar(args) => commands::list::run_similar(&ctx, &args),
        Commands::Tag(args) => commands::tag::run(&ctx, &args),
        Commands::Task(args) => commands::task::run(&ctx, &args),
        Commands::Delegate(args) => commands::delegate::run(&ctx, &args),
        Commands::Exec(args) => commands::exec_cmd::run(&ctx, &args),
        Commands::Maintain(args) => commands::maintain::run(&ctx, &args),
        Commands::Recipe(args) => commands::recipe::run(&ctx, &args),
    };

    if let Err(e) = result {
        if ctx.json {
            let err_json = serde_json::json!({ "error": format!("{e:#}") });
            if let Ok(s) = serde_json::to_string_pretty(&err_json) {
                eprintln!("{s}");
            }
        } else {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(exit_code_for(&e));
    }
}

/// Maps an error chain onto the documented exit codes.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<emdx_exec::ExecError>() {
            return e.exit_code();
        }
        if let Some(e) = cause.downcast_ref::<emdx_storage::StorageError>() {
            if e.is_invalid_input() {
                return 2;
            }
            return 1;
        }
        if cause
            .downcast_ref::<emdx_core::validation::ValidationError>()
            .is_some()
        {
            return 2;
        }
    }
    1
}
