//! `emdx delegate` -- run an agent subprocess to completion.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use emdx_config::EmdxConfig;
use emdx_exec::{BinaryAgentRunner, DelegateJob, ExecMode, Executor, GitHubHost, VcsHost};

use crate::cli::DelegateArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `emdx delegate` command.
pub fn run(ctx: &RuntimeContext, args: &DelegateArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let runner = Arc::new(BinaryAgentRunner::new(args.agent.clone(), "delegate"));
    let vcs: Option<Arc<dyn VcsHost>> =
        EmdxConfig::vcs_token().map(|token| Arc::new(GitHubHost::new(token)) as Arc<dyn VcsHost>);

    let executor = Executor::new(ctx.config.clone(), Arc::clone(&store), runner, vcs);
    // A previous engine may have died mid-run; settle its rows first.
    let recovered = executor.recover()?;
    if !recovered.is_empty() && !ctx.quiet && !ctx.json {
        eprintln!("Reconciled {} stale execution(s)", recovered.len());
    }

    let mode = if args.pr {
        ExecMode::Pr
    } else if args.branch {
        ExecMode::Branch
    } else if args.worktree {
        ExecMode::Worktree
    } else {
        ExecMode::Plain
    };

    let mut job = DelegateJob::new(args.prompt.clone())
        .mode(mode)
        .cleanup(args.cleanup)
        .save_output(!args.no_save);
    if let Some(ref tools) = args.tools {
        job = job.tool_allowlist(tools.clone());
    }
    if let Some(ref model) = args.model {
        job = job.model(model.clone());
    }
    if let Some(timeout) = args.timeout {
        job = job.timeout(Duration::from_secs(timeout));
    }
    if let Some(ref cwd) = args.cwd {
        job = job.working_dir(cwd.clone());
    }

    let handle = executor.spawn(job)?;
    let execution_id = handle.execution_id.clone();
    if !ctx.quiet && !ctx.json {
        eprintln!("Execution {execution_id} started");
    }

    let outcome = handle.wait()?;
    if ctx.json {
        output_json(&serde_json::json!({
            "execution_id": outcome.execution_id,
            "status": outcome.status,
            "exit_code": outcome.exit_code,
            "doc_id": outcome.doc_id,
            "pr_url": outcome.pr_url,
        }));
    } else if !ctx.quiet {
        println!("Execution {} finished: {}", outcome.execution_id, outcome.status);
        if let Some(doc_id) = outcome.doc_id {
            println!("Output saved as document #{doc_id}");
        }
        if let Some(ref pr_url) = outcome.pr_url {
            println!("PR: {pr_url}");
        }
    }
    Ok(())
}
