//! `emdx recipe` -- run a recipe file.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};

use emdx_config::EmdxConfig;
use emdx_exec::{BinaryAgentRunner, Executor, GitHubHost, VcsHost};
use emdx_skills::{run_recipe, Recipe};

use crate::cli::RecipeArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `emdx recipe` command.
pub fn run(ctx: &RuntimeContext, args: &RecipeArgs) -> Result<()> {
    let recipe = Recipe::load(&args.path)?;

    let mut vars: HashMap<String, String> = HashMap::new();
    for pair in &args.vars {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("--var takes key=value pairs (got '{pair}')");
        };
        vars.insert(key.to_string(), value.to_string());
    }

    let store = ctx.open_store()?;
    let runner = Arc::new(BinaryAgentRunner::new(args.agent.clone(), "recipe"));
    let vcs: Option<Arc<dyn VcsHost>> =
        EmdxConfig::vcs_token().map(|token| Arc::new(GitHubHost::new(token)) as Arc<dyn VcsHost>);
    let executor = Executor::new(ctx.config.clone(), Arc::clone(&store), runner, vcs);

    let outcome = run_recipe(&store, &executor, &recipe, &vars)?;

    if ctx.json {
        let steps: Vec<serde_json::Value> = outcome
            .steps
            .iter()
            .map(|step| {
                serde_json::json!({
                    "execution_id": step.execution_id,
                    "doc_id": step.doc_id,
                })
            })
            .collect();
        output_json(&serde_json::json!({
            "recipe": outcome.recipe,
            "steps": steps,
            "summary_doc_id": outcome.summary_doc_id,
        }));
    } else if !ctx.quiet {
        println!(
            "Recipe '{}' finished ({} step(s))",
            outcome.recipe,
            outcome.steps.len()
        );
        if let Some(doc_id) = outcome.summary_doc_id {
            println!("Summary saved as document #{doc_id}");
        }
    }
    Ok(())
}
