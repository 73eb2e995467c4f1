//! Sequential recipe execution.

use std::collections::HashMap;
use std::time::Duration;

use tracing::info;

use emdx_core::enums::SourceKind;
use emdx_exec::{extract_final_message, DelegateJob, ExecMode, Executor};
use emdx_storage::{SaveOptions, SqliteStore};

use crate::error::{Result, SkillError};
use crate::recipe::Recipe;
use crate::template::substitute_vars;

/// Result of one executed step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub execution_id: String,
    /// The step's captured final message.
    pub output: String,
    pub doc_id: Option<i64>,
}

/// Result of a whole recipe run.
#[derive(Debug, Clone)]
pub struct RecipeOutcome {
    pub recipe: String,
    pub steps: Vec<StepOutcome>,
    /// Document holding the final step's output, when substantive.
    pub summary_doc_id: Option<i64>,
}

/// Runs a recipe's steps in order, chaining each step's output into the
/// next prompt as `{{prev}}`.
///
/// A failing step aborts the run; prior steps' rows and documents stay as
/// the partial record.
pub fn run_recipe(
    store: &SqliteStore,
    executor: &Executor,
    recipe: &Recipe,
    provided: &HashMap<String, String>,
) -> Result<RecipeOutcome> {
    let base_vars = recipe.resolve_vars(provided)?;
    let mut steps: Vec<StepOutcome> = Vec::with_capacity(recipe.steps.len());
    let mut prev_output = String::new();

    for (index, step) in recipe.steps.iter().enumerate() {
        let mut vars = base_vars.clone();
        vars.insert("prev".to_string(), prev_output.clone());
        let prompt = substitute_vars(&step.prompt, &vars);

        let mode = if step.pr {
            ExecMode::Pr
        } else if step.worktree {
            ExecMode::Worktree
        } else {
            ExecMode::Plain
        };
        // Step documents would double up the recipe summary; rows carry
        // the per-step record.
        let mut job = DelegateJob::new(prompt).mode(mode).save_output(false);
        if let Some(timeout_s) = step.timeout_s {
            job = job.timeout(Duration::from_secs(timeout_s));
        }

        info!(recipe = %recipe.name, step = index, "running recipe step");
        let handle = executor.spawn(job).map_err(|e| SkillError::StepFailed {
            index,
            name: step.label(index),
            reason: e.to_string(),
        })?;
        let execution_id = handle.execution_id.clone();
        let outcome = handle.wait().map_err(|e| SkillError::StepFailed {
            index,
            name: step.label(index),
            reason: e.to_string(),
        })?;

        let row = store.get_execution(&execution_id)?;
        let log = std::fs::read_to_string(&row.log_path).unwrap_or_default();
        prev_output = extract_final_message(&log);

        steps.push(StepOutcome {
            execution_id,
            output: prev_output.clone(),
            doc_id: outcome.doc_id,
        });
    }

    // Persist the final output with recipe provenance.
    let summary_doc_id = if prev_output.chars().count() >= 10 {
        let id = store.save_document(
            &format!("Recipe: {}", recipe.name),
            &prev_output,
            &SaveOptions {
                tags: vec!["recipe".to_string()],
                source: Some((SourceKind::Recipe, recipe.name.clone())),
                ..Default::default()
            },
        )?;
        Some(id)
    } else {
        None
    };

    Ok(RecipeOutcome {
        recipe: recipe.name.clone(),
        steps,
        summary_doc_id,
    })
}
