//! Recipe model and TOML parsing.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillError};
use crate::template::extract_variables;

/// Declaration of a recipe variable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VarDef {
    /// Refuse to run without a provided value.
    #[serde(default)]
    pub required: bool,
    /// Used when the caller provides nothing.
    #[serde(default)]
    pub default: Option<String>,
}

/// One delegate step in a recipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeStep {
    /// Display name; falls back to the prompt prefix.
    #[serde(default)]
    pub name: Option<String>,

    /// Prompt template. `{{prev}}` expands to the previous step's output.
    pub prompt: String,

    /// Run in a worktree and open a PR on success.
    #[serde(default)]
    pub pr: bool,

    /// Run in a worktree without pushing.
    #[serde(default)]
    pub worktree: bool,

    /// Per-step timeout override, seconds.
    #[serde(default)]
    pub timeout_s: Option<u64>,
}

impl RecipeStep {
    /// Display label for logs and errors.
    pub fn label(&self, index: usize) -> String {
        match self.name {
            Some(ref name) => name.clone(),
            None => {
                let prefix: String = self.prompt.chars().take(32).collect();
                format!("step {index}: {prefix}")
            }
        }
    }
}

/// A parsed recipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Declared variables; undeclared `{{vars}}` are still substituted when
    /// provided, but cannot be required.
    #[serde(default)]
    pub vars: HashMap<String, VarDef>,

    #[serde(rename = "step")]
    pub steps: Vec<RecipeStep>,
}

impl Recipe {
    /// Parses a recipe from TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        let recipe: Recipe = toml::from_str(text)?;
        if recipe.steps.is_empty() {
            return Err(SkillError::NoSteps(recipe.name));
        }
        Ok(recipe)
    }

    /// Loads a recipe from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// All `{{variable}}` names referenced by any step, `prev` excluded.
    pub fn referenced_variables(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .steps
            .iter()
            .flat_map(|step| extract_variables(&step.prompt))
            .filter(|name| name != "prev")
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Resolves the effective variable map: defaults overlaid by provided
    /// values, with required variables enforced.
    pub fn resolve_vars(
        &self,
        provided: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>> {
        let mut resolved: HashMap<String, String> = HashMap::new();
        for (name, def) in &self.vars {
            match provided.get(name) {
                Some(value) => {
                    resolved.insert(name.clone(), value.clone());
                }
                None => match def.default {
                    Some(ref default) => {
                        resolved.insert(name.clone(), default.clone());
                    }
                    None if def.required => {
                        return Err(SkillError::MissingVariable(name.clone()));
                    }
                    None => {}
                },
            }
        }
        // Provided values for undeclared variables still substitute.
        for (name, value) in provided {
            resolved.entry(name.clone()).or_insert_with(|| value.clone());
        }
        Ok(resolved)
    }
}
