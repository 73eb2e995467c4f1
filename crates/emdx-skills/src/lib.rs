//! Recipes and skills: scripted pipelines over the knowledge base.
//!
//! A recipe is a TOML-described sequence of prompt templates executed
//! through the delegate executor, each step seeing the previous step's
//! output as `{{prev}}`. A skill is arbitrary Rust behind the [`Skill`]
//! trait, handed a [`SkillContext`] with knowledge-base reads/writes,
//! delegation, and shell access. Everything both produce is persisted
//! through the document index with recipe/skill provenance.

pub mod context;
pub mod error;
pub mod recipe;
pub mod runner;
pub mod template;

pub use context::{Skill, SkillContext};
pub use error::{Result, SkillError};
pub use recipe::{Recipe, RecipeStep};
pub use runner::{run_recipe, RecipeOutcome, StepOutcome};
pub use template::substitute_vars;
