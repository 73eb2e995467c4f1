//! The skill trait and its capability context.

use std::collections::HashMap;
use std::process::Command;

use tracing::debug;

use emdx_core::enums::SourceKind;
use emdx_core::filter::DocumentFilter;
use emdx_exec::{DelegateJob, ExecutionOutcome, Executor};
use emdx_search::{SearchEngine, SearchMode, SearchResult};
use emdx_storage::{SaveOptions, SqliteStore};

use crate::error::{Result, SkillError};

/// A declarative unit of KB-aware behavior.
///
/// Skills compose the three lower layers (index, tasks, executor) through
/// the context; they introduce no storage invariants of their own.
pub trait Skill {
    /// Stable name, recorded as provenance on anything the skill saves.
    fn name(&self) -> &str;

    /// Runs the skill.
    fn run(&self, ctx: &mut SkillContext<'_>) -> Result<()>;
}

/// Capabilities handed to a running skill.
pub struct SkillContext<'a> {
    store: &'a SqliteStore,
    executor: &'a Executor,
    skill_name: String,
    /// Caller-supplied arguments.
    pub args: HashMap<String, String>,
}

impl<'a> SkillContext<'a> {
    pub fn new(
        store: &'a SqliteStore,
        executor: &'a Executor,
        skill_name: impl Into<String>,
        args: HashMap<String, String>,
    ) -> Self {
        Self {
            store,
            executor,
            skill_name: skill_name.into(),
            args,
        }
    }

    /// Keyword search over the knowledge base.
    pub fn find(&self, query: &str, filter: &DocumentFilter) -> Result<Vec<SearchResult>> {
        let engine = SearchEngine::new(self.store, None);
        Ok(engine.search(query, SearchMode::Keyword, filter)?)
    }

    /// Saves a document with this skill as its provenance.
    pub fn save(&self, title: &str, content: &str, tags: &[String]) -> Result<i64> {
        let id = self.store.save_document(
            title,
            content,
            &SaveOptions {
                tags: tags.to_vec(),
                source: Some((SourceKind::Skill, self.skill_name.clone())),
                ..Default::default()
            },
        )?;
        debug!(skill = %self.skill_name, doc = id, "skill saved document");
        Ok(id)
    }

    /// Adds tags to an existing document.
    pub fn tag_add(&self, doc_id: i64, tags: &[String]) -> Result<()> {
        Ok(self.store.add_tags(doc_id, tags)?)
    }

    /// Runs a delegate job to completion.
    pub fn delegate(&self, job: DelegateJob) -> Result<ExecutionOutcome> {
        let handle = self.executor.spawn(job)?;
        Ok(handle.wait()?)
    }

    /// Runs a shell command, returning trimmed stdout.
    pub fn shell(&self, cmd: &str) -> Result<String> {
        let output = Command::new("sh").arg("-c").arg(cmd).output()?;
        if !output.status.success() {
            return Err(SkillError::ShellFailed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// The backing store, for skills that need task operations directly.
    pub fn store(&self) -> &SqliteStore {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emdx_config::EmdxConfig;
    use emdx_exec::AgentRunner;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    struct ShellRunner;

    impl AgentRunner for ShellRunner {
        fn binary(&self) -> &str {
            "sh"
        }

        fn build_args(&self, job: &DelegateJob) -> Vec<String> {
            vec!["-c".to_string(), job.prompt.clone()]
        }

        fn agent_type(&self) -> &str {
            "shell"
        }
    }

    fn harness() -> (Arc<SqliteStore>, Executor, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = EmdxConfig::load_from(dir.path()).unwrap();
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let executor = Executor::new(config, Arc::clone(&store), Arc::new(ShellRunner), None);
        (store, executor, dir)
    }

    struct NoteSkill;

    impl Skill for NoteSkill {
        fn name(&self) -> &str {
            "note-skill"
        }

        fn run(&self, ctx: &mut SkillContext<'_>) -> Result<()> {
            let host = ctx.shell("printf 'host-info'")?;
            let body = format!("environment report: {host}");
            let id = ctx.save("Environment", &body, &["report".to_string()])?;
            ctx.tag_add(id, &["fresh".to_string()])?;
            Ok(())
        }
    }

    #[test]
    fn skill_writes_through_the_index_with_provenance() {
        let (store, executor, _dir) = harness();
        let mut ctx = SkillContext::new(&store, &executor, "note-skill", HashMap::new());
        NoteSkill.run(&mut ctx).unwrap();

        let results = ctx.find("environment", &DocumentFilter::default()).unwrap();
        assert_eq!(results.len(), 1);
        let doc = &results[0].document;
        assert!(doc.tags.contains(&"report".to_string()));
        assert!(doc.tags.contains(&"fresh".to_string()));

        let source = store.get_source(doc.id).unwrap().unwrap();
        assert_eq!(source.kind, SourceKind::Skill);
        assert_eq!(source.source_id, "note-skill");
    }

    #[test]
    fn shell_failure_is_typed() {
        let (store, executor, _dir) = harness();
        let ctx = SkillContext::new(&store, &executor, "s", HashMap::new());
        let err = ctx.shell("exit 9").unwrap_err();
        assert!(matches!(err, SkillError::ShellFailed { code: Some(9), .. }));
    }

    #[test]
    fn delegate_runs_to_completion() {
        let (store, executor, _dir) = harness();
        let ctx = SkillContext::new(&store, &executor, "s", HashMap::new());
        let outcome = ctx
            .delegate(DelegateJob::new("printf 'from delegate'").save_output(false))
            .unwrap();
        assert_eq!(outcome.exit_code, 0);
    }
}
