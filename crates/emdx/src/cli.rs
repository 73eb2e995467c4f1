//! Clap argument definitions for the `emdx` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Global flags shared by every command.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Produce machine-readable JSON output.
    #[arg(long, global = true)]
    pub json: bool,

    /// Override the database path.
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Override the config directory (also: EMDX_CONFIG_DIR).
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Verbose diagnostics to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Local-first knowledge base with delegate execution.
#[derive(Debug, Parser)]
#[command(name = "emdx", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Save a new document.
    Save(SaveArgs),
    /// View a document (bumps access tracking).
    View(ViewArgs),
    /// Edit a document's title, content, or project.
    Edit(EditArgs),
    /// Move a document to the trash.
    Delete(IdArg),
    /// Restore a document from the trash.
    Restore(IdArg),
    /// Permanently remove a trashed document.
    Purge(IdArg),
    /// Archive a document (hidden from default listings).
    Archive(ArchiveArgs),
    /// Clear a document's archived flag.
    Unarchive(IdArg),
    /// Search documents.
    Find(FindArgs),
    /// Ask a natural-language question (hybrid search).
    Ask(AskArgs),
    /// Gather a document with its related material and tasks.
    Context(ContextArgs),
    /// List documents.
    List(ListArgs),
    /// Most recently created documents.
    Recent(RecentArgs),
    /// Documents related to a given one.
    Similar(SimilarArgs),
    /// Tag maintenance.
    Tag(TagArgs),
    /// Task and epic workflow.
    Task(TaskArgs),
    /// Run an agent delegate.
    Delegate(DelegateArgs),
    /// Inspect and control executions.
    Exec(ExecArgs),
    /// Database and executor maintenance.
    Maintain(MaintainArgs),
    /// Run a recipe file.
    Recipe(RecipeArgs),
}

/// Positional document reference: numeric id or exact title.
#[derive(Debug, Args)]
pub struct IdArg {
    pub id_or_title: String,
}

#[derive(Debug, Args)]
pub struct SaveArgs {
    /// Document title.
    pub title: String,

    /// Document content; read from --file or stdin when omitted.
    #[arg(long)]
    pub content: Option<String>,

    /// Read content from a file.
    #[arg(long, value_name = "PATH", conflicts_with = "content")]
    pub file: Option<PathBuf>,

    #[arg(long)]
    pub project: Option<String>,

    /// Comma-separated canonical tag names.
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    #[arg(long)]
    pub parent_id: Option<i64>,

    /// Archive the newest live same-titled document and link to it.
    #[arg(long)]
    pub supersede: bool,
}

#[derive(Debug, Args)]
pub struct ViewArgs {
    pub id_or_title: String,

    /// Do not bump access tracking.
    #[arg(long)]
    pub no_touch: bool,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    pub id_or_title: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub content: Option<String>,

    #[arg(long)]
    pub project: Option<String>,

    /// Clear the project field.
    #[arg(long, conflicts_with = "project")]
    pub clear_project: bool,
}

#[derive(Debug, Args)]
pub struct ArchiveArgs {
    pub id_or_title: String,

    /// Archive descendants too.
    #[arg(long)]
    pub cascade: bool,
}

/// Filter flags shared by find/list.
#[derive(Debug, Args, Default)]
pub struct FilterArgs {
    #[arg(long)]
    pub project: Option<String>,

    /// Documents must carry ALL of these tags (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Documents must carry AT LEAST ONE of these tags.
    #[arg(long, value_delimiter = ',')]
    pub tags_any: Vec<String>,

    /// ISO date or datetime lower bound on creation.
    #[arg(long, value_name = "DATE")]
    pub created_after: Option<String>,

    #[arg(long, value_name = "DATE")]
    pub created_before: Option<String>,

    #[arg(long, value_name = "DATE")]
    pub modified_after: Option<String>,

    #[arg(long, value_name = "DATE")]
    pub modified_before: Option<String>,

    /// Include archived documents.
    #[arg(long)]
    pub include_archived: bool,

    #[arg(long, default_value_t = 10)]
    pub limit: i64,
}

#[derive(Debug, Args)]
pub struct FindArgs {
    /// Query text; `*` lists everything matching the filters.
    pub query: String,

    /// keyword | fuzzy | semantic | hybrid
    #[arg(long, default_value = "keyword")]
    pub mode: String,

    /// Include a short excerpt around the best match (keyword mode).
    #[arg(long)]
    pub snippets: bool,

    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Debug, Args)]
pub struct AskArgs {
    /// The question.
    pub question: String,

    #[arg(long, default_value_t = 5)]
    pub limit: i64,

    /// Keyword weight in [0, 1]; the remainder goes to semantic.
    #[arg(long, default_value_t = 0.5)]
    pub alpha: f64,
}

#[derive(Debug, Args)]
pub struct ContextArgs {
    pub id_or_title: String,

    #[arg(long, default_value_t = 5)]
    pub limit: i64,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Include trashed documents.
    #[arg(long)]
    pub include_deleted: bool,

    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Debug, Args)]
pub struct RecentArgs {
    #[arg(long, default_value_t = 10)]
    pub limit: i64,
}

#[derive(Debug, Args)]
pub struct SimilarArgs {
    pub id_or_title: String,

    #[arg(long, default_value_t = 10)]
    pub limit: i64,
}

#[derive(Debug, Args)]
pub struct TagArgs {
    #[command(subcommand)]
    pub command: TagCommands,
}

#[derive(Debug, Subcommand)]
pub enum TagCommands {
    /// Add tags to a document.
    Add {
        id_or_title: String,
        #[arg(required = true, value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// Remove tags from a document.
    Remove {
        id_or_title: String,
        #[arg(required = true, value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// List all tags with usage counts.
    List,
    /// Rename a tag everywhere (merges if the target exists).
    Rename { old: String, new: String },
    /// Merge one tag into another.
    Merge { from: String, into: String },
}

#[derive(Debug, Args)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommands,
}

#[derive(Debug, Subcommand)]
pub enum TaskCommands {
    /// Create a task.
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// 1 (highest) through 5.
        #[arg(long, default_value_t = 3)]
        priority: i32,
        #[arg(long)]
        epic: Option<String>,
        /// Short category code (FEAT/FIX/ARCH/DOCS/TEST/CHORE/...).
        #[arg(long)]
        category: Option<String>,
        /// Document this task was carved out of.
        #[arg(long)]
        source_doc: Option<i64>,
    },
    /// Show one task with its history.
    View { id: i64 },
    /// List tasks.
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        epic: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Tasks ready to start (open, dependencies settled).
    Ready,
    /// Move a task to a new status.
    Status {
        id: i64,
        /// open | active | blocked | done | failed | wontdo
        status: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Shorthand: mark active.
    Active {
        id: i64,
        #[arg(long)]
        note: Option<String>,
    },
    /// Shorthand: mark done.
    Done {
        id: i64,
        #[arg(long)]
        note: Option<String>,
    },
    /// Shorthand: mark blocked.
    Blocked {
        id: i64,
        #[arg(long)]
        note: Option<String>,
    },
    /// Append a note to the task log.
    Log { id: i64, text: String },
    /// Declare that one task depends on another.
    Depend { id: i64, depends_on: i64 },
    /// Link a task to its source document.
    Source { id: i64, doc_id: i64 },
    /// Delete a task.
    Delete { id: i64 },
    /// Create an epic.
    EpicAdd {
        key: String,
        title: String,
        #[arg(long, default_value = "FEAT")]
        category: String,
    },
    /// List epics with derived states.
    EpicList,
}

#[derive(Debug, Args)]
pub struct DelegateArgs {
    /// Prompt handed to the agent.
    pub prompt: String,

    /// Agent binary to launch.
    #[arg(long, default_value = "claude")]
    pub agent: String,

    /// Isolate in a worktree.
    #[arg(long)]
    pub worktree: bool,

    /// Worktree + push the branch on success.
    #[arg(long, conflicts_with = "worktree")]
    pub branch: bool,

    /// Worktree + push + open a pull request on success.
    #[arg(long, conflicts_with_all = ["worktree", "branch"])]
    pub pr: bool,

    /// Tool allowlist passed through to the agent.
    #[arg(long)]
    pub tools: Option<String>,

    #[arg(long)]
    pub model: Option<String>,

    /// Hard timeout in seconds (default from config).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Skip saving substantive output as a document.
    #[arg(long)]
    pub no_save: bool,

    /// Remove the worktree after a clean finish.
    #[arg(long)]
    pub cleanup: bool,

    /// Working directory for non-isolated runs.
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ExecArgs {
    #[command(subcommand)]
    pub command: ExecCommands,
}

#[derive(Debug, Subcommand)]
pub enum ExecCommands {
    /// List executions, newest first.
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show running executions and reconcile orphans.
    Health,
    /// Kill a running execution.
    Kill { execution_id: String },
    /// Show the stored output tail.
    Tail { execution_id: String },
}

#[derive(Debug, Args)]
pub struct MaintainArgs {
    #[command(subcommand)]
    pub command: MaintainCommands,
}

#[derive(Debug, Subcommand)]
pub enum MaintainCommands {
    /// Apply pending schema migrations.
    Migrate,
    /// Copy the database file to a backup path.
    Backup {
        #[arg(value_name = "DEST")]
        dest: Option<PathBuf>,
    },
    /// Reconcile orphaned executions.
    Cleanup {
        /// Only consider rows staler than this many minutes.
        #[arg(long, value_name = "MINUTES")]
        age: Option<u64>,
    },
    /// Backfill embeddings for documents missing one.
    Embed,
}

#[derive(Debug, Args)]
pub struct RecipeArgs {
    /// Path to the recipe TOML file.
    pub path: PathBuf,

    /// Variables as key=value pairs.
    #[arg(long = "var", value_name = "K=V")]
    pub vars: Vec<String>,

    /// Agent binary for delegate steps.
    #[arg(long, default_value = "claude")]
    pub agent: String,
}
