//! `emdx task` -- task and epic workflow.

use anyhow::Result;

use emdx_core::enums::{Category, TaskStatus};
use emdx_core::filter::TaskFilter;
use emdx_core::task::TaskBuilder;

use crate::cli::{TaskArgs, TaskCommands};
use crate::context::RuntimeContext;
use crate::output::{format_task_row, output_json, output_table};

const TASK_HEADERS: &[&str] = &["ID", "PRI", "STATUS", "CAT", "EPIC", "TITLE"];

/// Execute the `emdx task` command family.
pub fn run(ctx: &RuntimeContext, args: &TaskArgs) -> Result<()> {
    let store = ctx.open_store()?;

    match args.command {
        TaskCommands::Add {
            ref title,
            ref description,
            priority,
            ref epic,
            ref category,
            source_doc,
        } => {
            let mut builder = TaskBuilder::new(title.clone()).priority(priority);
            if let Some(description) = description {
                builder = builder.description(description.clone());
            }
            if let Some(epic) = epic {
                builder = builder.epic_key(epic.clone());
            }
            if let Some(category) = category {
                builder = builder.category(Category::from(category.as_str()));
            }
            if let Some(doc_id) = source_doc {
                builder = builder.source_doc_id(doc_id);
            }
            let id = store.create_task(&builder.build())?;
            if let Some(epic) = epic {
                store.refresh_epic_state(epic)?;
            }

            if ctx.json {
                output_json(&serde_json::json!({ "id": id, "title": title }));
            } else if !ctx.quiet {
                println!("Created task #{id}: {title}");
            }
        }
        TaskCommands::View { id } => {
            let task = store.get_task(id)?;
            let log = store.get_task_log(id)?;
            let deps = store.get_task_dependencies(id)?;
            if ctx.json {
                output_json(&serde_json::json!({
                    "task": task,
                    "log": log,
                    "dependencies": deps,
                }));
            } else {
                println!("#{} [P{}] {} ({})", task.id, task.priority, task.title, task.status);
                if let Some(ref description) = task.description {
                    println!("{description}");
                }
                if !deps.is_empty() {
                    let ids: Vec<String> = deps.iter().map(|d| format!("#{}", d.id)).collect();
                    println!("Depends on: {}", ids.join(", "));
                }
                for entry in &log {
                    println!(
                        "  {} [{}] {}",
                        entry.created_at.format("%Y-%m-%d %H:%M"),
                        entry.kind.as_str(),
                        entry.message
                    );
                }
            }
        }
        TaskCommands::List {
            ref status,
            ref epic,
            limit,
        } => {
            let status = status
                .as_deref()
                .map(TaskStatus::try_from)
                .transpose()
                .map_err(emdx_storage::StorageError::from)?;
            let tasks = store.list_tasks(&TaskFilter {
                status,
                epic_key: epic.clone(),
                limit,
                ..Default::default()
            })?;
            if ctx.json {
                output_json(&tasks);
            } else {
                output_table(TASK_HEADERS, &tasks.iter().map(format_task_row).collect::<Vec<_>>());
            }
        }
        TaskCommands::Ready => {
            let tasks = store.ready_tasks()?;
            if ctx.json {
                output_json(&tasks);
            } else if tasks.is_empty() {
                if !ctx.quiet {
                    println!("Nothing ready.");
                }
            } else {
                output_table(TASK_HEADERS, &tasks.iter().map(format_task_row).collect::<Vec<_>>());
            }
        }
        TaskCommands::Status {
            id,
            ref status,
            ref note,
        } => {
            let status = TaskStatus::try_from(status.as_str())
                .map_err(emdx_storage::StorageError::from)?;
            transition(ctx, &store, id, status, note.as_deref())?;
        }
        TaskCommands::Active { id, ref note } => {
            transition(ctx, &store, id, TaskStatus::Active, note.as_deref())?;
        }
        TaskCommands::Done { id, ref note } => {
            transition(ctx, &store, id, TaskStatus::Done, note.as_deref())?;
        }
        TaskCommands::Blocked { id, ref note } => {
            transition(ctx, &store, id, TaskStatus::Blocked, note.as_deref())?;
        }
        TaskCommands::Log { id, ref text } => {
            store.log_task_note(id, text)?;
            if ctx.json {
                output_json(&serde_json::json!({ "id": id, "logged": text }));
            } else if !ctx.quiet {
                println!("Logged on #{id}");
            }
        }
        TaskCommands::Depend { id, depends_on } => {
            store.add_task_dependency(id, depends_on)?;
            if ctx.json {
                output_json(&serde_json::json!({ "id": id, "depends_on": depends_on }));
            } else if !ctx.quiet {
                println!("Task #{id} now depends on #{depends_on}");
            }
        }
        TaskCommands::Source { id, doc_id } => {
            store.link_task_source(id, doc_id)?;
            if ctx.json {
                output_json(&serde_json::json!({ "id": id, "source_doc_id": doc_id }));
            } else if !ctx.quiet {
                println!("Task #{id} sourced from document #{doc_id}");
            }
        }
        TaskCommands::Delete { id } => {
            store.delete_task(id)?;
            if ctx.json {
                output_json(&serde_json::json!({ "id": id, "deleted": true }));
            } else if !ctx.quiet {
                println!("Deleted task #{id}");
            }
        }
        TaskCommands::EpicAdd {
            ref key,
            ref title,
            ref category,
        } => {
            store.create_epic(key, title, Category::from(category.as_str()))?;
            if ctx.json {
                output_json(&serde_json::json!({ "key": key, "title": title }));
            } else if !ctx.quiet {
                println!("Created epic {key}: {title}");
            }
        }
        TaskCommands::EpicList => {
            for epic in store.list_epics()? {
                store.refresh_epic_state(&epic.key)?;
            }
            let epics = store.list_epics()?;
            if ctx.json {
                output_json(&epics);
            } else {
                let rows: Vec<Vec<String>> = epics
                    .iter()
                    .map(|epic| {
                        vec![
                            epic.key.clone(),
                            epic.state.to_string(),
                            epic.category.to_string(),
                            epic.title.clone(),
                        ]
                    })
                    .collect();
                output_table(&["KEY", "STATE", "CAT", "TITLE"], &rows);
            }
        }
    }
    Ok(())
}

/// Shared transition path: every status move threads the note down to the
/// task log and refreshes the parent epic.
fn transition(
    ctx: &RuntimeContext,
    store: &emdx_storage::SqliteStore,
    id: i64,
    status: TaskStatus,
    note: Option<&str>,
) -> Result<()> {
    let task = store.transition_task(id, status, note)?;
    if let Some(ref epic_key) = task.epic_key {
        store.refresh_epic_state(epic_key)?;
    }
    if ctx.json {
        output_json(&task);
    } else if !ctx.quiet {
        println!("Task #{id} -> {status}");
    }
    Ok(())
}
