//! `emdx tag` -- tag maintenance.

use anyhow::Result;

use crate::cli::{TagArgs, TagCommands};
use crate::context::RuntimeContext;
use crate::output::{output_json, output_table};

/// Execute the `emdx tag` command family.
pub fn run(ctx: &RuntimeContext, args: &TagArgs) -> Result<()> {
    let store = ctx.open_store()?;

    match args.command {
        TagCommands::Add {
            ref id_or_title,
            ref tags,
        } => {
            let id = store.resolve_document_ref(id_or_title)?;
            store.add_tags(id, tags)?;
            if ctx.json {
                output_json(&serde_json::json!({ "id": id, "added": tags }));
            } else if !ctx.quiet {
                println!("Tagged #{id}: {}", tags.join(", "));
            }
        }
        TagCommands::Remove {
            ref id_or_title,
            ref tags,
        } => {
            let id = store.resolve_document_ref(id_or_title)?;
            store.remove_tags(id, tags)?;
            if ctx.json {
                output_json(&serde_json::json!({ "id": id, "removed": tags }));
            } else if !ctx.quiet {
                println!("Untagged #{id}: {}", tags.join(", "));
            }
        }
        TagCommands::List => {
            let tags = store.list_tags()?;
            if ctx.json {
                output_json(&tags);
            } else {
                let rows: Vec<Vec<String>> = tags
                    .iter()
                    .map(|tag| vec![tag.name.clone(), tag.usage_count.to_string()])
                    .collect();
                output_table(&["TAG", "USES"], &rows);
            }
        }
        TagCommands::Rename { ref old, ref new } => {
            store.rename_tag(old, new)?;
            if ctx.json {
                output_json(&serde_json::json!({ "renamed": old, "to": new }));
            } else if !ctx.quiet {
                println!("Renamed tag '{old}' to '{new}'");
            }
        }
        TagCommands::Merge { ref from, ref into } => {
            store.merge_tags(from, into)?;
            if ctx.json {
                output_json(&serde_json::json!({ "merged": from, "into": into }));
            } else if !ctx.quiet {
                println!("Merged tag '{from}' into '{into}'");
            }
        }
    }
    Ok(())
}
