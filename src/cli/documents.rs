//! CLI `documents` command: list the CORE documents under one label.

use anyhow::{bail, Result};
use std::path::Path;

use super::config_setup as cs;
use super::prompt::{Choice, Prompter};

pub async fn documents(dir: &Path, label_arg: Option<String>) -> Result<()> {
    let existing = cs::load_existing(dir);
    let core = cs::project_core_client(dir, &existing)?;

    let label_id = match label_arg {
        Some(id) => id,
        None => {
            let labels = cs::fetch_labels(&core).await;
            if labels.is_empty() {
                bail!("No labels found in your CORE workspace.");
            }
            let choices: Vec<Choice<'_>> = labels
                .iter()
                .map(|l| Choice {
                    value: &l.id,
                    label: &l.name,
                    hint: l.description.as_deref(),
                })
                .collect();
            let index = Prompter::stdio().select("Select a label:", &choices)?;
            labels[index].id.clone()
        }
    };

    let pb = cs::spinner("Fetching documents...");
    let docs = core.documents_for_label(&label_id).await;
    pb.finish_and_clear();
    let docs = docs?;

    if docs.is_empty() {
        println!("No documents found for this label.");
        return Ok(());
    }
    println!("Found {} documents:", docs.len());
    for doc in &docs {
        println!("{}\t{}", doc.id, doc.title.as_deref().unwrap_or("Untitled"));
    }
    Ok(())
}
