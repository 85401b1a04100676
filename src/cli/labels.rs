//! CLI `labels` commands: list CORE labels, and change which ones the site uses.

use anyhow::{bail, Result};
use std::path::Path;

use super::config_setup as cs;
use super::prompt::Prompter;

/// Print every label, marking the ones selected in `holo.json`.
pub async fn list(dir: &Path) -> Result<()> {
    let existing = cs::load_existing(dir);
    let core = cs::project_core_client(dir, &existing)?;
    let selected = cs::existing_labels(&existing);

    let labels = cs::fetch_labels(&core).await;
    if labels.is_empty() {
        println!("No labels found in your CORE workspace.");
        return Ok(());
    }

    println!("Found {} labels:", labels.len());
    for label in &labels {
        let mark = if selected.contains(&label.id) { "[SELECTED] " } else { "" };
        println!(
            "  {mark}{} - {}",
            label.name,
            label.description.as_deref().unwrap_or("No description")
        );
    }
    Ok(())
}

/// Re-select labels, refetch their documents and rewrite the navigation.
pub async fn update(dir: &Path, labels_arg: Option<Vec<String>>) -> Result<()> {
    let existing = cs::load_existing(dir);
    let core = cs::project_core_client(dir, &existing)?;
    let Some(provider) = cs::existing_provider(&existing) else {
        bail!("Provider configuration not found in holo.json. Please run `holo setup` first.");
    };
    let Some(core_url) = cs::existing_core_url(&existing) else {
        bail!("Core URL not found in holo.json. Please run `holo setup` first.");
    };

    let labels = cs::fetch_labels(&core).await;
    let previous = cs::existing_labels(&existing);
    let selected = match labels_arg {
        Some(ids) => ids,
        None => cs::select_labels(&mut Prompter::stdio(), &labels, &previous)?,
    };
    let documents = cs::fetch_documents(&core, &selected).await;

    let navigation = cs::merge_navigation(
        &cs::existing_navigation(&existing),
        &labels,
        &selected,
        &previous,
        &documents,
    );
    let config = cs::build_config(existing, &core_url, &selected, &provider, navigation)?;
    cs::save_holo_config(dir, &config)?;

    println!("Labels updated.");
    Ok(())
}
