//! Shared pieces of `setup` and `labels update`: reading the existing project, label and
//! document fetching, navigation merging, and writing `holo.json`.

use anyhow::{bail, Context, Result};
use indicatif::ProgressBar;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use holo::config::{HoloConfig, NavigationGroup, ProviderSection, CONFIG_FILE_NAME, CORE_API_KEY_ENV};
use holo::core_api::{CoreClient, Document, Label};

use super::env_file;
use super::prompt::{Choice, Prompter};

pub const DEFAULT_PROJECT_NAME: &str = "My Holo Project";
pub const DEFAULT_CORE_URL: &str = "https://core.heysol.ai";

pub struct ProviderTemplate {
    pub name: &'static str,
    pub base_url: &'static str,
    pub default_model: &'static str,
}

pub const OPENAI: ProviderTemplate = ProviderTemplate {
    name: "openai",
    base_url: "https://api.openai.com/v1",
    default_model: "gpt-4.1-2025-04-14",
};

/// The existing `holo.json` as a raw object, or empty if it is missing or unreadable.
/// Kept untyped so fields the CLI does not manage survive a rewrite.
pub fn load_existing(dir: &Path) -> Map<String, Value> {
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Map::new();
    }
    let parsed = std::fs::read_to_string(&path)
        .ok()
        .and_then(|s| serde_json::from_str::<Value>(&s).ok());
    match parsed {
        Some(Value::Object(map)) => {
            println!("Found existing holo.json. Using existing values as defaults.");
            map
        }
        _ => {
            eprintln!("Found holo.json but could not parse it. Starting fresh.");
            Map::new()
        }
    }
}

pub fn existing_core_url(existing: &Map<String, Value>) -> Option<String> {
    existing
        .get("core")?
        .get("url")?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn existing_labels(existing: &Map<String, Value>) -> Vec<String> {
    existing
        .get("core")
        .and_then(|c| c.get("labels"))
        .and_then(|l| serde_json::from_value(l.clone()).ok())
        .unwrap_or_default()
}

pub fn existing_provider(existing: &Map<String, Value>) -> Option<ProviderSection> {
    serde_json::from_value(existing.get("providers")?.clone()).ok()
}

pub fn existing_navigation(existing: &Map<String, Value>) -> Vec<NavigationGroup> {
    existing
        .get("navigation")
        .and_then(|n| serde_json::from_value(n.clone()).ok())
        .unwrap_or_default()
}

/// CORE client for an already set-up project: URL from `holo.json`, key from `.env`.
pub fn project_core_client(dir: &Path, existing: &Map<String, Value>) -> Result<CoreClient> {
    let Some(url) = existing_core_url(existing) else {
        bail!("Core URL not found in holo.json. Please run `holo setup` first.");
    };
    let Some(key) = env_file::lookup(dir, CORE_API_KEY_ENV)? else {
        bail!("{CORE_API_KEY_ENV} not found in .env. Please run `holo setup` first.");
    };
    Ok(CoreClient::new(reqwest::Client::new(), url, Some(key)))
}

pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// All labels, or none if CORE cannot be reached (reported, not fatal).
pub async fn fetch_labels(core: &CoreClient) -> Vec<Label> {
    let pb = spinner("Fetching labels from CORE...");
    match core.labels().await {
        Ok(labels) => {
            pb.finish_with_message(format!("Found {} labels", labels.len()));
            labels
        }
        Err(e) => {
            pb.finish_with_message("Warning: could not fetch labels from CORE");
            tracing::warn!(error = %e, "label fetch failed");
            Vec::new()
        }
    }
}

/// Documents for each selected label; a label whose listing fails gets none.
pub async fn fetch_documents(core: &CoreClient, selected: &[String]) -> HashMap<String, Vec<Document>> {
    let mut documents = HashMap::new();
    for label_id in selected {
        let pb = spinner(&format!("Fetching documents for label {label_id}..."));
        let docs = match core.documents_for_label(label_id).await {
            Ok(docs) => {
                pb.finish_with_message(format!("{} documents for label {label_id}", docs.len()));
                docs
            }
            Err(e) => {
                pb.finish_with_message(format!("Warning: could not fetch documents for label {label_id}"));
                tracing::warn!(label = %label_id, error = %e, "document fetch failed");
                Vec::new()
            }
        };
        documents.insert(label_id.clone(), docs);
    }
    documents
}

pub fn select_labels<R: std::io::BufRead, W: std::io::Write>(
    prompt: &mut Prompter<R, W>,
    labels: &[Label],
    initial: &[String],
) -> Result<Vec<String>> {
    if labels.is_empty() {
        println!("No labels found in your CORE workspace");
        return Ok(Vec::new());
    }
    let choices: Vec<Choice<'_>> = labels
        .iter()
        .map(|l| Choice {
            value: &l.id,
            label: &l.name,
            hint: l.description.as_deref(),
        })
        .collect();
    prompt.multiselect("Select labels to include:", &choices, initial)
}

/// Rebuild the navigation after a label selection change.
///
/// Non-CORE groups are kept. A CORE group survives only if its label is still selected and
/// was already selected before. If nothing is left, a "Getting Started" group is added. Then
/// every selected label with documents gets a group if it is new or has no group yet.
pub fn merge_navigation(
    existing: &[NavigationGroup],
    labels: &[Label],
    selected: &[String],
    previous: &[String],
    documents: &HashMap<String, Vec<Document>>,
) -> Vec<NavigationGroup> {
    let newly_added: Vec<&String> = selected.iter().filter(|id| !previous.contains(*id)).collect();
    let removed_names: Vec<&str> = previous
        .iter()
        .filter(|id| !selected.contains(*id))
        .filter_map(|id| labels.iter().find(|l| &l.id == id))
        .map(|l| l.name.as_str())
        .collect();

    let mut navigation: Vec<NavigationGroup> = existing
        .iter()
        .filter(|group| {
            if !group.is_core_group() {
                return true;
            }
            if removed_names.contains(&group.group.as_str()) {
                return false;
            }
            labels
                .iter()
                .find(|l| l.name == group.group)
                .is_some_and(|l| selected.contains(&l.id) && !newly_added.contains(&&l.id))
        })
        .cloned()
        .collect();

    if navigation.is_empty() {
        navigation.push(NavigationGroup {
            group: "Getting Started".into(),
            pages: vec!["introduction".into()],
        });
    }

    for label_id in selected {
        let Some(label) = labels.iter().find(|l| &l.id == label_id) else {
            continue;
        };
        let docs = documents.get(label_id).map(Vec::as_slice).unwrap_or_default();
        if docs.is_empty() {
            continue;
        }
        let has_group = navigation.iter().any(|g| g.group == label.name);
        if newly_added.contains(&label_id) || !has_group {
            navigation.push(NavigationGroup {
                group: label.name.clone(),
                pages: docs.iter().map(|d| format!("CORE {}", d.id)).collect(),
            });
        }
    }

    navigation
}

/// The new `holo.json` object: `existing` with core, providers and navigation replaced.
pub fn build_config(
    mut existing: Map<String, Value>,
    core_url: &str,
    selected: &[String],
    provider: &ProviderSection,
    navigation: Vec<NavigationGroup>,
) -> Result<Map<String, Value>> {
    let mut core = json!({ "url": core_url });
    if !selected.is_empty() {
        core["labels"] = json!(selected);
    }

    let has_name = existing
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|n| !n.is_empty());
    if !has_name {
        existing.insert("name".into(), DEFAULT_PROJECT_NAME.into());
    }
    existing.insert("core".into(), core);
    existing.insert("providers".into(), serde_json::to_value(provider)?);
    existing.insert("navigation".into(), serde_json::to_value(navigation)?);
    Ok(existing)
}

/// Validate and write `holo.json`. An invalid config is still written, with a warning.
pub fn save_holo_config(dir: &Path, config: &Map<String, Value>) -> Result<()> {
    let value = Value::Object(config.clone());
    let validation = serde_json::from_value::<HoloConfig>(value.clone())
        .map_err(|e| e.to_string())
        .and_then(|c| c.validate().map_err(|e| e.to_string()));

    if let Err(issues) = &validation {
        eprintln!("Warning: generated holo.json does not match the expected schema");
        eprintln!("{issues}");
    }

    let path = dir.join(CONFIG_FILE_NAME);
    let existed = path.exists();
    let contents = serde_json::to_string_pretty(&value)?;
    std::fs::write(&path, contents)
        .with_context(|| format!("failed to write {}", path.display()))?;

    if validation.is_err() {
        println!("holo.json was written but may need manual corrections. Run `holo check` for details.");
    } else {
        println!("{} holo.json", if existed { "Updated" } else { "Created" });
    }
    Ok(())
}
