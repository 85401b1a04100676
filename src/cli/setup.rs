//! CLI `setup` command: create or update `holo.json`, `.env` and `introduction.mdx`.

use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;

use holo::ai::{self, prompts, ChatModel, ModelMessage};
use holo::config::{provider_key_env, ProviderConnection, ProviderSection, CORE_API_KEY_ENV};
use holo::core_api::CoreClient;

use super::config_setup::{self as cs, OPENAI};
use super::env_file;
use super::prompt::{self, Prompter};

pub const INTRODUCTION_FILE: &str = "introduction.mdx";

/// Values given here skip the matching prompt.
#[derive(Debug, Default, Args)]
pub struct SetupArgs {
    /// CORE base URL
    #[arg(long)]
    pub core_url: Option<String>,
    /// CORE API key
    #[arg(long)]
    pub core_api_key: Option<String>,
    /// Label ids to include, comma separated
    #[arg(long, value_delimiter = ',')]
    pub labels: Option<Vec<String>>,
    /// Provider model name
    #[arg(long)]
    pub model: Option<String>,
    /// Provider API key
    #[arg(long)]
    pub provider_api_key: Option<String>,
    /// Regenerate introduction.mdx without asking
    #[arg(long)]
    pub regenerate_introduction: bool,
}

pub async fn setup(dir: &Path, args: SetupArgs) -> Result<()> {
    println!("Setting up Holo configuration...");
    let mut prompt = Prompter::stdio();

    let existing = cs::load_existing(dir);

    let core_url = match args.core_url {
        Some(url) => {
            prompt::valid_url(&url).map_err(anyhow::Error::msg)?;
            url
        }
        None => {
            let default = cs::existing_core_url(&existing).unwrap_or_else(|| cs::DEFAULT_CORE_URL.into());
            prompt.text("Enter your Core URL:", Some(&default), prompt::valid_url)?
        }
    };
    let core_api_key = match args.core_api_key.filter(|k| !k.is_empty()) {
        Some(key) => key,
        None => prompt.text("Enter your Core API Key:", None, prompt::required("Core API Key"))?,
    };

    let http = reqwest::Client::new();
    let core = CoreClient::new(http.clone(), core_url.clone(), Some(core_api_key.clone()));

    let labels = cs::fetch_labels(&core).await;
    let previous = cs::existing_labels(&existing);
    let selected = match args.labels {
        Some(ids) => ids,
        None => cs::select_labels(&mut prompt, &labels, &previous)?,
    };
    let documents = cs::fetch_documents(&core, &selected).await;

    let template = OPENAI;
    let model = match args.model {
        Some(model) => model,
        None => {
            let default = cs::existing_provider(&existing)
                .map(|p| p.model)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| template.default_model.into());
            prompt.text(
                &format!("Enter {} model:", template.name),
                Some(&default),
                prompt::required("Model name"),
            )?
        }
    };
    let provider_api_key = match args.provider_api_key.filter(|k| !k.is_empty()) {
        Some(key) => key,
        None => prompt.text(
            &format!("Enter your {} API Key:", template.name.to_uppercase()),
            None,
            prompt::required("API Key"),
        )?,
    };

    let provider = ProviderSection {
        name: template.name.into(),
        model,
        base_url: template.base_url.into(),
    };
    let navigation = cs::merge_navigation(
        &cs::existing_navigation(&existing),
        &labels,
        &selected,
        &previous,
        &documents,
    );
    let config = cs::build_config(existing, &core_url, &selected, &provider, navigation)?;
    cs::save_holo_config(dir, &config)?;

    let provider_env = provider_key_env(&provider.name);
    env_file::update_env_file(
        dir,
        &[
            (CORE_API_KEY_ENV, core_api_key.as_str()),
            (provider_env.as_str(), provider_api_key.as_str()),
        ],
    )?;

    let connection = ProviderConnection {
        name: provider.name,
        model: provider.model,
        base_url: provider.base_url,
        api_key: Some(provider_api_key),
    };
    let intro_path = dir.join(INTRODUCTION_FILE);
    let regenerate = if !intro_path.exists() || args.regenerate_introduction {
        true
    } else {
        prompt.confirm(
            "introduction.mdx already exists. Do you want to regenerate it?",
            false,
        )?
    };
    if regenerate {
        if let Err(e) = generate_introduction(&intro_path, &core, http, &connection).await {
            eprintln!("Error: {e:#}");
            println!("You can create introduction.mdx manually later.");
        }
    } else {
        println!("Keeping existing introduction.mdx");
    }

    println!("Holo setup completed successfully!");
    Ok(())
}

/// Fetch the persona and have the model write an introduction page from it.
pub async fn generate_introduction(
    path: &Path,
    core: &CoreClient,
    http: reqwest::Client,
    provider: &ProviderConnection,
) -> Result<()> {
    let pb = cs::spinner("Fetching persona information from CORE...");
    let model = match ai::create_client(http, provider).await {
        Ok(model) => model,
        Err(e) => {
            pb.finish_with_message("Failed to reach the model provider");
            return Err(e.into());
        }
    };
    let persona = match core.me().await {
        Ok(me) => me.persona.unwrap_or_default(),
        Err(e) => {
            pb.finish_with_message("Failed to fetch persona");
            return Err(e).context("failed to fetch persona");
        }
    };
    pb.finish_with_message("Persona fetched");

    let pb = cs::spinner("Generating introduction.mdx...");
    let messages = [
        ModelMessage::System(prompts::INTRODUCTION_SYSTEM_PROMPT.into()),
        ModelMessage::User(prompts::introduction_request(&persona)),
    ];
    let content = match model.complete(&messages).await {
        Ok(content) => content,
        Err(e) => {
            pb.finish_with_message("Failed to generate introduction");
            return Err(e).context("introduction generation failed");
        }
    };

    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    pb.finish_with_message("Generated introduction.mdx");
    println!("Created introduction.mdx at {}", path.display());
    Ok(())
}
