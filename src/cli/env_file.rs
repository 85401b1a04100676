//! Reading and rewriting the project's `.env` file.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

use holo::config::{provider_key_env, HoloConfig, CORE_API_KEY_ENV};

pub const ENV_FILE_NAME: &str = ".env";

/// Set `key=value` in env-file text: every existing `key=` line is replaced, otherwise the
/// pair is appended. The result is trimmed.
pub fn upsert(contents: &str, key: &str, value: &str) -> String {
    let prefix = format!("{key}=");
    let mut found = false;
    let mut lines: Vec<String> = contents
        .lines()
        .map(|line| {
            let bare = line.trim_start().strip_prefix("export ").unwrap_or(line.trim_start());
            if bare.starts_with(&prefix) {
                found = true;
                format!("{key}={value}")
            } else {
                line.to_string()
            }
        })
        .collect();
    if !found {
        lines.push(format!("{key}={value}"));
    }
    lines.join("\n").trim().to_string()
}

/// Apply `pairs` to `<dir>/.env`, creating it if needed.
pub fn update_env_file(dir: &Path, pairs: &[(&str, &str)]) -> Result<()> {
    let path = dir.join(ENV_FILE_NAME);
    let existed = path.exists();
    let mut contents = if existed {
        std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?
    } else {
        String::new()
    };

    for (key, value) in pairs {
        contents = upsert(&contents, key, value);
    }

    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("{} .env", if existed { "Updated" } else { "Created" });
    Ok(())
}

/// Variables defined in `<dir>/.env`; empty when the file does not exist.
pub fn read_env_file(dir: &Path) -> Result<HashMap<String, String>> {
    let path = dir.join(ENV_FILE_NAME);
    if !path.exists() {
        return Ok(HashMap::new());
    }
    dotenvy::from_path_iter(&path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .map(|item| item.with_context(|| format!("failed to parse {}", path.display())))
        .collect()
}

/// `CORE_API_KEY` always, plus the configured provider's key.
pub fn required_env_vars(config: Option<&HoloConfig>) -> Vec<String> {
    let mut vars = vec![CORE_API_KEY_ENV.to_string()];
    if let Some(name) = config
        .map(|c| c.providers.name.as_str())
        .filter(|n| !n.is_empty())
    {
        vars.push(provider_key_env(name));
    }
    vars
}

/// Required variables set neither in the `.env` file nor in the process environment.
pub fn missing_env_vars(
    required: &[String],
    file_vars: &HashMap<String, String>,
    process_env: impl Fn(&str) -> Option<String>,
) -> Vec<String> {
    required
        .iter()
        .filter(|var| {
            let in_file = file_vars.get(var.as_str()).is_some_and(|v| !v.is_empty());
            let in_process = process_env(var).is_some_and(|v| !v.is_empty());
            !in_file && !in_process
        })
        .cloned()
        .collect()
}

/// Look up `key` in `<dir>/.env`, then the process environment.
pub fn lookup(dir: &Path, key: &str) -> Result<Option<String>> {
    let file_vars = read_env_file(dir)?;
    Ok(file_vars
        .get(key)
        .cloned()
        .or_else(|| std::env::var(key).ok())
        .filter(|v| !v.trim().is_empty()))
}
