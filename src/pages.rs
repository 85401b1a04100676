//! Page content and metadata for the site's `/api/config` and `/api/metadata` endpoints.
//!
//! Pages are either files in the config directory (`introduction.mdx`, `holo.json`, ...)
//! or CORE documents addressed by the pseudo file name `CORE <logId>`.

use std::path::{Component, Path, PathBuf};

use serde_json::{json, Map, Number, Value};

use crate::config::{ConfigError, HoloConfig};
use crate::core_api::{CoreClient, CoreError};

const CORE_PREFIX: &str = "CORE";
const UNTITLED: &str = "Untitled";

#[derive(Debug, thiserror::Error)]
pub enum PagesError {
    #[error("fileName is required")]
    MissingFileName,

    #[error("path escapes the config directory: {0}")]
    OutsideConfigDir(String),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {0}: {1}")]
    Json(String, #[source] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Core URL or API key not configured")]
    CoreNotConfigured,

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("CORE document {0} has no body")]
    EmptyDocument(String),
}

/// The log id from a `CORE <id>` page name, with any `.mdx` suffix removed.
///
/// Ids that could address anything but a single log (path separators, queries, dot
/// segments) are not CORE pages.
pub fn core_log_id(page: &str) -> Option<&str> {
    let rest = page.strip_prefix(CORE_PREFIX)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let id = rest.trim();
    let id = id.strip_suffix(".mdx").unwrap_or(id);
    let plain = !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\', '?', '#']);
    plain.then_some(id)
}

/// Join `file_name` onto `dir`, refusing absolute paths and `..` components.
pub fn resolve_in(dir: &Path, file_name: &str) -> Result<PathBuf, PagesError> {
    let relative = Path::new(file_name);
    let escapes = relative.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes || file_name.is_empty() {
        return Err(PagesError::OutsideConfigDir(file_name.to_string()));
    }
    Ok(dir.join(relative))
}

/// Split a leading `---` fenced frontmatter block off a page.
///
/// Only flat `key: value` lines are understood; values become booleans, numbers or
/// strings (surrounding quotes removed). Anything nested is skipped.
pub fn split_frontmatter(contents: &str) -> (Map<String, Value>, String) {
    let mut frontmatter = Map::new();

    let Some(after_open) = contents
        .strip_prefix("---\n")
        .or_else(|| contents.strip_prefix("---\r\n"))
    else {
        return (frontmatter, contents.to_string());
    };

    let mut offset = 0;
    let mut body_start = None;
    for line in after_open.split_inclusive('\n') {
        offset += line.len();
        let trimmed = line.trim_end();
        if trimmed == "---" {
            body_start = Some(offset);
            break;
        }
        if trimmed.is_empty() || trimmed.starts_with('#') || line.starts_with([' ', '\t']) {
            continue;
        }
        if let Some((key, value)) = trimmed.split_once(':') {
            frontmatter.insert(key.trim().to_string(), frontmatter_value(value.trim()));
        }
    }

    match body_start {
        Some(start) => {
            let body = &after_open[start..];
            let body = body.strip_prefix('\n').unwrap_or(body);
            (frontmatter, body.to_string())
        }
        // Unterminated block: treat the whole thing as body.
        None => (Map::new(), contents.to_string()),
    }
}

fn frontmatter_value(raw: &str) -> Value {
    let unquoted = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));
    if let Some(s) = unquoted {
        return Value::String(s.to_string());
    }
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "" | "null" | "~" => return Value::Null,
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Some(n) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    Value::String(raw.to_string())
}

fn file_stem_title(file_name: &str) -> String {
    file_name.replacen(".mdx", "", 1)
}

/// Serves page sources and metadata out of a config directory.
#[derive(Debug, Clone)]
pub struct Pages {
    config_dir: PathBuf,
    http: reqwest::Client,
}

impl Pages {
    pub fn new(config_dir: PathBuf, http: reqwest::Client) -> Self {
        Self { config_dir, http }
    }

    fn core_client(&self, config: &HoloConfig) -> Result<CoreClient, PagesError> {
        let conn = config.core_connection()?;
        if conn.api_key.is_none() {
            return Err(PagesError::CoreNotConfigured);
        }
        Ok(CoreClient::from_connection(self.http.clone(), &conn))
    }

    async fn read(&self, file_name: &str) -> Result<String, PagesError> {
        let path = resolve_in(&self.config_dir, file_name)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| PagesError::Read { path, source })
    }

    /// Content for `/api/config`.
    pub async fn config(&self, file_name: Option<&str>) -> Result<Value, PagesError> {
        let file_name = file_name.ok_or(PagesError::MissingFileName)?;

        if let Some(log_id) = core_log_id(file_name) {
            let config = HoloConfig::load(&self.config_dir)?;
            let core = self.core_client(&config)?;
            let log = core.log(log_id).await?;
            let source = log
                .data
                .episode_body
                .ok_or_else(|| PagesError::EmptyDocument(log_id.to_string()))?;
            return Ok(json!({ "source": source, "frontmatter": {} }));
        }

        let contents = self.read(file_name).await?;
        if file_name.contains(".json") {
            return serde_json::from_str(&contents)
                .map_err(|e| PagesError::Json(file_name.to_string(), e));
        }
        let (frontmatter, source) = split_frontmatter(&contents);
        Ok(json!({ "source": source, "frontmatter": frontmatter }))
    }

    /// Metadata for `/api/metadata`: one page, or every navigation page keyed by name.
    pub async fn metadata(&self, file_name: Option<&str>) -> Result<Value, PagesError> {
        let Some(file_name) = file_name.filter(|f| !f.is_empty()) else {
            return self.all_metadata().await.map(Value::Object);
        };

        if let Some(log_id) = core_log_id(file_name) {
            let config = HoloConfig::load(&self.config_dir)?;
            let core = self.core_client(&config)?;
            return Ok(core_metadata(&core, log_id).await);
        }

        Ok(self.file_metadata(file_name).await)
    }

    async fn all_metadata(&self) -> Result<Map<String, Value>, PagesError> {
        let config = HoloConfig::load(&self.config_dir)?;
        // CORE pages need a key; without one they are looked up as files and fall back.
        let core = self.core_client(&config).ok();

        let mut map = Map::new();
        for page in config.navigation.iter().flat_map(|g| g.pages.iter()) {
            let metadata = match (core_log_id(page), &core) {
                (Some(log_id), Some(core)) => core_metadata(core, log_id).await,
                _ => {
                    let file_name = if page.ends_with(".mdx") {
                        page.clone()
                    } else {
                        format!("{page}.mdx")
                    };
                    self.file_metadata(&file_name).await
                }
            };
            map.insert(page.clone(), metadata);
        }
        tracing::debug!(pages = map.len(), "collected page metadata");
        Ok(map)
    }

    async fn file_metadata(&self, file_name: &str) -> Value {
        let stem = file_stem_title(file_name);
        match self.read(file_name).await {
            Ok(contents) => {
                let (frontmatter, _) = split_frontmatter(&contents);
                let mut metadata = Map::new();
                let title = frontmatter
                    .get("title")
                    .filter(|v| !v.is_null())
                    .cloned()
                    .unwrap_or_else(|| stem.into());
                let description = frontmatter
                    .get("description")
                    .filter(|v| !v.is_null())
                    .cloned()
                    .unwrap_or_else(|| "".into());
                metadata.insert("title".into(), title);
                metadata.insert("description".into(), description);
                for (key, value) in frontmatter {
                    if key != "title" && key != "description" {
                        metadata.insert(key, value);
                    }
                }
                Value::Object(metadata)
            }
            Err(e) => {
                tracing::warn!(file = %file_name, error = %e, "page metadata unavailable");
                json!({ "title": stem, "description": "" })
            }
        }
    }
}

async fn core_metadata(core: &CoreClient, log_id: &str) -> Value {
    match core.log(log_id).await {
        Ok(log) => json!({
            "title": log.title.filter(|t| !t.is_empty()).unwrap_or_else(|| UNTITLED.into()),
            "description": "",
        }),
        Err(e) => {
            tracing::warn!(log_id, error = %e, "CORE document metadata unavailable");
            json!({ "title": UNTITLED, "description": "" })
        }
    }
}
