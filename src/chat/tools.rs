//! The `search` tool the persona uses to recall its own memories from CORE.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ai::{ToolCall, ToolDefinition};
use crate::core_api::CoreClient;

pub const SEARCH_TOOL_NAME: &str = "search";

/// Returned to the model when search fails for any reason.
pub const NO_MEMORY_FOUND: &str = "No memory found";

const SEARCH_DESCRIPTION: &str = "CRITICAL: You MUST use this tool before responding to ANY question \
about yourself, your experiences, work, opinions, or past. This searches YOUR knowledge graph: your \
actual memories, blog posts, projects, and conversations. ALWAYS search first with a relevant query \
before answering. Example queries: 'my experience with React', 'projects I built in 2024', 'my \
thoughts on AI', 'what I wrote about databases'. Returns your authentic memories and writings in markdown.";

/// Parameters for the `search` tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    #[schemars(
        description = "Search query optimized for knowledge graph retrieval. Choose the query structure by intent:\n\n\
1. Entity-centric (best for graph search). Format: [Person/Project] + [relationship/attribute] + [context].\n   \
GOOD: \"User's preferences for code style and formatting\"\n   \
GOOD: \"Project authentication implementation decisions\"\n   \
BAD: \"user code style\"\n\n\
2. Multi-entity relationship (episode graph). Format: [Entity1] + [relationship type] + [Entity2] + [context].\n   \
GOOD: \"User and team discussions about API design patterns\"\n   \
GOOD: \"relationship between database schema and performance optimization\"\n   \
BAD: \"user team api design\"\n\n\
3. Semantic question (vector search). Format: complete natural questions with full context.\n   \
GOOD: \"What causes authentication errors in production? What are the security requirements?\"\n   \
GOOD: \"How does caching improve API response times compared to direct database queries?\"\n   \
BAD: \"auth errors production\"\n\n\
4. Concept exploration (graph traversal). Format: [concept] + related/connected + [domain/context].\n   \
GOOD: \"concepts and ideas related to database indexing and query optimization\"\n   \
GOOD: \"topics connected to user authentication and session management\"\n   \
BAD: \"database indexing concepts\"\n\n\
Avoid keyword soup; use complete phrases with proper context."
    )]
    pub query: String,

    #[schemars(
        description = "Optional ISO timestamp (like '2024-01-15T10:30:00Z'). Get facts that were true at this specific time. Leave empty for current facts."
    )]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_at: Option<String>,

    #[schemars(
        description = "Optional ISO timestamp (like '2024-01-01T00:00:00Z'). Only find memories created AFTER this time. \
Use for 'recent', 'this week', 'last month' or 'since X' questions. Examples: \
'recent work' sets startTime to 7 days ago; \
'this week' sets startTime to the start of the current week; \
'since January' sets startTime to '2025-01-01T00:00:00Z'. \
IMPORTANT: Calculate relative dates from today's date (see system context). Combine with sortBy='recency' for a chronological timeline."
    )]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,

    #[schemars(
        description = "Optional ISO timestamp (like '2024-12-31T23:59:59Z'). Only find memories created BEFORE this time. \
Use for historical questions like 'before X', 'until last month' or specific ranges. Examples: \
'work from last month' sets startTime to the first and endTime to the last day of last month; \
'before March' sets endTime to '2025-03-01T00:00:00Z'; \
'between Jan and Mar' sets startTime='2025-01-01T00:00:00Z' and endTime='2025-03-31T23:59:59Z'. \
IMPORTANT: Use with startTime to define time windows. Always use ISO format with a timezone (Z for UTC)."
    )]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,

    #[schemars(
        description = "Optional label UUIDs to filter results. Leave empty to search all labels."
    )]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_ids: Option<Vec<String>>,

    #[schemars(
        description = "Optional: 'relevance' (default, best semantic matches) or 'recency' (newest first). Use 'relevance' for conceptual questions and 'recency' for timeline or recent activity."
    )]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    Relevance,
    Recency,
}

/// Result of running one tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Output(String),
    /// The call could not be run at all (unknown tool, malformed arguments).
    Error(String),
}

#[derive(Debug, Clone)]
pub struct SearchTool {
    core: CoreClient,
    labels: Vec<String>,
}

impl SearchTool {
    /// `labels` replaces whatever label filter the model asks for; empty means unfiltered.
    pub fn new(core: CoreClient, labels: Vec<String>) -> Self {
        Self { core, labels }
    }

    pub fn definition() -> ToolDefinition {
        let mut parameters = schemars::schema_for!(SearchParams).to_value();
        if let Some(obj) = parameters.as_object_mut() {
            obj.remove("$schema");
            obj.remove("title");
        }
        ToolDefinition {
            name: SEARCH_TOOL_NAME.into(),
            description: SEARCH_DESCRIPTION.into(),
            parameters,
        }
    }

    /// Run a search. Never fails: any CORE error yields [`NO_MEMORY_FOUND`].
    pub async fn execute(&self, mut params: SearchParams) -> String {
        params.label_ids = (!self.labels.is_empty()).then(|| self.labels.clone());
        tracing::info!(query = %params.query, labels = self.labels.len(), "memory search");

        match self.core.search(&params).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "memory search failed");
                NO_MEMORY_FOUND.to_string()
            }
        }
    }

    /// Dispatch a model tool call.
    pub async fn call(&self, call: &ToolCall) -> ToolOutcome {
        if call.name != SEARCH_TOOL_NAME {
            return ToolOutcome::Error(format!("Unknown tool: {}", call.name));
        }
        match serde_json::from_str::<SearchParams>(&call.arguments) {
            Ok(params) => ToolOutcome::Output(self.execute(params).await),
            Err(e) => {
                tracing::debug!(error = %e, arguments = %call.arguments, "invalid search arguments");
                ToolOutcome::Error(format!("Invalid input for tool search: {e}"))
            }
        }
    }
}
