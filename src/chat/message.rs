//! UI chat messages: the shape the browser sends and the chat store keeps.
//!
//! A message is a role plus an ordered list of typed parts. Known parts (`text`,
//! `reasoning`, `step-start`, `tool-<name>`) are modelled; anything else (`file`,
//! `source-url`, `data-*`, ...) is carried through untouched as [`UiPart::Other`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::ai::{ModelMessage, ToolCall};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiMessage {
    pub id: String,
    pub role: Role,
    pub parts: Vec<UiPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl UiMessage {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            parts: Vec::new(),
            metadata: None,
        }
    }

    /// Convenience constructor for a single-text message.
    pub fn text(id: impl Into<String>, role: Role, text: impl Into<String>) -> Self {
        let mut message = Self::new(id, role);
        message.parts.push(UiPart::Text {
            text: text.into(),
            state: None,
        });
        message
    }

    /// All text parts concatenated.
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                UiPart::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum UiPart {
    Text { text: String, state: Option<String> },
    Reasoning { text: String, state: Option<String> },
    StepStart,
    Tool(ToolPart),
    Other(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolState {
    InputStreaming,
    InputAvailable,
    OutputAvailable,
    OutputError,
}

impl ToolState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputStreaming => "input-streaming",
            Self::InputAvailable => "input-available",
            Self::OutputAvailable => "output-available",
            Self::OutputError => "output-error",
        }
    }
}

impl std::str::FromStr for ToolState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "input-streaming" => Ok(Self::InputStreaming),
            "input-available" => Ok(Self::InputAvailable),
            "output-available" => Ok(Self::OutputAvailable),
            "output-error" => Ok(Self::OutputError),
            _ => Err(format!("unknown tool state: {s}")),
        }
    }
}

/// A tool invocation recorded in an assistant message (`type: "tool-<name>"`).
#[derive(Debug, Clone, PartialEq)]
pub struct ToolPart {
    pub tool_name: String,
    pub tool_call_id: String,
    pub state: ToolState,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub error_text: Option<String>,
}

fn required_str(obj: &Map<String, Value>, key: &str, kind: &str) -> Result<String, String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| format!("{kind} part requires a string `{key}`"))
}

fn optional_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

impl TryFrom<Value> for UiPart {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(obj) = value else {
            return Err("message part must be an object".into());
        };
        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or("message part requires a string `type`")?
            .to_string();

        match kind.as_str() {
            "text" => Ok(Self::Text {
                text: required_str(&obj, "text", "text")?,
                state: optional_str(&obj, "state"),
            }),
            "reasoning" => Ok(Self::Reasoning {
                text: required_str(&obj, "text", "reasoning")?,
                state: optional_str(&obj, "state"),
            }),
            "step-start" => Ok(Self::StepStart),
            _ if kind.starts_with("tool-") => {
                let state = required_str(&obj, "state", "tool")?.parse()?;
                Ok(Self::Tool(ToolPart {
                    tool_name: kind["tool-".len()..].to_string(),
                    tool_call_id: required_str(&obj, "toolCallId", "tool")?,
                    state,
                    input: obj.get("input").cloned(),
                    output: obj.get("output").cloned(),
                    error_text: optional_str(&obj, "errorText"),
                }))
            }
            _ => Ok(Self::Other(Value::Object(obj))),
        }
    }
}

impl From<UiPart> for Value {
    fn from(part: UiPart) -> Self {
        match part {
            UiPart::Text { text, state } => with_state(json!({ "type": "text", "text": text }), state),
            UiPart::Reasoning { text, state } => {
                with_state(json!({ "type": "reasoning", "text": text }), state)
            }
            UiPart::StepStart => json!({ "type": "step-start" }),
            UiPart::Tool(tool) => {
                let mut obj = Map::new();
                obj.insert("type".into(), format!("tool-{}", tool.tool_name).into());
                obj.insert("toolCallId".into(), tool.tool_call_id.into());
                obj.insert("state".into(), tool.state.as_str().into());
                if let Some(input) = tool.input {
                    obj.insert("input".into(), input);
                }
                if let Some(output) = tool.output {
                    obj.insert("output".into(), output);
                }
                if let Some(error_text) = tool.error_text {
                    obj.insert("errorText".into(), error_text.into());
                }
                Value::Object(obj)
            }
            UiPart::Other(value) => value,
        }
    }
}

fn with_state(mut value: Value, state: Option<String>) -> Value {
    if let Some(state) = state {
        value["state"] = state.into();
    }
    value
}

// ── Validation ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("invalid messages: {0}")]
pub struct ValidationError(pub String);

/// Check raw messages against the message schema and convert them.
pub fn validate_messages(raw: &[Value]) -> Result<Vec<UiMessage>, ValidationError> {
    raw.iter()
        .enumerate()
        .map(|(i, value)| {
            let message: UiMessage = serde_json::from_value(value.clone())
                .map_err(|e| ValidationError(format!("messages[{i}]: {e}")))?;
            if message.parts.is_empty() {
                return Err(ValidationError(format!(
                    "messages[{i}]: a message needs at least one part"
                )));
            }
            Ok(message)
        })
        .collect()
}

// ── Conversion to model messages ─────────────────────────────────────────────

fn joined_text(parts: &[UiPart]) -> String {
    parts
        .iter()
        .filter_map(|p| match p {
            UiPart::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn output_text(output: &Value) -> String {
    match output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flatten UI messages into the model conversation.
///
/// Assistant messages are split at `step-start` boundaries; each step becomes an assistant
/// turn carrying its text and finished tool calls, followed by one tool message per call.
/// Tool calls that never produced an output are dropped.
pub fn to_model_messages(messages: &[UiMessage]) -> Vec<ModelMessage> {
    let mut out = Vec::new();

    for message in messages {
        match message.role {
            Role::System => {
                let text = joined_text(&message.parts);
                if !text.is_empty() {
                    out.push(ModelMessage::System(text));
                }
            }
            Role::User => {
                let text = joined_text(&message.parts);
                if !text.is_empty() {
                    out.push(ModelMessage::User(text));
                }
            }
            Role::Assistant => {
                for step in message.parts.split(|p| matches!(p, UiPart::StepStart)) {
                    push_assistant_step(step, &mut out);
                }
            }
        }
    }

    out
}

fn push_assistant_step(parts: &[UiPart], out: &mut Vec<ModelMessage>) {
    let text: String = parts
        .iter()
        .filter_map(|p| match p {
            UiPart::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();

    let mut tool_calls = Vec::new();
    let mut results = Vec::new();
    for part in parts {
        let UiPart::Tool(tool) = part else { continue };
        let content = match tool.state {
            ToolState::OutputAvailable => tool.output.as_ref().map(output_text).unwrap_or_default(),
            ToolState::OutputError => tool.error_text.clone().unwrap_or_default(),
            ToolState::InputStreaming | ToolState::InputAvailable => continue,
        };
        tool_calls.push(ToolCall {
            id: tool.tool_call_id.clone(),
            name: tool.tool_name.clone(),
            arguments: tool
                .input
                .as_ref()
                .map(Value::to_string)
                .unwrap_or_else(|| "{}".into()),
        });
        results.push(ModelMessage::Tool {
            call_id: tool.tool_call_id.clone(),
            content,
        });
    }

    if text.is_empty() && tool_calls.is_empty() {
        return;
    }
    out.push(ModelMessage::Assistant {
        text: (!text.is_empty()).then_some(text),
        tool_calls,
    });
    out.extend(results);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_keep_their_wire_shape() {
        let raw = json!({
            "id": "m1",
            "role": "assistant",
            "parts": [
                { "type": "step-start" },
                { "type": "tool-search", "toolCallId": "c1", "state": "output-available",
                  "input": { "query": "rust" }, "output": "I like Rust" },
                { "type": "text", "text": "Yes.", "state": "done" },
                { "type": "source-url", "sourceId": "s", "url": "https://x.dev" }
            ]
        });
        let message: UiMessage = serde_json::from_value(raw.clone()).unwrap();
        assert!(matches!(&message.parts[1], UiPart::Tool(t) if t.tool_name == "search" && t.state == ToolState::OutputAvailable));
        assert!(matches!(&message.parts[3], UiPart::Other(_)));
        assert_eq!(serde_json::to_value(&message).unwrap(), raw);
    }

    #[test]
    fn validation_rejects_bad_messages() {
        let cases = [
            json!({ "role": "user", "parts": [{ "type": "text", "text": "hi" }] }),
            json!({ "id": "1", "role": "robot", "parts": [{ "type": "text", "text": "hi" }] }),
            json!({ "id": "1", "role": "user", "parts": [] }),
            json!({ "id": "1", "role": "user", "parts": [{ "type": "text" }] }),
            json!({ "id": "1", "role": "assistant", "parts": [{ "type": "tool-search", "toolCallId": "c", "state": "bogus" }] }),
            json!({ "id": "1", "role": "user", "parts": [{ "text": "no type" }] }),
        ];
        for case in cases {
            assert!(validate_messages(&[case.clone()]).is_err(), "accepted {case}");
        }

        let ok = json!({ "id": "1", "role": "user", "parts": [{ "type": "text", "text": "hi" }] });
        let messages = validate_messages(&[ok]).unwrap();
        assert_eq!(messages[0].text_content(), "hi");
    }

    #[test]
    fn assistant_steps_become_tool_turns() {
        let mut assistant = UiMessage::new("a1", Role::Assistant);
        assistant.parts = vec![
            UiPart::StepStart,
            UiPart::Tool(ToolPart {
                tool_name: "search".into(),
                tool_call_id: "c1".into(),
                state: ToolState::OutputAvailable,
                input: Some(json!({ "query": "work" })),
                output: Some(json!("Built compilers")),
                error_text: None,
            }),
            UiPart::StepStart,
            UiPart::Text {
                text: "I build compilers.".into(),
                state: Some("done".into()),
            },
        ];
        let history = vec![
            UiMessage::text("u1", Role::User, "What do you do?"),
            assistant,
        ];

        let converted = to_model_messages(&history);
        assert_eq!(converted.len(), 4);
        assert_eq!(converted[0], ModelMessage::User("What do you do?".into()));
        let ModelMessage::Assistant { text, tool_calls } = &converted[1] else {
            panic!("expected assistant tool turn");
        };
        assert!(text.is_none());
        assert_eq!(tool_calls[0].arguments, r#"{"query":"work"}"#);
        assert_eq!(
            converted[2],
            ModelMessage::Tool {
                call_id: "c1".into(),
                content: "Built compilers".into()
            }
        );
        assert_eq!(
            converted[3],
            ModelMessage::Assistant {
                text: Some("I build compilers.".into()),
                tool_calls: vec![]
            }
        );
    }

    #[test]
    fn unfinished_tool_calls_are_dropped() {
        let mut assistant = UiMessage::new("a1", Role::Assistant);
        assistant.parts = vec![UiPart::Tool(ToolPart {
            tool_name: "search".into(),
            tool_call_id: "c1".into(),
            state: ToolState::InputAvailable,
            input: Some(json!({})),
            output: None,
            error_text: None,
        })];
        assert!(to_model_messages(&[assistant]).is_empty());
    }
}
