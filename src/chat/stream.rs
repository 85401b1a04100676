//! UI message stream chunks and the builder that folds them into the stored assistant message.
//!
//! Chunks are serialized as JSON objects tagged by `type` and sent to the browser one SSE
//! event at a time, terminated by `data: [DONE]`.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use super::message::{Role, ToolPart, ToolState, UiMessage, UiPart};

/// Response header that marks an SSE body as a UI message stream.
pub const UI_STREAM_HEADER: &str = "x-vercel-ai-ui-message-stream";
pub const UI_STREAM_VERSION: &str = "v1";
pub const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiChunk {
    #[serde(rename_all = "camelCase")]
    Start { message_id: String },
    StartStep,
    TextStart { id: String },
    TextDelta { id: String, delta: String },
    TextEnd { id: String },
    ReasoningStart { id: String },
    ReasoningDelta { id: String, delta: String },
    ReasoningEnd { id: String },
    #[serde(rename_all = "camelCase")]
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        input: Value,
    },
    #[serde(rename_all = "camelCase")]
    ToolOutputAvailable { tool_call_id: String, output: Value },
    #[serde(rename_all = "camelCase")]
    ToolOutputError {
        tool_call_id: String,
        error_text: String,
    },
    FinishStep,
    Finish,
    #[serde(rename_all = "camelCase")]
    Error { error_text: String },
}

/// Accumulates streamed chunks into the assistant [`UiMessage`].
#[derive(Debug)]
pub struct MessageBuilder {
    message: UiMessage,
    open: HashMap<String, usize>,
}

impl MessageBuilder {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message: UiMessage::new(message_id, Role::Assistant),
            open: HashMap::new(),
        }
    }

    pub fn apply(&mut self, chunk: &UiChunk) {
        match chunk {
            UiChunk::StartStep => self.message.parts.push(UiPart::StepStart),
            UiChunk::TextStart { id } => self.open_part(id, false),
            UiChunk::ReasoningStart { id } => self.open_part(id, true),
            UiChunk::TextDelta { id, delta } | UiChunk::ReasoningDelta { id, delta } => {
                if let Some(UiPart::Text { text, .. } | UiPart::Reasoning { text, .. }) = self.part_mut(id) {
                    text.push_str(delta);
                }
            }
            UiChunk::TextEnd { id } | UiChunk::ReasoningEnd { id } => {
                if let Some(UiPart::Text { state, .. } | UiPart::Reasoning { state, .. }) = self.part_mut(id) {
                    *state = Some("done".into());
                }
                self.open.remove(id);
            }
            UiChunk::ToolInputAvailable {
                tool_call_id,
                tool_name,
                input,
            } => self.message.parts.push(UiPart::Tool(ToolPart {
                tool_name: tool_name.clone(),
                tool_call_id: tool_call_id.clone(),
                state: ToolState::InputAvailable,
                input: Some(input.clone()),
                output: None,
                error_text: None,
            })),
            UiChunk::ToolOutputAvailable {
                tool_call_id,
                output,
            } => {
                if let Some(tool) = self.tool_mut(tool_call_id) {
                    tool.state = ToolState::OutputAvailable;
                    tool.output = Some(output.clone());
                }
            }
            UiChunk::ToolOutputError {
                tool_call_id,
                error_text,
            } => {
                if let Some(tool) = self.tool_mut(tool_call_id) {
                    tool.state = ToolState::OutputError;
                    tool.error_text = Some(error_text.clone());
                }
            }
            UiChunk::Start { .. }
            | UiChunk::FinishStep
            | UiChunk::Finish
            | UiChunk::Error { .. } => {}
        }
    }

    /// True when nothing but step markers has been recorded.
    pub fn is_empty(&self) -> bool {
        self.message
            .parts
            .iter()
            .all(|p| matches!(p, UiPart::StepStart))
    }

    /// End chunks for every text or reasoning part still streaming, in part order.
    pub fn open_part_ends(&self) -> Vec<UiChunk> {
        let mut open: Vec<(&String, &usize)> = self.open.iter().collect();
        open.sort_by_key(|(_, index)| **index);
        open.into_iter()
            .filter_map(|(id, index)| match self.message.parts.get(*index)? {
                UiPart::Reasoning { .. } => Some(UiChunk::ReasoningEnd { id: id.clone() }),
                _ => Some(UiChunk::TextEnd { id: id.clone() }),
            })
            .collect()
    }

    pub fn finish(self) -> UiMessage {
        self.message
    }

    fn open_part(&mut self, id: &str, reasoning: bool) {
        let state = Some("streaming".to_string());
        let part = if reasoning {
            UiPart::Reasoning {
                text: String::new(),
                state,
            }
        } else {
            UiPart::Text {
                text: String::new(),
                state,
            }
        };
        self.open.insert(id.to_string(), self.message.parts.len());
        self.message.parts.push(part);
    }

    fn part_mut(&mut self, id: &str) -> Option<&mut UiPart> {
        let index = *self.open.get(id)?;
        self.message.parts.get_mut(index)
    }

    fn tool_mut(&mut self, call_id: &str) -> Option<&mut ToolPart> {
        self.message.parts.iter_mut().rev().find_map(|p| match p {
            UiPart::Tool(tool) if tool.tool_call_id == call_id => Some(tool),
            _ => None,
        })
    }
}
