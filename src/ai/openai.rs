//! OpenAI-compatible chat completions client.
//!
//! Works against any server exposing `POST {base_url}/chat/completions`: OpenAI, Ollama,
//! vLLM, LM Studio, llama.cpp and the like. Streaming responses are server-sent events whose
//! tool-call arguments arrive in fragments; [`ToolCallAccumulator`] reassembles them.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    is_reasoning_model, AiError, ChatModel, FinishReason, ModelEvent, ModelMessage, ModelRequest,
    ModelStream, ToolCall, ToolDefinition,
};
use crate::config::ProviderConnection;

pub struct OpenAiCompatible {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatible {
    pub fn new(http: reqwest::Client, provider: &ProviderConnection) -> Self {
        Self {
            http,
            base_url: provider.base_url.trim_end_matches('/').to_string(),
            api_key: provider.api_key.clone(),
            model: provider.model.clone(),
        }
    }

    fn request_body(&self, messages: &[ModelMessage], tools: &[ToolDefinition], stream: bool) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages.iter().map(wire_message).collect::<Vec<_>>(),
            "stream": stream,
        });
        if !tools.is_empty() {
            body["tools"] = tools.iter().map(wire_tool).collect::<Vec<_>>().into();
        }
        if is_reasoning_model(&self.model) {
            body["reasoning_effort"] = "low".into();
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response, AiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut req = self.http.post(&url).json(body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status { status, body });
        }
        Ok(response)
    }
}

fn wire_message(message: &ModelMessage) -> Value {
    match message {
        ModelMessage::System(content) => json!({ "role": "system", "content": content }),
        ModelMessage::User(content) => json!({ "role": "user", "content": content }),
        ModelMessage::Assistant { text, tool_calls } => {
            let mut msg = json!({ "role": "assistant", "content": text });
            if !tool_calls.is_empty() {
                msg["tool_calls"] = tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": { "name": call.name, "arguments": call.arguments },
                        })
                    })
                    .collect::<Vec<_>>()
                    .into();
            }
            msg
        }
        ModelMessage::Tool { call_id, content } => {
            json!({ "role": "tool", "tool_call_id": call_id, "content": content })
        }
    }
}

fn wire_tool(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

// ── Streaming wire types ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<Delta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
    reasoning_content: Option<String>,
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: u32,
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// Splits a byte stream into SSE `data` payloads.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed bytes; returns the payloads of every event completed by them.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(rest) = line.strip_prefix("data:") {
                self.data.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
            }
        }

        events
    }

    /// Flush an event left open when the stream ended without a blank line.
    pub(crate) fn finish(&mut self) -> Option<String> {
        if !self.buf.is_empty() {
            self.buf.push(b'\n');
            let mut tail = self.push(&[]);
            if let Some(event) = tail.pop() {
                return Some(event);
            }
        }
        if self.data.is_empty() {
            None
        } else {
            let event = self.data.join("\n");
            self.data.clear();
            Some(event)
        }
    }
}

#[derive(Debug, Default)]
struct PartialCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Collects tool-call fragments keyed by their `index`.
#[derive(Debug, Default)]
pub(crate) struct ToolCallAccumulator {
    calls: BTreeMap<u32, PartialCall>,
}

impl ToolCallAccumulator {
    fn push(&mut self, delta: ToolCallDelta) {
        let call = self.calls.entry(delta.index).or_default();
        if let Some(id) = delta.id.filter(|id| !id.is_empty()) {
            call.id = Some(id);
        }
        if let Some(function) = delta.function {
            if let Some(name) = function.name {
                call.name.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                call.arguments.push_str(&arguments);
            }
        }
    }

    pub(crate) fn finish(self) -> Vec<ToolCall> {
        self.calls
            .into_iter()
            .filter(|(_, call)| !call.name.is_empty())
            .map(|(index, call)| ToolCall {
                id: call.id.unwrap_or_else(|| format!("call_{index}")),
                name: call.name,
                arguments: if call.arguments.is_empty() {
                    "{}".to_string()
                } else {
                    call.arguments
                },
            })
            .collect()
    }
}

/// Translate one decoded SSE payload into model events. Returns `true` on `[DONE]`.
fn handle_payload(
    data: &str,
    calls: &mut ToolCallAccumulator,
    finish: &mut Option<FinishReason>,
    out: &mut Vec<ModelEvent>,
) -> Result<bool, AiError> {
    if data == "[DONE]" {
        return Ok(true);
    }
    let chunk: StreamChunk =
        serde_json::from_str(data).map_err(|e| AiError::Parse(format!("{e}: {data}")))?;

    for choice in chunk.choices {
        let delta = choice.delta.unwrap_or_default();
        if let Some(reasoning) = delta.reasoning_content.filter(|s| !s.is_empty()) {
            out.push(ModelEvent::ReasoningDelta(reasoning));
        }
        if let Some(text) = delta.content.filter(|s| !s.is_empty()) {
            out.push(ModelEvent::TextDelta(text));
        }
        for delta in delta.tool_calls.into_iter().flatten() {
            calls.push(delta);
        }
        if let Some(reason) = choice.finish_reason {
            *finish = Some(FinishReason::from(reason.as_str()));
        }
    }
    Ok(false)
}

#[async_trait]
impl ChatModel for OpenAiCompatible {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn stream(&self, request: &ModelRequest) -> Result<ModelStream, AiError> {
        let body = self.request_body(&request.messages, &request.tools, true);
        let response = self.send(&body).await?;
        let mut bytes = response.bytes_stream().boxed();

        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::default();
            let mut calls = ToolCallAccumulator::default();
            let mut finish = None;
            let mut done = false;

            while !done {
                let Some(chunk) = bytes.next().await else {
                    break;
                };
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(AiError::from(e));
                        return;
                    }
                };

                let mut events = Vec::new();
                let mut failure = None;
                for data in decoder.push(&chunk) {
                    match handle_payload(&data, &mut calls, &mut finish, &mut events) {
                        Ok(true) => {
                            done = true;
                            break;
                        }
                        Ok(false) => {}
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }
                for event in events {
                    yield Ok(event);
                }
                if let Some(e) = failure {
                    yield Err(e);
                    return;
                }
            }

            if !done {
                if let Some(data) = decoder.finish() {
                    let mut events = Vec::new();
                    if let Err(e) = handle_payload(&data, &mut calls, &mut finish, &mut events) {
                        yield Err(e);
                        return;
                    }
                    for event in events {
                        yield Ok(event);
                    }
                }
            }

            for call in calls.finish() {
                yield Ok(ModelEvent::ToolCall(call));
            }
            yield Ok(ModelEvent::Finish(finish.unwrap_or(FinishReason::Stop)));
        };

        Ok(Box::pin(stream))
    }

    async fn complete(&self, messages: &[ModelMessage]) -> Result<String, AiError> {
        let body = self.request_body(messages, &[], false);
        let response: CompletionResponse = self
            .send(&body)
            .await?
            .json()
            .await
            .map_err(|e| AiError::Parse(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AiError::Parse("no content in response".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(model: &str) -> ProviderConnection {
        ProviderConnection {
            name: "openai".into(),
            model: model.into(),
            base_url: "http://localhost:1/v1/".into(),
            api_key: None,
        }
    }

    #[test]
    fn decoder_handles_split_events() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"a\"").is_empty());
        let events = decoder.push(b":1}\n\ndata: [DONE]\r\n\r\n");
        assert_eq!(events, vec!["{\"a\":1}".to_string(), "[DONE]".to_string()]);
    }

    #[test]
    fn decoder_ignores_comments_and_flushes_tail() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b": keep-alive\n\n").is_empty());
        assert!(decoder.push(b"data: tail").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("tail"));
    }

    #[test]
    fn tool_call_fragments_are_reassembled() {
        let mut calls = ToolCallAccumulator::default();
        let mut finish = None;
        let mut events = Vec::new();
        let payloads = [
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","function":{"name":"search","arguments":""}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"query\":"}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"rust\"}"}}]},"finish_reason":"tool_calls"}]}"#,
        ];
        for p in payloads {
            assert!(!handle_payload(p, &mut calls, &mut finish, &mut events).unwrap());
        }

        assert!(events.is_empty());
        assert_eq!(finish, Some(FinishReason::ToolCalls));
        let calls = calls.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_a");
        assert_eq!(calls[0].name, "search");
        assert_eq!(calls[0].arguments, r#"{"query":"rust"}"#);
    }

    #[test]
    fn text_and_reasoning_deltas() {
        let mut calls = ToolCallAccumulator::default();
        let mut finish = None;
        let mut events = Vec::new();
        let payload = r#"{"choices":[{"delta":{"reasoning_content":"hmm","content":"Hi"},"finish_reason":null}]}"#;
        handle_payload(payload, &mut calls, &mut finish, &mut events).unwrap();
        assert_eq!(
            events,
            vec![
                ModelEvent::ReasoningDelta("hmm".into()),
                ModelEvent::TextDelta("Hi".into()),
            ]
        );
        assert!(handle_payload("[DONE]", &mut calls, &mut finish, &mut events).unwrap());
    }

    #[test]
    fn request_body_shape() {
        let client = OpenAiCompatible::new(reqwest::Client::new(), &provider("gpt-5.1-2025-11-13"));
        assert_eq!(client.base_url, "http://localhost:1/v1");

        let messages = vec![
            ModelMessage::System("sys".into()),
            ModelMessage::Assistant {
                text: None,
                tool_calls: vec![ToolCall {
                    id: "c1".into(),
                    name: "search".into(),
                    arguments: "{}".into(),
                }],
            },
            ModelMessage::Tool {
                call_id: "c1".into(),
                content: "result".into(),
            },
        ];
        let tools = vec![ToolDefinition {
            name: "search".into(),
            description: "d".into(),
            parameters: json!({"type": "object"}),
        }];
        let body = client.request_body(&messages, &tools, true);

        assert_eq!(body["stream"], true);
        assert_eq!(body["reasoning_effort"], "low");
        assert_eq!(body["messages"][1]["tool_calls"][0]["function"]["name"], "search");
        assert_eq!(body["messages"][2]["tool_call_id"], "c1");
        assert_eq!(body["tools"][0]["function"]["parameters"]["type"], "object");
    }
}
