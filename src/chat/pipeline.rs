//! One chat turn, from request body to streamed reply and saved history.
//!
//! Everything that can fail before the model is called (config, validation, persona,
//! provider probe) fails the request. After that the turn runs in a detached task that
//! always drives the model to completion, forwards chunks to the client while it is still
//! listening, and saves the conversation when it is done.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::ai::{self, prompts, AiError, ChatModel, ModelEvent, ModelMessage, ModelRequest, ProviderError};
use crate::config::{ConfigError, HoloConfig};
use crate::core_api::CoreClient;
use crate::persona::{PersonaCache, PersonaFetchError};
use crate::store::ChatStore;

use super::message::{to_model_messages, validate_messages, UiMessage, ValidationError};
use super::stream::{MessageBuilder, UiChunk};
use super::tools::{SearchTool, ToolOutcome};

/// Model calls allowed per turn.
pub const MAX_STEPS: usize = 10;

/// Wall-clock limit for one turn, including tool calls.
pub const MAX_DURATION: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Value>,
    pub id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Persona(#[from] PersonaFetchError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// A running turn: the chunk stream for the client and the background task producing it.
pub struct ChatTurn {
    pub chunks: UnboundedReceiverStream<UiChunk>,
    pub task: JoinHandle<()>,
}

#[derive(Clone)]
pub struct ChatPipeline {
    config_dir: PathBuf,
    http: reqwest::Client,
    persona: Arc<PersonaCache>,
    chats: Arc<ChatStore>,
    max_duration: Duration,
}

impl ChatPipeline {
    pub fn new(
        config_dir: PathBuf,
        http: reqwest::Client,
        persona: Arc<PersonaCache>,
        chats: Arc<ChatStore>,
    ) -> Self {
        Self {
            config_dir,
            http,
            persona,
            chats,
            max_duration: MAX_DURATION,
        }
    }

    pub fn chats(&self) -> &Arc<ChatStore> {
        &self.chats
    }

    /// Prepare a turn and start it in the background.
    pub async fn start(&self, request: ChatRequest) -> Result<ChatTurn, ChatError> {
        if request.id.trim().is_empty() {
            return Err(ChatError::BadRequest("chat id must not be empty".into()));
        }

        let config = HoloConfig::load(&self.config_dir)?;
        let core_conn = config.core_connection()?;
        let provider_conn = config.provider_connection()?;

        // Structural checks run before anything leaves the process.
        let incoming = validate_messages(&request.messages)?;
        let mut messages = self.chats.load(&request.id);
        let previous = messages.len();
        messages.extend(incoming);
        if messages.is_empty() {
            return Err(ValidationError("messages must not be empty".into()).into());
        }
        info!(chat_id = %request.id, previous, total = messages.len(), "chat turn");

        let core = CoreClient::from_connection(self.http.clone(), &core_conn);
        let persona = self.persona.fetch(&core).await?;
        let model = ai::create_client(self.http.clone(), &provider_conn).await?;
        let search = SearchTool::new(core, core_conn.labels);

        let mut model_messages = vec![ModelMessage::System(prompts::system_prompt(
            &persona,
            chrono::Local::now().date_naive(),
        ))];
        model_messages.extend(to_model_messages(&messages));

        let (tx, rx) = mpsc::unbounded_channel();
        let turn = Turn {
            chat_id: request.id,
            history: messages,
            model_messages,
            chats: Arc::clone(&self.chats),
            max_duration: self.max_duration,
        };
        let task = tokio::spawn(turn.run(Arc::new(model), search, tx));

        Ok(ChatTurn {
            chunks: UnboundedReceiverStream::new(rx),
            task,
        })
    }
}

/// State moved into the background task.
pub struct Turn {
    pub chat_id: String,
    pub history: Vec<UiMessage>,
    pub model_messages: Vec<ModelMessage>,
    pub chats: Arc<ChatStore>,
    pub max_duration: Duration,
}

impl Turn {
    /// Drive the model loop, then save `history + reply`.
    pub async fn run(
        self,
        model: Arc<dyn ChatModel>,
        search: SearchTool,
        tx: mpsc::UnboundedSender<UiChunk>,
    ) {
        let message_id = Uuid::now_v7().to_string();
        let mut out = Emitter::new(tx, &message_id);
        out.emit(UiChunk::Start { message_id });

        let outcome = tokio::time::timeout(
            self.max_duration,
            run_steps(model.as_ref(), &search, self.model_messages, &mut out),
        )
        .await;

        match outcome {
            Ok(Ok(steps)) => {
                info!(chat_id = %self.chat_id, model = model.model_id(), steps, "chat turn finished");
                out.emit(UiChunk::Finish);
            }
            Ok(Err(e)) => {
                error!(chat_id = %self.chat_id, error = %e, "model stream failed");
                out.close_open_parts();
                out.emit(UiChunk::Error {
                    error_text: e.to_string(),
                });
            }
            Err(_) => {
                warn!(chat_id = %self.chat_id, limit_ms = self.max_duration.as_millis() as u64, "chat turn timed out");
                out.close_open_parts();
                out.emit(UiChunk::Error {
                    error_text: "response took too long".into(),
                });
            }
        }

        let mut history = self.history;
        history.extend(out.take_reply());
        self.chats.save(&self.chat_id, history);
        // Closing the channel ends the client's stream, so this happens after the save.
        drop(out);
    }
}

/// Forwards chunks to the client and folds them into the reply.
struct Emitter {
    tx: mpsc::UnboundedSender<UiChunk>,
    builder: MessageBuilder,
    client_gone: bool,
}

impl Emitter {
    fn new(tx: mpsc::UnboundedSender<UiChunk>, message_id: &str) -> Self {
        Self {
            tx,
            builder: MessageBuilder::new(message_id),
            client_gone: false,
        }
    }

    fn emit(&mut self, chunk: UiChunk) {
        self.builder.apply(&chunk);
        if !self.client_gone && self.tx.send(chunk).is_err() {
            self.client_gone = true;
            debug!("client disconnected; finishing turn without it");
        }
    }

    /// Finish parts the interrupted step left streaming.
    fn close_open_parts(&mut self) {
        for end in self.builder.open_part_ends() {
            self.emit(end);
        }
    }

    fn take_reply(&mut self) -> Option<UiMessage> {
        let builder = std::mem::replace(&mut self.builder, MessageBuilder::new(""));
        (!builder.is_empty()).then(|| builder.finish())
    }
}

/// The tool loop. Returns the number of model calls made.
async fn run_steps(
    model: &dyn ChatModel,
    search: &SearchTool,
    mut messages: Vec<ModelMessage>,
    out: &mut Emitter,
) -> Result<usize, AiError> {
    let tools = vec![SearchTool::definition()];

    for step in 1..=MAX_STEPS {
        out.emit(UiChunk::StartStep);
        let request = ModelRequest {
            messages: messages.clone(),
            tools: tools.clone(),
        };
        let mut events = model.stream(&request).await?;

        let text_id = format!("text-{step}");
        let reasoning_id = format!("reasoning-{step}");
        let mut text = String::new();
        let mut reasoning_open = false;
        let mut calls = Vec::new();

        while let Some(event) = events.next().await {
            match event? {
                ModelEvent::TextDelta(delta) => {
                    if text.is_empty() {
                        out.emit(UiChunk::TextStart {
                            id: text_id.clone(),
                        });
                    }
                    text.push_str(&delta);
                    out.emit(UiChunk::TextDelta {
                        id: text_id.clone(),
                        delta,
                    });
                }
                ModelEvent::ReasoningDelta(delta) => {
                    if !reasoning_open {
                        reasoning_open = true;
                        out.emit(UiChunk::ReasoningStart {
                            id: reasoning_id.clone(),
                        });
                    }
                    out.emit(UiChunk::ReasoningDelta {
                        id: reasoning_id.clone(),
                        delta,
                    });
                }
                ModelEvent::ToolCall(call) => calls.push(call),
                ModelEvent::Finish(reason) => debug!(step, reason = reason.as_str(), "model step finished"),
            }
        }

        if reasoning_open {
            out.emit(UiChunk::ReasoningEnd { id: reasoning_id });
        }
        if !text.is_empty() {
            out.emit(UiChunk::TextEnd { id: text_id });
        }

        if calls.is_empty() {
            out.emit(UiChunk::FinishStep);
            return Ok(step);
        }

        messages.push(ModelMessage::Assistant {
            text: (!text.is_empty()).then_some(text),
            tool_calls: calls.clone(),
        });

        for call in calls {
            let input = serde_json::from_str(&call.arguments)
                .unwrap_or_else(|_| Value::String(call.arguments.clone()));
            out.emit(UiChunk::ToolInputAvailable {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                input,
            });

            let content = match search.call(&call).await {
                ToolOutcome::Output(output) => {
                    out.emit(UiChunk::ToolOutputAvailable {
                        tool_call_id: call.id.clone(),
                        output: Value::String(output.clone()),
                    });
                    output
                }
                ToolOutcome::Error(error_text) => {
                    out.emit(UiChunk::ToolOutputError {
                        tool_call_id: call.id.clone(),
                        error_text: error_text.clone(),
                    });
                    error_text
                }
            };
            messages.push(ModelMessage::Tool {
                call_id: call.id,
                content,
            });
        }

        out.emit(UiChunk::FinishStep);
    }

    warn!(max_steps = MAX_STEPS, "step limit reached");
    Ok(MAX_STEPS)
}
