//! Chat turns: UI message types, the stream protocol, the `search` tool and the pipeline.

pub mod message;
pub mod pipeline;
pub mod stream;
pub mod tools;

pub use message::{validate_messages, Role, ToolPart, ToolState, UiMessage, UiPart, ValidationError};
pub use pipeline::{ChatError, ChatPipeline, ChatRequest, ChatTurn, MAX_DURATION, MAX_STEPS};
pub use stream::{MessageBuilder, UiChunk};
pub use tools::{SearchParams, SearchTool, NO_MEMORY_FOUND};
