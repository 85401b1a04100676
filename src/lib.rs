//! Holo: a digital twin site backend.
//!
//! A visitor chats with a persona whose identity and memories come from a
//! [CORE](https://core.heysol.ai) knowledge graph. The model answers in the persona's voice
//! and recalls facts through a `search` tool backed by CORE.
//!
//! # Modules
//!
//! - [`config`]: `holo.json` loading and validation, server settings
//! - [`core_api`]: HTTP client for the CORE API
//! - [`persona`]: time-boxed persona cache
//! - [`store`]: in-memory chat history
//! - [`ai`]: OpenAI-compatible streaming chat client and prompts
//! - [`chat`]: UI messages, stream protocol, search tool and the chat turn pipeline
//! - [`pages`]: page sources and metadata for the site
//! - [`server`]: axum routes and the listener

pub mod ai;
pub mod chat;
pub mod config;
pub mod core_api;
pub mod error;
pub mod pages;
pub mod persona;
pub mod server;
pub mod store;
