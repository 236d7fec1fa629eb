//! # grokcli core
//!
//! Domain types, traits, and error definitions for the grokcli terminal agent.
//! This crate has no transport or runtime dependencies; it defines the model
//! the provider, tool and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the agent loop is a trait here:
//! - [`Provider`] is the raw chat-completion transport
//! - [`Tool`] is one named, schema-described local operation
//!
//! Implementations live in their respective crates, so the loop can be tested
//! against scripted providers and temporary directories.

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{ProviderError, ToolError};
pub use message::{Conversation, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult, ToolStatus};
