//! Remote image-generation nodes: credential-backed HTTPS calls to the
//! captioning, storyboard and generation endpoints, and conversion between
//! their base64 payloads and host image tensors.

pub mod assembler;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod nodes;
pub mod progress;

pub use assembler::GenerationResult;
pub use client::RemoteClient;
pub use config::ServiceConfig;
pub use error::{DecodeError, FailureKind};
pub use nodes::{default_node_registry, ImageFxNode, WhiskNode, WhiskOutput, WhiskPromptsNode};
