//! The concrete nodes and the registry the host loads them from.

use std::sync::Arc;

use anyhow::{Context, Result};
use fxlab_contracts::events::EventLog;
use fxlab_contracts::load_credentials;
use fxlab_contracts::nodes::{InputKind, NodeRegistry};
use fxlab_contracts::AspectRatio;

use crate::client::RemoteClient;
use crate::config::ServiceConfig;

mod imagefx;
mod prompts;
mod whisk;

pub use imagefx::{ImageFxNode, IMAGEFX_NODE};
pub use prompts::{WhiskPromptsNode, WHISK_PROMPTS_NODE};
pub use whisk::{WhiskNode, WhiskOutput, WHISK_NODE};

/// Loads credentials once and registers every node against one shared client.
///
/// A missing or unreadable credential file fails here, before any node runs.
pub fn default_node_registry(config: &ServiceConfig) -> Result<NodeRegistry> {
    let credentials = load_credentials(&config.credentials_path).with_context(|| {
        format!(
            "failed to load credentials from {}",
            config.credentials_path.display()
        )
    })?;
    let client = RemoteClient::new(config.clone(), Arc::new(credentials))?;
    let events = match &config.events_path {
        Some(path) => EventLog::open(path.clone()),
        None => EventLog::disabled(),
    };
    Ok(node_registry(client, events))
}

pub fn node_registry(client: RemoteClient, events: EventLog) -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    registry.register(ImageFxNode::new(client.clone(), events.clone()));
    registry.register(WhiskNode::new(client, events));
    registry.register(WhiskPromptsNode);
    registry
}

fn prompt_kind() -> InputKind {
    InputKind::String { multiline: true }
}

fn aspect_ratio_kind() -> InputKind {
    InputKind::Choice {
        options: AspectRatio::labels(),
        default: AspectRatio::default().label(),
    }
}

/// Host integers arrive as `i64`; the declared bounds keep this in range.
fn image_count(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(1)
}
