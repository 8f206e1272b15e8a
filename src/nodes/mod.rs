pub mod annotate_channel;
pub mod in_container;
pub mod in_playback;
pub mod out_container;
pub mod pacing;

pub use annotate_channel::AnnotateChannel;
pub use in_container::{InContainer, SourceMeta};
pub use in_playback::InPlayback;
pub use out_container::{OutContainer, SinkState};

use crate::core::ProcessingNode;
use anyhow::{anyhow, Result};
use serde_json::Value;

/// Instantiate a node by type name and apply its config
pub async fn create_node(node_type: &str, config: Value) -> Result<Box<dyn ProcessingNode>> {
    let mut node: Box<dyn ProcessingNode> = match node_type {
        "InContainer" => Box::new(InContainer::new()),
        "InPlayback" => Box::new(InPlayback::new()),
        "OutContainer" => Box::new(OutContainer::new()),
        "AnnotateChannel" => Box::new(AnnotateChannel::new()),
        _ => return Err(anyhow!("Unknown node type: {}", node_type)),
    };
    node.on_create(config).await?;
    Ok(node)
}
