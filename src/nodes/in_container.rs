use super::pacing::{send_unless_stopped, stopped};
use crate::core::{DataFrame, ProcessingNode};
use crate::error::Error;
use crate::format::reader::expand_glob;
use crate::format::{ChannelNameResolver, ContainerReader};
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tokio::sync::mpsc;

/// `meta` settings shared by the source nodes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceMeta {
    #[serde(default)]
    pub sample_rate: Option<u32>,

    /// Overrides the channel names position by position
    #[serde(default)]
    pub channels: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct InContainerConfig {
    #[serde(default = "default_files")]
    files: String,
    #[serde(default)]
    meta: SourceMeta,
}

pub(crate) fn default_files() -> String {
    "data".to_string()
}

/// Share of `total` files done after file `index`, rounded to 2 decimals
pub fn percent_done(index: usize, total: usize) -> f64 {
    ((index + 1) as f64 / total as f64 * 100.0).round() / 100.0
}

/// Sends every matched recording as one frame.
///
/// Each frame carries the full matrix, its channel names, the per-sample
/// annotation (empty if the recording has none) and the share of files sent
/// so far. Files that cannot be opened still count towards the share.
pub struct InContainer {
    files: String,
    channels: Option<Vec<String>>,
    sequence: u64,
}

impl Default for InContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl InContainer {
    pub fn new() -> Self {
        Self {
            files: default_files(),
            channels: None,
            sequence: 0,
        }
    }

    /// Build the frame for file `index` of `total`
    pub fn load(&mut self, path: &Path, index: usize, total: usize) -> DataFrame {
        let recording = ContainerReader::open(path);
        let annot = recording.dense_annotation();
        let channels = ChannelNameResolver::resolve(
            recording.channels,
            recording.data.ncols(),
            self.channels.as_deref(),
        );

        self.sequence += 1;
        DataFrame::now(self.sequence)
            .with_ts(recording.data)
            .with_channels(channels)
            .with_annot(annot)
            .with_percent(percent_done(index, total))
    }
}

#[async_trait]
impl ProcessingNode for InContainer {
    async fn on_create(&mut self, config: Value) -> Result<()> {
        let config: InContainerConfig =
            serde_json::from_value(config).context("Invalid InContainer config")?;
        self.files = config.files;
        self.channels = config.meta.channels;
        Ok(())
    }

    async fn run(
        &mut self,
        rx: mpsc::Receiver<DataFrame>,
        tx: mpsc::Sender<DataFrame>,
    ) -> Result<()> {
        let files = expand_glob(&self.files)?;
        if files.is_empty() {
            return Err(Error::Configuration(format!("no files match {:?}", self.files)).into());
        }
        info!("Files found: {}", files.len());

        for (index, path) in files.iter().enumerate() {
            if stopped(&rx, &tx) {
                info!("Stopped before {}", path.display());
                break;
            }
            info!("Processing {}", path.display());

            let frame = self.load(path, index, files.len());
            if !send_unless_stopped(frame, &rx, &tx).await {
                break;
            }

            // Let other tasks run between files
            tokio::task::yield_now().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_done_rounds_to_two_decimals() {
        assert_eq!(percent_done(0, 3), 0.33);
        assert_eq!(percent_done(1, 3), 0.67);
        assert_eq!(percent_done(2, 3), 1.0);
    }
}
