use super::in_container::{default_files, SourceMeta};
use super::pacing::{pace, send_unless_stopped, stopped};
use crate::core::{DataFrame, ProcessingNode};
use crate::error::Error;
use crate::format::reader::expand_glob;
use crate::format::{ChannelNameResolver, ContainerReader};
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use ndarray::{s, Array2, ArrayView2};
use rand::seq::IndexedRandom;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Debug, Deserialize)]
struct InPlaybackConfig {
    #[serde(default = "default_files")]
    files: String,
    meta: SourceMeta,
    #[serde(default = "default_loop", rename = "loop")]
    loop_playback: bool,
    #[serde(default = "default_emit_at_once")]
    emit_at_once: usize,
}

fn default_loop() -> bool {
    true
}

fn default_emit_at_once() -> usize {
    10
}

/// One slice of a recording
pub struct Batch<'a> {
    pub ts: ArrayView2<'a, f64>,
    pub annot: &'a [String],
}

/// Consecutive slices of `size` samples; the last one may be shorter
pub fn batches<'a>(
    data: &'a Array2<f64>,
    annot: &'a [String],
    size: usize,
) -> impl Iterator<Item = Batch<'a>> + 'a {
    let n_samples = data.nrows();
    (0..n_samples).step_by(size.max(1)).map(move |start| {
        let end = (start + size).min(n_samples);
        Batch {
            ts: data.slice(s![start..end, ..]),
            annot: &annot[start.min(annot.len())..end.min(annot.len())],
        }
    })
}

/// Plays back randomly chosen recordings in real time.
///
/// Each frame carries `emit_at_once` samples and frames are spaced so that
/// the stream runs at `meta.sample_rate` samples per second. Channel names
/// go out once, with the first frame of the node's lifetime.
pub struct InPlayback {
    files: String,
    channels: Option<Vec<String>>,
    sample_rate: u32,
    emit_at_once: usize,
    loop_playback: bool,
    channels_sent: bool,
    sequence: u64,
}

impl Default for InPlayback {
    fn default() -> Self {
        Self::new()
    }
}

impl InPlayback {
    pub fn new() -> Self {
        Self {
            files: default_files(),
            channels: None,
            sample_rate: 1000,
            emit_at_once: default_emit_at_once(),
            loop_playback: default_loop(),
            channels_sent: false,
            sequence: 0,
        }
    }

    /// Time between two frames
    pub fn batch_interval(&self) -> Duration {
        Duration::from_secs_f64(self.emit_at_once as f64 / self.sample_rate as f64)
    }

    pub fn emit_at_once(&self) -> usize {
        self.emit_at_once
    }

    fn next_frame(&mut self) -> DataFrame {
        self.sequence += 1;
        DataFrame::now(self.sequence)
    }

    fn pick(files: &[PathBuf]) -> Option<PathBuf> {
        let mut rng = rand::rng();
        files.choose(&mut rng).cloned()
    }
}

#[async_trait]
impl ProcessingNode for InPlayback {
    async fn on_create(&mut self, config: Value) -> Result<()> {
        let config: InPlaybackConfig =
            serde_json::from_value(config).context("Invalid InPlayback config")?;

        self.sample_rate = match config.meta.sample_rate {
            Some(rate) if rate > 0 => rate,
            _ => {
                return Err(Error::Configuration(
                    "meta.sample_rate must be a positive integer".to_string(),
                )
                .into())
            }
        };
        if config.emit_at_once == 0 {
            return Err(Error::Configuration("emit_at_once must be at least 1".to_string()).into());
        }

        self.files = config.files;
        self.channels = config.meta.channels;
        self.emit_at_once = config.emit_at_once;
        self.loop_playback = config.loop_playback;
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

        let interval = self.batch_interval();
        let mut last_emit = Instant::now();
        let mut round = 0u64;

        loop {
            let Some(path) = Self::pick(&files) else {
                break;
            };
            info!("Playback round {}: {}", round, path.display());

            let recording = ContainerReader::open(&path);
            let annot = recording.dense_annotation();
            let channels = ChannelNameResolver::resolve(
                recording.channels.clone(),
                recording.n_channels(),
                self.channels.as_deref(),
            );
            let mut pending_channels = if self.channels_sent {
                None
            } else {
                self.channels_sent = true;
                Some(channels)
            };

            for batch in batches(&recording.data, &annot, self.emit_at_once) {
                let mut frame = self.next_frame().with_ts(batch.ts.to_owned());
                frame.channels = pending_channels.take();
                if !batch.annot.is_empty() {
                    frame.annot = Some(batch.annot.to_vec());
                }

                if !pace(last_emit + interval, &rx, &tx).await {
                    return Ok(());
                }
                last_emit = Instant::now();

                if !send_unless_stopped(frame, &rx, &tx).await {
                    return Ok(());
                }
            }

            // First recording had no samples; channel names still go out once
            if let Some(channels) = pending_channels {
                let frame = self.next_frame().with_channels(channels);
                if !send_unless_stopped(frame, &rx, &tx).await {
                    return Ok(());
                }
            }

            round += 1;
            if !self.loop_playback || stopped(&rx, &tx) {
                break;
            }
            tokio::task::yield_now().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batches_last_one_shorter() {
        let data = Array2::from_shape_fn((7, 2), |(r, c)| (r * 2 + c) as f64);
        let annot: Vec<String> = (0..7).map(|i| i.to_string()).collect();

        let sizes: Vec<(usize, usize)> = batches(&data, &annot, 3)
            .map(|b| (b.ts.nrows(), b.annot.len()))
            .collect();
        assert_eq!(sizes, vec![(3, 3), (3, 3), (1, 1)]);
    }

    #[test]
    fn test_batches_without_annotation() {
        let data = Array2::<f64>::zeros((4, 1));
        let all: Vec<usize> = batches(&data, &[], 2).map(|b| b.annot.len()).collect();
        assert_eq!(all, vec![0, 0]);
    }

    #[test]
    fn test_batches_of_empty_matrix() {
        let data = Array2::<f64>::zeros((0, 0));
        assert_eq!(batches(&data, &[], 5).count(), 0);
    }

    #[test]
    fn test_batch_interval() {
        let mut node = InPlayback::new();
        node.sample_rate = 100;
        node.emit_at_once = 10;
        assert_eq!(node.batch_interval(), Duration::from_millis(100));
    }
}
