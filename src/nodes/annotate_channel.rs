use crate::core::{DataFrame, ProcessingNode};
use crate::error::Error;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use ndarray::Axis;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct AnnotateChannelConfig {
    channel_name: String,
    targets: Vec<String>,
}

/// Turns one channel of the time series into an annotation.
///
/// The named channel is removed from `ts` and `channels`; each sample is
/// labelled `targets[1]` when the channel value is positive and
/// `targets[0]` otherwise.
pub struct AnnotateChannel {
    channel_name: String,
    inactive: String,
    active: String,
    /// Column of the annotated channel, once channel names are known
    index: Option<Option<usize>>,
    sequence: u64,
}

impl Default for AnnotateChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotateChannel {
    pub fn new() -> Self {
        Self {
            channel_name: String::new(),
            inactive: String::new(),
            active: String::new(),
            index: None,
            sequence: 0,
        }
    }

    fn kept_columns(&self, n_columns: usize, index: Option<usize>) -> Vec<usize> {
        (0..n_columns).filter(|&c| Some(c) != index).collect()
    }
}

#[async_trait]
impl ProcessingNode for AnnotateChannel {
    async fn on_create(&mut self, config: Value) -> Result<()> {
        let config: AnnotateChannelConfig =
            serde_json::from_value(config).context("Invalid AnnotateChannel config")?;

        let [inactive, active]: [String; 2] = config.targets.try_into().map_err(|t: Vec<String>| {
            Error::Configuration(format!("targets needs exactly 2 labels, got {}", t.len()))
        })?;

        self.channel_name = config.channel_name;
        self.inactive = inactive;
        self.active = active;
        Ok(())
    }

    async fn process(&mut self, input: DataFrame) -> Result<Option<DataFrame>> {
        self.sequence += 1;
        let mut output = DataFrame::new(input.timestamp, self.sequence);

        if let Some(channels) = input.channels {
            let index = channels.iter().position(|c| *c == self.channel_name);
            if index.is_none() {
                warn!("Channel {:?} not found in {:?}", self.channel_name, channels);
            }
            self.index = Some(index);
            output.channels = Some(
                channels
                    .into_iter()
                    .enumerate()
                    .filter(|(i, _)| Some(*i) != index)
                    .map(|(_, name)| name)
                    .collect(),
            );
        }

        if let Some(ts) = input.ts {
            let Some(index) = self.index else {
                debug!("Dropping batch, channel names not known yet");
                return Ok((!output.is_empty()).then_some(output));
            };
            let index = index.filter(|&i| i < ts.ncols());

            let labels = match index {
                Some(i) => ts
                    .column(i)
                    .iter()
                    .map(|&v| if v > 0.0 { self.active.clone() } else { self.inactive.clone() })
                    .collect(),
                None => vec![self.inactive.clone(); ts.nrows()],
            };
            let kept = self.kept_columns(ts.ncols(), index);

            output.ts = Some(ts.select(Axis(1), &kept));
            output.annot = Some(labels);
        }

        Ok((!output.is_empty()).then_some(output))
    }
}
