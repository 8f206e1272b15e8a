use crate::core::{DataFrame, ProcessingNode};
use crate::format::meta::{self, MetaRecord};
use crate::format::reader::recording_paths;
use crate::format::{AnnotationWriter, ChannelNameResolver, DatasetWriter, RunEncoder};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use ndarray::{Array2, ArrayView2, Axis};
use serde::Deserialize;
use serde_json::Value;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Buffered batches are written out once the buffer grows beyond this
pub const FLUSH_THRESHOLD: usize = 100;

#[derive(Debug, Deserialize)]
struct OutContainerConfig {
    folder: PathBuf,
}

/// Sink lifecycle. A closed sink is never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Idle,
    Open,
    Closed,
}

struct OpenFiles {
    /// Created on start, formatted once the channel count is known
    data_file: Option<File>,
    dataset: Option<DatasetWriter>,
    annotation: AnnotationWriter,
}

/// Persists a stream into a container, an annotation table and a metadata file.
///
/// All three files share one timestamped base name inside `folder`.
pub struct OutContainer {
    folder: PathBuf,
    base: PathBuf,
    state: SinkState,
    files: Option<OpenFiles>,
    channels: Option<Vec<String>>,
    buffer: Vec<Array2<f64>>,
    encoder: RunEncoder,
}

impl Default for OutContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl OutContainer {
    pub fn new() -> Self {
        Self {
            folder: PathBuf::new(),
            base: PathBuf::new(),
            state: SinkState::Idle,
            files: None,
            channels: None,
            buffer: Vec::new(),
            encoder: RunEncoder::new(),
        }
    }

    pub fn state(&self) -> SinkState {
        self.state
    }

    /// Base path without extension, shared by all output files
    pub fn base_path(&self) -> &Path {
        &self.base
    }

    pub fn data_path(&self) -> PathBuf {
        recording_paths(&self.base).0
    }

    pub fn annotation_path(&self) -> PathBuf {
        recording_paths(&self.base).1
    }

    pub fn meta_path(&self) -> PathBuf {
        recording_paths(&self.base).2
    }

    /// Batches waiting for the next flush
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn timestamped_base(folder: &Path) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y-%m-%d %H-%M-%S%.6f");
        folder.join(stamp.to_string())
    }

    /// Create the container and annotation files
    fn open(&mut self) -> Result<()> {
        let mut suffix = 1;
        while self.data_path().exists() {
            let mut name = Self::timestamped_base(&self.folder).into_os_string();
            name.push(format!("-{}", suffix));
            self.base = PathBuf::from(name);
            suffix += 1;
        }

        let data_path = self.data_path();
        let data_file = File::create(&data_path)
            .with_context(|| format!("Failed to create {:?}", data_path))?;
        let annotation = AnnotationWriter::create(self.annotation_path())?;

        self.files = Some(OpenFiles {
            data_file: Some(data_file),
            dataset: None,
            annotation,
        });
        self.state = SinkState::Open;
        info!("Created files {}", self.base.display());
        Ok(())
    }

    /// Flush the open run and buffered data, then close both files
    fn close(&mut self) -> Result<()> {
        self.flush_buffer()?;

        let Some(mut files) = self.files.take() else {
            bail!("Sink has no open files");
        };
        if let Some(run) = self.encoder.finish() {
            files.annotation.write_run(&run)?;
        }
        files.annotation.close()?;

        if let Some(dataset) = files.dataset {
            let rows = dataset.len();
            dataset.finish()?;
            info!("Stopped writing out and closed files ({} samples)", rows);
        } else {
            warn!("Closed {} without any data", self.base.display());
        }
        self.state = SinkState::Closed;
        Ok(())
    }

    fn open_files(&mut self) -> Result<&mut OpenFiles> {
        let state = self.state;
        self.files
            .as_mut()
            .ok_or_else(|| anyhow!("Sink is not open (state {:?})", state))
    }

    fn ensure_dataset(&mut self, channels: &[String]) -> Result<()> {
        let data_path = self.data_path();
        let files = self.open_files()?;
        if files.dataset.is_none() {
            let file = files
                .data_file
                .take()
                .ok_or_else(|| anyhow!("Container file already consumed"))?;
            files.dataset = Some(DatasetWriter::new(file, data_path, channels)?);
            debug!("Created dataset with {} channels", channels.len());
        }
        Ok(())
    }

    /// Record channel names, persist them, and create the dataset if needed
    pub fn on_channel_names(&mut self, names: Vec<String>) -> Result<()> {
        meta::store_channels(&self.meta_path(), &names)?;
        if self.state == SinkState::Open {
            self.ensure_dataset(&names)?;
        }
        self.channels = Some(names);
        Ok(())
    }

    /// Buffer one batch, flushing when the buffer exceeds [`FLUSH_THRESHOLD`]
    pub fn on_data_batch(&mut self, batch: Array2<f64>) -> Result<()> {
        self.buffer.push(batch);
        if self.buffer.len() > FLUSH_THRESHOLD {
            self.flush_buffer()?;
        }
        Ok(())
    }

    /// Feed labels into the run encoder; every closed run is written at once
    pub fn on_annotation_batch(&mut self, labels: &[String]) -> Result<()> {
        let Some(files) = self.files.as_mut() else {
            bail!("Sink is not open (state {:?})", self.state);
        };
        for run in self.encoder.feed(labels.iter().cloned()) {
            files.annotation.write_run(&run)?;
        }
        Ok(())
    }

    /// Merge metadata into the metadata file; `channels` is ignored here
    pub fn on_meta_update(&mut self, update: &MetaRecord) -> Result<()> {
        meta::merge_meta(&self.meta_path(), update)?;
        Ok(())
    }

    /// Concatenate buffered batches and append them to the dataset
    fn flush_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let block = {
            let views: Vec<ArrayView2<'_, f64>> = self.buffer.iter().map(|b| b.view()).collect();
            ndarray::concatenate(Axis(0), &views)
                .context("Buffered batches have mismatching channel counts")?
        };
        self.buffer.clear();

        let channels = match &self.channels {
            Some(channels) => channels.clone(),
            None => {
                warn!("No channel names received, numbering {} channels", block.ncols());
                ChannelNameResolver::default_names(block.ncols())
            }
        };
        self.ensure_dataset(&channels)?;

        let files = self.open_files()?;
        if let Some(dataset) = files.dataset.as_mut() {
            dataset.append(block.view())?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessingNode for OutContainer {
    async fn on_create(&mut self, config: Value) -> Result<()> {
        let config: OutContainerConfig =
            serde_json::from_value(config).context("Invalid OutContainer config")?;

        fs::create_dir_all(&config.folder)
            .with_context(|| format!("Failed to create output folder {:?}", config.folder))?;
        self.base = Self::timestamped_base(&config.folder);
        self.folder = config.folder;
        info!("Saving to {}", self.base.display());
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        match self.state {
            SinkState::Idle => self.open(),
            state => {
                debug!("Ignoring start in state {:?}", state);
                Ok(())
            }
        }
    }

    async fn on_stop(&mut self) -> Result<()> {
        match self.state {
            SinkState::Open => self.close(),
            state => {
                debug!("Ignoring stop in state {:?}", state);
                Ok(())
            }
        }
    }

    async fn process(&mut self, input: DataFrame) -> Result<Option<DataFrame>> {
        if self.state != SinkState::Open {
            bail!("Sink received data in state {:?}", self.state);
        }
        if let Some(channels) = input.channels {
            self.on_channel_names(channels)?;
        }
        if let Some(meta) = &input.meta {
            self.on_meta_update(meta)?;
        }
        if let Some(annot) = &input.annot {
            self.on_annotation_batch(annot)?;
        }
        if let Some(ts) = input.ts {
            self.on_data_batch(ts)?;
        }
        Ok(None)
    }
}
