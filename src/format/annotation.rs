//! Run-length annotation tables and their dense per-sample expansion.
//!
//! On disk an annotation is a CSV table of `start,end,act` rows, one row per
//! run of identical labels. In memory and on the wire it is one label per
//! sample.

use crate::error::{Error, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

/// One run of identical labels, `start` inclusive and `end` exclusive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationInterval {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "act")]
    pub label: String,
}

impl AnnotationInterval {
    pub fn new(start: usize, end: usize, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type RunLengthTable = Vec<AnnotationInterval>;
pub type DenseAnnotation = Vec<String>;

pub const ANNOTATION_HEADER: [&str; 3] = ["start", "end", "act"];

pub struct AnnotationCodec;

impl AnnotationCodec {
    /// Expand a run-length table into one label per sample.
    ///
    /// Gaps before, between and after the runs become empty labels. A
    /// malformed table yields an empty annotation, which callers treat as
    /// "no annotation available". An empty table also yields an empty
    /// annotation.
    pub fn decode(table: &[AnnotationInterval], total_samples: usize) -> DenseAnnotation {
        match Self::try_decode(table, total_samples) {
            Ok(dense) => dense,
            Err(e) => {
                warn!("Ignoring annotation: {}", e);
                Vec::new()
            }
        }
    }

    pub fn try_decode(
        table: &[AnnotationInterval],
        total_samples: usize,
    ) -> Result<DenseAnnotation> {
        if table.is_empty() {
            return Ok(Vec::new());
        }
        Self::validate(table, total_samples)?;

        let mut dense = Vec::with_capacity(total_samples);
        for run in table {
            dense.resize(run.start, String::new());
            dense.extend(std::iter::repeat(run.label.clone()).take(run.len()));
        }
        dense.resize(total_samples, String::new());
        Ok(dense)
    }

    /// Checks ordering, overlap and range of every run
    pub fn validate(table: &[AnnotationInterval], total_samples: usize) -> Result<()> {
        let mut last_end = 0;
        for (row, run) in table.iter().enumerate() {
            if run.end < run.start {
                return Err(Error::AnnotationParse(format!(
                    "row {}: end {} before start {}",
                    row, run.end, run.start
                )));
            }
            if run.start < last_end {
                return Err(Error::AnnotationParse(format!(
                    "row {}: start {} overlaps previous run ending at {}",
                    row, run.start, last_end
                )));
            }
            if run.end > total_samples {
                return Err(Error::AnnotationParse(format!(
                    "row {}: end {} exceeds sample count {}",
                    row, run.end, total_samples
                )));
            }
            last_end = run.end;
        }
        Ok(())
    }

    /// Coalesce consecutive equal labels into runs
    pub fn encode<I>(labels: I) -> RunLengthTable
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut encoder = RunEncoder::new();
        let mut table: RunLengthTable = encoder.feed(labels).collect();
        table.extend(encoder.finish());
        table
    }
}

/// Incremental run-length encoder holding at most one open run.
///
/// Labels may arrive one at a time or in batches; a run is handed out the
/// moment a different label arrives, and the open run is handed out by
/// [`RunEncoder::finish`].
#[derive(Debug, Default)]
pub struct RunEncoder {
    pending: Option<AnnotationInterval>,
}

impl RunEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of labels consumed so far
    pub fn position(&self) -> usize {
        self.pending.as_ref().map_or(0, |run| run.end)
    }

    pub fn pending(&self) -> Option<&AnnotationInterval> {
        self.pending.as_ref()
    }

    /// Feed one label, returning the run it closed, if any
    pub fn push(&mut self, label: impl Into<String>) -> Option<AnnotationInterval> {
        let label = label.into();
        match self.pending.as_mut() {
            Some(run) if run.label == label => {
                run.end += 1;
                None
            }
            Some(run) => {
                let start = run.end;
                self.pending
                    .replace(AnnotationInterval::new(start, start + 1, label))
            }
            None => {
                self.pending = Some(AnnotationInterval::new(0, 1, label));
                None
            }
        }
    }

    /// Lazily feed a batch of labels, yielding the runs closed along the way
    pub fn feed<'a, I>(&'a mut self, labels: I) -> impl Iterator<Item = AnnotationInterval> + 'a
    where
        I: IntoIterator + 'a,
        I::IntoIter: 'a,
        I::Item: Into<String>,
    {
        labels.into_iter().filter_map(move |label| self.push(label))
    }

    /// Close the open run at end of stream
    pub fn finish(&mut self) -> Option<AnnotationInterval> {
        self.pending.take()
    }
}

/// Read a `start,end,act` table
pub fn read_table(path: &Path) -> Result<RunLengthTable> {
    let mut reader = csv::Reader::from_path(path)?;
    let table = reader
        .deserialize()
        .collect::<std::result::Result<RunLengthTable, csv::Error>>()?;
    Ok(table)
}

/// Streaming writer for annotation tables; every run is flushed to disk as
/// soon as it is written.
pub struct AnnotationWriter {
    writer: csv::Writer<File>,
    path: PathBuf,
}

impl AnnotationWriter {
    /// Create the file and write the header row
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .map_err(|e| Error::write(&path, e))?;
        writer
            .write_record(ANNOTATION_HEADER)
            .map_err(|e| Error::write(&path, e))?;
        writer.flush().map_err(|e| Error::write(&path, e))?;
        Ok(Self { writer, path })
    }

    pub fn write_run(&mut self, run: &AnnotationInterval) -> Result<()> {
        self.writer
            .serialize(run)
            .map_err(|e| Error::write(&self.path, e))?;
        self.writer.flush().map_err(|e| Error::write(&self.path, e))?;
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.writer.flush().map_err(|e| Error::write(&self.path, e))?;
        let file = self
            .writer
            .into_inner()
            .map_err(|e| Error::write(&self.path, e.error()))?;
        file.sync_all().map_err(|e| Error::write(&self.path, e))?;
        Ok(())
    }
}
