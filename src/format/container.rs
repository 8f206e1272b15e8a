//! Time-series container: an Arrow IPC stream holding one dataset named
//! `data`, one Float64 column per channel and one row per sample.
//!
//! Growing the dataset appends a record batch, so the stored row count is
//! the sum of all batch lengths.

use crate::error::{Error, Result};
use arrow::array::{Array, ArrayRef, AsArray, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Float64Type, Schema, SchemaRef};
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use ndarray::{Array2, ArrayView2};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DATA_EXTENSION: &str = "arrows";
pub const DATASET_NAME: &str = "data";
const DATASET_KEY: &str = "dataset";

/// Load the whole `data` dataset into memory as samples x channels
pub fn read_dataset(path: &Path) -> Result<Array2<f64>> {
    let file = File::open(path).map_err(|e| Error::source_file(path, e))?;
    let reader = StreamReader::try_new(BufReader::new(file), None)
        .map_err(|e| Error::source_file(path, e))?;

    let schema = reader.schema();
    if schema.metadata().get(DATASET_KEY).map(String::as_str) != Some(DATASET_NAME) {
        return Err(Error::source_file(
            path,
            format!("no dataset named {:?}", DATASET_NAME),
        ));
    }
    let n_channels = schema.fields().len();

    let mut values = Vec::new();
    let mut n_samples = 0;
    for batch in reader {
        let batch = batch.map_err(|e| Error::source_file(path, e))?;
        let columns = batch
            .columns()
            .iter()
            .map(|column| as_f64(path, column))
            .collect::<Result<Vec<_>>>()?;

        values.reserve(batch.num_rows() * n_channels);
        for row in 0..batch.num_rows() {
            for column in &columns {
                values.push(if column.is_null(row) {
                    f64::NAN
                } else {
                    column.value(row)
                });
            }
        }
        n_samples += batch.num_rows();
    }

    Array2::from_shape_vec((n_samples, n_channels), values)
        .map_err(|e| Error::source_file(path, e))
}

fn as_f64(path: &Path, column: &ArrayRef) -> Result<Float64Array> {
    if !column.data_type().is_numeric() {
        return Err(Error::source_file(
            path,
            format!("expected numeric column, found {}", column.data_type()),
        ));
    }
    let converted = cast(column, &DataType::Float64).map_err(|e| Error::source_file(path, e))?;
    Ok(converted.as_primitive::<Float64Type>().clone())
}

/// Append-only writer for the `data` dataset.
///
/// The dataset starts with zero rows and a fixed channel count; every
/// [`DatasetWriter::append`] grows it along the sample axis.
pub struct DatasetWriter {
    writer: StreamWriter<BufWriter<File>>,
    schema: SchemaRef,
    rows: usize,
    path: PathBuf,
}

impl DatasetWriter {
    /// Create the dataset with shape (0, channels.len()) in an already created file
    pub fn new(file: File, path: impl Into<PathBuf>, channels: &[String]) -> Result<Self> {
        let path = path.into();
        let fields: Vec<Field> = channels
            .iter()
            .map(|name| Field::new(name.as_str(), DataType::Float64, false))
            .collect();
        let metadata = HashMap::from([(DATASET_KEY.to_string(), DATASET_NAME.to_string())]);
        let schema = Arc::new(Schema::new_with_metadata(fields, metadata));

        let writer = StreamWriter::try_new(BufWriter::new(file), &schema)
            .map_err(|e| Error::write(&path, e))?;

        Ok(Self {
            writer,
            schema,
            rows: 0,
            path,
        })
    }

    pub fn create(path: impl Into<PathBuf>, channels: &[String]) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| Error::write(&path, e))?;
        Self::new(file, path, channels)
    }

    pub fn n_channels(&self) -> usize {
        self.schema.fields().len()
    }

    /// Rows persisted so far
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Grow the dataset by `block.nrows()` and write `block` into the new rows
    pub fn append(&mut self, block: ArrayView2<'_, f64>) -> Result<()> {
        if block.ncols() != self.n_channels() {
            return Err(Error::write(
                &self.path,
                format!(
                    "block has {} channels, dataset has {}",
                    block.ncols(),
                    self.n_channels()
                ),
            ));
        }
        if block.nrows() == 0 {
            return Ok(());
        }

        let columns: Vec<ArrayRef> = block
            .columns()
            .into_iter()
            .map(|column| Arc::new(Float64Array::from_iter_values(column.iter().copied())) as ArrayRef)
            .collect();
        let options = RecordBatchOptions::new().with_row_count(Some(block.nrows()));
        let batch = RecordBatch::try_new_with_options(self.schema.clone(), columns, &options)
            .map_err(|e| Error::write(&self.path, e))?;

        self.writer
            .write(&batch)
            .map_err(|e| Error::write(&self.path, e))?;
        self.rows += block.nrows();
        Ok(())
    }

    /// Write the end-of-stream marker and flush to disk
    pub fn finish(self) -> Result<()> {
        let path = self.path;
        let mut inner = self
            .writer
            .into_inner()
            .map_err(|e| Error::write(&path, e))?;
        inner.flush().map_err(|e| Error::write(&path, e))?;
        Ok(())
    }
}
