use super::annotation::{self, AnnotationCodec, DenseAnnotation, RunLengthTable};
use super::container::{self, DATA_EXTENSION};
use super::meta::{self, META_EXTENSION};
use crate::error::{Error, Result};
use log::{debug, warn};
use ndarray::Array2;
use std::path::{Path, PathBuf};

pub const ANNOTATION_EXTENSION: &str = "csv";

/// Everything loaded from one container and its companion files
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub data: Array2<f64>,
    pub annotation: RunLengthTable,
    pub channels: Vec<String>,
}

impl Recording {
    /// Degraded result for a file that could not be opened
    pub fn empty() -> Self {
        Self {
            data: Array2::zeros((0, 0)),
            annotation: Vec::new(),
            channels: Vec::new(),
        }
    }

    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_channels(&self) -> usize {
        self.data.ncols()
    }

    /// Per-sample labels; empty when no usable annotation exists
    pub fn dense_annotation(&self) -> DenseAnnotation {
        AnnotationCodec::decode(&self.annotation, self.n_samples())
    }
}

/// Path of a companion file sharing the container's base name
pub fn companion_path(path: &Path, extension: &str) -> PathBuf {
    path.with_extension(extension)
}

/// Output paths for a recording base name such as `folder/2024-01-01 10-00-00`
pub fn recording_paths(base: &Path) -> (PathBuf, PathBuf, PathBuf) {
    let with = |extension: &str| {
        let mut name = base.as_os_str().to_owned();
        name.push(".");
        name.push(extension);
        PathBuf::from(name)
    };
    (
        with(DATA_EXTENSION),
        with(ANNOTATION_EXTENSION),
        with(META_EXTENSION),
    )
}

/// Expand a glob pattern into the list of matching files, in match order
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob::glob(pattern)
        .map_err(|e| Error::Configuration(format!("invalid file pattern {:?}: {}", pattern, e)))?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable path: {}", e),
        }
    }
    Ok(files)
}

pub struct ContainerReader;

impl ContainerReader {
    /// Load a recording, degrading to an empty one if the container cannot be read
    pub fn open(path: &Path) -> Recording {
        match Self::try_open(path) {
            Ok(recording) => recording,
            Err(e) => {
                warn!("Could not open file, skipping {}: {}", path.display(), e);
                Recording::empty()
            }
        }
    }

    /// Load a recording. Only the container itself is required; unusable
    /// companion files degrade to an empty annotation or channel list.
    pub fn try_open(path: &Path) -> Result<Recording> {
        let data = container::read_dataset(path)?;
        debug!("Loaded {} x {} from {}", data.nrows(), data.ncols(), path.display());

        let annotation = Self::read_annotation(&companion_path(path, ANNOTATION_EXTENSION));
        let channels = meta::read_channels(&companion_path(path, META_EXTENSION));

        Ok(Recording {
            data,
            annotation,
            channels,
        })
    }

    fn read_annotation(path: &Path) -> RunLengthTable {
        if !path.exists() {
            return Vec::new();
        }
        annotation::read_table(path).unwrap_or_else(|e| {
            warn!("Ignoring annotation {}: {}", path.display(), e);
            Vec::new()
        })
    }
}
