use crate::error::{Error, Result};
use log::warn;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

pub const META_EXTENSION: &str = "json";
pub const CHANNELS_KEY: &str = "channels";

pub type MetaRecord = Map<String, Value>;

/// Load the metadata record, or an empty one if the file does not exist yet
pub fn read_meta(path: &Path) -> Result<MetaRecord> {
    if !path.exists() {
        return Ok(MetaRecord::new());
    }
    let json = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&json)?;
    match value {
        Value::Object(record) => Ok(record),
        other => Err(Error::source_file(
            path,
            format!("expected a JSON object, found {}", other),
        )),
    }
}

pub fn write_meta(path: &Path, record: &MetaRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(record)?;
    fs::write(path, json).map_err(|e| Error::write(path, e))?;
    Ok(())
}

/// Read-merge-write of free-form keys. `channels` is skipped; it is only
/// set through [`store_channels`].
pub fn merge_meta(path: &Path, update: &MetaRecord) -> Result<MetaRecord> {
    let mut record = read_meta(path)?;
    for (key, value) in update {
        if key != CHANNELS_KEY {
            record.insert(key.clone(), value.clone());
        }
    }
    write_meta(path, &record)?;
    Ok(record)
}

pub fn store_channels(path: &Path, channels: &[String]) -> Result<()> {
    let mut record = read_meta(path)?;
    record.insert(CHANNELS_KEY.to_string(), Value::from(channels.to_vec()));
    write_meta(path, &record)
}

/// Channel names stored in the metadata file; empty when absent or unusable
pub fn read_channels(path: &Path) -> Vec<String> {
    if !path.exists() {
        return Vec::new();
    }
    let record = match read_meta(path) {
        Ok(record) => record,
        Err(e) => {
            warn!("Ignoring metadata {}: {}", path.display(), e);
            return Vec::new();
        }
    };
    match record.get(CHANNELS_KEY) {
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            warn!("Ignoring channel names in {}: {}", path.display(), e);
            Vec::new()
        }),
        None => Vec::new(),
    }
}
