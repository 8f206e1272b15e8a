use ndarray::Array2;
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// Basic data unit passed between processing nodes.
///
/// Every optional field is one port. `None` means nothing was sent on that
/// port with this frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataFrame {
    /// Timestamp in microseconds since epoch
    pub timestamp: u64,

    /// Sequential frame number for ordering
    pub sequence_id: u64,

    /// Samples x channels
    pub ts: Option<Array2<f64>>,

    /// Channel names, one per column of `ts`
    pub channels: Option<Vec<String>>,

    /// One annotation label per sample
    pub annot: Option<Vec<String>>,

    /// Share of the file set sent so far, 0.0 to 1.0
    pub percent: Option<f64>,

    /// Free-form recording metadata
    pub meta: Option<Map<String, Value>>,
}

impl DataFrame {
    pub fn new(timestamp: u64, sequence_id: u64) -> Self {
        Self {
            timestamp,
            sequence_id,
            ..Self::default()
        }
    }

    /// Frame stamped with the current wall-clock time
    pub fn now(sequence_id: u64) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        Self::new(timestamp, sequence_id)
    }

    pub fn with_ts(mut self, ts: Array2<f64>) -> Self {
        self.ts = Some(ts);
        self
    }

    pub fn with_channels(mut self, channels: Vec<String>) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn with_annot(mut self, annot: Vec<String>) -> Self {
        self.annot = Some(annot);
        self
    }

    pub fn with_percent(mut self, percent: f64) -> Self {
        self.percent = Some(percent);
        self
    }

    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = Some(meta);
        self
    }

    /// True when no port carries a value
    pub fn is_empty(&self) -> bool {
        self.ts.is_none()
            && self.channels.is_none()
            && self.annot.is_none()
            && self.percent.is_none()
            && self.meta.is_none()
    }
}
