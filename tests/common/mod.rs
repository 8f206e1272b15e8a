#![allow(dead_code)]

use ndarray::Array2;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tsio::core::{DataFrame, ProcessingNode};
use tsio::nodes::OutContainer;

/// 20 samples x 5 channels, values 0..100
pub fn sample_matrix() -> Array2<f64> {
    Array2::from_shape_fn((20, 5), |(r, c)| (r * 5 + c) as f64)
}

/// Includes runs of length 1 and 2
pub fn sample_annotation() -> Vec<String> {
    [("1", 5), ("2", 2), ("3", 1), ("1", 2), ("2", 3), ("3", 7)]
        .iter()
        .flat_map(|(label, n)| std::iter::repeat(label.to_string()).take(*n))
        .collect()
}

pub fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Push frames through an `OutContainer` writing into `folder` and return the
/// closed node
pub async fn record_frames(folder: &Path, frames: Vec<DataFrame>) -> OutContainer {
    let mut node = OutContainer::new();
    node.on_create(serde_json::json!({ "folder": folder }))
        .await
        .unwrap();

    let (tx_in, rx_in) = mpsc::channel(16);
    let (tx_out, _rx_out) = mpsc::channel(16);
    let handle = tokio::spawn(async move { node.run(rx_in, tx_out).await.map(|_| node) });

    for frame in frames {
        tx_in.send(frame).await.unwrap();
    }
    drop(tx_in);

    handle.await.unwrap().unwrap()
}

/// Record `data` one sample per frame, with channel names on the first frame
/// and the whole annotation on the first frame if given
pub async fn record(
    folder: &Path,
    data: &Array2<f64>,
    channels: &[&str],
    annot: Option<Vec<String>>,
) -> OutContainer {
    let mut frames = Vec::new();
    for (i, row) in data.outer_iter().enumerate() {
        let mut frame = DataFrame::new(0, i as u64)
            .with_ts(row.to_owned().insert_axis(ndarray::Axis(0)));
        if i == 0 {
            frame.channels = Some(strings(channels));
            frame.annot = annot.clone();
        }
        frames.push(frame);
    }
    record_frames(folder, frames).await
}

pub fn pattern(folder: &Path) -> String {
    format!("{}/*.arrows", folder.display())
}

/// Run a source node to completion and collect what it sent
pub async fn collect_source<N>(mut node: N) -> anyhow::Result<Vec<DataFrame>>
where
    N: ProcessingNode + 'static,
{
    let (_tx_in, rx_in) = mpsc::channel(1);
    let (tx_out, mut rx_out) = mpsc::channel(64);

    let handle = tokio::spawn(async move { node.run(rx_in, tx_out).await });

    let mut frames = Vec::new();
    while let Some(frame) = rx_out.recv().await {
        frames.push(frame);
    }
    handle.await.unwrap()?;
    Ok(frames)
}

pub fn data_files(folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = glob::glob(&pattern(folder))
        .unwrap()
        .filter_map(|p| p.ok())
        .collect();
    files.sort();
    files
}
