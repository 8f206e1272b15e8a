mod common;

use common::{record, record_frames, sample_annotation, sample_matrix, strings};
use ndarray::{s, Array2, Axis};
use serde_json::{json, Map};
use tsio::core::{DataFrame, ProcessingNode};
use tsio::format::annotation::read_table;
use tsio::format::container::read_dataset;
use tsio::format::meta::read_meta;
use tsio::format::AnnotationCodec;
use tsio::nodes::out_container::FLUSH_THRESHOLD;
use tsio::nodes::{OutContainer, SinkState};

async fn created(folder: &std::path::Path) -> OutContainer {
    let mut node = OutContainer::new();
    node.on_create(json!({ "folder": folder })).await.unwrap();
    node
}

#[tokio::test]
async fn test_on_create_makes_folder() {
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().join("nested/output");

    let node = created(&folder).await;

    assert!(folder.is_dir());
    assert_eq!(node.state(), SinkState::Idle);
    assert!(node.base_path().starts_with(&folder));
    assert!(!node.data_path().exists());
}

#[tokio::test]
async fn test_missing_folder_config_fails() {
    let mut node = OutContainer::new();
    assert!(node.on_create(json!({})).await.is_err());
}

#[tokio::test]
async fn test_lifecycle_and_double_stop() {
    let dir = tempfile::tempdir().unwrap();
    let mut node = created(dir.path()).await;

    node.on_start().await.unwrap();
    assert_eq!(node.state(), SinkState::Open);
    assert!(node.data_path().exists());
    assert_eq!(
        std::fs::read_to_string(node.annotation_path()).unwrap(),
        "start,end,act\n"
    );

    node.on_stop().await.unwrap();
    assert_eq!(node.state(), SinkState::Closed);
    node.on_stop().await.unwrap();
    assert_eq!(node.state(), SinkState::Closed);

    // Closed sinks are not reopened
    node.on_start().await.unwrap();
    assert_eq!(node.state(), SinkState::Closed);
}

#[tokio::test]
async fn test_process_before_start_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut node = created(dir.path()).await;
    let frame = DataFrame::new(0, 0).with_ts(Array2::zeros((1, 2)));
    assert!(node.process(frame).await.is_err());
}

#[tokio::test]
async fn test_buffered_writes_keep_arrival_order() {
    let dir = tempfile::tempdir().unwrap();
    let total = 2 * FLUSH_THRESHOLD + 37;
    let data = Array2::from_shape_fn((total, 3), |(r, c)| (r * 3 + c) as f64);

    let mut node = created(dir.path()).await;
    node.on_start().await.unwrap();
    node.on_channel_names(strings(&["x", "y", "z"])).unwrap();

    // Uneven batch sizes: 1, 2, 3, 1, 2, 3, ...
    let mut start = 0;
    let mut size = 1;
    while start < total {
        let end = (start + size).min(total);
        node.on_data_batch(data.slice(s![start..end, ..]).to_owned())
            .unwrap();
        assert!(node.buffered() <= FLUSH_THRESHOLD);
        start = end;
        size = size % 3 + 1;
    }
    node.on_stop().await.unwrap();

    assert_eq!(read_dataset(&node.data_path()).unwrap(), data);
}

#[tokio::test]
async fn test_flush_happens_past_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let mut node = created(dir.path()).await;
    node.on_start().await.unwrap();
    node.on_channel_names(strings(&["x"])).unwrap();

    for _ in 0..FLUSH_THRESHOLD {
        node.on_data_batch(Array2::zeros((1, 1))).unwrap();
    }
    assert_eq!(node.buffered(), FLUSH_THRESHOLD);

    node.on_data_batch(Array2::zeros((1, 1))).unwrap();
    assert_eq!(node.buffered(), 0);

    node.on_stop().await.unwrap();
    assert_eq!(read_dataset(&node.data_path()).unwrap().nrows(), FLUSH_THRESHOLD + 1);
}

#[tokio::test]
async fn test_annotation_runs_are_written_as_they_close() {
    let dir = tempfile::tempdir().unwrap();
    let mut node = created(dir.path()).await;
    node.on_start().await.unwrap();

    node.on_annotation_batch(&strings(&["a", "a", "b"])).unwrap();
    assert_eq!(
        std::fs::read_to_string(node.annotation_path()).unwrap(),
        "start,end,act\n0,2,a\n"
    );

    node.on_annotation_batch(&strings(&["b", "b"])).unwrap();
    node.on_stop().await.unwrap();

    assert_eq!(
        std::fs::read_to_string(node.annotation_path()).unwrap(),
        "start,end,act\n0,2,a\n2,5,b\n"
    );
}

#[tokio::test]
async fn test_stream_writes_all_three_files() {
    let dir = tempfile::tempdir().unwrap();
    let node = record(
        dir.path(),
        &sample_matrix(),
        &["A", "B", "C", "D", "E"],
        Some(sample_annotation()),
    )
    .await;

    assert_eq!(node.state(), SinkState::Closed);
    assert_eq!(read_dataset(&node.data_path()).unwrap(), sample_matrix());
    assert_eq!(
        read_table(&node.annotation_path()).unwrap(),
        AnnotationCodec::encode(sample_annotation())
    );
    assert_eq!(
        read_meta(&node.meta_path()).unwrap()["channels"],
        json!(["A", "B", "C", "D", "E"])
    );
}

#[tokio::test]
async fn test_meta_merge_excludes_channels() {
    let dir = tempfile::tempdir().unwrap();

    let mut first = Map::new();
    first.insert("subject".to_string(), json!("s01"));
    let mut second = Map::new();
    second.insert("sample_rate".to_string(), json!(250));
    second.insert("channels".to_string(), json!(["nope"]));

    let frames = vec![
        DataFrame::new(0, 0)
            .with_channels(strings(&["A"]))
            .with_meta(first)
            .with_ts(Array2::zeros((2, 1))),
        DataFrame::new(0, 1).with_meta(second).with_ts(Array2::zeros((2, 1))),
    ];
    let node = record_frames(dir.path(), frames).await;

    let meta = read_meta(&node.meta_path()).unwrap();
    assert_eq!(meta["subject"], json!("s01"));
    assert_eq!(meta["sample_rate"], json!(250));
    assert_eq!(meta["channels"], json!(["A"]));
}

#[tokio::test]
async fn test_data_without_channel_names_is_numbered() {
    let dir = tempfile::tempdir().unwrap();
    let data = sample_matrix();
    let frames = data
        .axis_chunks_iter(Axis(0), 7)
        .enumerate()
        .map(|(i, chunk)| DataFrame::new(0, i as u64).with_ts(chunk.to_owned()))
        .collect();

    let node = record_frames(dir.path(), frames).await;
    assert_eq!(read_dataset(&node.data_path()).unwrap(), data);
}

#[tokio::test]
async fn test_two_sinks_in_one_folder_do_not_collide() {
    let dir = tempfile::tempdir().unwrap();
    let a = record(dir.path(), &sample_matrix(), &["A", "B", "C", "D", "E"], None).await;
    let b = record(dir.path(), &sample_matrix(), &["A", "B", "C", "D", "E"], None).await;

    assert_ne!(a.data_path(), b.data_path());
    assert!(a.meta_path().exists());
    assert_eq!(read_meta(&b.meta_path()).unwrap()["channels"][0], json!("A"));
}
