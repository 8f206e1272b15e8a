use anyhow::Result;
use log::info;
use ndarray::Array2;
use tokio::sync::mpsc;
use tsio::core::{DataFrame, ProcessingNode};
use tsio::nodes::{InContainer, OutContainer};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let folder = std::env::temp_dir().join("tsio-demo");
    info!("Recording into {}", folder.display());

    // Record: 20 samples x 5 channels with a two-label annotation
    let mut sink = OutContainer::new();
    sink.on_create(serde_json::json!({ "folder": folder })).await?;

    let (tx_in, rx_in) = mpsc::channel(16);
    let (tx_out, _rx_out) = mpsc::channel(16);
    let recorder = tokio::spawn(async move { sink.run(rx_in, tx_out).await });

    let data = Array2::from_shape_fn((20, 5), |(r, c)| (r * 5 + c) as f64);
    let channels = ["A", "B", "C", "D", "E"].map(String::from).to_vec();
    let annot = (0..20)
        .map(|i| if i < 8 { "rest" } else { "move" }.to_string())
        .collect();
    tx_in
        .send(
            DataFrame::now(0)
                .with_channels(channels)
                .with_annot(annot)
                .with_ts(data),
        )
        .await?;
    drop(tx_in);
    recorder.await??;

    // Play every recording in the folder back as whole files
    let mut source = InContainer::new();
    source
        .on_create(serde_json::json!({
            "files": format!("{}/*.arrows", folder.display()),
        }))
        .await?;

    let (_stop, rx_in) = mpsc::channel(1);
    let (tx_out, mut rx_out) = mpsc::channel(16);
    let player = tokio::spawn(async move { source.run(rx_in, tx_out).await });

    while let Some(frame) = rx_out.recv().await {
        let shape = frame.ts.as_ref().map(|ts| ts.dim()).unwrap_or_default();
        info!(
            "Read {:?} samples x channels, channels {:?}, {} labels, {:.0}% done",
            shape,
            frame.channels.unwrap_or_default(),
            frame.annot.map(|a| a.len()).unwrap_or(0),
            frame.percent.unwrap_or(0.0) * 100.0
        );
    }
    player.await??;

    Ok(())
}
