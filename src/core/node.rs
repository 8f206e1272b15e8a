use super::DataFrame;
use anyhow::Result;
use async_trait::async_trait;
use log::error;
use serde_json::Value;
use tokio::sync::mpsc;

/// Base trait for all processing nodes in the pipeline
#[async_trait]
pub trait ProcessingNode: Send {
    /// Called once when node is instantiated with config from JSON
    async fn on_create(&mut self, config: Value) -> Result<()>;

    /// Stream-start signal, before the first frame is processed
    async fn on_start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Stream-stop signal. May arrive more than once.
    async fn on_stop(&mut self) -> Result<()> {
        Ok(())
    }

    /// Handle one incoming frame, optionally producing one outgoing frame
    async fn process(&mut self, _input: DataFrame) -> Result<Option<DataFrame>> {
        anyhow::bail!("Node does not accept input frames")
    }

    /// Async streaming processing loop.
    ///
    /// Receives frames from `rx` until the channel is closed and forwards
    /// results to `tx`. Source nodes override this and treat a closed `rx`
    /// as the stop signal.
    async fn run(
        &mut self,
        mut rx: mpsc::Receiver<DataFrame>,
        tx: mpsc::Sender<DataFrame>,
    ) -> Result<()> {
        self.on_start().await?;

        let mut outcome = Ok(());
        while let Some(frame) = rx.recv().await {
            match self.process(frame).await {
                Ok(Some(output)) => {
                    if tx.send(output).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }

        let stopped = self.on_stop().await;
        match (outcome, stopped) {
            (Err(e), Err(stop_error)) => {
                error!("Stop failed after processing error: {:#}", stop_error);
                Err(e)
            }
            (outcome, stopped) => outcome.and(stopped),
        }
    }
}
