use crate::core::DataFrame;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

/// Granularity of every source wait; a stop request is noticed within one tick
pub const PACING_TICK: Duration = Duration::from_millis(1);

/// A source is stopped once its input closes or its output receiver is gone
pub fn stopped(rx: &mpsc::Receiver<DataFrame>, tx: &mpsc::Sender<DataFrame>) -> bool {
    rx.is_closed() || tx.is_closed()
}

/// Wait until `deadline` in short ticks. Returns false if the node was
/// stopped meanwhile.
pub async fn pace(
    deadline: Instant,
    rx: &mpsc::Receiver<DataFrame>,
    tx: &mpsc::Sender<DataFrame>,
) -> bool {
    loop {
        if stopped(rx, tx) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        tokio::time::sleep(PACING_TICK.min(deadline - now)).await;
    }
}

/// Send `frame`, waiting for channel capacity in short ticks. Returns false
/// if the node was stopped before the frame could be queued.
pub async fn send_unless_stopped(
    frame: DataFrame,
    rx: &mpsc::Receiver<DataFrame>,
    tx: &mpsc::Sender<DataFrame>,
) -> bool {
    loop {
        if stopped(rx, tx) {
            return false;
        }
        match timeout(PACING_TICK, tx.reserve()).await {
            Ok(Ok(permit)) => {
                permit.send(frame);
                return true;
            }
            Ok(Err(_)) => return false,
            Err(_) => {}
        }
    }
}
