//! Logs every lifecycle notice published on the event bus.
//!
//! Subscribes to the bus's broadcast feed and records each notice at
//! `info`. The loop exits when the feed closes (the bus is dropped) or the
//! cancellation token fires.

use labcoord_events::LifecycleNotice;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Run the event logging loop. Returns the number of notices logged.
pub async fn run(mut receiver: broadcast::Receiver<LifecycleNotice>, cancel: CancellationToken) -> u64 {
    let mut logged = 0;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(logged, "Event logger stopping");
                break;
            }
            received = receiver.recv() => match received {
                Ok(notice) => {
                    logged += 1;
                    tracing::info!(
                        topic = %notice.topic,
                        timestamp = %notice.timestamp,
                        payload = %notice.payload,
                        "Lifecycle event"
                    );
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event logger lagged, some events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!(logged, "Event bus closed, event logger shutting down");
                    break;
                }
            }
        }
    }
    logged
}
