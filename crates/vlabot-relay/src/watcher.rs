//! [`FrameWatcher`] – timer-driven scan of the image channel.
//!
//! A background task rescans the [`FrameChannel`] every `interval` and sends
//! each newly current frame over an mpsc channel.  The receiving side owns
//! all state; the task never touches it.  The task ends when the
//! [`CancellationToken`] fires or the receiver is dropped.

use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vlabot_types::Frame;

use crate::frame_channel::{FrameChannel, ObservedFrame};

pub struct FrameWatcher {
    channel: FrameChannel,
    interval: Duration,
}

impl FrameWatcher {
    pub fn new(channel: FrameChannel, interval: Duration) -> Self {
        Self {
            channel,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Spawn the scan loop on the current tokio runtime.
    ///
    /// Each frame is sent once; a frame re-published under the same name is
    /// sent again when its modification time advances.
    pub fn spawn(self, tx: mpsc::Sender<Frame>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last: Option<(i64, Option<SystemTime>)> = None;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let channel = self.channel.clone();
                let scanned = match tokio::task::spawn_blocking(move || channel.scan()).await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(error = %e, "frame scan task failed");
                        continue;
                    }
                };

                let observed = match scanned {
                    Ok(Some(observed)) => observed,
                    Ok(None) => continue,
                    Err(e) => {
                        debug!(error = %e, "frame scan failed; retrying next interval");
                        continue;
                    }
                };

                let ObservedFrame { frame, modified } = observed;
                let key = (frame.capture_timestamp, modified);
                if last.as_ref() == Some(&key) {
                    continue;
                }
                last = Some(key);

                if tx.send(frame).await.is_err() {
                    debug!("frame receiver dropped; stopping watcher");
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emits_new_frames_and_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let channel = FrameChannel::new(dir.path(), "rosbot_image");
        channel.publish(10, "bmp", b"BM").unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let handle = FrameWatcher::new(channel.clone(), Duration::from_millis(10))
            .spawn(tx, shutdown.clone());

        let first = rx.recv().await.unwrap();
        assert_eq!(first.capture_timestamp, 10);

        channel.publish(20, "bmp", b"BM").unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(second.capture_timestamp, 20);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn unchanged_frame_is_not_resent() {
        let dir = tempfile::tempdir().unwrap();
        let channel = FrameChannel::new(dir.path(), "rosbot_image");
        channel.publish(10, "bmp", b"BM").unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let handle =
            FrameWatcher::new(channel, Duration::from_millis(5)).spawn(tx, shutdown.clone());

        rx.recv().await.unwrap();
        let again = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(again.is_err(), "frame was re-sent without a change");

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn dropping_receiver_ends_task() {
        let dir = tempfile::tempdir().unwrap();
        let channel = FrameChannel::new(dir.path(), "rosbot_image");
        channel.publish(1, "bmp", b"BM").unwrap();

        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle =
            FrameWatcher::new(channel, Duration::from_millis(5)).spawn(tx, CancellationToken::new());
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
