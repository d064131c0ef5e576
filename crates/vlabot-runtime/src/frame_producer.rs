//! [`FrameProducer`] – camera buffer to timestamped BMP on the image channel.

use std::path::PathBuf;

use chrono::Utc;
use tracing::{debug, warn};
use vlabot_hal::HardwareRegistry;
use vlabot_relay::{FrameChannel, bmp};
use vlabot_types::VlaError;

pub struct FrameProducer {
    channel: FrameChannel,
    camera_id: String,
}

impl FrameProducer {
    pub fn new(channel: FrameChannel, camera_id: impl Into<String>) -> Self {
        Self {
            channel,
            camera_id: camera_id.into(),
        }
    }

    pub fn channel(&self) -> &FrameChannel {
        &self.channel
    }

    /// Capture and publish a frame stamped with the current Unix time.
    ///
    /// # Errors
    ///
    /// See [`produce_at`][Self::produce_at].
    pub fn produce(&self, registry: &mut HardwareRegistry) -> Result<Option<PathBuf>, VlaError> {
        self.produce_at(registry, Utc::now().timestamp())
    }

    /// Capture and publish a frame stamped `timestamp`.
    ///
    /// Returns `Ok(None)` when the camera has no (complete) image this tick;
    /// nothing is written and the caller retries next tick.  The file is
    /// encoded in memory and committed atomically, so a frame written in the
    /// same second replaces the earlier one whole.
    ///
    /// # Errors
    ///
    /// Returns [`VlaError::HardwareFault`] if the camera is not registered
    /// and [`VlaError::Io`] if the file cannot be committed.
    pub fn produce_at(
        &self,
        registry: &mut HardwareRegistry,
        timestamp: i64,
    ) -> Result<Option<PathBuf>, VlaError> {
        let frame = match registry.capture(&self.camera_id) {
            Ok(frame) => frame,
            Err(VlaError::NoFrame(reason)) => {
                debug!(camera = %self.camera_id, %reason, "no image this tick");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let bytes = match bmp::encode(&frame) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(camera = %self.camera_id, error = %e, "skipping incomplete frame");
                return Ok(None);
            }
        };
        let path = self.channel.publish(timestamp, "bmp", &bytes)?;
        debug!(path = %path.display(), "frame published");
        Ok(Some(path))
    }
}
