use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::discord::RestClient;
use crate::tracker::Notifier;

/// File name the image is uploaded under, regardless of the local path.
const ATTACHMENT_NAME: &str = "image.png";

/// Read `image_path` and post it to `channel_id` along with `message`.
///
/// Returns whether the message was delivered. A missing image means nothing
/// is sent; every failure is logged and swallowed.
pub async fn send_image_with_message(
    rest: &RestClient,
    channel_id: &str,
    message: &str,
    image_path: &Path,
) -> bool {
    let bytes = match tokio::fs::read(image_path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Error opening file {}: {e}", image_path.display());
            return false;
        }
    };

    match rest
        .send_file_with_message(channel_id, message, ATTACHMENT_NAME, bytes)
        .await
    {
        Ok(()) => {
            info!("Goal announcement sent to channel {channel_id}");
            true
        }
        Err(e) => {
            warn!("Error sending message with image: {e}");
            false
        }
    }
}

/// Announces goals to one channel with a fixed image.
pub struct ImageNotifier {
    rest: RestClient,
    channel_id: String,
    image_path: PathBuf,
}

impl ImageNotifier {
    pub fn new(rest: RestClient, channel_id: &str, image_path: impl Into<PathBuf>) -> Self {
        Self {
            rest,
            channel_id: channel_id.to_string(),
            image_path: image_path.into(),
        }
    }
}

impl Notifier for ImageNotifier {
    async fn notify(&self, message: &str) {
        send_image_with_message(&self.rest, &self.channel_id, message, &self.image_path).await;
    }
}
