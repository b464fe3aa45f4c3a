use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::process::Child;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::message::{HLS_QUEUE_GROUP, Message, START_HLS_SUBJECT, STOP_SUBJECT};
use crate::pipeline::{self, StreamPaths};

/// One transcoder worker: pulls start requests off the HLS queue group,
/// runs an ffmpeg child per stream, and honors broadcast stops.
pub struct Daemon {
    client: async_nats::Client,
    streams_root: PathBuf,
    ffmpeg: String,
    children: Mutex<HashMap<String, Child>>,
}

impl Daemon {
    pub async fn connect(
        nats_addr: &str,
        streams_root: impl Into<PathBuf>,
        ffmpeg: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let client = async_nats::connect(nats_addr).await?;
        Ok(Self {
            client,
            streams_root: streams_root.into(),
            ffmpeg: ffmpeg.into(),
            children: Mutex::new(HashMap::new()),
        })
    }

    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
        info!("start transcode daemon");

        let mut starts = self
            .client
            .queue_subscribe(START_HLS_SUBJECT, HLS_QUEUE_GROUP.to_owned())
            .await?;
        let mut stops = self.client.subscribe(STOP_SUBJECT).await?;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(msg) = starts.next() => {
                    if let Err(e) = self.handle_start(&msg.payload).await {
                        error!(%e, "failed to start transcoder");
                    }
                }
                Some(msg) = stops.next() => {
                    if let Err(e) = self.handle_stop(&msg.payload).await {
                        error!(%e, "failed to stop transcoder");
                    }
                }
            }
        }

        self.stop_all().await;
        info!("stop transcode daemon");
        Ok(())
    }

    /// Writes the delivered SDP to disk and spawns the HLS pipeline for
    /// that user. A start for an already-running stream restarts it.
    async fn handle_start(&self, payload: &[u8]) -> anyhow::Result<()> {
        let message: Message = serde_json::from_slice(payload)?;
        debug!(user_id = %message.user_id, "received start request");

        let paths = StreamPaths::new(&self.streams_root, &message.user_id);
        tokio::fs::create_dir_all(&paths.user_dir).await?;
        tokio::fs::write(&paths.sdp_path, &message.sdp).await?;

        let child = pipeline::spawn_hls(&self.ffmpeg, &paths).await?;
        info!(user_id = %message.user_id, "transcoder started");

        if let Some(mut previous) = self
            .children
            .lock()
            .await
            .insert(message.user_id.clone(), child)
        {
            warn!(user_id = %message.user_id, "replacing a running transcoder");
            let _ = previous.kill().await;
        }
        Ok(())
    }

    /// Stops are broadcast; a worker without the stream ignores them.
    async fn handle_stop(&self, payload: &[u8]) -> anyhow::Result<()> {
        let message: Message = serde_json::from_slice(payload)?;

        let child = self.children.lock().await.remove(&message.user_id);
        let Some(mut child) = child else {
            debug!(user_id = %message.user_id, "stop for a stream we do not own");
            return Ok(());
        };

        let _ = child.kill().await;

        let paths = StreamPaths::new(&self.streams_root, &message.user_id);
        if let Err(e) = tokio::fs::remove_dir_all(&paths.stream_dir).await {
            warn!(user_id = %message.user_id, %e, "failed to remove stream directory");
        }
        info!(user_id = %message.user_id, "transcoder stopped");
        Ok(())
    }

    async fn stop_all(&self) {
        let mut children = self.children.lock().await;
        for (user_id, mut child) in children.drain() {
            debug!(user_id = %user_id, "killing transcoder on shutdown");
            let _ = child.kill().await;
        }
    }
}
