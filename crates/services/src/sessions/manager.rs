use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use livecast_db::models::Session;

use crate::dao::base::DaoError;
use crate::dao::session::SessionsStore;
use crate::eventbus::router::SignalingHandler;
use crate::eventbus::rpc::{IceCandidateParams, SdpParams};
use crate::eventbus::{BusError, Rpc, RpcPublisher};
use crate::ids::UserSessionId;
use crate::rtc::{Participant, PortsAllocator, Room, RtcError, WebRtcConfig};
use crate::telemetry::Metrics;
use crate::transcoder::{TranscodeControl, TranscodeError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("room is not initialized for user {0}")]
    RoomNotInitialized(UserSessionId),
    #[error(transparent)]
    Rtc(#[from] RtcError),
    #[error(transparent)]
    Store(#[from] DaoError),
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error(transparent)]
    Transcoder(#[from] TranscodeError),
}

/// The authoritative map from user id to room. Translates router callbacks
/// into room operations and answers back over the per-user client channel.
pub struct SessionsManager {
    config: WebRtcConfig,
    streams_root: PathBuf,
    store: Arc<dyn SessionsStore>,
    sink: Arc<dyn RpcPublisher>,
    transcoder: Arc<dyn TranscodeControl>,
    allocator: Arc<PortsAllocator>,
    metrics: Metrics,
    rooms: RwLock<HashMap<UserSessionId, Arc<Room>>>,
    /// Viewing intent per streamer. Receiver transports are allocated
    /// lazily, so this is the only state a subscribe leaves behind.
    viewers: Mutex<HashMap<UserSessionId, HashSet<UserSessionId>>>,
}

impl SessionsManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: WebRtcConfig,
        streams_root: impl Into<PathBuf>,
        store: Arc<dyn SessionsStore>,
        sink: Arc<dyn RpcPublisher>,
        transcoder: Arc<dyn TranscodeControl>,
        allocator: Arc<PortsAllocator>,
        metrics: Metrics,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            streams_root: streams_root.into(),
            store,
            sink,
            transcoder,
            allocator,
            metrics,
            rooms: RwLock::new(HashMap::new()),
            viewers: Mutex::new(HashMap::new()),
        })
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }

    /// Idempotent per user: the session row is upserted to online/idle, the
    /// room is reused or created, and a fresh participant joins it. A
    /// duplicate join silently replaces the previous participant.
    pub async fn start_session(&self, user_id: UserSessionId) -> Result<(), SessionError> {
        debug!(user_id = %user_id, "start session");

        self.store.save(&Session::new_idle(user_id.as_str())).await?;

        // Each participant gets its own copy of the RTC config so
        // transport tweaks cannot leak across users.
        let participant = Participant::new(
            user_id.clone(),
            self.sink.clone(),
            self.config.clone(),
            self.allocator.clone(),
            &self.streams_root,
            self.metrics.clone(),
        )
        .await?;

        let (room, created) = self.find_or_create_room(&user_id);
        if created {
            self.metrics.session_started();
        }
        if let Some(replaced) = room.join(participant) {
            debug!(user_id = %user_id, "replacing participant of a duplicate join");
            replaced.close().await;
        }

        self.sink.publish_client(&user_id, &Rpc::Join).await?;
        Ok(())
    }

    fn find_or_create_room(&self, user_id: &UserSessionId) -> (Arc<Room>, bool) {
        {
            let rooms = self.rooms.read();
            if let Some(room) = rooms.get(user_id) {
                return (room.clone(), false);
            }
        }

        let mut rooms = self.rooms.write();
        if let Some(room) = rooms.get(user_id) {
            return (room.clone(), false);
        }
        let room = Arc::new(Room::new(user_id.clone()));
        rooms.insert(user_id.clone(), room.clone());
        (room, true)
    }

    fn room(&self, user_id: &UserSessionId) -> Result<Arc<Room>, SessionError> {
        self.rooms
            .read()
            .get(user_id)
            .cloned()
            .ok_or_else(|| SessionError::RoomNotInitialized(user_id.clone()))
    }

    pub async fn handle_offer(
        &self,
        user_id: UserSessionId,
        params: SdpParams,
    ) -> Result<(), SessionError> {
        self.room(&user_id)?.handle_offer(&user_id, params).await?;
        Ok(())
    }

    pub async fn add_ice_candidate(
        &self,
        user_id: UserSessionId,
        params: IceCandidateParams,
    ) -> Result<(), SessionError> {
        self.room(&user_id)?
            .add_ice_candidate(&user_id, params)
            .await?;
        Ok(())
    }

    /// Marks the session as publishing and hands the participant's
    /// transcoder SDP to an HLS worker.
    pub async fn publish_stream(&self, user_id: UserSessionId) -> Result<(), SessionError> {
        let room = self.room(&user_id)?;
        self.store.start_publish(user_id.as_str()).await?;

        let sdp = room.transcoder_sdp(&user_id)?;
        self.transcoder
            .start_hls(&user_id, sdp.into_bytes())
            .await?;

        info!(user_id = %user_id, "stream published");
        Ok(())
    }

    pub async fn stop_stream(&self, user_id: UserSessionId) -> Result<(), SessionError> {
        self.store.stop_publish(user_id.as_str()).await?;
        self.transcoder.stop(&user_id).await?;

        info!(user_id = %user_id, "stream stopped");
        Ok(())
    }

    /// Records viewing intent. The receiver transport is allocated lazily
    /// once subscriber media actually flows, so nothing else happens yet.
    pub async fn subscribe(
        &self,
        user_id: UserSessionId,
        streamer: UserSessionId,
    ) -> Result<(), SessionError> {
        debug!(user_id = %user_id, streamer = %streamer, "subscribe");
        self.viewers
            .lock()
            .entry(streamer)
            .or_default()
            .insert(user_id);
        Ok(())
    }

    pub async fn unsubscribe(
        &self,
        user_id: UserSessionId,
        streamer: UserSessionId,
    ) -> Result<(), SessionError> {
        debug!(user_id = %user_id, streamer = %streamer, "unsubscribe");
        let mut viewers = self.viewers.lock();
        if let Some(watching) = viewers.get_mut(&streamer) {
            watching.remove(&user_id);
            if watching.is_empty() {
                viewers.remove(&streamer);
            }
        }
        Ok(())
    }

    /// Closes the user's room and marks the session offline. Idempotent: a
    /// second call finds no room entry and returns without touching the
    /// repository again.
    pub async fn close_session(&self, user_id: UserSessionId) -> Result<(), SessionError> {
        let room = self.rooms.write().remove(&user_id);
        let Some(room) = room else {
            debug!(user_id = %user_id, "close for unknown session ignored");
            return Ok(());
        };

        room.close().await;
        self.store.set_offline(user_id.as_str()).await?;
        if let Err(e) = self.transcoder.stop(&user_id).await {
            warn!(user_id = %user_id, %e, "transcoder stop failed during close");
        }
        self.metrics.session_closed();

        info!(user_id = %user_id, "session closed");
        Ok(())
    }

    /// Application-wide shutdown: every room is notified and closed.
    pub async fn close(&self) {
        let rooms: Vec<Arc<Room>> = {
            let mut map = self.rooms.write();
            map.drain().map(|(_, room)| room).collect()
        };
        for room in rooms {
            room.close().await;
            self.metrics.session_closed();
        }
    }
}

#[async_trait]
impl SignalingHandler for SessionsManager {
    async fn on_join(&self, user_id: UserSessionId) -> anyhow::Result<()> {
        self.start_session(user_id).await?;
        Ok(())
    }

    async fn on_offer(&self, user_id: UserSessionId, params: SdpParams) -> anyhow::Result<()> {
        self.handle_offer(user_id, params).await?;
        Ok(())
    }

    async fn on_add_ice_candidate(
        &self,
        user_id: UserSessionId,
        params: IceCandidateParams,
    ) -> anyhow::Result<()> {
        self.add_ice_candidate(user_id, params).await?;
        Ok(())
    }

    async fn on_close_session(&self, user_id: UserSessionId) -> anyhow::Result<()> {
        self.close_session(user_id).await?;
        Ok(())
    }

    async fn on_publish_stream(&self, user_id: UserSessionId) -> anyhow::Result<()> {
        self.publish_stream(user_id).await?;
        Ok(())
    }

    async fn on_stop_stream(&self, user_id: UserSessionId) -> anyhow::Result<()> {
        self.stop_stream(user_id).await?;
        Ok(())
    }

    async fn on_subscribe(
        &self,
        user_id: UserSessionId,
        streamer: UserSessionId,
    ) -> anyhow::Result<()> {
        self.subscribe(user_id, streamer).await?;
        Ok(())
    }

    async fn on_unsubscribe(
        &self,
        user_id: UserSessionId,
        streamer: UserSessionId,
    ) -> anyhow::Result<()> {
        self.unsubscribe(user_id, streamer).await?;
        Ok(())
    }
}
