use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::eventbus::rpc::{IceCandidateParams, SdpParams};
use crate::ids::UserSessionId;

use super::RtcError;
use super::participant::Participant;

/// Groups the participants sharing a session owner. The baseline SFU only
/// ever holds the owner, but the map shape admits multi-party calls.
pub struct Room {
    id: UserSessionId,
    participants: RwLock<HashMap<UserSessionId, Arc<Participant>>>,
}

impl Room {
    pub fn new(id: UserSessionId) -> Self {
        Self {
            id,
            participants: RwLock::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &UserSessionId {
        &self.id
    }

    /// Adds the participant, returning a previous one it replaced (a
    /// duplicate join) so the caller can close it.
    pub fn join(&self, participant: Arc<Participant>) -> Option<Arc<Participant>> {
        let id = participant.id().clone();
        debug!(room = %self.id, user_id = %id, "participant joined");
        self.participants.write().insert(id, participant)
    }

    fn participant(&self, user_id: &UserSessionId) -> Result<Arc<Participant>, RtcError> {
        self.participants
            .read()
            .get(user_id)
            .cloned()
            .ok_or(RtcError::ParticipantNotFound)
    }

    pub async fn handle_offer(
        &self,
        user_id: &UserSessionId,
        params: SdpParams,
    ) -> Result<(), RtcError> {
        self.participant(user_id)?.handle_offer(params).await
    }

    pub async fn add_ice_candidate(
        &self,
        user_id: &UserSessionId,
        params: IceCandidateParams,
    ) -> Result<(), RtcError> {
        self.participant(user_id)?.add_ice_candidate(params).await
    }

    pub fn transcoder_sdp(&self, user_id: &UserSessionId) -> Result<String, RtcError> {
        Ok(self.participant(user_id)?.transcoder_sdp().to_owned())
    }

    pub fn is_empty(&self) -> bool {
        self.participants.read().is_empty()
    }

    pub async fn close(&self) {
        debug!(room = %self.id, "closing room");
        let participants: Vec<Arc<Participant>> = {
            let mut map = self.participants.write();
            map.drain().map(|(_, participant)| participant).collect()
        };
        for participant in participants {
            participant.close().await;
        }
    }
}
