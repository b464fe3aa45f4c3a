use async_trait::async_trait;
use parking_lot::Mutex;

use livecast_services::UserSessionId;
use livecast_services::transcoder::{TranscodeControl, TranscodeError};

/// Captures transcoder control traffic instead of touching NATS.
#[derive(Default)]
pub struct RecordingTranscoder {
    starts: Mutex<Vec<(UserSessionId, Vec<u8>)>>,
    stops: Mutex<Vec<UserSessionId>>,
}

impl RecordingTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started(&self) -> Vec<(UserSessionId, Vec<u8>)> {
        self.starts.lock().clone()
    }

    pub fn stopped(&self) -> Vec<UserSessionId> {
        self.stops.lock().clone()
    }
}

#[async_trait]
impl TranscodeControl for RecordingTranscoder {
    async fn start_hls(&self, user_id: &UserSessionId, sdp: Vec<u8>) -> Result<(), TranscodeError> {
        self.starts.lock().push((user_id.clone(), sdp));
        Ok(())
    }

    async fn stop(&self, user_id: &UserSessionId) -> Result<(), TranscodeError> {
        self.stops.lock().push(user_id.clone());
        Ok(())
    }
}
