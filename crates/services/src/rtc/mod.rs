pub mod config;
pub mod media_engine;
pub mod media_track;
pub mod participant;
pub mod ports;
pub mod room;
pub mod transcoder_sdp;
pub mod transport;

use thiserror::Error;

use crate::eventbus::{BusError, RpcError};

pub use config::{DirectionConfig, WebRtcConfig};
pub use media_track::MediaTrack;
pub use participant::Participant;
pub use ports::PortsAllocator;
pub use room::Room;
pub use transport::PcTransport;

#[derive(Debug, Error)]
pub enum RtcError {
    #[error("participant is not initialized")]
    ParticipantNotFound,
    #[error("receiver transport is not initialized")]
    ReceiverNotInitialized,
    #[error("no free UDP ports for transcoder egress")]
    NoFreePorts,
    #[error("local description unavailable")]
    LocalDescriptionMissing,
    #[error(transparent)]
    Webrtc(#[from] webrtc::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}
