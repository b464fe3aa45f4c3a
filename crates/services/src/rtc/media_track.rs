use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, warn};
use webrtc::track::track_remote::TrackRemote;
use webrtc::util::Marshal;

use super::RtcError;

/// A remote track being forwarded as raw RTP to the transcoder's loopback
/// UDP port. Lives from the peer connection's on-track event until the
/// participant closes.
pub struct MediaTrack {
    id: String,
    payload_type: u8,
    socket: Arc<UdpSocket>,
    packets_forwarded: AtomicU64,
    shutdown: watch::Sender<bool>,
}

impl MediaTrack {
    /// Dials from an ephemeral local address to `127.0.0.1:<port>`.
    pub async fn new(id: String, payload_type: u8, port: u16) -> Result<Arc<Self>, RtcError> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        socket.connect(("127.0.0.1", port)).await?;

        let (shutdown, _) = watch::channel(false);
        Ok(Arc::new(Self {
            id,
            payload_type,
            socket: Arc::new(socket),
            packets_forwarded: AtomicU64::new(0),
            shutdown,
        }))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn packets_forwarded(&self) -> u64 {
        self.packets_forwarded.load(Ordering::Relaxed)
    }

    /// Reads RTP from the remote track one packet at a time, rewrites the
    /// payload type to the value the transcoder SDP advertises, and sends
    /// it over UDP. "Connection refused" means the transcoder has not
    /// attached yet and is skipped; any other send error ends the loop.
    pub fn forward_rtp(self: &Arc<Self>, track: Arc<TrackRemote>) {
        let this = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    read = track.read(&mut buf) => {
                        let mut packet = match read {
                            Ok((packet, _)) => packet,
                            Err(e) => {
                                debug!(track = %this.id, %e, "remote track ended");
                                break;
                            }
                        };
                        packet.header.payload_type = this.payload_type;

                        let n = match packet.marshal_to(&mut buf) {
                            Ok(n) => n,
                            Err(e) => {
                                warn!(track = %this.id, %e, "failed to remarshal RTP packet");
                                continue;
                            }
                        };

                        match this.socket.send(&buf[..n]).await {
                            Ok(_) => {
                                this.packets_forwarded.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                                // Transcoder not attached yet.
                                continue;
                            }
                            Err(e) => {
                                warn!(track = %this.id, %e, "UDP forward failed, closing track");
                                break;
                            }
                        }
                    }
                }
            }
        });
    }

    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }
}
