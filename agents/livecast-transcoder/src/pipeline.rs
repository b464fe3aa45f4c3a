use std::path::{Path, PathBuf};
use tokio::process::{Child, Command};

pub const TRANSCODER_SDP_FILENAME: &str = "transcoder.sdp";
pub const STREAM_DIR: &str = "stream";
pub const PLAYLIST_FILENAME: &str = "stream.m3u8";

/// Filesystem layout of one user's stream under the streams root.
pub struct StreamPaths {
    pub user_dir: PathBuf,
    pub sdp_path: PathBuf,
    pub stream_dir: PathBuf,
}

impl StreamPaths {
    pub fn new(streams_root: &Path, user_id: &str) -> Self {
        let user_dir = streams_root.join(user_id);
        Self {
            sdp_path: user_dir.join(TRANSCODER_SDP_FILENAME),
            stream_dir: user_dir.join(STREAM_DIR),
            user_dir,
        }
    }
}

/// The ffmpeg invocation reading RTP as described by the SDP and rolling
/// an HLS playlist with a bounded segment window.
pub fn hls_command(ffmpeg: &str, paths: &StreamPaths) -> Command {
    let mut command = Command::new(ffmpeg);
    command
        .arg("-hide_banner")
        .arg("-loglevel")
        .arg("warning")
        .arg("-protocol_whitelist")
        .arg("file,udp,rtp")
        .arg("-i")
        .arg(&paths.sdp_path)
        .arg("-c:v")
        .arg("libx264")
        .arg("-preset")
        .arg("veryfast")
        .arg("-tune")
        .arg("zerolatency")
        .arg("-c:a")
        .arg("aac")
        .arg("-f")
        .arg("hls")
        .arg("-hls_time")
        .arg("2")
        .arg("-hls_list_size")
        .arg("5")
        .arg("-hls_flags")
        .arg("delete_segments")
        .arg("-hls_segment_filename")
        .arg(paths.stream_dir.join("%03d.ts"))
        .arg(paths.stream_dir.join(PLAYLIST_FILENAME));
    command.kill_on_drop(true);
    command
}

pub async fn spawn_hls(ffmpeg: &str, paths: &StreamPaths) -> std::io::Result<Child> {
    tokio::fs::create_dir_all(&paths.stream_dir).await?;
    hls_command(ffmpeg, paths).spawn()
}
