use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use livecast_transcoder::Daemon;

#[derive(Debug, Parser)]
#[command(name = "livecast-transcoder", about = "HLS transcoder worker")]
struct Args {
    /// NATS server address
    #[arg(long, env = "NATS_ADDR", default_value = "nats://127.0.0.1:4222")]
    nats_addr: String,

    /// Root directory streams are written under
    #[arg(long, env = "STREAMS_ROOT_DIR", default_value = "streams")]
    streams_root: String,

    /// ffmpeg binary to drive the pipeline with
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "livecast_transcoder=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let daemon = Daemon::connect(&args.nats_addr, &args.streams_root, &args.ffmpeg).await?;

    daemon
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
}
