use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use pulse_relay::{serve, ChannelHub};

#[derive(Parser)]
#[command(name = "pulse-relay", about = "WebSocket pub/sub relay for pulse chat")]
struct Args {
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Seconds between channel statistics log lines.
    #[arg(long, default_value_t = 60)]
    stats_interval: u64,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulse_relay=info".into()),
        )
        .init();

    let args = Args::parse();
    let hub = ChannelHub::new();

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("pulse-relay listening on {}", addr);

    let stats_hub = hub.clone();
    let period = Duration::from_secs(args.stats_interval.max(1));
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(period).await;
            let connections = stats_hub.connection_count().await;
            let channels = stats_hub.channel_count().await;
            tracing::debug!(connections, channels, "Stats tick");
        }
    });

    tokio::select! {
        _ = serve(listener, hub) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }
    Ok(())
}
