//! bwprobe 서버
//!
//! Offer를 브로드캐스트하고 TCP/UDP 전송 요청을 처리한다. Ctrl-C로 종료.
//!
//! 사용법:
//!   cargo run --release --bin bwprobe-server -- [OPTIONS]
//!
//! 예시:
//!   # 기본 포트, 255.255.255.255로 브로드캐스트
//!   cargo run --release --bin bwprobe-server
//!
//!   # 서브넷 브로드캐스트 + 설정 파일
//!   cargo run --release --bin bwprobe-server -- --broadcast 192.168.1.255 -c bwprobe.toml

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bwprobe::{Config, Server};

#[derive(Parser)]
#[command(name = "bwprobe-server")]
#[command(about = "Broadcast offers and serve TCP/UDP bandwidth tests")]
struct Cli {
    #[arg(short, long, help = "TOML config file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Bind address (default 0.0.0.0)")]
    bind: Option<IpAddr>,

    #[arg(long, help = "Offer destination address (default 255.255.255.255)")]
    broadcast: Option<IpAddr>,

    #[arg(long, help = "Offer broadcast port (default 14117)")]
    discovery_port: Option<u16>,

    #[arg(long, help = "TCP transfer port (default 65432, 0 = any)")]
    tcp_port: Option<u16>,

    #[arg(long, help = "UDP request port (default 14118, 0 = any)")]
    udp_port: Option<u16>,
}

impl Cli {
    fn into_config(self) -> bwprobe::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(ip) = self.bind {
            config.bind_ip = ip;
        }
        if let Some(ip) = self.broadcast {
            config.broadcast_ip = ip;
        }
        if let Some(port) = self.discovery_port {
            config.discovery_port = port;
        }
        if let Some(port) = self.tcp_port {
            config.tcp_port = port;
        }
        if let Some(port) = self.udp_port {
            config.udp_port = port;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_config()?;

    info!("bwprobe server starting...");
    info!("Offer destination: {}", config.broadcast_addr());
    info!("Segment size: {} bytes", config.segment_size);

    let server = Server::bind(config).await?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => {
                warn!("Ctrl-C handler error: {}", e);
                return;
            }
        }
        let _ = cancel_tx.send(true);
    });

    server.run(cancel_rx).await?;
    Ok(())
}
