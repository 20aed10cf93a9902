//! bwprobe 클라이언트
//!
//! Offer를 기다렸다가 TCP/UDP 전송을 동시에 실행하고 결과를 출력한 뒤 다시 대기한다.
//! 명령줄에 주지 않은 값(크기, 연결 수)은 표준 입력으로 묻는다.
//!
//! 사용법:
//!   cargo run --release --bin bwprobe-client -- [OPTIONS]
//!
//! 예시:
//!   # 10KB, TCP 1개 + UDP 1개, 한 라운드만
//!   cargo run --release --bin bwprobe-client -- --size 10240 --tcp 1 --udp 1 --once

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bwprobe::{Client, Config, Error, TransferPlan};

#[derive(Parser)]
#[command(name = "bwprobe-client")]
#[command(about = "Discover a bwprobe server and measure TCP/UDP throughput")]
struct Cli {
    #[arg(short, long, help = "TOML config file")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Bytes to request per transfer")]
    size: Option<u64>,

    #[arg(long, help = "Number of concurrent TCP transfers")]
    tcp: Option<usize>,

    #[arg(long, help = "Number of concurrent UDP transfers")]
    udp: Option<usize>,

    #[arg(long, help = "Offer broadcast port (default 14117)")]
    discovery_port: Option<u16>,

    #[arg(long, help = "Give up waiting for an offer after this many milliseconds")]
    discovery_timeout_ms: Option<u64>,

    #[arg(long, help = "Run a single round and exit")]
    once: bool,
}

/// 값이 파싱될 때까지 한 줄씩 묻는다
///
/// 여러 질문이 같은 `input`을 공유해야 파이프로 넘긴 줄이 버퍼에서 사라지지 않는다.
async fn prompt<R, T>(input: &mut R, question: &str) -> std::io::Result<T>
where
    R: AsyncBufRead + Unpin,
    T: FromStr,
{
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(question.as_bytes()).await?;
        stdout.flush().await?;

        let mut line = String::new();
        if input.read_line(&mut line).await? == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        match line.trim().parse() {
            Ok(value) => return Ok(value),
            Err(_) => warn!("Invalid input: {:?}", line.trim()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(port) = cli.discovery_port {
        config.discovery_port = port;
    }
    if let Some(ms) = cli.discovery_timeout_ms {
        config.discovery_timeout_ms = Some(ms);
    }
    config.validate()?;

    let mut stdin = BufReader::new(tokio::io::stdin());
    let file_size = match cli.size {
        Some(size) => size,
        None => prompt(&mut stdin, "Enter file size in bytes: ").await?,
    };
    let tcp_connections = match cli.tcp {
        Some(n) => n,
        None => prompt(&mut stdin, "Enter number of TCP connections: ").await?,
    };
    let udp_connections = match cli.udp {
        Some(n) => n,
        None => prompt(&mut stdin, "Enter number of UDP connections: ").await?,
    };

    let client = Client::new(
        config,
        TransferPlan::new(file_size, tcp_connections, udp_connections),
    );
    let plan = client.plan();
    info!(
        "Plan: {} bytes x ({} TCP + {} UDP)",
        plan.file_size, plan.tcp_connections, plan.udp_connections
    );

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

    let max_rounds = if cli.once { Some(1) } else { None };

    match client.run(cancel_rx, max_rounds).await {
        Ok(_) => Ok(()),
        Err(Error::DiscoveryTimeout) => {
            error!("No server offer received before the discovery timeout");
            Err(Error::DiscoveryTimeout.into())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prompts_read_consecutive_lines() {
        let mut input = BufReader::new(&b"10240\n1\n2\n"[..]);

        let size: u64 = prompt(&mut input, "size: ").await.unwrap();
        let tcp: usize = prompt(&mut input, "tcp: ").await.unwrap();
        let udp: usize = prompt(&mut input, "udp: ").await.unwrap();
        assert_eq!((size, tcp, udp), (10240, 1, 2));
    }

    #[tokio::test]
    async fn test_prompt_retries_invalid_input() {
        let mut input = BufReader::new(&b"ten\n  42 \n"[..]);
        let value: u64 = prompt(&mut input, "size: ").await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_prompt_eof() {
        let mut input = BufReader::new(&b""[..]);
        let err = prompt::<_, u64>(&mut input, "size: ").await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }
}
