//! TCP 전송 경로
//!
//! - 클라이언트: `"<size>\n"` 요청 후 size 바이트를 받을 때까지 읽기
//! - 서버: filler 버퍼를 size 이상이 될 때까지 반복 전송 (마지막 write는 초과 가능)

use std::net::{Shutdown, SocketAddr};
use std::time::Instant;

use socket2::SockRef;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

use crate::message::{encode_size_request, parse_size_request, MAX_SIZE_REQUEST_LEN};
use crate::stats::{SendReport, TransferReport, TransferSession, Transport};
use crate::{Error, Result};

const RECV_BUFFER_SIZE: usize = 64 * 1024;

/// size 바이트를 요청하고 모두 받을 때까지 읽는다 (클라이언트측)
///
/// 시간 측정은 connect 직전부터 목표 바이트에 도달한 직후까지.
/// 목표 전에 서버가 연결을 닫으면 [`Error::ConnectionClosed`].
pub async fn request_transfer(
    server: SocketAddr,
    size: u64,
    worker_id: usize,
) -> Result<TransferReport> {
    let mut session = TransferSession::start();

    let mut stream = TcpStream::connect(server).await?;
    stream
        .write_all(encode_size_request(size).as_bytes())
        .await?;

    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    while session.bytes() < size {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Err(Error::ConnectionClosed {
                received: session.bytes(),
                expected: size,
            });
        }
        session.add_bytes(n as u64);
    }

    Ok(session.finish(worker_id, Transport::Tcp, size))
}

/// 연결 첫 줄에서 크기 요청을 읽는다
pub async fn read_size_request<R: AsyncRead + Unpin>(reader: R) -> Result<u64> {
    let mut line = String::new();
    let mut limited = BufReader::new(reader.take(MAX_SIZE_REQUEST_LEN as u64));
    limited.read_line(&mut line).await?;
    parse_size_request(&line)
}

/// 요청을 읽고 filler를 반복 전송 (서버측)
pub async fn serve_connection(
    stream: &mut TcpStream,
    peer: SocketAddr,
    filler: &[u8],
) -> Result<SendReport> {
    if filler.is_empty() {
        return Err(Error::InvalidConfig("empty filler buffer".into()));
    }

    let size = read_size_request(&mut *stream).await?;
    debug!("TCP client {} requested file of size: {} bytes", peer, size);

    let start = Instant::now();
    let mut bytes_sent = 0u64;
    while bytes_sent < size {
        stream.write_all(filler).await?;
        bytes_sent += filler.len() as u64;
    }
    stream.flush().await?;

    Ok(SendReport {
        peer,
        transport: Transport::Tcp,
        bytes_sent,
        segments_sent: None,
        elapsed: start.elapsed(),
    })
}

/// 연결 하나를 처리하고 항상 닫는다
///
/// 에러는 이 연결에만 영향을 주며 로그로 남긴다.
pub async fn handle_connection(mut stream: TcpStream, peer: SocketAddr, filler: bytes::Bytes) {
    info!("Handling TCP connection from {}", peer);

    match serve_connection(&mut stream, peer, &filler).await {
        Ok(report) => info!("{}", report.summary()),
        Err(e) => warn!("Error handling TCP client {}: {}", peer, e),
    }

    if let Err(e) = SockRef::from(&stream).shutdown(Shutdown::Both) {
        trace!("shutdown({}) 실패: {}", peer, e);
    }
    debug!("Connection with {} closed", peer);
}
