//! UDP 전송 경로
//!
//! - 클라이언트: Request 한 번 전송 후 관찰 윈도우 동안 세그먼트 수신/집계
//! - 서버: floor(size / segment_size)개의 세그먼트를 연속 전송 (pacing, ACK, 재전송 없음)
//!
//! 손실, 순서 뒤바뀜, 중복은 에러가 아니라 측정 대상이다.

use std::net::SocketAddr;
use std::time::Instant;

use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::message::{filler, total_segments, PayloadHeader, RequestMessage, PAYLOAD_HEADER_SIZE};
use crate::stats::{SendReport, TransferReport, TransferSession, Transport};
use crate::{net, Config, Result};

/// 수신 버퍼 크기 (최대 UDP 데이터그램)
const RECV_BUFFER_SIZE: usize = 64 * 1024;

/// size 바이트를 요청하고 관찰 윈도우 동안 수신 (클라이언트측)
///
/// 윈도우는 요청 전송 직후부터 `udp_window_ms`. 데이터그램 사이가 `recv_timeout_ms`
/// 이상 비면 더 올 데이터가 없다고 보고 일찍 끝낸다.
pub async fn request_transfer(
    server: SocketAddr,
    size: u64,
    worker_id: usize,
    config: &Config,
) -> Result<TransferReport> {
    let socket = net::bind_udp_for_remote(server).await?;
    socket
        .send_to(&RequestMessage::new(size).to_bytes(), server)
        .await?;
    info!(
        "UDP request sent to {} for file size {} bytes",
        server, size
    );

    let expected = total_segments(size, config.segment_size);
    let mut session = TransferSession::start_segmented(expected);
    let deadline = Instant::now() + config.udp_window();
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        let wait = config.recv_timeout().min(deadline - now);

        match timeout(wait, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, from))) => match PayloadHeader::from_bytes(&buf[..len]) {
                Ok(header) => {
                    session.record_segment(
                        header.segment_index,
                        (len - PAYLOAD_HEADER_SIZE) as u64,
                    );
                }
                Err(e) => trace!("Payload 아님, 무시 ({}): {}", from, e),
            },
            Ok(Err(e)) => {
                warn!("UDP receive error on transfer #{}: {}", worker_id, e);
                break;
            }
            Err(_) => {
                debug!("UDP transfer #{} receive timeout", worker_id);
                break;
            }
        }
    }

    Ok(session.finish(worker_id, Transport::Udp, size))
}

/// 세그먼트를 모두 전송 (서버측)
///
/// 정확히 `floor(size / segment_size)`개를 보내며 나머지 바이트는 보내지 않는다.
/// 개별 send 실패는 건너뛰고 계속 보낸다. `bytes_sent`는 전송 계층에 넘어간
/// 바이트만 센다.
pub async fn serve_request(peer: SocketAddr, size: u64, segment_size: usize) -> Result<SendReport> {
    let total = total_segments(size, segment_size);
    let socket = net::bind_udp_for_remote(peer).await?;
    let mut segment = filler(segment_size).to_vec();

    let start = Instant::now();
    let mut bytes_sent = 0u64;
    let mut send_errors = 0u64;

    for index in 0..total {
        PayloadHeader::new(total, index).encode_into(&mut segment)?;
        match socket.send_to(&segment, peer).await {
            Ok(n) => {
                bytes_sent += n as u64;
                trace!("Sent segment {}/{} to {}", index + 1, total, peer);
            }
            Err(e) => {
                send_errors += 1;
                trace!("segment {} send error: {}", index, e);
            }
        }
    }

    if send_errors > 0 {
        warn!(
            "{}/{} segments to {} failed to send",
            send_errors, total, peer
        );
    }

    Ok(SendReport {
        peer,
        transport: Transport::Udp,
        bytes_sent,
        segments_sent: Some(total),
        elapsed: start.elapsed(),
    })
}

/// 요청 하나를 처리. 에러는 이 요청에만 영향을 준다.
pub async fn handle_request(peer: SocketAddr, size: u64, segment_size: usize) {
    info!(
        "Handling UDP client from {} requesting file of size: {}",
        peer, size
    );

    match serve_request(peer, size, segment_size).await {
        Ok(report) => info!("{}", report.summary()),
        Err(e) => warn!("Error handling UDP client {}: {}", peer, e),
    }
}
