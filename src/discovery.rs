//! 서버 탐색
//!
//! - 서버: 주기적으로 Offer를 브로드캐스트 ([`Broadcaster`])
//! - 클라이언트: 유효한 Offer가 올 때까지 대기 ([`listen_for_offer`])
//!
//! 탐색 포트는 무관한 트래픽과 공유되므로, 매직 넘버/타입이 맞지 않는 데이터그램은
//! 에러가 아니라 조용히 버린다.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::{debug, info, trace, warn};

use crate::message::OfferMessage;
use crate::{cancelled, net, CancelRx, Config, Error, Result};

/// 수신 버퍼 크기
const RECV_BUFFER_SIZE: usize = 1024;

/// 수신한 서버 오퍼
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offer {
    /// 오퍼를 보낸 서버 주소
    pub server_ip: IpAddr,
    pub udp_port: u16,
    pub tcp_port: u16,
}

impl Offer {
    pub fn from_message(server_ip: IpAddr, msg: OfferMessage) -> Self {
        Self {
            server_ip,
            udp_port: msg.udp_port,
            tcp_port: msg.tcp_port,
        }
    }

    pub fn tcp_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server_ip, self.tcp_port)
    }

    pub fn udp_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server_ip, self.udp_port)
    }
}

impl fmt::Display for Offer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on TCP port {}, UDP port {}",
            self.server_ip, self.tcp_port, self.udp_port
        )
    }
}

/// Offer 브로드캐스터 (서버측)
pub struct Broadcaster {
    socket: UdpSocket,
    packet: bytes::Bytes,
    dest: SocketAddr,
    interval: Duration,
}

impl Broadcaster {
    pub fn bind(config: &Config, offer: OfferMessage) -> Result<Self> {
        Ok(Self {
            socket: net::bind_udp_broadcast()?,
            packet: offer.to_bytes(),
            dest: config.broadcast_addr(),
            interval: config.broadcast_interval(),
        })
    }

    /// 취소될 때까지 `interval`마다 Offer 전송
    ///
    /// 송신 실패는 로그만 남기고 다음 주기에 다시 시도한다.
    pub async fn run(self, mut cancel: CancelRx) {
        info!("Broadcasting offers to {} every {:?}", self.dest, self.interval);

        loop {
            match self.socket.send_to(&self.packet, self.dest).await {
                Ok(_) => debug!("Offer message sent via broadcast"),
                Err(e) => warn!("Offer 전송 실패 ({}): {}", self.dest, e),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = cancelled(&mut cancel) => {
                    debug!("Broadcaster stopped");
                    return;
                }
            }
        }
    }
}

/// 탐색 포트에 바인딩하고 유효한 Offer를 받을 때까지 대기 (클라이언트측)
///
/// `discovery_timeout_ms`가 없으면 무한 대기한다. 있으면 시간 초과 시
/// [`Error::DiscoveryTimeout`].
pub async fn listen_for_offer(config: &Config, cancel: &mut CancelRx) -> Result<Offer> {
    let bind_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.discovery_port);
    let socket = net::bind_udp_reusable(bind_addr)?;

    info!("Client started, listening for offer requests...");

    let search = wait_for_offer(&socket, cancel);
    match config.discovery_timeout() {
        Some(limit) => tokio::time::timeout(limit, search)
            .await
            .map_err(|_| Error::DiscoveryTimeout)?,
        None => search.await,
    }
}

/// 이미 바인딩된 소켓에서 첫 번째 유효한 Offer를 반환
pub async fn wait_for_offer(socket: &UdpSocket, cancel: &mut CancelRx) -> Result<Offer> {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                match result {
                    Ok((len, addr)) => match OfferMessage::from_bytes(&buf[..len]) {
                        Ok(msg) => {
                            let offer = Offer::from_message(addr.ip(), msg);
                            info!("Received offer from {}", offer);
                            return Ok(offer);
                        }
                        Err(e) => trace!("Offer 아님, 무시 ({}): {}", addr, e),
                    },
                    Err(e) => warn!("Error receiving offer: {}", e),
                }
            }
            _ = cancelled(cancel) => return Err(Error::Cancelled),
        }
    }
}
