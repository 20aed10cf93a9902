//! 서버 (송신측)
//!
//! 세 개의 독립 루프를 동시에 실행한다:
//! - Offer 브로드캐스트
//! - TCP accept → 연결마다 핸들러 태스크
//! - UDP 요청 수신 → 요청마다 핸들러 태스크
//!
//! 핸들러끼리 공유하는 가변 상태는 없다. 각 핸들러가 자기 소켓을 소유한다.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::net::{TcpListener, UdpSocket};
use tracing::{debug, info, trace, warn};

use crate::discovery::Broadcaster;
use crate::message::{filler, OfferMessage, RequestMessage};
use crate::{cancelled, net, tcp, udp, CancelRx, Config, Result};

/// 요청 수신 버퍼 크기
const RECV_BUFFER_SIZE: usize = 2048;

/// bwprobe 서버
pub struct Server {
    config: Config,
    tcp_listener: TcpListener,
    udp_socket: UdpSocket,
    broadcaster: Broadcaster,
    offer: OfferMessage,
    filler: Bytes,
}

impl Server {
    /// 소켓 바인딩. 포트가 0이면 임의 할당되고, Offer에는 실제 포트가 실린다.
    pub async fn bind(config: Config) -> Result<Self> {
        config.validate()?;

        let tcp_listener =
            net::bind_tcp_listener(SocketAddr::new(config.bind_ip, config.tcp_port))?;
        let udp_socket =
            net::bind_udp_reusable(SocketAddr::new(config.bind_ip, config.udp_port))?;

        let offer = OfferMessage::new(
            udp_socket.local_addr()?.port(),
            tcp_listener.local_addr()?.port(),
        );
        let broadcaster = Broadcaster::bind(&config, offer)?;

        info!(
            "Server started, listening on {} (TCP port {}, UDP port {})",
            config.bind_ip, offer.tcp_port, offer.udp_port
        );

        Ok(Self {
            filler: filler(config.segment_size),
            config,
            tcp_listener,
            udp_socket,
            broadcaster,
            offer,
        })
    }

    /// 브로드캐스트되는 Offer
    pub fn offer(&self) -> OfferMessage {
        self.offer
    }

    pub fn tcp_port(&self) -> u16 {
        self.offer.tcp_port
    }

    pub fn udp_port(&self) -> u16 {
        self.offer.udp_port
    }

    /// 취소될 때까지 세 루프 실행
    ///
    /// 루프 안의 에러는 로그만 남기고 계속 진행한다. 취소 후에도 이미 시작된
    /// 핸들러는 끝까지 실행된다.
    pub async fn run(self, cancel: CancelRx) -> Result<()> {
        let broadcast = tokio::spawn(self.broadcaster.run(cancel.clone()));
        let tcp = tokio::spawn(accept_tcp(self.tcp_listener, self.filler, cancel.clone()));
        let udp = tokio::spawn(listen_udp(
            self.udp_socket,
            self.config.segment_size,
            cancel,
        ));

        let (broadcast, tcp, udp) = tokio::join!(broadcast, tcp, udp);
        broadcast?;
        tcp?;
        udp?;

        info!("Server stopped");
        Ok(())
    }
}

async fn accept_tcp(listener: TcpListener, filler: Bytes, mut cancel: CancelRx) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        tokio::spawn(tcp::handle_connection(stream, peer, filler.clone()));
                    }
                    Err(e) => warn!("Error accepting TCP connection: {}", e),
                }
            }
            _ = cancelled(&mut cancel) => {
                debug!("TCP accept loop stopped");
                return;
            }
        }
    }
}

async fn listen_udp(socket: UdpSocket, segment_size: usize, mut cancel: CancelRx) {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                match result {
                    Ok((len, peer)) => match RequestMessage::from_bytes(&buf[..len]) {
                        Ok(request) => {
                            tokio::spawn(udp::handle_request(peer, request.size, segment_size));
                        }
                        Err(e) => trace!("Request 아님, 무시 ({}): {}", peer, e),
                    },
                    Err(e) => warn!("Error in UDP server: {}", e),
                }
            }
            _ = cancelled(&mut cancel) => {
                debug!("UDP request loop stopped");
                return;
            }
        }
    }
}
