//! 소켓 생성 유틸리티
//!
//! bind 전에 소켓 옵션(SO_REUSEADDR, SO_BROADCAST)을 설정해야 하므로 socket2로
//! 만든 뒤 tokio 소켓으로 변환한다.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::net::{TcpListener, UdpSocket};
use tracing::debug;

fn domain_for(addr: &SocketAddr) -> Domain {
    if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    }
}

fn into_tokio_udp(socket: Socket) -> io::Result<UdpSocket> {
    socket.set_nonblocking(true)?;
    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}

/// SO_REUSEADDR가 설정된 UDP 소켓
///
/// 같은 포트에 여러 리스너가 공존할 수 있다 (브로드캐스트는 모두에게 전달됨).
pub fn bind_udp_reusable(addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = Socket::new(domain_for(&addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&SockAddr::from(addr))?;

    debug!("UDP socket bound to {} (reuse)", addr);
    into_tokio_udp(socket)
}

/// 오퍼 송신용 브로드캐스트 소켓 (임의 포트)
pub fn bind_udp_broadcast() -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;
    socket.bind(&SockAddr::from(SocketAddr::new(
        IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        0,
    )))?;
    into_tokio_udp(socket)
}

/// 원격 주소와 같은 주소 체계의 임의 포트 UDP 소켓
pub async fn bind_udp_for_remote(remote: SocketAddr) -> io::Result<UdpSocket> {
    let local = if remote.is_ipv4() {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
    } else {
        SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
    };
    UdpSocket::bind(local).await
}

/// SO_REUSEADDR가 설정된 TCP 리스너
pub fn bind_tcp_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(domain_for(&addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&SockAddr::from(addr))?;
    socket.listen(128)?;

    socket.set_nonblocking(true)?;
    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}
