//! 프로토콜 설정

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::message::PAYLOAD_HEADER_SIZE;
use crate::{Error, Result, DISCOVERY_PORT, SEGMENT_SIZE, TCP_PORT, UDP_PORT};

/// UDP 데이터그램 최대 페이로드 (IPv4)
const MAX_DATAGRAM_SIZE: usize = 65507;

/// bwprobe 네트워크 설정 (서버/클라이언트 공용)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 오퍼 브로드캐스트 포트
    pub discovery_port: u16,

    /// TCP 전송 포트 (0이면 임의 할당)
    pub tcp_port: u16,

    /// UDP 요청 포트 (0이면 임의 할당)
    pub udp_port: u16,

    /// UDP 세그먼트 크기 및 TCP filler 버퍼 크기 (바이트)
    pub segment_size: usize,

    /// 오퍼 전송 간격 (밀리초)
    pub broadcast_interval_ms: u64,

    /// UDP 수신 관찰 윈도우 (밀리초)
    pub udp_window_ms: u64,

    /// 데이터그램당 수신 타임아웃 (밀리초)
    pub recv_timeout_ms: u64,

    /// 오퍼 대기 타임아웃 (밀리초)
    /// None이면 유효한 오퍼가 올 때까지 무한 대기
    pub discovery_timeout_ms: Option<u64>,

    /// 서버 바인드 주소
    pub bind_ip: IpAddr,

    /// 오퍼 목적지 주소
    pub broadcast_ip: IpAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discovery_port: DISCOVERY_PORT,
            tcp_port: TCP_PORT,
            udp_port: UDP_PORT,
            segment_size: SEGMENT_SIZE,
            broadcast_interval_ms: 1000,
            udp_window_ms: 1000,
            recv_timeout_ms: 1000,
            discovery_timeout_ms: None,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            broadcast_ip: IpAddr::V4(Ipv4Addr::BROADCAST),
        }
    }
}

impl Config {
    /// 단일 호스트용 설정
    ///
    /// 오퍼를 127.0.0.1로 보내고, 전송 포트는 임의 할당, 타이머는 짧게.
    pub fn loopback(discovery_port: u16) -> Self {
        Self {
            discovery_port,
            tcp_port: 0,
            udp_port: 0,
            broadcast_interval_ms: 100,
            udp_window_ms: 500,
            recv_timeout_ms: 200,
            discovery_timeout_ms: Some(5000),
            bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            broadcast_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            ..Self::default()
        }
    }

    /// TOML 파일에서 로드. 빠진 항목은 기본값.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.segment_size < PAYLOAD_HEADER_SIZE || self.segment_size > MAX_DATAGRAM_SIZE {
            return Err(Error::InvalidConfig(format!(
                "segment_size {} must be within {}..={}",
                self.segment_size, PAYLOAD_HEADER_SIZE, MAX_DATAGRAM_SIZE
            )));
        }
        if self.broadcast_interval_ms == 0 {
            return Err(Error::InvalidConfig("broadcast_interval_ms must be > 0".into()));
        }
        if self.udp_window_ms == 0 || self.recv_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "udp_window_ms and recv_timeout_ms must be > 0".into(),
            ));
        }
        // 오퍼는 IPv4 브로드캐스트로만 보낸다
        if !self.broadcast_ip.is_ipv4() {
            return Err(Error::InvalidConfig(format!(
                "broadcast_ip {} must be an IPv4 address",
                self.broadcast_ip
            )));
        }
        Ok(())
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }

    pub fn udp_window(&self) -> Duration {
        Duration::from_millis(self.udp_window_ms)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    pub fn discovery_timeout(&self) -> Option<Duration> {
        self.discovery_timeout_ms.map(Duration::from_millis)
    }

    /// 오퍼 목적지
    pub fn broadcast_addr(&self) -> SocketAddr {
        SocketAddr::new(self.broadcast_ip, self.discovery_port)
    }
}

/// 클라이언트 한 라운드의 전송 계획
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransferPlan {
    /// 워커마다 요청할 바이트 수
    pub file_size: u64,

    /// TCP 워커 수
    pub tcp_connections: usize,

    /// UDP 워커 수
    pub udp_connections: usize,
}

impl TransferPlan {
    pub fn new(file_size: u64, tcp_connections: usize, udp_connections: usize) -> Self {
        Self {
            file_size,
            tcp_connections,
            udp_connections,
        }
    }

    /// 총 워커 수
    pub fn total_workers(&self) -> usize {
        self.tcp_connections + self.udp_connections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.discovery_port, 14117);
        assert_eq!(config.tcp_port, 65432);
        assert_eq!(config.segment_size, 1024);
        assert_eq!(config.broadcast_interval(), Duration::from_secs(1));
        assert_eq!(config.udp_window(), Duration::from_secs(1));
        assert_eq!(config.recv_timeout(), Duration::from_secs(1));
        assert!(config.discovery_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_segment_size() {
        let mut config = Config::default();
        config.segment_size = PAYLOAD_HEADER_SIZE - 1;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        config.segment_size = 70_000;
        assert!(config.validate().is_err());

        config.segment_size = PAYLOAD_HEADER_SIZE;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_ipv6_broadcast() {
        let mut config = Config::default();
        config.broadcast_ip = "ff02::1".parse().unwrap();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        config.broadcast_ip = "192.168.0.255".parse().unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "discovery_port = 15000").unwrap();
        writeln!(file, "broadcast_ip = \"192.168.1.255\"").unwrap();
        writeln!(file, "discovery_timeout_ms = 3000").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.discovery_port, 15000);
        assert_eq!(config.broadcast_addr(), "192.168.1.255:15000".parse().unwrap());
        assert_eq!(config.discovery_timeout(), Some(Duration::from_secs(3)));
        // 나머지는 기본값
        assert_eq!(config.tcp_port, TCP_PORT);
        assert_eq!(config.segment_size, SEGMENT_SIZE);
    }

    #[test]
    fn test_from_file_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "segment_size = 4").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(Error::InvalidConfig(_))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "discovery_port = \"nope\"").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(Error::ConfigParse(_))
        ));
    }

    #[test]
    fn test_transfer_plan() {
        let plan = TransferPlan::new(10240, 2, 3);
        assert_eq!(plan.total_workers(), 5);
    }
}
