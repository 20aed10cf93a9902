//! 에러 타입 정의

use thiserror::Error;

use crate::message::MessageType;

/// bwprobe 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("설정 파일 파싱 에러: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("유효하지 않은 설정: {0}")]
    InvalidConfig(String),

    #[error("메시지 길이 부족: {kind} 최소 {min} bytes, got {got}")]
    TooShort {
        kind: MessageType,
        min: usize,
        got: usize,
    },

    #[error("유효하지 않은 매직 넘버: expected {expected:08X}, got {got:08X}")]
    InvalidMagicNumber { expected: u32, got: u32 },

    #[error("메시지 타입 불일치: expected {expected}, got 0x{got:02X}")]
    MessageTypeMismatch { expected: MessageType, got: u8 },

    #[error("유효하지 않은 크기 요청: {0:?}")]
    InvalidSizeRequest(String),

    #[error("연결 종료: {received}/{expected} bytes 수신 후 끊김")]
    ConnectionClosed { received: u64, expected: u64 },

    #[error("오퍼 수신 타임아웃")]
    DiscoveryTimeout,

    #[error("취소됨")]
    Cancelled,

    #[error("워커 종료 실패: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
