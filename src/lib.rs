//! # bwprobe
//!
//! 브로드캐스트 탐색 기반 TCP/UDP 대역폭 측정 도구
//!
//! ## 동작
//! - **서버**: Offer를 주기적으로 브로드캐스트하고, TCP 연결/UDP 요청마다 핸들러 태스크 생성
//! - **클라이언트**: Offer 수신 → TCP/UDP 워커 N개 동시 실행 → 각자 처리율/손실률 보고
//! - **TCP 경로**: `"<size>\n"` 요청, 서버가 size 바이트 이상 스트리밍
//! - **UDP 경로**: 바이너리 Request, 서버가 고정 크기 세그먼트를 보내고 클라이언트는
//!   관찰 윈도우 동안 도착한 세그먼트를 센다
//!
//! 모든 루프는 [`CancelRx`] 취소 신호로 멈출 수 있다.

pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod message;
pub mod net;
pub mod server;
pub mod stats;
pub mod tcp;
pub mod udp;

pub use client::{Client, RoundSummary, RunSummary};
pub use config::{Config, TransferPlan};
pub use discovery::{listen_for_offer, Broadcaster, Offer};
pub use error::{Error, Result};
pub use message::{MessageType, OfferMessage, PayloadHeader, RequestMessage};
pub use server::Server;
pub use stats::{SendReport, TransferReport, Transport};

/// 매직 넘버 (패킷 식별용)
pub const MAGIC_COOKIE: u32 = 0xABCD_DCBA;

/// Offer 브로드캐스트 포트
pub const DISCOVERY_PORT: u16 = 14117;

/// 기본 TCP 전송 포트
pub const TCP_PORT: u16 = 65432;

/// 기본 UDP 요청 포트 (탐색 포트와 분리해서 같은 호스트에 클라이언트/서버 공존 가능)
pub const UDP_PORT: u16 = 14118;

/// UDP 세그먼트 크기 (바이트)
pub const SEGMENT_SIZE: usize = 1024;

/// 취소 신호 수신기. `true`가 되면 루프가 멈춘다.
pub type CancelRx = tokio::sync::watch::Receiver<bool>;

/// 취소 신호가 올 때까지 대기. 송신측이 사라지면 영원히 대기.
pub(crate) async fn cancelled(cancel: &mut CancelRx) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
