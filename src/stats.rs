//! 전송 통계

use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// 전송 경로 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Tcp => write!(f, "TCP"),
            Transport::Udp => write!(f, "UDP"),
        }
    }
}

/// 처리율 (bits/sec). 경과 시간이 0이면 0.
pub fn bits_per_second(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    (bytes as f64 * 8.0) / secs
}

/// UDP 세그먼트 수신 기록
///
/// 중복 제거는 하지 않는다. 같은 인덱스가 두 번 도착하면 두 번 센다.
#[derive(Debug, Clone, Default)]
pub struct SegmentStats {
    /// 기대 세그먼트 수 (floor(size / segment_size))
    pub expected: u64,

    /// 도착한 세그먼트 수
    pub received: u64,

    /// 이전에 본 최대 인덱스보다 작은 인덱스로 도착한 수
    pub out_of_order: u64,

    /// 지금까지 본 최대 인덱스
    pub highest_index: Option<u64>,
}

impl SegmentStats {
    pub fn new(expected: u64) -> Self {
        Self {
            expected,
            ..Self::default()
        }
    }

    /// 세그먼트 도착 기록
    pub fn record(&mut self, segment_index: u64) {
        self.received += 1;

        match self.highest_index {
            Some(highest) if segment_index < highest => self.out_of_order += 1,
            Some(highest) if segment_index == highest => {}
            _ => self.highest_index = Some(segment_index),
        }
    }

    /// 수신 성공률 (%). 기대 수가 0이면 0, 중복 도착이 있어도 100을 넘지 않음.
    pub fn success_rate(&self) -> f64 {
        if self.expected == 0 {
            return 0.0;
        }
        ((self.received as f64 / self.expected as f64) * 100.0).min(100.0)
    }
}

/// 워커 하나의 전송 세션
///
/// 전송 시작 시 생성되어 워커가 결과를 보고하면 [`TransferReport`]로 소모된다.
#[derive(Debug)]
pub struct TransferSession {
    started: Instant,
    bytes: u64,
    segments: Option<SegmentStats>,
}

impl TransferSession {
    /// TCP 세션 시작
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            bytes: 0,
            segments: None,
        }
    }

    /// UDP 세션 시작
    pub fn start_segmented(expected_segments: u64) -> Self {
        Self {
            segments: Some(SegmentStats::new(expected_segments)),
            ..Self::start()
        }
    }

    pub fn add_bytes(&mut self, n: u64) {
        self.bytes += n;
    }

    /// 세그먼트 도착 기록 (헤더 제외 바이트 포함)
    pub fn record_segment(&mut self, segment_index: u64, payload_bytes: u64) {
        self.bytes += payload_bytes;
        if let Some(segments) = self.segments.as_mut() {
            segments.record(segment_index);
        }
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn finish(self, worker_id: usize, transport: Transport, requested: u64) -> TransferReport {
        TransferReport {
            worker_id,
            transport,
            requested,
            bytes: self.bytes,
            elapsed: self.started.elapsed(),
            segments: self.segments,
        }
    }
}

/// 클라이언트 워커 결과
#[derive(Debug, Clone)]
pub struct TransferReport {
    /// 라운드 내 워커 번호 (전송 종류별 1부터)
    pub worker_id: usize,

    pub transport: Transport,

    /// 요청 바이트 수
    pub requested: u64,

    /// 수신 바이트 수 (UDP는 헤더 제외)
    pub bytes: u64,

    pub elapsed: Duration,

    /// UDP 전용
    pub segments: Option<SegmentStats>,
}

impl TransferReport {
    pub fn throughput_bps(&self) -> f64 {
        bits_per_second(self.bytes, self.elapsed)
    }

    pub fn success_rate(&self) -> Option<f64> {
        self.segments.as_ref().map(SegmentStats::success_rate)
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} transfer #{} finished, total time: {:.2} seconds, speed: {:.2} bits/second",
            self.transport,
            self.worker_id,
            self.elapsed.as_secs_f64(),
            self.throughput_bps(),
        );
        if let Some(rate) = self.success_rate() {
            line.push_str(&format!(
                ", percentage of packets received successfully: {:.2}%",
                rate
            ));
        }
        line
    }
}

/// 서버 핸들러 결과 (전송 계층에 넘긴 바이트 기준)
#[derive(Debug, Clone)]
pub struct SendReport {
    pub peer: SocketAddr,
    pub transport: Transport,
    pub bytes_sent: u64,
    /// UDP 전용
    pub segments_sent: Option<u64>,
    pub elapsed: Duration,
}

impl SendReport {
    pub fn throughput_bps(&self) -> f64 {
        bits_per_second(self.bytes_sent, self.elapsed)
    }

    pub fn summary(&self) -> String {
        format!(
            "Sent {} bytes over {} to {} at {:.2} bits/second",
            self.bytes_sent,
            self.transport,
            self.peer,
            self.throughput_bps()
        )
    }
}
