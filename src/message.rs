//! 와이어 프로토콜 메시지 정의
//!
//! 모든 바이너리 메시지는 네트워크 바이트 순서(big-endian) 고정 레이아웃:
//!
//! | 메시지 | 필드 | 크기 |
//! |---|---|---|
//! | Offer | magic:u32, type:u8=0x2, udp_port:u16, tcp_port:u16 | 9 |
//! | Request | magic:u32, type:u8=0x3, size:u64 | 13 |
//! | Payload | magic:u32, type:u8=0x4, total:u64, index:u64, filler | segment_size |
//!
//! TCP 경로의 요청만은 바이너리가 아닌 `"<size>\n"` 텍스트 한 줄이다.
//! 기존 클라이언트/서버와의 호환을 위해 두 프레이밍을 통일하지 않는다.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use rand::RngCore;

use crate::{Error, Result, MAGIC_COOKIE};

/// magic(4) + type(1)
const PREAMBLE_SIZE: usize = 5;

/// Offer 메시지 크기
pub const OFFER_SIZE: usize = PREAMBLE_SIZE + 2 + 2;

/// Request 메시지 크기
pub const REQUEST_SIZE: usize = PREAMBLE_SIZE + 8;

/// Payload 헤더 크기 (나머지는 filler)
pub const PAYLOAD_HEADER_SIZE: usize = PREAMBLE_SIZE + 8 + 8;

/// TCP 크기 요청 한 줄의 최대 길이
pub const MAX_SIZE_REQUEST_LEN: usize = 64;

/// 메시지 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// 서버 오퍼 (브로드캐스트)
    Offer = 0x2,

    /// UDP 전송 요청
    Request = 0x3,

    /// UDP 데이터 세그먼트
    Payload = 0x4,
}

impl MessageType {
    /// 이 타입 메시지의 최소 길이
    pub fn min_len(self) -> usize {
        match self {
            MessageType::Offer => OFFER_SIZE,
            MessageType::Request => REQUEST_SIZE,
            MessageType::Payload => PAYLOAD_HEADER_SIZE,
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::Offer => write!(f, "Offer"),
            MessageType::Request => write!(f, "Request"),
            MessageType::Payload => write!(f, "Payload"),
        }
    }
}

/// 길이, 매직 넘버, 타입을 검사하고 커서를 본문 위치로 옮긴다.
fn read_preamble(buf: &mut &[u8], expected: MessageType) -> Result<()> {
    let min = expected.min_len();
    if buf.len() < min {
        return Err(Error::TooShort {
            kind: expected,
            min,
            got: buf.len(),
        });
    }

    let magic = buf.get_u32();
    if magic != MAGIC_COOKIE {
        return Err(Error::InvalidMagicNumber {
            expected: MAGIC_COOKIE,
            got: magic,
        });
    }

    let msg_type = buf.get_u8();
    if msg_type != expected as u8 {
        return Err(Error::MessageTypeMismatch {
            expected,
            got: msg_type,
        });
    }

    Ok(())
}

fn put_preamble(buf: &mut impl BufMut, msg_type: MessageType) {
    buf.put_u32(MAGIC_COOKIE);
    buf.put_u8(msg_type as u8);
}

/// 서버 오퍼 메시지 (서버 → 브로드캐스트)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferMessage {
    /// UDP 요청 포트
    pub udp_port: u16,

    /// TCP 접속 포트
    pub tcp_port: u16,
}

impl OfferMessage {
    pub fn new(udp_port: u16, tcp_port: u16) -> Self {
        Self { udp_port, tcp_port }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(OFFER_SIZE);
        put_preamble(&mut buf, MessageType::Offer);
        buf.put_u16(self.udp_port);
        buf.put_u16(self.tcp_port);
        buf.freeze()
    }

    /// 앞 9바이트만 해석하며 뒤에 붙은 바이트는 무시한다.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;
        read_preamble(&mut buf, MessageType::Offer)?;
        Ok(Self {
            udp_port: buf.get_u16(),
            tcp_port: buf.get_u16(),
        })
    }
}

/// UDP 전송 요청 (클라이언트 → 서버)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestMessage {
    /// 요청 바이트 수
    pub size: u64,
}

impl RequestMessage {
    pub fn new(size: u64) -> Self {
        Self { size }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(REQUEST_SIZE);
        put_preamble(&mut buf, MessageType::Request);
        buf.put_u64(self.size);
        buf.freeze()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;
        read_preamble(&mut buf, MessageType::Request)?;
        Ok(Self {
            size: buf.get_u64(),
        })
    }
}

/// UDP 데이터 세그먼트 헤더 (서버 → 클라이언트)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    /// 이 전송의 총 세그먼트 수
    pub total_segments: u64,

    /// 세그먼트 인덱스 (0부터)
    pub segment_index: u64,
}

impl PayloadHeader {
    pub fn new(total_segments: u64, segment_index: u64) -> Self {
        Self {
            total_segments,
            segment_index,
        }
    }

    /// 세그먼트 버퍼 앞부분에 헤더를 덮어쓴다. filler 영역은 건드리지 않는다.
    pub fn encode_into(&self, segment: &mut [u8]) -> Result<()> {
        if segment.len() < PAYLOAD_HEADER_SIZE {
            return Err(Error::TooShort {
                kind: MessageType::Payload,
                min: PAYLOAD_HEADER_SIZE,
                got: segment.len(),
            });
        }

        let mut cursor = &mut segment[..PAYLOAD_HEADER_SIZE];
        put_preamble(&mut cursor, MessageType::Payload);
        cursor.put_u64(self.total_segments);
        cursor.put_u64(self.segment_index);
        Ok(())
    }

    /// `segment_size`까지 0으로 패딩된 세그먼트 생성
    pub fn to_segment(&self, segment_size: usize) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(segment_size);
        self.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;
        read_preamble(&mut buf, MessageType::Payload)?;
        Ok(Self {
            total_segments: buf.get_u64(),
            segment_index: buf.get_u64(),
        })
    }
}

/// UDP 전송의 세그먼트 수.
///
/// 나머지 바이트(`size % segment_size`)는 전송하지 않는다. 즉 실제 전송량은
/// `segment_size`의 배수로 내림된다.
pub fn total_segments(size: u64, segment_size: usize) -> u64 {
    if segment_size == 0 {
        return 0;
    }
    size / segment_size as u64
}

/// 임의 바이트로 채운 filler 버퍼. 내용은 의미 없다.
pub fn filler(len: usize) -> Bytes {
    let mut buf = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut buf);
    Bytes::from(buf)
}

/// TCP 크기 요청 인코딩 (`"<size>\n"`)
pub fn encode_size_request(size: u64) -> String {
    format!("{}\n", size)
}

/// TCP 크기 요청 파싱. 앞뒤 공백과 줄바꿈은 무시한다.
pub fn parse_size_request(line: &str) -> Result<u64> {
    let trimmed = line.trim();
    trimmed
        .parse::<u64>()
        .map_err(|_| Error::InvalidSizeRequest(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_layout() {
        let bytes = OfferMessage::new(14118, 65432).to_bytes();
        assert_eq!(bytes.len(), OFFER_SIZE);
        assert_eq!(
            bytes.as_ref(),
            &[0xAB, 0xCD, 0xDC, 0xBA, 0x02, 0x37, 0x26, 0xFF, 0x98]
        );
    }

    #[test]
    fn test_offer_ports_preserved() {
        for (udp, tcp) in [(0, 0), (1, u16::MAX), (14117, 65432)] {
            let decoded = OfferMessage::from_bytes(&OfferMessage::new(udp, tcp).to_bytes()).unwrap();
            assert_eq!(decoded.udp_port, udp);
            assert_eq!(decoded.tcp_port, tcp);
        }
    }

    #[test]
    fn test_offer_trailing_bytes_ignored() {
        let mut buf = OfferMessage::new(1000, 2000).to_bytes().to_vec();
        buf.extend_from_slice(&[0xFF; 16]);
        let decoded = OfferMessage::from_bytes(&buf).unwrap();
        assert_eq!(decoded, OfferMessage::new(1000, 2000));
    }

    #[test]
    fn test_reject_wrong_magic() {
        let mut buf = OfferMessage::new(1, 2).to_bytes().to_vec();
        buf[0] = 0x00;
        assert!(matches!(
            OfferMessage::from_bytes(&buf),
            Err(Error::InvalidMagicNumber { .. })
        ));
    }

    #[test]
    fn test_reject_wrong_type() {
        // Request를 Offer로 해석하면 타입 불일치
        let buf = RequestMessage::new(4096).to_bytes();
        assert!(matches!(
            OfferMessage::from_bytes(&buf),
            Err(Error::MessageTypeMismatch {
                expected: MessageType::Offer,
                got: 0x3
            })
        ));
    }

    #[test]
    fn test_reject_short_buffer() {
        let offer = OfferMessage::new(1, 2).to_bytes();
        assert!(matches!(
            OfferMessage::from_bytes(&offer[..OFFER_SIZE - 1]),
            Err(Error::TooShort { min: OFFER_SIZE, .. })
        ));

        let request = RequestMessage::new(10).to_bytes();
        assert!(RequestMessage::from_bytes(&request[..REQUEST_SIZE - 1]).is_err());
        assert!(PayloadHeader::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_request_size() {
        let bytes = RequestMessage::new(10240).to_bytes();
        assert_eq!(bytes.len(), REQUEST_SIZE);
        assert_eq!(&bytes[5..], &10240u64.to_be_bytes());
        assert_eq!(RequestMessage::from_bytes(&bytes).unwrap().size, 10240);
    }

    #[test]
    fn test_payload_segment() {
        let segment = PayloadHeader::new(10, 3).to_segment(1024).unwrap();
        assert_eq!(segment.len(), 1024);
        assert_eq!(&segment[5..13], &10u64.to_be_bytes());
        assert_eq!(&segment[13..21], &3u64.to_be_bytes());

        let header = PayloadHeader::from_bytes(&segment).unwrap();
        assert_eq!(header.total_segments, 10);
        assert_eq!(header.segment_index, 3);
    }

    #[test]
    fn test_payload_encode_keeps_filler() {
        let mut segment = vec![b'X'; 64];
        PayloadHeader::new(1, 0).encode_into(&mut segment).unwrap();
        assert!(segment[PAYLOAD_HEADER_SIZE..].iter().all(|&b| b == b'X'));
        assert!(PayloadHeader::new(1, 0).encode_into(&mut [0u8; 20]).is_err());
    }

    #[test]
    fn test_total_segments_truncates() {
        assert_eq!(total_segments(10240, 1024), 10);
        assert_eq!(total_segments(10239, 1024), 9);
        assert_eq!(total_segments(1023, 1024), 0);
        assert_eq!(total_segments(0, 1024), 0);
        assert_eq!(total_segments(100, 0), 0);
    }

    #[test]
    fn test_filler_len() {
        assert_eq!(filler(1024).len(), 1024);
        assert!(filler(0).is_empty());
    }

    #[test]
    fn test_size_request() {
        assert_eq!(encode_size_request(10240), "10240\n");
        assert_eq!(parse_size_request("10240\n").unwrap(), 10240);
        assert_eq!(parse_size_request("  7\r\n").unwrap(), 7);
        assert!(matches!(
            parse_size_request("ten\n"),
            Err(Error::InvalidSizeRequest(_))
        ));
        assert!(parse_size_request("-1\n").is_err());
        assert!(parse_size_request("").is_err());
    }
}
