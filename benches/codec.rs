//! 와이어 코덱 벤치마크

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bwprobe::message::filler;
use bwprobe::{OfferMessage, PayloadHeader, RequestMessage, SEGMENT_SIZE};

fn bench_offer(c: &mut Criterion) {
    let bytes = OfferMessage::new(14118, 65432).to_bytes();
    c.bench_function("offer_decode", |b| {
        b.iter(|| OfferMessage::from_bytes(black_box(&bytes)))
    });
}

fn bench_request(c: &mut Criterion) {
    let bytes = RequestMessage::new(1 << 30).to_bytes();
    c.bench_function("request_decode", |b| {
        b.iter(|| RequestMessage::from_bytes(black_box(&bytes)))
    });
}

fn bench_payload(c: &mut Criterion) {
    let mut segment = filler(SEGMENT_SIZE).to_vec();
    let mut index = 0u64;
    c.bench_function("payload_encode_into", |b| {
        b.iter(|| {
            index = index.wrapping_add(1);
            PayloadHeader::new(1_000_000, black_box(index)).encode_into(&mut segment)
        })
    });

    let encoded = PayloadHeader::new(10, 3).to_segment(SEGMENT_SIZE).unwrap();
    c.bench_function("payload_decode", |b| {
        b.iter(|| PayloadHeader::from_bytes(black_box(&encoded)))
    });
}

criterion_group!(benches, bench_offer, bench_request, bench_payload);
criterion_main!(benches);
