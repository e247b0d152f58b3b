use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mwcan_rs::bitfield::{decode, FAULT_STATUS};
use mwcan_rs::can::frame::{pack_request, Request, ValueWidth};
use mwcan_rs::payload::decode_payload;
use mwcan_rs::DeviceVariant;

fn benchmark_decode_payload(c: &mut Criterion) {
    let word = hex::decode("60000604").unwrap();
    let firmware = hex::decode("84000a05ffffffff").unwrap();
    let text = hex::decode("870041424344454a").unwrap();

    c.bench_function("decode_word", |b| {
        b.iter(|| {
            let _ = black_box(decode_payload(black_box(&word)));
        })
    });
    c.bench_function("decode_firmware", |b| {
        b.iter(|| {
            let _ = black_box(decode_payload(black_box(&firmware)));
        })
    });
    c.bench_function("decode_text", |b| {
        b.iter(|| {
            let _ = black_box(decode_payload(black_box(&text)));
        })
    });
}

fn benchmark_pack_request(c: &mut Criterion) {
    c.bench_function("pack_word_write", |b| {
        b.iter(|| {
            black_box(pack_request(
                black_box(0x0020),
                Request::Write {
                    value: black_box(2566),
                    width: ValueWidth::Word,
                },
            ))
        })
    });
}

fn benchmark_bitfield(c: &mut Criterion) {
    c.bench_function("decode_fault_status", |b| {
        b.iter(|| black_box(decode(&FAULT_STATUS, black_box(0x01A5), DeviceVariant::PowerSupply)))
    });
}

criterion_group!(
    benches,
    benchmark_decode_payload,
    benchmark_pack_request,
    benchmark_bitfield
);
criterion_main!(benches);
