use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use mailfwd::model::mail::RawMessage;

fn fixture_bytes(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(path).unwrap()
}

fn bench_decode_message(c: &mut Criterion) {
    let raw = RawMessage::new("qp-german", fixture_bytes("qp_german.eml"));

    c.bench_function("decode_qp_message", |b| {
        b.iter(|| mailfwd::parser::message::decode_message(&raw))
    });
}

fn bench_encoded_words(c: &mut Criterion) {
    let subject = "=?UTF-8?Q?Gr=C3?= =?UTF-8?Q?=BC=C3=9Fe_aus_Z=C3=BCrich?= und =?UTF-8?B?TcO8bmNoZW4=?=";

    c.bench_function("decode_encoded_words", |b| {
        b.iter(|| mailfwd::parser::header::decode_encoded_words(subject))
    });
}

fn bench_large_qp_body(c: &mut Criterion) {
    let body = "Die Stra=C3=9Fe =C3=BCber die Br=C3=BCcke ist gesperrt, bitte =\nUmweg nehmen.\n".repeat(2000);

    c.bench_function("decode_large_qp_body", |b| {
        b.iter(|| mailfwd::parser::transfer::decode_quoted_printable(&body))
    });
}

criterion_group!(benches, bench_decode_message, bench_encoded_words, bench_large_qp_body);
criterion_main!(benches);
