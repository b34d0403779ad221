//! Benchmarks for line parsing and frame decoding.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use slirc_wire::{frame, InboundFrame, Message};

/// Simple PING message
const SIMPLE_MESSAGE: &str = "PING :irc.example.com";

/// Message with prefix
const PREFIX_MESSAGE: &str = ":nick!user@host PRIVMSG #channel :Hello, world!";

/// Worker-channel event with connection tag
const TAGGED_MESSAGE: &str = "S42 :nick!user@host.example.com PRIVMSG #long-channel-name :This is a longer message with more content to parse";

/// Numeric response
const NUMERIC_RESPONSE: &str =
    ":irc.server.net 001 nickname :Welcome to the IRC Network nickname!user@host";

fn benchmark_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Message Parsing");

    for (name, line) in [
        ("simple_ping", SIMPLE_MESSAGE),
        ("with_prefix", PREFIX_MESSAGE),
        ("tagged", TAGGED_MESSAGE),
        ("numeric_response", NUMERIC_RESPONSE),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let msg: Message = black_box(line).parse().unwrap();
                black_box(msg)
            })
        });
    }

    group.finish();
}

fn benchmark_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("Frames");

    group.bench_function("encode_event", |b| {
        b.iter(|| black_box(frame::encode_event(black_box(42), black_box(PREFIX_MESSAGE))))
    });

    group.bench_function("parse_routed", |b| {
        b.iter(|| {
            let f: InboundFrame = black_box("S42 PRIVMSG #chan :reply text").parse().unwrap();
            black_box(f)
        })
    });

    group.bench_function("parse_connect", |b| {
        b.iter(|| {
            let f: InboundFrame = black_box(":CONNECT bot bot irc.example.net 6697 1")
                .parse()
                .unwrap();
            black_box(f)
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_parsing, benchmark_frames);
criterion_main!(benches);
