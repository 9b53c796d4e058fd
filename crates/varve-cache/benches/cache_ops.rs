use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::net::Ipv4Addr;
use std::str::FromStr;
use varve_cache::{Cache, MemoryBackend, Query, Rank, Request};
use varve_proto::rdata::A;
use varve_proto::{Message, Name, RData, RecordClass, RecordType, RrSet};

fn a_set(owner: &str, ttl: u32) -> RrSet {
    RrSet::with_rdata(
        Name::from_str(owner).unwrap(),
        RecordType::A,
        RecordClass::IN,
        ttl,
        RData::A(A::new(Ipv4Addr::new(192, 0, 2, 1))),
    )
}

fn bench_exact_peek(c: &mut Criterion) {
    let cache = Cache::open(MemoryBackend::new()).unwrap();
    for i in 0..1000 {
        cache
            .insert_rr(
                &a_set(&format!("host{i}.example.com."), 3600),
                None,
                Rank::SECURE | Rank::AUTH,
                100,
            )
            .unwrap();
    }

    c.bench_function("peek_exact_hit", |b| {
        let mut i = 0u32;
        b.iter(|| {
            i = (i + 1) % 1000;
            let mut req = Request::new(Query::new(
                Name::from_str(&format!("host{i}.example.com.")).unwrap(),
                RecordType::A,
                150,
            ));
            let mut pkt = Message::new(1);
            black_box(cache.peek(&mut req, &mut pkt));
        });
    });
}

fn bench_stash(c: &mut Criterion) {
    let cache = Cache::open(MemoryBackend::new()).unwrap();
    c.bench_function("insert_rr", |b| {
        let mut i = 0u32;
        b.iter(|| {
            i += 1;
            let set = a_set(&format!("host{}.example.com.", i % 4096), 3600);
            cache
                .insert_rr(black_box(&set), None, Rank::SECURE | Rank::AUTH, i)
                .unwrap();
        });
    });
}

criterion_group!(benches, bench_exact_peek, bench_stash);
criterion_main!(benches);
