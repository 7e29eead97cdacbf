//! Bus mapper address-lookup latency benchmarks.

#![allow(missing_docs)]

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use w65816_cpu::bus::Bus;
use w65816_host::device::{Ram, Rom};
use w65816_host::mapper::Mapper;

/// A mapper with several small mappings scattered across the address space,
/// representative of a real machine's RAM/ROM/peripheral layout rather than
/// one giant mapping that never exercises the binary search.
fn scattered_mapper() -> Mapper {
    let mut mapper = Mapper::new();
    mapper.add("wram", "ram", Box::new(Ram::new(0x2000)), 0x0000, 0, 0x2000).unwrap();
    mapper.add("sram", "ram", Box::new(Ram::new(0x2000)), 0x6000, 0, 0x2000).unwrap();
    let tmp = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(tmp.path(), vec![0xEA; 0x8000]).unwrap();
    mapper.add("prg", "rom", Box::new(Rom::from_file(tmp.path()).unwrap()), 0x8000, 0, 0x8000).unwrap();
    mapper
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("mapper_lookup");
    group.throughput(Throughput::Elements(1));

    group.bench_function("read_first_mapping", |b| {
        let mut mapper = scattered_mapper();
        b.iter(|| black_box(mapper.read(0x0010)));
    });

    group.bench_function("read_last_mapping", |b| {
        let mut mapper = scattered_mapper();
        b.iter(|| black_box(mapper.read(0xFFFF)));
    });

    group.bench_function("read_unmapped", |b| {
        let mut mapper = scattered_mapper();
        b.iter(|| black_box(mapper.read(0x4000)));
    });

    group.finish();
}

criterion_group!(benches, bench_lookup);
criterion_main!(benches);
