use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use patchwerk::dsp::CosineTable;
use patchwerk::nodes::{Osc, Poly};
use patchwerk::{Graph, Message, MessageUnit, Outlets, ProcessContext, SignalUnit, TableStore, BLOCK_SIZE};

pub fn criterion_benchmark(c: &mut Criterion) {
    let tables = TableStore::new();
    let ctx = ProcessContext {
        sample_rate: 48_000.0,
        block_size: BLOCK_SIZE,
        block_start: 0.0,
        tables: &tables,
    };

    c.bench_function("Osc.process() scalar", |b| {
        let mut osc = Osc::new(440.0, Arc::new(CosineTable::new()));
        let mut outlets = Outlets::new();

        b.iter(|| osc.process(black_box(&ctx), 0, BLOCK_SIZE, &mut outlets))
    });

    c.bench_function("Osc.process() signal", |b| {
        let mut osc = Osc::new(0.0, Arc::new(CosineTable::new()));
        for (i, s) in osc.ports_mut().inlet_mut(0).iter_mut().enumerate() {
            *s = 220.0 + i as f32;
        }
        osc.ports_mut().set_connection_count(0, 1);
        osc.on_inlet_connection_update(0);
        let mut outlets = Outlets::new();

        b.iter(|| osc.process(black_box(&ctx), 0, BLOCK_SIZE, &mut outlets))
    });

    c.bench_function("Poly.process_message() steal", |b| {
        let mut poly = Poly::new(8, true);
        let mut outlets = Outlets::new();
        poly.process_message(1, &Message::float(0.0, 100.0), &mut outlets);
        let mut pitch = 0.0;

        b.iter(|| {
            pitch = (pitch + 1.0) % 128.0;
            poly.process_message(0, black_box(&Message::float(0.0, pitch)), &mut outlets);
            outlets.take()
        })
    });

    c.bench_function("Graph.process_block() fm", |b| {
        let mut graph = Graph::new(48_000.0);
        let carrier = graph.add_object("osc~ 440").unwrap();
        let modulator = graph.add_object("osc~ 3").unwrap();
        graph.connect(modulator, 0, carrier, 0).unwrap();

        b.iter(|| graph.process_block())
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
