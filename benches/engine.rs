use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pipecore::prelude::*;

fn bench_ring(c: &mut Criterion) {
    let mut ring = RingStream::new(8192, StreamParams::default());
    let chunk = [0u8; 192];
    let mut out = [0u8; 192];
    c.bench_function("ring_push_pop_192", |b| {
        b.iter(|| {
            ring.push(black_box(&chunk)).unwrap();
            ring.pop(&mut out).unwrap();
            black_box(&out);
        })
    });
}

/// host(1) -> buffer(10) -> dai(2), DMA-clocked so triggers run inline.
fn streaming_engine() -> Engine {
    let mut e = Engine::new(EngineConfig::new());
    e.create_component(ComponentDesc {
        id: 1,
        pipeline: 5,
        direction: Direction::Playback,
        core: 0,
        ops: Box::new(HostOps::new(Direction::Playback)),
    })
    .unwrap();
    e.create_component(ComponentDesc {
        id: 2,
        pipeline: 5,
        direction: Direction::Playback,
        core: 0,
        ops: Box::new(DaiOps::new(Direction::Playback, 0)),
    })
    .unwrap();
    e.create_buffer(&BufferDesc {
        id: 10,
        size: 8192,
        core: 0,
        params: StreamParams::default(),
    })
    .unwrap();
    e.connect(1, 10, 2).unwrap();
    e.create_pipeline(
        &PipelineDesc {
            id: 5,
            priority: 0,
            core: 0,
            period_us: 1000,
            time_domain: TimeDomain::Dma,
        },
        2,
    )
    .unwrap();
    e.complete_pipeline(5).unwrap();
    e
}

fn bench_trigger_walk(c: &mut Criterion) {
    let mut e = streaming_engine();
    c.bench_function("prepare_reset_walk", |b| {
        b.iter(|| {
            e.trigger(5, TriggerCommand::Prepare).unwrap();
            e.reset_pipeline(5).unwrap();
        })
    });
}

fn bench_tick_copy(c: &mut Criterion) {
    let mut e = streaming_engine();
    e.trigger(5, TriggerCommand::Prepare).unwrap();
    e.trigger(5, TriggerCommand::Start).unwrap();
    c.bench_function("pipeline_tick_copy", |b| b.iter(|| e.tick(0).unwrap()));
}

criterion_group!(benches, bench_ring, bench_trigger_walk, bench_tick_copy);
criterion_main!(benches);
