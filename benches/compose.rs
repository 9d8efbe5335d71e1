use std::hint::black_box;

use anachron_video::demo::DemoScene;
use anachron_video::{SharedMemory, VideoCore, VideoTiming};
use criterion::{Criterion, criterion_group, criterion_main};

fn demo_core() -> VideoCore {
    let mut core = VideoCore::new();
    let memory = SharedMemory::default();
    core.bind_memory(memory.clone());
    let regs = core.registers();
    VideoTiming::MODE_320X240.program(&regs, true);
    DemoScene::build(&regs, &memory, 320, 240).expect("demo scene fits the default memory");
    core.update();
    core
}

fn bench_compose(c: &mut Criterion) {
    let mut core = demo_core();
    c.bench_function("compose 320x240 demo scene", |b| {
        b.iter(|| black_box(core.compose()))
    });
}

fn bench_render(c: &mut Criterion) {
    let mut core = demo_core();
    c.bench_function("render 320x240 demo scene", |b| b.iter(|| core.render()));
}

criterion_group!(benches, bench_compose, bench_render);
criterion_main!(benches);
