//! Sprite Demo
//!
//! Demonstrates the processor side and the render side running at once:
//! - A render thread free-running over a 320x240 screen
//! - A checkerboard plane and eight bouncing sprites
//! - Register writes from the main thread while frames are produced
//! - Collision status polling and clear-on-write

use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anachron_video::demo::load_palette;
use anachron_video::element::{PLANE_COUNT, SPRITE_COUNT};
use anachron_video::regmap::{INT_STATUS, PLANE_COLLISION, SPRITE_COLLISION};
use anachron_video::{
    Bpp, FrameCapture, PlaneBuf, RenderThread, SharedMemory, SpriteBuf, VideoCore,
    VideoRegisters, VideoTiming,
};
use anyhow::Result;

const STEPS: usize = 240;

fn main() -> Result<()> {
    env_logger::init();

    println!("Anachron Sprite Demo");
    println!("====================\n");

    let memory = SharedMemory::default();
    let regs = Arc::new(VideoRegisters::new());

    println!("Programming 320x240...");
    VideoTiming::MODE_320X240.program(&regs, true);
    load_palette(&regs);

    println!("Drawing checkerboard plane...");
    let plane = PlaneBuf::new(&regs, 0, &memory, 0x0, 320, 240, Bpp::Bpp2)?;
    for cell_y in 0..15 {
        for cell_x in 0..20 {
            let color = if (cell_x + cell_y) % 2 == 0 { 1 } else { 2 };
            plane.fill_rect(cell_x * 16, cell_y * 16, 16, 16, color);
        }
    }
    plane.set_draw_order(0);
    plane.set_enabled(true);

    println!("Drawing {SPRITE_COUNT} sprites...");
    let mut sprites = Vec::with_capacity(SPRITE_COUNT);
    let mut velocity = Vec::with_capacity(SPRITE_COUNT);
    for index in 0..SPRITE_COUNT {
        let mut sprite = SpriteBuf::new(&regs, index, &memory, 0x8_0000 + 0x200 * index as u32, 32)?;
        sprite.clear(0);
        sprite.fill_rect(4, 4, 24, 24, 1);
        sprite.draw_rect(8, 8, 16, 16, 2);
        sprite.fill_rect(14, 14, 4, 4, 3);
        sprite.set_palette_1(5 + index as u8);
        sprite.set_palette_2(21);
        sprite.set_palette_3(27);
        sprite.set_draw_order((PLANE_COUNT + index) as u8);
        sprite.set_x(36 * index as i32);
        sprite.set_y(20 * index as i32);
        sprite.set_enabled(true);
        sprites.push(sprite);
        velocity.push((1 + index as i32 % 3, 2 - index as i32 % 2));
    }

    // Render on a worker thread; the main thread acts as the processor.
    let capture = FrameCapture::new();
    let sink = capture.clone();
    let (render_regs, render_memory) = (Arc::clone(&regs), memory.clone());
    let renderer = RenderThread::spawn(
        move || {
            let mut core = VideoCore::with_registers(render_regs);
            core.bind_memory(render_memory);
            core.bind_output(Box::new(sink));
            core
        },
        |_| {},
    );

    println!("\nAnimating {STEPS} steps...");
    let mut collisions = 0u32;
    for _ in 0..STEPS {
        for (sprite, (dx, dy)) in sprites.iter_mut().zip(velocity.iter_mut()) {
            let (x, y) = (sprite.x() + *dx, sprite.y() + *dy);
            if !(0..=320 - 32).contains(&x) {
                *dx = -*dx;
            }
            if !(0..=240 - 32).contains(&y) {
                *dy = -*dy;
            }
            sprite.set_x(x.clamp(0, 320 - 32));
            sprite.set_y(y.clamp(0, 240 - 32));
        }

        let hits = regs.register_read(SPRITE_COLLISION);
        if hits != 0 {
            collisions += hits.count_ones();
            regs.register_write(SPRITE_COLLISION, hits);
        }
        thread::sleep(Duration::from_millis(2));
    }

    let stats = renderer.stop()?;
    println!("  Rendered {} frames ({:.1} fps)", stats.frames, stats.fps);
    println!("  Sprite collisions seen: {collisions}");
    println!("  Plane collision byte:   {:#04x}", regs.register_read(PLANE_COLLISION));
    println!("  Interrupt status:       {:#04x}", regs.register_read(INT_STATUS));

    let path = std::env::temp_dir().join("anachron_sprite_demo.ppm");
    capture.write_ppm(BufWriter::new(File::create(&path)?))?;
    println!("\nLast frame written to {}", path.display());
    Ok(())
}
