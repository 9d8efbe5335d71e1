// Copyright (C) 2025 Dayton Fishell
// Anachron Video Peripheral Model
// This file is part of Anachron.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

// Demo driver for the Anachron video peripheral model.
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anachron_video::demo::DemoScene;
use anachron_video::driver::{self, RenderStats, StopFlag};
use anachron_video::{FrameCapture, SharedMemory, VideoCore, VideoTiming};
use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser)]
#[command(name = "anachron-video")]
#[command(version, about = "Anachron video peripheral demo", long_about = None)]
struct Cli {
    /// Frames to render without a window
    #[arg(short, long, default_value_t = 60)]
    frames: u64,

    /// Timing preset: 640x480, 320x240, 640x400, 320x200, 512x384 or 256x192
    #[arg(short, long, default_value = "320x240")]
    mode: String,

    /// Timing registers from a YAML or JSON file instead of a preset
    #[cfg(feature = "serde-spec")]
    #[arg(long)]
    timing: Option<PathBuf>,

    /// Write the last frame as a binary PPM image
    #[arg(long)]
    ppm: Option<PathBuf>,

    /// Open a window and take keyboard input
    #[cfg(feature = "sdl-frontend")]
    #[arg(long)]
    sdl: bool,
}

impl Cli {
    fn timing(&self) -> Result<VideoTiming> {
        #[cfg(feature = "serde-spec")]
        if let Some(path) = &self.timing {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            return Ok(if is_json {
                VideoTiming::from_json_str(&text)?
            } else {
                VideoTiming::from_yaml_str(&text)?
            });
        }
        Ok(VideoTiming::by_name(&self.mode)?)
    }
}

fn print_stats(stats: &RenderStats) {
    println!("Frames:  {}", stats.frames);
    println!("Elapsed: {} ms", stats.elapsed.as_millis());
    println!("FPS:     {:.1}", stats.fps);
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    println!("Anachron Video v{}", env!("CARGO_PKG_VERSION"));
    println!("====================");

    let timing = cli.timing()?;
    println!("Mode: {}x{}", timing.width(), timing.height());

    let mut core = VideoCore::new();
    let memory = SharedMemory::default();
    core.bind_memory(memory.clone());
    let regs = core.registers();
    timing.program(&regs, true);
    let scene = DemoScene::build(&regs, &memory, timing.width(), timing.height())?;

    #[cfg(feature = "sdl-frontend")]
    if cli.sdl {
        return window::run(core, scene);
    }
    drop(scene);

    let capture = FrameCapture::new();
    core.bind_output(Box::new(capture.clone()));
    let stop = StopFlag::new();
    let mut remaining = cli.frames;
    let stats = driver::run(&mut core, &stop, |_| {
        if remaining == 0 {
            stop.stop();
        } else {
            remaining -= 1;
        }
    });
    print_stats(&stats);

    if let Some(path) = &cli.ppm {
        let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        capture.write_ppm(BufWriter::new(file))?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

#[cfg(feature = "sdl-frontend")]
mod window {
    use std::thread;
    use std::time::Duration;

    use anachron_video::demo::DemoScene;
    use anachron_video::driver::{self, StopFlag};
    use anachron_video::sdl_output;
    use anachron_video::{KeyQueue, VideoCore};
    use anyhow::{Result, anyhow};

    /// Render on this thread and run the scene's key handling on another,
    /// the way a program would poke registers while the display scans out.
    pub fn run(mut core: VideoCore, mut scene: DemoScene) -> Result<()> {
        let (sink, mut events) = sdl_output::open("Anachron Video").map_err(|e| anyhow!(e))?;
        core.bind_output(Box::new(sink));

        let keys = KeyQueue::new();
        let stop = StopFlag::new();
        let program = {
            let keys = keys.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                while !stop.is_stopped() {
                    match keys.pop() {
                        Some(event) => {
                            if !scene.handle_key(event) {
                                stop.stop();
                            }
                        }
                        None => thread::sleep(Duration::from_millis(1)),
                    }
                }
            })
        };

        let stats = driver::run(&mut core, &stop, |_| {
            if !events.pump(&keys) {
                stop.stop();
            }
        });
        stop.stop();
        program
            .join()
            .map_err(|_| anyhow!("scene thread panicked"))?;
        super::print_stats(&stats);
        Ok(())
    }
}
