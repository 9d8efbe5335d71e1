// Copyright (C) 2025 Dayton Fishell
// Anachron Video Peripheral Model
// This file is part of Anachron.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Free-running render loop.
//!
//! The loop renders as fast as it can until a [`StopFlag`] is raised. The
//! processor side keeps its own handle to the register file and memory and
//! writes them concurrently; it is never synchronised to a frame boundary.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::info;

use crate::error::VideoError;
use crate::video::VideoCore;

/// Cooperative stop request shared between threads.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStats {
    pub frames: u64,
    pub elapsed: Duration,
    pub fps: f64,
}

impl RenderStats {
    fn new(frames: u64, elapsed: Duration) -> Self {
        let seconds = elapsed.as_secs_f64();
        let fps = if seconds > 0.0 { frames as f64 / seconds } else { 0.0 };
        Self { frames, elapsed, fps }
    }
}

/// Render until `stop` is raised. `hook` runs before every frame and may
/// itself raise the flag, in which case no further frame is rendered.
pub fn run<F>(core: &mut VideoCore, stop: &StopFlag, mut hook: F) -> RenderStats
where
    F: FnMut(&mut VideoCore),
{
    let start = Instant::now();
    let mut frames = 0u64;
    while !stop.is_stopped() {
        hook(core);
        if stop.is_stopped() {
            break;
        }
        core.render();
        frames += 1;
    }
    let stats = RenderStats::new(frames, start.elapsed());
    info!(
        "rendered {} frames in {} ms ({:.1} fps)",
        stats.frames,
        stats.elapsed.as_millis(),
        stats.fps
    );
    stats
}

/// [`run`] on a dedicated thread.
pub struct RenderThread {
    stop: StopFlag,
    handle: JoinHandle<RenderStats>,
}

impl RenderThread {
    /// The core is built on the render thread, so display sinks that must
    /// live on one thread can be bound inside `factory`.
    pub fn spawn<C, F>(factory: C, hook: F) -> Self
    where
        C: FnOnce() -> VideoCore + Send + 'static,
        F: FnMut(&mut VideoCore) + Send + 'static,
    {
        let stop = StopFlag::new();
        let thread_stop = stop.clone();
        let handle = thread::spawn(move || {
            let mut core = factory();
            run(&mut core, &thread_stop, hook)
        });
        Self { stop, handle }
    }

    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Raise the stop flag and wait for the loop to exit.
    pub fn stop(self) -> Result<RenderStats, VideoError> {
        self.stop.stop();
        self.handle
            .join()
            .map_err(|_| VideoError::RenderThreadPanicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SharedMemory;
    use crate::display::FrameCapture;
    use crate::mode::VideoTiming;
    use crate::regmap::{CONTROL, plane_base};
    use pretty_assertions::assert_eq;

    fn small_core() -> VideoCore {
        let mut core = VideoCore::new();
        core.bind_memory(SharedMemory::new(0x1000));
        VideoTiming::MODE_256X192.program(&core.registers(), true);
        core
    }

    #[test]
    fn hook_can_stop_the_loop() {
        let mut core = small_core();
        let stop = StopFlag::new();
        let mut calls = 0;
        let stats = run(&mut core, &stop, |_| {
            calls += 1;
            if calls == 4 {
                stop.stop();
            }
        });
        assert_eq!(calls, 4);
        assert_eq!(stats.frames, 3);
        assert_eq!(core.frame_count(), 3);
    }

    #[test]
    fn raised_flag_renders_nothing() {
        let mut core = small_core();
        let stop = StopFlag::new();
        stop.stop();
        let stats = run(&mut core, &stop, |_| panic!("hook must not run"));
        assert_eq!(stats.frames, 0);
        assert_eq!(stats.fps, 0.0);
    }

    #[test]
    fn render_thread_stops_on_request() {
        let capture = FrameCapture::new();
        let sink = capture.clone();
        let thread = RenderThread::spawn(
            move || {
                let mut core = small_core();
                core.bind_output(Box::new(sink));
                core
            },
            |_| thread::yield_now(),
        );
        while capture.present_count() < 2 {
            thread::yield_now();
        }
        let stats = thread.stop().unwrap();
        assert!(stats.frames >= 2);
        assert_eq!(capture.present_count(), stats.frames);
        assert_eq!(capture.resizes(), vec![(256, 192)]);
    }

    #[test]
    fn panicking_render_thread_is_reported() {
        // Enabled plane with no memory bound.
        let thread = RenderThread::spawn(
            || {
                let core = VideoCore::new();
                let regs = core.registers();
                VideoTiming::MODE_256X192.program(&regs, true);
                regs.register_write(plane_base(0) + CONTROL, 0x80);
                core
            },
            |_| {},
        );
        while !thread.is_finished() {
            thread::yield_now();
        }
        assert!(matches!(thread.stop(), Err(VideoError::RenderThreadPanicked)));
    }
}
