// Copyright (C) 2025 Dayton Fishell
// Anachron Video Peripheral Model
// This file is part of Anachron.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Render-side owner of the peripheral.
//!
//! [`VideoCore`] holds the DMA engines, the frame buffers and the bindings to
//! memory and the display. The register file is shared through an
//! [`Arc<VideoRegisters>`] so the processor side can keep writing registers
//! while frames are produced.

use std::sync::Arc;

use log::{debug, trace};

use crate::compositor::{self, Frame};
use crate::core::{SharedMemory, WordSource};
use crate::display::{self, DisplaySink, PaletteMode};
use crate::dma::Dma;
use crate::element::{PLANE_COUNT, SPRITE_COUNT, SPRITE_ROW_DWORDS};
use crate::palette::Rgb;
use crate::registers::VideoRegisters;

/// Stand-in memory used until [`VideoCore::bind_memory`] is called.
struct UnboundMemory;

impl WordSource for UnboundMemory {
    fn read_word(&self, word_address: u32) -> u32 {
        panic!("video DMA fetch from dword {word_address:#010x} with no memory bound");
    }
}

pub struct VideoCore {
    regs: Arc<VideoRegisters>,
    memory: Option<SharedMemory>,
    plane_dma: [Dma; PLANE_COUNT],
    sprite_dma: [Dma; SPRITE_COUNT],
    frame: Frame,
    rgb: Vec<Rgb>,
    output: Option<Box<dyn DisplaySink>>,
    /// Size last handed to `output`.
    output_size: Option<(u32, u32)>,
    frame_count: u64,
}

impl VideoCore {
    pub fn new() -> Self {
        Self::with_registers(Arc::new(VideoRegisters::new()))
    }

    /// Build a core around an existing register file.
    pub fn with_registers(regs: Arc<VideoRegisters>) -> Self {
        Self {
            regs,
            memory: None,
            plane_dma: std::array::from_fn(|_| Dma::variable_stride()),
            sprite_dma: std::array::from_fn(|_| Dma::fixed_stride(SPRITE_ROW_DWORDS)),
            frame: Frame::default(),
            rgb: Vec::new(),
            output: None,
            output_size: None,
            frame_count: 0,
        }
    }

    /// Handle to the register file for the processor side.
    pub fn registers(&self) -> Arc<VideoRegisters> {
        Arc::clone(&self.regs)
    }

    pub fn bind_memory(&mut self, memory: SharedMemory) {
        debug!("video memory bound ({} bytes)", memory.len());
        self.memory = Some(memory);
    }

    pub fn memory(&self) -> Option<&SharedMemory> {
        self.memory.as_ref()
    }

    pub fn bind_output(&mut self, output: Box<dyn DisplaySink>) {
        debug!("video output bound");
        self.output = Some(output);
        self.output_size = None;
    }

    pub fn unbind_output(&mut self) -> Option<Box<dyn DisplaySink>> {
        self.output_size = None;
        self.output.take()
    }

    pub fn register_read(&self, offset: u32) -> u8 {
        self.regs.register_read(offset)
    }

    pub fn register_write(&self, offset: u32, value: u8) {
        self.regs.register_write(offset, value);
    }

    /// Latch all registers and follow any geometry change.
    pub fn update(&mut self) {
        let old = (self.regs.screen_width(), self.regs.screen_height());
        self.regs.latch();
        let new = (self.regs.screen_width(), self.regs.screen_height());
        if old != new {
            debug!("screen geometry {}x{} -> {}x{}", old.0, old.1, new.0, new.1);
        }
        if !self.regs.is_enabled() {
            return;
        }
        self.frame.resize(new.0, new.1);
        if let Some(output) = self.output.as_mut() {
            if self.output_size != Some(new) {
                output.resize(new.0, new.1);
                self.output_size = Some(new);
            }
        }
    }

    /// Rasterise the latched state into the indexed frame.
    ///
    /// # Panics
    ///
    /// If an element fetches data while no memory is bound.
    pub fn compose(&mut self) -> usize {
        match &self.memory {
            Some(memory) => {
                let bytes = memory.read();
                compositor::compose(
                    &self.regs,
                    &mut self.plane_dma,
                    &mut self.sprite_dma,
                    bytes.as_slice(),
                    &mut self.frame,
                )
            }
            None => compositor::compose(
                &self.regs,
                &mut self.plane_dma,
                &mut self.sprite_dma,
                &UnboundMemory,
                &mut self.frame,
            ),
        }
    }

    /// Produce one frame: latch, compose, convert, present.
    pub fn render(&mut self) {
        self.update();
        let composed = self.compose();

        let mode = PaletteMode::select(self.regs.any_plane_bpp8());
        display::convert(&self.frame, &self.regs.palette(), mode, &mut self.rgb);
        if let Some(output) = self.output.as_mut() {
            output.present(&self.rgb, self.frame.width(), self.frame.height());
        }

        self.regs.raise_frame_interrupts();
        self.frame_count += 1;
        trace!(
            "frame {} composed {} elements ({:?} palette)",
            self.frame_count, composed, mode
        );
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Last converted frame.
    pub fn rgb_frame(&self) -> &[Rgb] {
        &self.rgb
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Default for VideoCore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{FrameBuf, PlaneBuf};
    use crate::display::FrameCapture;
    use crate::element::Bpp;
    use crate::mode::VideoTiming;
    use crate::regmap::*;
    use pretty_assertions::assert_eq;

    fn core_320x240() -> (VideoCore, SharedMemory) {
        let mut core = VideoCore::new();
        let memory = SharedMemory::default();
        core.bind_memory(memory.clone());
        VideoTiming::MODE_320X240.program(&core.registers(), true);
        (core, memory)
    }

    #[test]
    fn update_sizes_frame_and_output() {
        let (mut core, _memory) = core_320x240();
        let capture = FrameCapture::new();
        core.bind_output(Box::new(capture.clone()));
        core.update();
        assert_eq!((core.frame().width(), core.frame().height()), (320, 240));
        core.update();
        assert_eq!(capture.resizes(), vec![(320, 240)]);

        VideoTiming::MODE_640X480.program(&core.registers(), true);
        core.update();
        assert_eq!(capture.resizes(), vec![(320, 240), (640, 480)]);
    }

    #[test]
    fn disabled_core_keeps_frame_size() {
        let (mut core, _memory) = core_320x240();
        VideoTiming::MODE_640X480.program(&core.registers(), false);
        core.update();
        assert_eq!(core.frame().width(), 0);
    }

    #[test]
    fn render_without_output_still_converts() {
        let (mut core, _memory) = core_320x240();
        core.render();
        core.render();
        assert_eq!(core.frame_count(), 2);
        assert_eq!(core.rgb_frame().len(), 320 * 240);
    }

    #[test]
    #[should_panic(expected = "no memory bound")]
    fn drawing_without_memory_is_fatal() {
        let mut core = VideoCore::new();
        let regs = core.registers();
        VideoTiming::MODE_320X240.program(&regs, true);
        regs.register_write(plane_base(0) + CONTROL, 0x80);
        core.render();
    }

    #[test]
    fn gradient_plane_with_rectangle_overlay() {
        let (mut core, memory) = core_320x240();
        let regs = core.registers();
        let capture = FrameCapture::new();
        core.bind_output(Box::new(capture.clone()));

        let plane0 = PlaneBuf::new(&regs, 0, &memory, 0x0, 320, 240, Bpp::Bpp8).unwrap();
        for y in 0..240 {
            for x in 0..320 {
                plane0.set_pixel(x, y, (y - x) as u8);
            }
        }
        plane0.set_enabled(true);
        plane0.set_draw_order(0);

        let plane1 = PlaneBuf::new(&regs, 1, &memory, 0x2_0000, 320, 240, Bpp::Bpp4).unwrap();
        plane1.clear(0);
        plane1.draw_rect(10, 10, 300, 220, 5);
        plane1.set_palette_1(32);
        plane1.set_draw_order(1);
        plane1.set_enabled(true);

        core.render();
        let frame = core.frame();
        for y in 0..240u32 {
            for x in 0..320u32 {
                let on_border = (x == 10 || x == 309) && (10..230).contains(&y)
                    || (y == 10 || y == 229) && (10..310).contains(&x);
                let expected = if on_border {
                    37
                } else {
                    (y as i32 - x as i32) as u8
                };
                assert_eq!(frame.get(x, y), Some(expected), "pixel ({x}, {y})");
            }
        }
        // The border crosses the gradient's transparent diagonal, so plane 1
        // overwrote opaque gradient pixels elsewhere.
        assert!(regs.planes[1].common.collision.get());
        assert!(!regs.planes[0].common.collision.get());

        let (width, height, pixels) = capture.last_frame();
        assert_eq!((width, height), (320, 240));
        assert_eq!(pixels.len(), 320 * 240);
        assert_eq!(pixels[0], core.registers().palette().interpolated()[0]);
    }

    #[test]
    fn low_depth_frames_use_the_banked_palette() {
        let (mut core, memory) = core_320x240();
        let regs = core.registers();
        {
            let mut palette = regs.palette();
            palette.set_entry(1, Rgb::new(1, 0, 0));
            palette.set_entry(17, Rgb::new(17, 0, 0));
        }
        let plane = PlaneBuf::new(&regs, 0, &memory, 0x0, 320, 240, Bpp::Bpp1).unwrap();
        plane.clear(1);
        plane.set_enabled(true);
        core.render();
        assert_eq!(core.rgb_frame()[0], Rgb::new(1, 0, 0));
        assert_eq!(core.rgb_frame()[1], Rgb::new(17, 0, 0));
    }

    #[test]
    fn register_writes_wait_for_the_next_frame() {
        let (mut core, memory) = core_320x240();
        let regs = core.registers();
        let frame = FrameBuf::new(&memory, 0, 320, 240, Bpp::Bpp8);
        frame.clear(3);
        let plane = PlaneBuf::new(&regs, 0, &memory, 0x0, 320, 240, Bpp::Bpp8).unwrap();
        core.render();
        assert_eq!(core.frame().get(0, 0), Some(0));
        plane.set_enabled(true);
        assert_eq!(core.frame().get(0, 0), Some(0));
        core.render();
        assert_eq!(core.frame().get(0, 0), Some(3));
    }
}
