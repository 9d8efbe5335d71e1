// Copyright (C) 2025 Dayton Fishell
// Anachron Video Peripheral Model
// This file is part of Anachron.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Drawing and positioning helpers for software that drives the peripheral.
//!
//! [`FrameBuf`] draws into packed pixel data in shared memory. [`PlaneBuf`]
//! and [`SpriteBuf`] additionally own an element slot and translate screen
//! coordinates into register values. They only touch the peripheral through
//! `register_read`/`register_write`, exactly like code on the processor would.

use std::ops::{Deref, Range};
use std::sync::Arc;

use bitvec::prelude::*;

use crate::core::SharedMemory;
use crate::element::{Bpp, ElementControl, PLANE_COUNT, SPRITE_COUNT, SPRITE_WIDTH};
use crate::error::VideoError;
use crate::regmap::{
    BASE_ADDRESS, CONTROL, END_Y, H_FRONT_PORCH_END, H_TOTAL, PALETTE_1, PALETTE_2, PALETTE_3,
    POST_INCREMENT, TIMING_MISC, V_TOTAL_HIGH, WRAP_WINDOW, X, Y, plane_base, sprite_base,
};
use crate::registers::{TimingMisc, VideoRegisters};

/// `start..start + len` limited to `0..limit`.
fn clip(start: i32, len: i32, limit: u32) -> Range<i32> {
    let limit = i32::try_from(limit).unwrap_or(i32::MAX);
    start.max(0)..start.saturating_add(len).min(limit)
}

/// A packed pixel buffer in shared memory.
///
/// Pixels are packed low bits first inside each byte, the order the DMA
/// engine unpacks them in.
#[derive(Debug, Clone)]
pub struct FrameBuf {
    memory: SharedMemory,
    base_address: u32,
    width: u32,
    height: u32,
    pitch: u32,
    bpp: Bpp,
}

impl FrameBuf {
    /// Buffer with rows packed back to back.
    pub fn new(memory: &SharedMemory, base_address: u32, width: u32, height: u32, bpp: Bpp) -> Self {
        let pitch = width * bpp.bits() as u32 / 8;
        Self::with_pitch(memory, base_address, width, height, pitch, bpp)
    }

    /// Buffer whose rows are `pitch` bytes apart.
    pub fn with_pitch(
        memory: &SharedMemory,
        base_address: u32,
        width: u32,
        height: u32,
        pitch: u32,
        bpp: Bpp,
    ) -> Self {
        Self {
            memory: memory.clone(),
            base_address,
            width,
            height,
            pitch,
            bpp,
        }
    }

    pub fn base_address(&self) -> u32 {
        self.base_address
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pitch(&self) -> u32 {
        self.pitch
    }

    pub fn bpp(&self) -> Bpp {
        self.bpp
    }

    fn plot(&self, bytes: &mut [u8], x: i32, y: i32, color: u8) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        let bits = self.bpp.bits() as usize;
        let row = self.base_address as usize + y as usize * self.pitch as usize;
        let start = row * 8 + x as usize * bits;
        if let Some(field) = bytes.view_bits_mut::<Lsb0>().get_mut(start..start + bits) {
            field.store_le(color);
        }
    }

    pub fn set_pixel(&self, x: i32, y: i32, color: u8) {
        self.plot(&mut self.memory.write(), x, y, color);
    }

    /// Columns `x..x + w` that land inside the buffer.
    fn columns(&self, x: i32, w: i32) -> Range<i32> {
        clip(x, w, self.width)
    }

    fn rows(&self, y: i32, h: i32) -> Range<i32> {
        clip(y, h, self.height)
    }

    /// Rectangle outline.
    pub fn draw_rect(&self, x: i32, y: i32, w: i32, h: i32, color: u8) {
        if w <= 0 || h <= 0 {
            return;
        }
        let (right, bottom) = (x.saturating_add(w) - 1, y.saturating_add(h) - 1);
        let mut bytes = self.memory.write();
        for xx in self.columns(x, w) {
            self.plot(&mut bytes, xx, y, color);
            self.plot(&mut bytes, xx, bottom, color);
        }
        for yy in self.rows(y, h) {
            self.plot(&mut bytes, x, yy, color);
            self.plot(&mut bytes, right, yy, color);
        }
    }

    pub fn fill_rect(&self, x: i32, y: i32, w: i32, h: i32, color: u8) {
        let mut bytes = self.memory.write();
        for yy in self.rows(y, h) {
            for xx in self.columns(x, w) {
                self.plot(&mut bytes, xx, yy, color);
            }
        }
    }

    /// Fill every row, padding included, with `color`.
    pub fn clear(&self, color: u8) {
        let pattern = match self.bpp {
            Bpp::Bpp1 => (color & 0x01) * 0xff,
            Bpp::Bpp2 => (color & 0x03) * 0x55,
            Bpp::Bpp4 => (color & 0x0f) * 0x11,
            Bpp::Bpp8 => color,
        };
        let mut bytes = self.memory.write();
        let start = (self.base_address as usize).min(bytes.len());
        let end = (start + self.pitch as usize * self.height as usize).min(bytes.len());
        bytes[start..end].fill(pattern);
    }
}

/// Register plumbing shared by plane and sprite helpers.
#[derive(Debug, Clone)]
struct ElementSlot {
    regs: Arc<VideoRegisters>,
    block: u32,
}

impl ElementSlot {
    fn read(&self, sub_offset: u32) -> u8 {
        self.regs.register_read(self.block + sub_offset)
    }

    fn write(&self, sub_offset: u32, value: u8) {
        self.regs.register_write(self.block + sub_offset, value);
    }

    fn write_u16(&self, sub_offset: u32, value: u16) {
        for (lane, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.write(sub_offset + lane as u32, byte);
        }
    }

    fn read_u16(&self, sub_offset: u32) -> u16 {
        u16::from_le_bytes([self.read(sub_offset), self.read(sub_offset + 1)])
    }

    /// Program a byte address into the base-address register.
    fn write_base_address(&self, address: u32) {
        for (lane, byte) in address.to_le_bytes().into_iter().enumerate() {
            self.write(BASE_ADDRESS + lane as u32, byte);
        }
    }

    fn control(&self) -> ElementControl {
        ElementControl::from_bits_retain(self.read(CONTROL))
    }

    fn update_control(&self, f: impl FnOnce(&mut ElementControl)) {
        let mut control = self.control();
        f(&mut control);
        self.write(CONTROL, control.bits());
    }

    fn high_res(&self) -> bool {
        TimingMisc::from_bits_truncate(self.regs.register_read(TIMING_MISC))
            .contains(TimingMisc::HIGH_RES)
    }

    fn x_scale(&self) -> i32 {
        if self.high_res() { 1 } else { 2 }
    }

    /// First visible column in X register units.
    fn screen_start(&self) -> i32 {
        (self.regs.register_read(H_FRONT_PORCH_END) as i32 + 1) * 4
    }

    fn screen_end(&self) -> i32 {
        (self.regs.register_read(H_TOTAL) as i32 + 1) * 4
    }

    /// Store screen X as register X.
    fn write_x(&self, x: i32) {
        let real_x = x * self.x_scale() + self.screen_start();
        self.write_u16(X, real_x as u16);
    }

    fn read_x(&self) -> i32 {
        let real_x = self.read_u16(X);
        let x = real_x.wrapping_sub(self.screen_start() as u16) as i16 as i32;
        x / self.x_scale()
    }
}

/// Positioning and attribute setters both element kinds support.
pub trait ScreenElement {
    fn x(&self) -> i32;
    fn set_x(&self, x: i32);
    fn y(&self) -> i32;
    fn set_y(&mut self, y: i32);
    fn enabled(&self) -> bool;
    fn set_enabled(&self, enabled: bool);
}

macro_rules! element_accessors {
    ($ty:ty) => {
        impl $ty {
            pub fn enabled(&self) -> bool {
                self.slot.control().contains(ElementControl::ENABLED)
            }

            pub fn set_enabled(&self, enabled: bool) {
                self.slot
                    .update_control(|control| control.set(ElementControl::ENABLED, enabled));
            }

            pub fn draw_order(&self) -> u8 {
                self.slot.control().draw_order()
            }

            pub fn set_draw_order(&self, order: u8) {
                self.slot.update_control(|control| {
                    *control = ElementControl::from_bits_retain(
                        (control.bits() & !ElementControl::ORDER.bits()) | (order & 0x0f),
                    );
                });
            }

            pub fn palette_1(&self) -> u8 {
                self.slot.read(PALETTE_1)
            }

            pub fn set_palette_1(&self, palette: u8) {
                self.slot.write(PALETTE_1, palette);
            }

            pub fn x(&self) -> i32 {
                self.slot.read_x()
            }

            pub fn y(&self) -> i32 {
                self.y
            }

            /// Move the pixel data; rewrites the base address through `set_y`.
            pub fn set_base_address(&mut self, base_address: u32) {
                self.frame.base_address = base_address;
                self.set_y(self.y);
            }
        }

        impl Deref for $ty {
            type Target = FrameBuf;

            fn deref(&self) -> &FrameBuf {
                &self.frame
            }
        }

        impl ScreenElement for $ty {
            fn x(&self) -> i32 {
                <$ty>::x(self)
            }

            fn set_x(&self, x: i32) {
                <$ty>::set_x(self, x)
            }

            fn y(&self) -> i32 {
                <$ty>::y(self)
            }

            fn set_y(&mut self, y: i32) {
                <$ty>::set_y(self, y)
            }

            fn enabled(&self) -> bool {
                <$ty>::enabled(self)
            }

            fn set_enabled(&self, enabled: bool) {
                <$ty>::set_enabled(self, enabled)
            }
        }
    };
}

/// A plane bound to a [`FrameBuf`].
#[derive(Debug, Clone)]
pub struct PlaneBuf {
    slot: ElementSlot,
    frame: FrameBuf,
    y: i32,
}

impl PlaneBuf {
    pub fn new(
        regs: &Arc<VideoRegisters>,
        index: usize,
        memory: &SharedMemory,
        base_address: u32,
        width: u32,
        height: u32,
        bpp: Bpp,
    ) -> Result<Self, VideoError> {
        let frame = FrameBuf::new(memory, base_address, width, height, bpp);
        Self::with_frame(regs, index, frame)
    }

    /// Bind plane `index` to an existing buffer: base address, bit depth,
    /// full wrap window, palette offset 0 and screen X 0.
    pub fn with_frame(
        regs: &Arc<VideoRegisters>,
        index: usize,
        frame: FrameBuf,
    ) -> Result<Self, VideoError> {
        if index >= PLANE_COUNT {
            return Err(VideoError::InvalidPlane(index));
        }
        let plane = Self {
            slot: ElementSlot {
                regs: Arc::clone(regs),
                block: plane_base(index),
            },
            frame,
            y: 0,
        };
        plane.slot.write_base_address(plane.frame.base_address);
        plane.set_palette_1(0);
        plane.set_bpp(plane.frame.bpp);
        plane.set_wrap_window(31);
        plane.set_x(0);
        Ok(plane)
    }

    pub fn bpp(&self) -> Bpp {
        Bpp::from_code(self.slot.control().bpp_code())
    }

    /// Changes the register only; the buffer keeps its packing.
    pub fn set_bpp(&self, bpp: Bpp) {
        self.slot.update_control(|control| {
            *control = ElementControl::from_bits_retain(
                (control.bits() & !ElementControl::BPP.bits()) | (bpp.code() << 5),
            );
        });
    }

    pub fn wrap_window(&self) -> u8 {
        self.slot.read(WRAP_WINDOW)
    }

    pub fn set_wrap_window(&self, window: u8) {
        self.slot.write(WRAP_WINDOW, window);
    }

    /// Position the plane and fix up the post-increment so every scan line
    /// starts on its own row of the buffer.
    pub fn set_x(&self, x: i32) {
        self.slot.write_x(x);
        let pixels_per_scan_line = (self.slot.screen_end() - self.slot.screen_start()) / self.slot.x_scale();
        let pixels_per_plane_line = pixels_per_scan_line - x;
        let bits = self.frame.bpp.bits() as i32;
        let dwords_per_plane_line = (pixels_per_plane_line * bits + 31) / 32;
        let post_increment = self.frame.pitch as i32 / 4 - dwords_per_plane_line;
        self.slot.write(POST_INCREMENT, post_increment as u8);
    }

    /// Negative Y scrolls the buffer up by skipping its first rows.
    pub fn set_y(&mut self, y: i32) {
        self.y = y;
        let skipped = if y < 0 { (-y) as u32 * self.frame.pitch } else { 0 };
        self.slot.write_base_address(self.frame.base_address + skipped);
        self.slot.write_u16(Y, y as u16);
    }
}

element_accessors!(PlaneBuf);

/// A sprite bound to a 32-pixel-wide, 2 bpp buffer.
#[derive(Debug, Clone)]
pub struct SpriteBuf {
    slot: ElementSlot,
    frame: FrameBuf,
    y: i32,
}

impl SpriteBuf {
    /// Bind sprite `index` to `height` rows at `base_address`; palettes
    /// default to 0, 1 and 2 and the sprite sits at the top-left corner.
    pub fn new(
        regs: &Arc<VideoRegisters>,
        index: usize,
        memory: &SharedMemory,
        base_address: u32,
        height: u32,
    ) -> Result<Self, VideoError> {
        if index >= SPRITE_COUNT {
            return Err(VideoError::InvalidSprite(index));
        }
        let mut sprite = Self {
            slot: ElementSlot {
                regs: Arc::clone(regs),
                block: sprite_base(index),
            },
            frame: FrameBuf::new(memory, base_address, SPRITE_WIDTH, height, Bpp::Bpp2),
            y: 0,
        };
        sprite.slot.write_base_address(base_address);
        sprite.set_palette_1(0);
        sprite.set_palette_2(1);
        sprite.set_palette_3(2);
        sprite.set_y(0);
        sprite.set_x(0);
        Ok(sprite)
    }

    pub fn palette_2(&self) -> u8 {
        self.slot.read(PALETTE_2)
    }

    pub fn set_palette_2(&self, palette: u8) {
        self.slot.write(PALETTE_2, palette);
    }

    pub fn palette_3(&self) -> u8 {
        self.slot.read(PALETTE_3)
    }

    pub fn set_palette_3(&self, palette: u8) {
        self.slot.write(PALETTE_3, palette);
    }

    pub fn set_x(&self, x: i32) {
        self.slot.write_x(x);
    }

    /// Set the top row. Rows above the screen are skipped through the base
    /// address; a sprite entirely above the screen gets an empty row range
    /// past the last line.
    pub fn set_y(&mut self, y: i32) {
        self.y = y;
        let bottom = y.saturating_add(self.frame.height as i32);
        if bottom < 0 {
            let off_screen = ((self.slot.regs.register_read(V_TOTAL_HIGH) as u16) << 2) | 0x03;
            self.slot.write_u16(Y, off_screen);
            self.slot.write_u16(END_Y, off_screen);
            return;
        }
        if y < 0 {
            self.slot
                .write_base_address(self.frame.base_address + (-y) as u32 * self.frame.pitch);
            self.slot.write_u16(Y, 0);
        } else {
            self.slot.write_base_address(self.frame.base_address);
            self.slot.write_u16(Y, y as u16);
        }
        self.slot.write_u16(END_Y, bottom as u16);
    }
}

element_accessors!(SpriteBuf);
