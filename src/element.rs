// Copyright (C) 2025 Dayton Fishell
// Anachron Video Peripheral Model
// This file is part of Anachron.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Plane and sprite configuration blocks.
//!
//! Both kinds of renderable element share geometry, enable/order fields and a
//! DMA engine. They differ in how far they extend on screen, their bit depth
//! and how a raw pixel code maps to a palette index; [`Renderable`] is the
//! interface the compositor drives them through.

use bitflags::bitflags;

use crate::core::{ClearOnWrite, ShadowFlag, ShadowReg, StatusReg};
use crate::dma::DmaConfig;

pub const PLANE_COUNT: usize = 4;
pub const SPRITE_COUNT: usize = 8;
/// Size of the composition array: one slot per element.
pub const ELEMENT_COUNT: usize = PLANE_COUNT + SPRITE_COUNT;

pub const SPRITE_WIDTH: u32 = 32;
pub const SPRITE_HEIGHT: u32 = 32;
/// Dwords fetched per sprite row: 32 pixels at 2 bpp.
pub const SPRITE_ROW_DWORDS: u32 = SPRITE_WIDTH * Bpp::Bpp2.bits() as u32 / 32;

/// Sprites wrap over the whole address space.
const SPRITE_WINDOW: u8 = 31;

bitflags! {
    /// Packed enable / bit-depth / draw-order byte at sub-offset 0x04.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ElementControl: u8 {
        const ENABLED = 0x80;
        const BPP = 0x60;
        const ORDER = 0x0F;
    }
}

impl ElementControl {
    pub fn draw_order(self) -> u8 {
        (self & Self::ORDER).bits()
    }

    pub fn bpp_code(self) -> u8 {
        (self & Self::BPP).bits() >> 5
    }

    pub fn pack(enabled: bool, bpp_code: u8, draw_order: u8) -> Self {
        let mut control = Self::from_bits_truncate(((bpp_code & 0x03) << 5) | (draw_order & 0x0F));
        control.set(Self::ENABLED, enabled);
        control
    }
}

/// Plane bit depth, encoded in two bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Bpp {
    Bpp1 = 0,
    Bpp2 = 1,
    Bpp4 = 2,
    Bpp8 = 3,
}

impl Bpp {
    pub fn from_code(code: u8) -> Self {
        match code & 0x03 {
            0 => Bpp::Bpp1,
            1 => Bpp::Bpp2,
            2 => Bpp::Bpp4,
            _ => Bpp::Bpp8,
        }
    }

    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Bits per pixel.
    pub const fn bits(self) -> u8 {
        1 << (self as u8)
    }
}

/// Region an element covers on the composition grid. Ends are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementBounds {
    pub start_x: u32,
    pub end_x: u32,
    pub start_y: u32,
    pub end_y: u32,
}

impl ElementBounds {
    pub fn contains_row(&self, y: u32) -> bool {
        y >= self.start_y && y < self.end_y
    }
}

/// Raw-code to palette-index mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelDecoder {
    /// Non-zero codes get a palette offset added.
    Offset(u8),
    /// Codes 1..=3 select one of three palette entries.
    Lookup([u8; 3]),
}

impl PixelDecoder {
    /// Map a raw pixel code to a palette index. Lookup decoders only see
    /// 2-bit codes.
    pub fn decode(self, raw: u8) -> u8 {
        match self {
            _ if raw == 0 => 0,
            PixelDecoder::Offset(offset) => raw.wrapping_add(offset),
            PixelDecoder::Lookup(entries) => {
                debug_assert!(raw <= 3, "sprite pixel code {raw} is wider than 2 bits");
                entries[raw as usize - 1]
            }
        }
    }
}

/// What the compositor needs from a plane or a sprite. Everything reads the
/// active (latched) side of the registers.
pub trait Renderable {
    fn bounds(&self, high_res: bool) -> ElementBounds;
    fn bpp(&self) -> Bpp;
    fn enabled(&self) -> bool;
    fn draw_order(&self) -> usize;
    fn dma_config(&self) -> DmaConfig;
    fn pixel_decoder(&self) -> PixelDecoder;
    fn collision(&self) -> &ClearOnWrite;
}

/// Register fields common to planes and sprites.
#[derive(Debug, Default)]
pub struct ElementRegs {
    /// Dword address.
    pub base_address: ShadowReg<30>,
    pub post_increment: ShadowReg<8>,
    pub x: ShadowReg<16>,
    pub y: ShadowReg<16>,
    pub enabled: ShadowFlag,
    pub draw_order: ShadowReg<4>,
    pub palette_1: ShadowReg<8>,
    pub collision: ClearOnWrite,
}

impl ElementRegs {
    fn start_x(&self, high_res: bool) -> u32 {
        let x = self.x.get();
        if high_res { x } else { x / 2 }
    }

    fn latch(&self) {
        self.base_address.latch();
        self.post_increment.latch();
        self.x.latch();
        self.y.latch();
        self.enabled.latch();
        self.draw_order.latch();
        self.palette_1.latch();
    }
}

/// A full-width background layer.
#[derive(Debug)]
pub struct PlaneRegs {
    pub common: ElementRegs,
    pub bpp: ShadowReg<2>,
    /// Wrap window, power of two in dwords.
    pub wrap_window: ShadowReg<5>,
    /// Where the plane's DMA stopped; published by the compositor.
    pub current_address: StatusReg<30>,
}

impl PlaneRegs {
    pub fn new() -> Self {
        Self {
            common: ElementRegs::default(),
            bpp: ShadowReg::new(Bpp::Bpp1.code() as u32),
            wrap_window: ShadowReg::default(),
            current_address: StatusReg::default(),
        }
    }

    pub fn latch(&self) {
        self.common.latch();
        self.bpp.latch();
        self.wrap_window.latch();
    }
}

impl Default for PlaneRegs {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderable for PlaneRegs {
    fn bounds(&self, high_res: bool) -> ElementBounds {
        ElementBounds {
            start_x: self.common.start_x(high_res),
            end_x: u32::MAX,
            start_y: 0,
            end_y: u32::MAX,
        }
    }

    fn bpp(&self) -> Bpp {
        Bpp::from_code(self.bpp.get() as u8)
    }

    fn enabled(&self) -> bool {
        self.common.enabled.flag()
    }

    fn draw_order(&self) -> usize {
        self.common.draw_order.get() as usize
    }

    fn dma_config(&self) -> DmaConfig {
        DmaConfig {
            base_address: self.common.base_address.get(),
            window: self.wrap_window.get() as u8,
            post_increment: self.common.post_increment.get() as u8 as i8,
        }
    }

    fn pixel_decoder(&self) -> PixelDecoder {
        PixelDecoder::Offset(self.common.palette_1.get() as u8)
    }

    fn collision(&self) -> &ClearOnWrite {
        &self.common.collision
    }
}

/// A 32×32, 2 bpp hardware sprite.
#[derive(Debug, Default)]
pub struct SpriteRegs {
    pub common: ElementRegs,
    pub end_y: ShadowReg<16>,
    pub palette_2: ShadowReg<8>,
    pub palette_3: ShadowReg<8>,
}

impl SpriteRegs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latch(&self) {
        self.common.latch();
        self.end_y.latch();
        self.palette_2.latch();
        self.palette_3.latch();
    }
}

impl Renderable for SpriteRegs {
    fn bounds(&self, high_res: bool) -> ElementBounds {
        let start_x = self.common.start_x(high_res);
        ElementBounds {
            start_x,
            end_x: start_x + SPRITE_WIDTH,
            start_y: self.common.y.get(),
            end_y: self.end_y.get(),
        }
    }

    fn bpp(&self) -> Bpp {
        Bpp::Bpp2
    }

    fn enabled(&self) -> bool {
        self.common.enabled.flag()
    }

    fn draw_order(&self) -> usize {
        self.common.draw_order.get() as usize
    }

    fn dma_config(&self) -> DmaConfig {
        DmaConfig {
            base_address: self.common.base_address.get(),
            window: SPRITE_WINDOW,
            post_increment: self.common.post_increment.get() as u8 as i8,
        }
    }

    fn pixel_decoder(&self) -> PixelDecoder {
        PixelDecoder::Lookup([
            self.common.palette_1.get() as u8,
            self.palette_2.get() as u8,
            self.palette_3.get() as u8,
        ])
    }

    fn collision(&self) -> &ClearOnWrite {
        &self.common.collision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bpp_codes() {
        assert_eq!(Bpp::from_code(0).bits(), 1);
        assert_eq!(Bpp::from_code(1).bits(), 2);
        assert_eq!(Bpp::from_code(2).bits(), 4);
        assert_eq!(Bpp::from_code(3).bits(), 8);
        assert_eq!(SPRITE_ROW_DWORDS, 2);
    }

    #[test]
    fn control_byte_packing() {
        let control = ElementControl::pack(true, Bpp::Bpp4.code(), 9);
        assert_eq!(control.bits(), 0x80 | (2 << 5) | 9);
        assert_eq!(control.draw_order(), 9);
        assert_eq!(control.bpp_code(), 2);
        assert!(control.contains(ElementControl::ENABLED));
    }

    #[test]
    fn plane_geometry_halves_x_in_low_res() {
        let plane = PlaneRegs::new();
        plane.common.x.set(161);
        plane.latch();
        let low = plane.bounds(false);
        assert_eq!(low.start_x, 80);
        assert_eq!(low.end_x, u32::MAX);
        assert_eq!((low.start_y, low.end_y), (0, u32::MAX));
        assert_eq!(plane.bounds(true).start_x, 161);
    }

    #[test]
    fn sprite_geometry_is_a_fixed_box() {
        let sprite = SpriteRegs::new();
        sprite.common.x.set(200);
        sprite.common.y.set(10);
        sprite.end_y.set(42);
        sprite.latch();
        assert_eq!(
            sprite.bounds(false),
            ElementBounds {
                start_x: 100,
                end_x: 132,
                start_y: 10,
                end_y: 42
            }
        );
        assert_eq!(sprite.bpp(), Bpp::Bpp2);
        assert_eq!(sprite.dma_config().window, 31);
    }

    #[test]
    fn pending_geometry_is_invisible_before_latch() {
        let sprite = SpriteRegs::new();
        sprite.common.y.set(10);
        assert_eq!(sprite.bounds(true).start_y, 0);
    }

    #[test]
    fn plane_pixels_get_palette_offset() {
        let decoder = PixelDecoder::Offset(32);
        assert_eq!(decoder.decode(0), 0);
        assert_eq!(decoder.decode(1), 33);
        assert_eq!(PixelDecoder::Offset(0xF0).decode(0x20), 0x10);
    }

    #[test]
    fn sprite_pixels_select_palette_entries() {
        let sprite = SpriteRegs::new();
        sprite.common.palette_1.set(8);
        sprite.palette_2.set(16);
        sprite.palette_3.set(48);
        sprite.latch();
        let decoder = sprite.pixel_decoder();
        assert_eq!(
            (0..4).map(|raw| decoder.decode(raw)).collect::<Vec<_>>(),
            vec![0, 8, 16, 48]
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "wider than 2 bits")]
    fn lookup_rejects_wide_codes() {
        PixelDecoder::Lookup([1, 2, 3]).decode(4);
    }

    #[test]
    fn post_increment_is_signed() {
        let plane = PlaneRegs::new();
        plane.common.post_increment.set(0xFE);
        plane.wrap_window.set(31);
        plane.latch();
        let config = plane.dma_config();
        assert_eq!(config.post_increment, -2);
        assert_eq!(config.window, 31);
    }
}
