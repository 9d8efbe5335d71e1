// Copyright (C) 2025 Dayton Fishell
// Anachron Video Peripheral Model
// This file is part of Anachron.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! The video register file.
//!
//! [`VideoRegisters`] is shared between the processor side, which only ever
//! goes through [`VideoRegisters::register_read`] and
//! [`VideoRegisters::register_write`], and the render side, which calls
//! [`VideoRegisters::latch`] once per frame and then reads active values.
//! Configuration reads return pending values; status reads return what the
//! hardware side last published.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use bitflags::bitflags;
use log::warn;

use crate::core::{ClearOnWrite, ShadowFlag, ShadowReg};
use crate::element::{
    Bpp, ElementControl, ElementRegs, PLANE_COUNT, PlaneRegs, Renderable, SPRITE_COUNT, SpriteRegs,
};
use crate::palette::Palette;
use crate::regmap::{self, ElementReg, GlobalReg, PlaneReg, Register, SpriteReg, VerticalField};

bitflags! {
    /// Bit layout shared by the interrupt enable and status registers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IntFlags: u8 {
        const GLOBAL = 0x80;
        const LINE = 0x04;
        const READ = 0x02;
        const VERTICAL = 0x01;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TimingMisc: u8 {
        const HIGH_RES = 0x01;
        const REPLICATION = 0x0c;
        const LINE_INT_LOW = 0x30;
        const ENABLED = 0x80;
    }
}

/// Horizontal timing is counted in double pixel clocks, 8 bits each.
#[derive(Debug, Default)]
pub struct HorizontalTiming {
    pub total: ShadowReg<8>,
    pub back_porch_end: ShadowReg<8>,
    pub sync_end: ShadowReg<8>,
    pub front_porch_end: ShadowReg<8>,
}

/// Vertical timing, 10 bits each, split over a high byte and a shared
/// low-bits byte.
#[derive(Debug, Default)]
pub struct VerticalTiming {
    pub total: ShadowReg<10>,
    pub active_end: ShadowReg<10>,
    pub back_porch_end: ShadowReg<10>,
    pub sync_end: ShadowReg<10>,
}

impl VerticalTiming {
    fn field(&self, field: VerticalField) -> &ShadowReg<10> {
        match field {
            VerticalField::Total => &self.total,
            VerticalField::ActiveEnd => &self.active_end,
            VerticalField::BackPorchEnd => &self.back_porch_end,
            VerticalField::SyncEnd => &self.sync_end,
        }
    }

    fn fields(&self) -> [&ShadowReg<10>; 4] {
        [&self.total, &self.active_end, &self.back_porch_end, &self.sync_end]
    }
}

#[derive(Debug, Default)]
struct InterruptStatus {
    global: ClearOnWrite,
    line: ClearOnWrite,
    read: ClearOnWrite,
    vertical: ClearOnWrite,
}

impl InterruptStatus {
    fn latches(&self) -> [(IntFlags, &ClearOnWrite); 4] {
        [
            (IntFlags::GLOBAL, &self.global),
            (IntFlags::LINE, &self.line),
            (IntFlags::READ, &self.read),
            (IntFlags::VERTICAL, &self.vertical),
        ]
    }

    fn bits(&self) -> IntFlags {
        self.latches()
            .into_iter()
            .filter(|(_, latch)| latch.get())
            .fold(IntFlags::empty(), |acc, (flag, _)| acc | flag)
    }

    fn raise(&self, raised: IntFlags) {
        for (flag, latch) in self.latches() {
            if raised.contains(flag) {
                latch.raise();
            }
        }
    }

    fn clear(&self, written: IntFlags) {
        for (flag, latch) in self.latches() {
            latch.clear(written.contains(flag));
        }
    }
}

fn collision_bits<'a>(latches: impl Iterator<Item = &'a ClearOnWrite>) -> u8 {
    latches
        .enumerate()
        .filter(|(_, latch)| latch.get())
        .fold(0, |acc, (bit, _)| acc | (1 << bit))
}

fn clear_collisions<'a>(latches: impl Iterator<Item = &'a ClearOnWrite>, value: u8) {
    for (bit, latch) in latches.enumerate() {
        latch.clear(value & (1 << bit) != 0);
    }
}

/// Byte `lane` of a little-endian multi-byte field.
fn byte_lane(value: u32, lane: u8) -> u8 {
    (value >> (8 * lane as u32)) as u8
}

/// Every register of the peripheral.
#[derive(Debug)]
pub struct VideoRegisters {
    pub horizontal: HorizontalTiming,
    pub vertical: VerticalTiming,
    pub line_int_val: ShadowReg<10>,
    pub high_res: ShadowFlag,
    pub v_replication: ShadowReg<2>,
    pub enabled: ShadowFlag,
    pub int_enable: ShadowReg<8>,
    int_status: InterruptStatus,
    pub plane_collision_enable: ShadowReg<4>,
    pub sprite_collision_enable: ShadowReg<8>,
    palette: Mutex<Palette>,
    pub planes: [PlaneRegs; PLANE_COUNT],
    pub sprites: [SpriteRegs; SPRITE_COUNT],
    /// Current-address snapshot, one for all planes.
    read_snapshot: AtomicU32,
    /// Held shared by every write and exclusively by `latch`.
    latch_lock: RwLock<()>,
}

impl VideoRegisters {
    pub fn new() -> Self {
        Self {
            horizontal: HorizontalTiming::default(),
            vertical: VerticalTiming::default(),
            line_int_val: ShadowReg::default(),
            high_res: ShadowFlag::default(),
            v_replication: ShadowReg::default(),
            enabled: ShadowFlag::default(),
            int_enable: ShadowReg::default(),
            int_status: InterruptStatus::default(),
            plane_collision_enable: ShadowReg::default(),
            sprite_collision_enable: ShadowReg::default(),
            palette: Mutex::new(Palette::new()),
            planes: std::array::from_fn(|_| PlaneRegs::new()),
            sprites: std::array::from_fn(|_| SpriteRegs::new()),
            read_snapshot: AtomicU32::new(0),
            latch_lock: RwLock::new(()),
        }
    }

    pub fn palette(&self) -> MutexGuard<'_, Palette> {
        self.palette.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read one byte of the register window.
    ///
    /// # Panics
    ///
    /// On an offset the register map does not define.
    pub fn register_read(&self, offset: u32) -> u8 {
        let Some(register) = regmap::decode(offset) else {
            panic!("unmapped video register offset {offset:#05x} (read)");
        };
        match register {
            Register::Global(reg) => self.read_global(reg),
            Register::Plane { index, reg } => self.read_plane(index, reg),
            Register::Sprite { index, reg } => self.read_sprite(index, reg),
        }
    }

    /// Write one byte of the register window.
    ///
    /// # Panics
    ///
    /// On an offset the register map does not define.
    pub fn register_write(&self, offset: u32, value: u8) {
        let Some(register) = regmap::decode(offset) else {
            panic!("unmapped video register offset {offset:#05x} (write of {value:#04x})");
        };
        let _write = self.latch_lock.read().unwrap_or_else(PoisonError::into_inner);
        match register {
            Register::Global(reg) => self.write_global(reg, value),
            Register::Plane { index, reg } => self.write_plane(index, reg, value),
            Register::Sprite { index, reg } => self.write_sprite(index, reg, value),
        }
    }

    fn timing_misc_pending(&self) -> TimingMisc {
        let mut misc = TimingMisc::from_bits_truncate(
            ((self.v_replication.get_pending() as u8) << 2)
                | (((self.line_int_val.get_pending() & 0x03) as u8) << 4),
        );
        misc.set(TimingMisc::HIGH_RES, self.high_res.pending_flag());
        misc.set(TimingMisc::ENABLED, self.enabled.pending_flag());
        misc
    }

    fn read_global(&self, reg: GlobalReg) -> u8 {
        match reg {
            GlobalReg::HTotal => self.horizontal.total.get_pending() as u8,
            GlobalReg::HBackPorchEnd => self.horizontal.back_porch_end.get_pending() as u8,
            GlobalReg::HSyncEnd => self.horizontal.sync_end.get_pending() as u8,
            GlobalReg::HFrontPorchEnd => self.horizontal.front_porch_end.get_pending() as u8,
            GlobalReg::VerticalHigh(field) => (self.vertical.field(field).get_pending() >> 2) as u8,
            GlobalReg::VerticalLow => self
                .vertical
                .fields()
                .iter()
                .enumerate()
                .fold(0, |acc, (slot, field)| {
                    acc | (((field.get_pending() & 0x03) as u8) << (2 * slot))
                }),
            GlobalReg::LineIntHigh => (self.line_int_val.get_pending() >> 2) as u8,
            GlobalReg::TimingMisc => self.timing_misc_pending().bits(),
            GlobalReg::IntEnable => self.int_enable.get_pending() as u8,
            GlobalReg::IntStatus => self.int_status.bits().bits(),
            GlobalReg::PlaneCollisionEnable => self.plane_collision_enable.get_pending() as u8,
            GlobalReg::PlaneCollision => collision_bits(self.planes.iter().map(|p| &p.common.collision)),
            GlobalReg::SpriteCollisionEnable => self.sprite_collision_enable.get_pending() as u8,
            GlobalReg::SpriteCollision => collision_bits(self.sprites.iter().map(|s| &s.common.collision)),
            GlobalReg::PaletteIndex => self.palette().index(),
            GlobalReg::PaletteChannel(channel) => self.palette().channel(channel),
        }
    }

    fn write_global(&self, reg: GlobalReg, value: u8) {
        let value32 = value as u32;
        match reg {
            GlobalReg::HTotal => self.horizontal.total.set(value32),
            GlobalReg::HBackPorchEnd => self.horizontal.back_porch_end.set(value32),
            GlobalReg::HSyncEnd => self.horizontal.sync_end.set(value32),
            GlobalReg::HFrontPorchEnd => self.horizontal.front_porch_end.set(value32),
            GlobalReg::VerticalHigh(field) => self.vertical.field(field).set_field(value32, 2, 8),
            GlobalReg::VerticalLow => {
                for (slot, field) in self.vertical.fields().iter().enumerate() {
                    field.set_field((value32 >> (2 * slot)) & 0x03, 0, 2);
                }
            }
            GlobalReg::LineIntHigh => self.line_int_val.set_field(value32, 2, 8),
            GlobalReg::TimingMisc => {
                let misc = TimingMisc::from_bits_truncate(value);
                self.high_res.set_flag(misc.contains(TimingMisc::HIGH_RES));
                self.v_replication
                    .set(((misc & TimingMisc::REPLICATION).bits() >> 2) as u32);
                self.line_int_val
                    .set_field(((misc & TimingMisc::LINE_INT_LOW).bits() >> 4) as u32, 0, 2);
                self.enabled.set_flag(misc.contains(TimingMisc::ENABLED));
            }
            GlobalReg::IntEnable => self
                .int_enable
                .set(IntFlags::from_bits_truncate(value).bits() as u32),
            GlobalReg::IntStatus => self.int_status.clear(IntFlags::from_bits_truncate(value)),
            GlobalReg::PlaneCollisionEnable => self.plane_collision_enable.set(value32),
            GlobalReg::PlaneCollision => {
                clear_collisions(self.planes.iter().map(|p| &p.common.collision), value)
            }
            GlobalReg::SpriteCollisionEnable => self.sprite_collision_enable.set(value32),
            GlobalReg::SpriteCollision => {
                clear_collisions(self.sprites.iter().map(|s| &s.common.collision), value)
            }
            GlobalReg::PaletteIndex => self.palette().set_index(value),
            GlobalReg::PaletteChannel(channel) => self.palette().set_channel(channel, value),
        }
    }

    fn read_common(common: &ElementRegs, reg: ElementReg, bpp_code: u8) -> u8 {
        match reg {
            ElementReg::BaseAddress(lane) => byte_lane(common.base_address.get_pending() << 2, lane),
            ElementReg::Control => ElementControl::pack(
                common.enabled.pending_flag(),
                bpp_code,
                common.draw_order.get_pending() as u8,
            )
            .bits(),
            ElementReg::PostIncrement => common.post_increment.get_pending() as u8,
            ElementReg::X(lane) => byte_lane(common.x.get_pending(), lane),
            ElementReg::Y(lane) => byte_lane(common.y.get_pending(), lane),
            ElementReg::Palette1 => common.palette_1.get_pending() as u8,
        }
    }

    fn write_common(common: &ElementRegs, reg: ElementReg, value: u8) {
        let value32 = value as u32;
        match reg {
            // The register holds a dword address; the low two bits of the
            // byte address are dropped.
            ElementReg::BaseAddress(0) => common.base_address.set_field(value32 >> 2, 0, 6),
            ElementReg::BaseAddress(lane) => {
                common.base_address.set_field(value32, 8 * lane as u32 - 2, 8)
            }
            ElementReg::Control => {
                let control = ElementControl::from_bits_retain(value);
                common.enabled.set_flag(control.contains(ElementControl::ENABLED));
                common.draw_order.set(control.draw_order() as u32);
            }
            ElementReg::PostIncrement => common.post_increment.set(value32),
            ElementReg::X(lane) => common.x.set_field(value32, 8 * lane as u32, 8),
            ElementReg::Y(lane) => common.y.set_field(value32, 8 * lane as u32, 8),
            ElementReg::Palette1 => common.palette_1.set(value32),
        }
    }

    fn read_plane(&self, index: usize, reg: PlaneReg) -> u8 {
        let plane = &self.planes[index];
        match reg {
            PlaneReg::Common(reg) => {
                Self::read_common(&plane.common, reg, plane.bpp.get_pending() as u8)
            }
            PlaneReg::WrapWindow => plane.wrap_window.get_pending() as u8,
            PlaneReg::CurrentAddress(lane) => {
                // Byte 0 captures the shared snapshot the other lanes read.
                if lane == 0 {
                    self.read_snapshot
                        .store(plane.current_address.get(), Ordering::Release);
                }
                byte_lane(self.read_snapshot.load(Ordering::Acquire) << 2, lane)
            }
        }
    }

    fn write_plane(&self, index: usize, reg: PlaneReg, value: u8) {
        let plane = &self.planes[index];
        match reg {
            PlaneReg::Common(reg) => {
                if reg == ElementReg::Control {
                    plane
                        .bpp
                        .set(ElementControl::from_bits_retain(value).bpp_code() as u32);
                }
                Self::write_common(&plane.common, reg, value);
            }
            PlaneReg::WrapWindow => plane.wrap_window.set(value as u32),
            PlaneReg::CurrentAddress(lane) => {
                warn!("write of {value:#04x} to read-only current address byte {lane} of plane {index} ignored");
            }
        }
    }

    fn read_sprite(&self, index: usize, reg: SpriteReg) -> u8 {
        let sprite = &self.sprites[index];
        match reg {
            SpriteReg::Common(reg) => Self::read_common(&sprite.common, reg, 0),
            SpriteReg::Palette2 => sprite.palette_2.get_pending() as u8,
            SpriteReg::Palette3 => sprite.palette_3.get_pending() as u8,
            SpriteReg::Reserved => 0,
            SpriteReg::EndY(lane) => byte_lane(sprite.end_y.get_pending(), lane),
        }
    }

    fn write_sprite(&self, index: usize, reg: SpriteReg, value: u8) {
        let sprite = &self.sprites[index];
        let value32 = value as u32;
        match reg {
            SpriteReg::Common(reg) => Self::write_common(&sprite.common, reg, value),
            SpriteReg::Palette2 => sprite.palette_2.set(value32),
            SpriteReg::Palette3 => sprite.palette_3.set(value32),
            SpriteReg::Reserved => {
                warn!("write of {value:#04x} to reserved byte of sprite {index} ignored");
            }
            SpriteReg::EndY(lane) => sprite.end_y.set_field(value32, 8 * lane as u32, 8),
        }
    }

    /// Make every pending value active. This is the only point where the
    /// render side observes register writes.
    ///
    /// No write lands while the latch runs, so the active set is always
    /// some prefix of the writes in program order.
    pub fn latch(&self) {
        let _latch = self.latch_lock.write().unwrap_or_else(PoisonError::into_inner);
        let h = &self.horizontal;
        for reg in [&h.total, &h.back_porch_end, &h.sync_end, &h.front_porch_end] {
            reg.latch();
        }
        for reg in self.vertical.fields() {
            reg.latch();
        }
        self.line_int_val.latch();
        self.high_res.latch();
        self.v_replication.latch();
        self.enabled.latch();
        self.int_enable.latch();
        self.plane_collision_enable.latch();
        self.sprite_collision_enable.latch();
        self.planes.iter().for_each(PlaneRegs::latch);
        self.sprites.iter().for_each(SpriteRegs::latch);
    }

    /// Pixel-clock multiplier: a timing unit is 4 pixels in high resolution,
    /// 2 in low resolution.
    fn clock_multiplier(&self) -> u32 {
        if self.high_res.flag() { 4 } else { 2 }
    }

    /// Active width in pixels, from latched timing.
    pub fn screen_width(&self) -> u32 {
        let h = &self.horizontal;
        h.total.get().saturating_sub(h.front_porch_end.get()) * self.clock_multiplier()
    }

    /// Active height in lines, from latched timing.
    pub fn screen_height(&self) -> u32 {
        (self.vertical.active_end.get() + 1) / (self.v_replication.get() + 1)
    }

    /// Last composition column scanned per row.
    pub fn max_column(&self) -> u32 {
        (self.horizontal.total.get() + 1) * self.clock_multiplier() - 1
    }

    /// Columns up to and including this one are blanking.
    pub fn active_start(&self) -> u32 {
        (self.horizontal.front_porch_end.get() + 1) * self.clock_multiplier() - 1
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.flag()
    }

    pub fn high_res(&self) -> bool {
        self.high_res.flag()
    }

    /// Whether any enabled plane runs at 8 bpp.
    pub fn any_plane_bpp8(&self) -> bool {
        self.planes
            .iter()
            .any(|plane| plane.enabled() && plane.bpp() == Bpp::Bpp8)
    }

    pub fn interrupt_status(&self) -> IntFlags {
        self.int_status.bits()
    }

    /// Raise the end-of-frame interrupt sources.
    pub fn raise_frame_interrupts(&self) {
        let mut raised = IntFlags::VERTICAL;
        if self.line_int_val.get() <= self.vertical.total.get() {
            raised |= IntFlags::LINE;
        }
        self.int_status.raise(raised);

        let enabled = IntFlags::from_bits_truncate(self.int_enable.get() as u8);
        let plane_hits = collision_bits(self.planes.iter().map(|p| &p.common.collision))
            & self.plane_collision_enable.get() as u8;
        let sprite_hits = collision_bits(self.sprites.iter().map(|s| &s.common.collision))
            & self.sprite_collision_enable.get() as u8;
        let pending = self.int_status.bits() & enabled & !IntFlags::GLOBAL;
        let source = !pending.is_empty() || plane_hits != 0 || sprite_hits != 0;
        if source && enabled.contains(IntFlags::GLOBAL) {
            self.int_status.raise(IntFlags::GLOBAL);
        }
    }

    /// Level of the interrupt line towards the processor.
    pub fn irq_asserted(&self) -> bool {
        self.int_status.bits().contains(IntFlags::GLOBAL)
    }
}

impl Default for VideoRegisters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regmap::*;
    use pretty_assertions::assert_eq;

    fn program_320x240(regs: &VideoRegisters) {
        regs.register_write(H_TOTAL, 199);
        regs.register_write(H_BACK_PORCH_END, 11);
        regs.register_write(H_SYNC_END, 35);
        regs.register_write(H_FRONT_PORCH_END, 39);
        regs.register_write(V_TOTAL_HIGH, (524 >> 2) as u8);
        regs.register_write(V_ACTIVE_END_HIGH, (479 >> 2) as u8);
        regs.register_write(V_BACK_PORCH_END_HIGH, (512 >> 2) as u8);
        regs.register_write(V_SYNC_END_HIGH, (514 >> 2) as u8);
        regs.register_write(
            V_TIMING_LOW,
            (524 & 3) as u8 | ((479 & 3) << 2) as u8 | ((512 & 3) << 4) as u8 | ((514 & 3) << 6) as u8,
        );
        regs.register_write(TIMING_MISC, 0x80 | (1 << 2));
    }

    #[test]
    fn geometry_from_timing() {
        let regs = VideoRegisters::new();
        program_320x240(&regs);
        assert_eq!(regs.screen_width(), 0, "nothing is active before latch");
        regs.latch();
        assert_eq!((regs.screen_width(), regs.screen_height()), (320, 240));
        assert_eq!(regs.max_column(), 399);
        assert_eq!(regs.active_start(), 79);

        regs.register_write(TIMING_MISC, 0x81);
        regs.latch();
        assert_eq!((regs.screen_width(), regs.screen_height()), (640, 480));
    }

    #[test]
    fn vertical_timing_is_split_across_bytes() {
        let regs = VideoRegisters::new();
        program_320x240(&regs);
        assert_eq!(regs.vertical.total.get_pending(), 524);
        assert_eq!(regs.vertical.active_end.get_pending(), 479);
        assert_eq!(regs.vertical.back_porch_end.get_pending(), 512);
        assert_eq!(regs.vertical.sync_end.get_pending(), 514);
        assert_eq!(regs.register_read(V_ACTIVE_END_HIGH), (479 >> 2) as u8);
        assert_eq!(regs.register_read(V_TIMING_LOW), 0b10_00_11_00);

        // Rewriting the high byte keeps the low bits.
        regs.register_write(V_ACTIVE_END_HIGH, 0);
        assert_eq!(regs.vertical.active_end.get_pending(), 3);
    }

    #[test]
    fn config_reads_return_pending_values() {
        let regs = VideoRegisters::new();
        regs.register_write(H_TOTAL, 199);
        assert_eq!(regs.register_read(H_TOTAL), 199);
        assert_eq!(regs.horizontal.total.get(), 0);
    }

    #[test]
    fn timing_misc_round_trip() {
        let regs = VideoRegisters::new();
        regs.register_write(TIMING_MISC, 0x80 | 0x20 | 0x0c | 0x01);
        assert!(regs.high_res.pending_flag());
        assert!(regs.enabled.pending_flag());
        assert_eq!(regs.v_replication.get_pending(), 3);
        assert_eq!(regs.line_int_val.get_pending(), 2);
        assert_eq!(regs.register_read(TIMING_MISC), 0xad);
    }

    #[test]
    fn line_interrupt_high_byte_leaves_misc_alone() {
        let regs = VideoRegisters::new();
        regs.register_write(TIMING_MISC, 0x80 | 0x30);
        regs.register_write(LINE_INT_VAL, 0x7f);
        assert_eq!(regs.line_int_val.get_pending(), (0x7f << 2) | 3);
        assert!(regs.enabled.pending_flag());
        assert_eq!(regs.register_read(LINE_INT_VAL), 0x7f);
    }

    #[test]
    fn base_address_is_stored_in_dwords() {
        let regs = VideoRegisters::new();
        let base = plane_base(1);
        for (lane, byte) in 0x0012_3456u32.to_le_bytes().into_iter().enumerate() {
            regs.register_write(base + BASE_ADDRESS + lane as u32, byte);
        }
        assert_eq!(regs.planes[1].common.base_address.get_pending(), 0x0012_3456 >> 2);
        let read_back: Vec<u8> = (0..4)
            .map(|lane| regs.register_read(base + BASE_ADDRESS + lane))
            .collect();
        assert_eq!(read_back, vec![0x54, 0x34, 0x12, 0x00]);
    }

    #[test]
    fn control_byte_decodes_per_element_kind() {
        let regs = VideoRegisters::new();
        regs.register_write(plane_base(0) + CONTROL, 0x80 | (3 << 5) | 7);
        regs.register_write(sprite_base(0) + CONTROL, 0x80 | (3 << 5) | 9);
        regs.latch();
        let plane = &regs.planes[0];
        assert!(plane.enabled());
        assert_eq!(plane.bpp(), Bpp::Bpp8);
        assert_eq!(plane.draw_order(), 7);
        let sprite = &regs.sprites[0];
        assert_eq!(sprite.draw_order(), 9);
        assert_eq!(sprite.bpp(), Bpp::Bpp2);
        assert_eq!(regs.register_read(plane_base(0) + CONTROL), 0xe7);
        assert_eq!(regs.register_read(sprite_base(0) + CONTROL), 0x89);
    }

    #[test]
    fn sprite_fields() {
        let regs = VideoRegisters::new();
        let base = sprite_base(3);
        regs.register_write(base + PALETTE_2, 16);
        regs.register_write(base + PALETTE_3, 48);
        regs.register_write(base + END_Y, 0x34);
        regs.register_write(base + END_Y + 1, 0x01);
        regs.register_write(base + SPRITE_RESERVED, 0xaa);
        assert_eq!(regs.register_read(base + PALETTE_2), 16);
        assert_eq!(regs.register_read(base + PALETTE_3), 48);
        assert_eq!(regs.sprites[3].end_y.get_pending(), 0x134);
        assert_eq!(regs.register_read(base + SPRITE_RESERVED), 0);
    }

    #[test]
    fn current_address_snapshot_is_shared() {
        let regs = VideoRegisters::new();
        regs.planes[0].current_address.set(0x0040_0000 >> 2);
        regs.planes[1].current_address.set(0x0011_2233 >> 2);

        let plane0 = plane_base(0) + CURRENT_ADDRESS;
        let plane1 = plane_base(1) + CURRENT_ADDRESS;
        let read = |offsets: [u32; 4]| -> u32 {
            u32::from_le_bytes(offsets.map(|offset| regs.register_read(offset)))
        };
        assert_eq!(read([plane0, plane0 + 1, plane0 + 2, plane0 + 3]), 0x0040_0000);

        // Interleaving two planes mixes their bytes.
        assert_eq!(read([plane0, plane1 + 1, plane1 + 2, plane0 + 3]), 0x0040_0000);
        assert_eq!(read([plane1, plane0 + 1, plane0 + 2, plane0 + 3]), 0x0011_2230);
    }

    #[test]
    fn collision_status_bits_clear_on_write() {
        let regs = VideoRegisters::new();
        regs.planes[2].common.collision.raise();
        regs.sprites[5].common.collision.raise();
        assert_eq!(regs.register_read(PLANE_COLLISION), 0b0100);
        assert_eq!(regs.register_read(SPRITE_COLLISION), 0b0010_0000);
        assert_eq!(regs.register_read(PLANE_COLLISION), 0b0100, "reads do not clear");

        regs.register_write(PLANE_COLLISION, 0b1011);
        assert_eq!(regs.register_read(PLANE_COLLISION), 0b0100);
        regs.register_write(PLANE_COLLISION, 0b0100);
        assert_eq!(regs.register_read(PLANE_COLLISION), 0);
        regs.register_write(SPRITE_COLLISION, 0xff);
        assert_eq!(regs.register_read(SPRITE_COLLISION), 0);
    }

    #[test]
    fn frame_interrupts() {
        let regs = VideoRegisters::new();
        program_320x240(&regs);
        regs.register_write(LINE_INT_VAL, 0xff); // line 1023 is never reached
        regs.register_write(INT_ENABLE, (IntFlags::GLOBAL | IntFlags::VERTICAL).bits());
        regs.latch();
        regs.raise_frame_interrupts();
        assert_eq!(regs.interrupt_status(), IntFlags::GLOBAL | IntFlags::VERTICAL);
        assert!(regs.irq_asserted());

        regs.register_write(INT_STATUS, 0xff);
        assert_eq!(regs.register_read(INT_STATUS), 0);
        assert!(!regs.irq_asserted());

        regs.register_write(LINE_INT_VAL, 0x10);
        regs.register_write(INT_ENABLE, IntFlags::LINE.bits());
        regs.latch();
        regs.raise_frame_interrupts();
        assert_eq!(regs.interrupt_status(), IntFlags::LINE | IntFlags::VERTICAL);
        assert!(!regs.irq_asserted(), "global enable is off");
    }

    #[test]
    fn collision_can_raise_the_global_interrupt() {
        let regs = VideoRegisters::new();
        regs.register_write(INT_ENABLE, IntFlags::GLOBAL.bits());
        regs.register_write(SPRITE_COLLISION_ENABLE, 0x01);
        regs.register_write(LINE_INT_VAL, 0xff);
        regs.register_write(V_TIMING_LOW, 0);
        regs.latch();
        regs.raise_frame_interrupts();
        assert!(!regs.irq_asserted());
        regs.sprites[0].common.collision.raise();
        regs.raise_frame_interrupts();
        assert!(regs.irq_asserted());
    }

    #[test]
    fn palette_ports() {
        let regs = VideoRegisters::new();
        regs.register_write(PALETTE_INDEX, 33);
        assert_eq!(regs.register_read(PALETTE_INDEX), 1);
        regs.register_write(PALETTE_RED, 0xff);
        regs.register_write(PALETTE_GREEN, 0x80);
        assert_eq!(regs.register_read(PALETTE_RED), 0xff);
        assert_eq!(regs.register_read(PALETTE_GREEN), 0x80);
        assert_eq!(regs.register_read(PALETTE_BLUE), 0);
        assert_eq!(regs.palette().interpolated()[8].r, 0xff);
    }

    #[test]
    fn latch_never_splits_a_write_sequence() {
        use std::sync::atomic::AtomicBool;
        use std::thread;

        // The writer always stores H_TOTAL before H_FRONT_PORCH_END with
        // total >= front porch, so every prefix of its writes keeps that
        // ordering. A latch landing between two registers would not.
        let regs = VideoRegisters::new();
        let done = AtomicBool::new(false);
        thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..200 {
                    regs.register_write(H_FRONT_PORCH_END, 0);
                    regs.register_write(H_TOTAL, 0);
                    for value in 1..=255u8 {
                        regs.register_write(H_TOTAL, value);
                        regs.register_write(H_FRONT_PORCH_END, value);
                    }
                }
                done.store(true, Ordering::Release);
            });

            let mut latches = 0u32;
            while !done.load(Ordering::Acquire) || latches == 0 {
                regs.latch();
                let (total, front_porch) =
                    (regs.horizontal.total.get(), regs.horizontal.front_porch_end.get());
                assert!(
                    total >= front_porch,
                    "latched total {total} behind front porch {front_porch}"
                );
                latches += 1;
            }
        });
        regs.latch();
        assert_eq!(regs.horizontal.total.get(), 255);
        assert_eq!(regs.horizontal.front_porch_end.get(), 255);
    }

    #[test]
    #[should_panic(expected = "unmapped video register offset")]
    fn unmapped_read_is_fatal() {
        VideoRegisters::new().register_read(0x20);
    }

    #[test]
    #[should_panic(expected = "unmapped video register offset")]
    fn write_past_window_is_fatal() {
        VideoRegisters::new().register_write(0x200, 0);
    }
}
