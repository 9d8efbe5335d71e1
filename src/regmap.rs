// Copyright (C) 2025 Dayton Fishell
// Anachron Video Peripheral Model
// This file is part of Anachron.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Byte offset map of the video register window.
//!
//! The tables below are the whole address map: global registers are listed
//! one offset at a time, element blocks share a common sub-layout for
//! `0x00..=0x0a` and a kind-specific tail for `0x0b..=0x0f`. Anything not in a
//! table decodes to `None`.

use crate::element::{PLANE_COUNT, SPRITE_COUNT};

/// Stride between element blocks.
pub const ELEMENT_STRIDE: u32 = 0x20;
pub const PLANE_BLOCK_BASE: u32 = 0x80;
pub const SPRITE_BLOCK_BASE: u32 = 0x100;
/// First offset past the register window.
pub const REGISTER_WINDOW_END: u32 = SPRITE_BLOCK_BASE + SPRITE_COUNT as u32 * ELEMENT_STRIDE;

pub const H_TOTAL: u32 = 0x00;
pub const H_BACK_PORCH_END: u32 = 0x01;
pub const H_SYNC_END: u32 = 0x02;
pub const H_FRONT_PORCH_END: u32 = 0x03;
pub const V_TOTAL_HIGH: u32 = 0x04;
pub const V_ACTIVE_END_HIGH: u32 = 0x05;
pub const V_BACK_PORCH_END_HIGH: u32 = 0x06;
pub const V_SYNC_END_HIGH: u32 = 0x07;
pub const V_TIMING_LOW: u32 = 0x08;
pub const LINE_INT_VAL: u32 = 0x09;
pub const TIMING_MISC: u32 = 0x0a;
pub const INT_ENABLE: u32 = 0x10;
pub const INT_STATUS: u32 = 0x11;
pub const PLANE_COLLISION_ENABLE: u32 = 0x12;
pub const PLANE_COLLISION: u32 = 0x13;
pub const SPRITE_COLLISION_ENABLE: u32 = 0x14;
pub const SPRITE_COLLISION: u32 = 0x15;
pub const PALETTE_INDEX: u32 = 0x40;
pub const PALETTE_RED: u32 = 0x41;
pub const PALETTE_GREEN: u32 = 0x42;
pub const PALETTE_BLUE: u32 = 0x43;

// Sub-offsets inside an element block.
pub const BASE_ADDRESS: u32 = 0x00;
pub const CONTROL: u32 = 0x04;
pub const POST_INCREMENT: u32 = 0x05;
pub const X: u32 = 0x06;
pub const Y: u32 = 0x08;
pub const PALETTE_1: u32 = 0x0a;
pub const WRAP_WINDOW: u32 = 0x0b;
pub const CURRENT_ADDRESS: u32 = 0x0c;
pub const PALETTE_2: u32 = 0x0b;
pub const PALETTE_3: u32 = 0x0c;
pub const SPRITE_RESERVED: u32 = 0x0d;
pub const END_Y: u32 = 0x0e;

/// The four 10-bit vertical timing values, in the order their low bits are
/// packed into `V_TIMING_LOW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalField {
    Total,
    ActiveEnd,
    BackPorchEnd,
    SyncEnd,
}

/// Which 8-bit colour channel a palette port reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalReg {
    HTotal,
    HBackPorchEnd,
    HSyncEnd,
    HFrontPorchEnd,
    VerticalHigh(VerticalField),
    VerticalLow,
    LineIntHigh,
    TimingMisc,
    IntEnable,
    IntStatus,
    PlaneCollisionEnable,
    PlaneCollision,
    SpriteCollisionEnable,
    SpriteCollision,
    PaletteIndex,
    PaletteChannel(Channel),
}

/// Fields every element block has. Multi-byte fields carry the byte lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementReg {
    BaseAddress(u8),
    Control,
    PostIncrement,
    X(u8),
    Y(u8),
    Palette1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneReg {
    Common(ElementReg),
    WrapWindow,
    CurrentAddress(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteReg {
    Common(ElementReg),
    Palette2,
    Palette3,
    Reserved,
    EndY(u8),
}

/// A decoded register offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Global(GlobalReg),
    Plane { index: usize, reg: PlaneReg },
    Sprite { index: usize, reg: SpriteReg },
}

const GLOBAL_MAP: &[(u32, GlobalReg)] = &[
    (H_TOTAL, GlobalReg::HTotal),
    (H_BACK_PORCH_END, GlobalReg::HBackPorchEnd),
    (H_SYNC_END, GlobalReg::HSyncEnd),
    (H_FRONT_PORCH_END, GlobalReg::HFrontPorchEnd),
    (V_TOTAL_HIGH, GlobalReg::VerticalHigh(VerticalField::Total)),
    (V_ACTIVE_END_HIGH, GlobalReg::VerticalHigh(VerticalField::ActiveEnd)),
    (V_BACK_PORCH_END_HIGH, GlobalReg::VerticalHigh(VerticalField::BackPorchEnd)),
    (V_SYNC_END_HIGH, GlobalReg::VerticalHigh(VerticalField::SyncEnd)),
    (V_TIMING_LOW, GlobalReg::VerticalLow),
    (LINE_INT_VAL, GlobalReg::LineIntHigh),
    (TIMING_MISC, GlobalReg::TimingMisc),
    (INT_ENABLE, GlobalReg::IntEnable),
    (INT_STATUS, GlobalReg::IntStatus),
    (PLANE_COLLISION_ENABLE, GlobalReg::PlaneCollisionEnable),
    (PLANE_COLLISION, GlobalReg::PlaneCollision),
    (SPRITE_COLLISION_ENABLE, GlobalReg::SpriteCollisionEnable),
    (SPRITE_COLLISION, GlobalReg::SpriteCollision),
    (PALETTE_INDEX, GlobalReg::PaletteIndex),
    (PALETTE_RED, GlobalReg::PaletteChannel(Channel::Red)),
    (PALETTE_GREEN, GlobalReg::PaletteChannel(Channel::Green)),
    (PALETTE_BLUE, GlobalReg::PaletteChannel(Channel::Blue)),
];

const COMMON_MAP: &[(u32, ElementReg)] = &[
    (BASE_ADDRESS, ElementReg::BaseAddress(0)),
    (BASE_ADDRESS + 1, ElementReg::BaseAddress(1)),
    (BASE_ADDRESS + 2, ElementReg::BaseAddress(2)),
    (BASE_ADDRESS + 3, ElementReg::BaseAddress(3)),
    (CONTROL, ElementReg::Control),
    (POST_INCREMENT, ElementReg::PostIncrement),
    (X, ElementReg::X(0)),
    (X + 1, ElementReg::X(1)),
    (Y, ElementReg::Y(0)),
    (Y + 1, ElementReg::Y(1)),
    (PALETTE_1, ElementReg::Palette1),
];

const PLANE_MAP: &[(u32, PlaneReg)] = &[
    (WRAP_WINDOW, PlaneReg::WrapWindow),
    (CURRENT_ADDRESS, PlaneReg::CurrentAddress(0)),
    (CURRENT_ADDRESS + 1, PlaneReg::CurrentAddress(1)),
    (CURRENT_ADDRESS + 2, PlaneReg::CurrentAddress(2)),
    (CURRENT_ADDRESS + 3, PlaneReg::CurrentAddress(3)),
];

const SPRITE_MAP: &[(u32, SpriteReg)] = &[
    (PALETTE_2, SpriteReg::Palette2),
    (PALETTE_3, SpriteReg::Palette3),
    (SPRITE_RESERVED, SpriteReg::Reserved),
    (END_Y, SpriteReg::EndY(0)),
    (END_Y + 1, SpriteReg::EndY(1)),
];

fn lookup<T: Copy>(table: &[(u32, T)], offset: u32) -> Option<T> {
    table
        .iter()
        .find(|(entry, _)| *entry == offset)
        .map(|(_, reg)| *reg)
}

fn lookup_element<T: Copy>(
    tail: &[(u32, T)],
    sub_offset: u32,
    common: impl Fn(ElementReg) -> T,
) -> Option<T> {
    lookup(COMMON_MAP, sub_offset)
        .map(common)
        .or_else(|| lookup(tail, sub_offset))
}

/// Decode a byte offset into the register it addresses.
pub fn decode(offset: u32) -> Option<Register> {
    let sub_offset = offset % ELEMENT_STRIDE;
    match offset {
        _ if offset < PLANE_BLOCK_BASE => lookup(GLOBAL_MAP, offset).map(Register::Global),
        _ if offset < SPRITE_BLOCK_BASE => {
            let index = ((offset - PLANE_BLOCK_BASE) / ELEMENT_STRIDE) as usize;
            debug_assert!(index < PLANE_COUNT);
            lookup_element(PLANE_MAP, sub_offset, PlaneReg::Common)
                .map(|reg| Register::Plane { index, reg })
        }
        _ if offset < REGISTER_WINDOW_END => {
            let index = ((offset - SPRITE_BLOCK_BASE) / ELEMENT_STRIDE) as usize;
            lookup_element(SPRITE_MAP, sub_offset, SpriteReg::Common)
                .map(|reg| Register::Sprite { index, reg })
        }
        _ => None,
    }
}

/// Offset of a plane block.
pub const fn plane_base(index: usize) -> u32 {
    PLANE_BLOCK_BASE + index as u32 * ELEMENT_STRIDE
}

/// Offset of a sprite block.
pub const fn sprite_base(index: usize) -> u32 {
    SPRITE_BLOCK_BASE + index as u32 * ELEMENT_STRIDE
}
