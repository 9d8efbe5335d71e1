// Copyright (C) 2025 Dayton Fishell
// Anachron Video Peripheral Model
// This file is part of Anachron.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Register primitives shared by every block of the video core.
//!
//! [`ShadowReg`] is the double-buffered register: software writes land in the
//! pending value and only become visible to the composition logic after
//! [`ShadowReg::latch`]. [`StatusReg`] and [`ClearOnWrite`] are single-buffered
//! and take effect immediately.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

const fn width_mask(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}

#[derive(Debug, Clone, Copy)]
struct ShadowState {
    active: u32,
    pending: u32,
    dirty: bool,
}

/// Double-buffered register holding `WIDTH` significant bits.
#[derive(Debug)]
pub struct ShadowReg<const WIDTH: u32> {
    state: Mutex<ShadowState>,
}

impl<const WIDTH: u32> ShadowReg<WIDTH> {
    /// Bits retained by the register.
    pub const MASK: u32 = width_mask(WIDTH);

    /// Power-on value, identical on both sides.
    pub fn new(value: u32) -> Self {
        let value = value & Self::MASK;
        Self {
            state: Mutex::new(ShadowState {
                active: value,
                pending: value,
                dirty: false,
            }),
        }
    }

    // The guard only ever protects a plain value copy, so a poisoned lock
    // still holds consistent data.
    fn lock(&self) -> MutexGuard<'_, ShadowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the pending value.
    pub fn set(&self, value: u32) {
        let mut state = self.lock();
        state.pending = value & Self::MASK;
        state.dirty = true;
    }

    /// Replace bits `[start_bit, start_bit + width)` of the pending value.
    ///
    /// The read-modify-write happens under one lock, so a concurrent latch
    /// never observes half of a split field update.
    pub fn set_field(&self, value: u32, start_bit: u32, width: u32) {
        let field = (width_mask(width) as u64) << start_bit;
        let field = field as u32;
        let mut state = self.lock();
        let merged = (state.pending & !field) | (((value as u64) << start_bit) as u32 & field);
        state.pending = merged & Self::MASK;
        state.dirty = true;
    }

    /// Active value, as seen by the hardware side.
    pub fn get(&self) -> u32 {
        self.lock().active
    }

    /// Value that becomes active at the next latch.
    pub fn get_pending(&self) -> u32 {
        self.lock().pending
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    /// Copy pending into active if anything was written since the last latch.
    pub fn latch(&self) {
        let mut state = self.lock();
        if state.dirty {
            state.active = state.pending;
        }
        state.dirty = false;
    }
}

impl<const WIDTH: u32> Default for ShadowReg<WIDTH> {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Single-bit double-buffered register.
pub type ShadowFlag = ShadowReg<1>;

impl ShadowReg<1> {
    pub fn set_flag(&self, value: bool) {
        self.set(value as u32);
    }

    pub fn flag(&self) -> bool {
        self.get() != 0
    }

    pub fn pending_flag(&self) -> bool {
        self.get_pending() != 0
    }
}

/// Single-buffered register; writes are visible immediately.
#[derive(Debug, Default)]
pub struct StatusReg<const WIDTH: u32> {
    value: AtomicU32,
}

impl<const WIDTH: u32> StatusReg<WIDTH> {
    pub const MASK: u32 = width_mask(WIDTH);

    pub fn new(value: u32) -> Self {
        Self {
            value: AtomicU32::new(value & Self::MASK),
        }
    }

    pub fn set(&self, value: u32) {
        self.value.store(value & Self::MASK, Ordering::Release);
    }

    pub fn get(&self) -> u32 {
        self.value.load(Ordering::Acquire)
    }
}

/// Hardware-set status flag, cleared by software writing a `1`.
///
/// Reads never clear the flag.
#[derive(Debug, Default)]
pub struct ClearOnWrite {
    flag: AtomicBool,
}

impl ClearOnWrite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hardware side: latch the condition.
    pub fn raise(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Software side: a written `true` clears, `false` is ignored.
    pub fn clear(&self, flag: bool) {
        if flag {
            self.flag.store(false, Ordering::Release);
        }
    }

    pub fn get(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
