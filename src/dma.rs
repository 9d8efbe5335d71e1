// Copyright (C) 2025 Dayton Fishell
// Anachron Video Peripheral Model
// This file is part of Anachron.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Per-element DMA and bit-unpacking engine.
//!
//! Addresses are dword addresses (30 bits). Sprites always consume a fixed
//! amount of data per scan-line (`row_size`), matching hardware that prefetches
//! sprite rows during horizontal blanking regardless of X. Planes instead use a
//! signed post-increment to cover the difference between the visible width and
//! the plane pitch.

use crate::core::WordSource;

/// Dword addresses are 30 bits wide.
pub const ADDRESS_MASK: u32 = (1 << 30) - 1;

/// Latched register values a DMA pass runs with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DmaConfig {
    /// Start address in dwords.
    pub base_address: u32,
    /// Wrap window as a power of two in dwords.
    pub window: u8,
    /// Signed row-to-row adjustment in dwords (variable stride only).
    pub post_increment: i8,
}

#[derive(Debug, Clone, Default)]
pub struct Dma {
    config: DmaConfig,
    current_address: u32,
    bits_remaining: u8,
    shift_register: u32,
    row_start_address: u32,
    row_size: u32,
}

impl Dma {
    /// Variable-stride engine, advanced by the post-increment (planes).
    pub fn variable_stride() -> Self {
        Self::default()
    }

    /// Fixed-stride engine consuming `row_size` dwords per row (sprites).
    pub fn fixed_stride(row_size: u32) -> Self {
        Self {
            row_size,
            ..Self::default()
        }
    }

    pub fn current_address(&self) -> u32 {
        self.current_address
    }

    pub fn bits_remaining(&self) -> u8 {
        self.bits_remaining
    }

    pub fn row_start_address(&self) -> u32 {
        self.row_start_address
    }

    pub fn row_size(&self) -> u32 {
        self.row_size
    }

    /// Begin a new frame from `config.base_address`.
    pub fn restart(&mut self, config: DmaConfig) {
        self.config = config;
        self.current_address = config.base_address & ADDRESS_MASK;
        self.bits_remaining = 0;
        self.shift_register = 0;
        self.row_start_address = self.current_address;
    }

    /// Move the address by `delta` dwords. Bits inside the wrap window wrap,
    /// bits above it are untouched.
    pub fn advance_address(&mut self, delta: i32) {
        let window_mask = ((1u64 << self.config.window) - 1) as u32;
        let moved = self.current_address.wrapping_add(delta as u32);
        self.current_address =
            ((self.current_address & !window_mask) | (moved & window_mask)) & ADDRESS_MASK;
    }

    /// Step to the start of the next scan-line's data.
    pub fn next_row(&mut self) {
        if self.row_size == 0 {
            self.advance_address(self.config.post_increment as i32);
        } else {
            let target = self.row_start_address.wrapping_add(self.row_size);
            self.advance_address(target.wrapping_sub(self.current_address) as i32);
        }
        self.row_start_address = self.current_address;
        self.bits_remaining = 0;
    }

    /// Pull the next `num_bits` pixel code, refilling from memory when empty.
    ///
    /// # Panics
    ///
    /// On a width other than 1, 2, 4 or 8, and when a refill would be needed
    /// while a partial word is still buffered.
    pub fn get_bits<M: WordSource + ?Sized>(&mut self, num_bits: u8, memory: &M) -> u8 {
        assert!(
            matches!(num_bits, 1 | 2 | 4 | 8),
            "invalid DMA pixel width {num_bits}"
        );
        if self.bits_remaining < num_bits {
            assert!(
                self.bits_remaining == 0,
                "DMA refill at {:#010x} with {} stale bits",
                self.current_address,
                self.bits_remaining
            );
            self.shift_register = memory.read_word(self.current_address);
            self.advance_address(1);
            self.bits_remaining = 32;
        }
        self.bits_remaining -= num_bits;
        let value = self.shift_register & ((1 << num_bits) - 1);
        self.shift_register >>= num_bits;
        value as u8
    }
}
