// Copyright (C) 2025 Dayton Fishell
// Anachron Video Peripheral Model
// This file is part of Anachron.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! 32-entry base palette and the 256-entry table interpolated from it.

use crate::regmap::Channel;

pub const BASE_ENTRIES: usize = 32;
pub const INTERPOLATED_ENTRIES: usize = 256;
/// Interpolation steps between neighbouring base entries.
const STEPS: usize = INTERPOLATED_ENTRIES / BASE_ENTRIES;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-spec", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(0xff, 0xff, 0xff);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Unpack `0xRRGGBB`.
    pub const fn from_u32(rgb: u32) -> Self {
        Self::new((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
    }

    fn channel(&self, channel: Channel) -> u8 {
        match channel {
            Channel::Red => self.r,
            Channel::Green => self.g,
            Channel::Blue => self.b,
        }
    }

    fn channel_mut(&mut self, channel: Channel) -> &mut u8 {
        match channel {
            Channel::Red => &mut self.r,
            Channel::Green => &mut self.g,
            Channel::Blue => &mut self.b,
        }
    }

    /// `step` eighths of the way from `self` to `to`, rounded down.
    fn blend(self, to: Rgb, step: usize) -> Rgb {
        let mix = |a: u8, b: u8| ((a as usize * (STEPS - step) + b as usize * step) / STEPS) as u8;
        Rgb::new(mix(self.r, to.r), mix(self.g, to.g), mix(self.b, to.b))
    }
}

/// Palette state behind the index/R/G/B register ports.
#[derive(Debug, Clone)]
pub struct Palette {
    index: u8,
    base: [Rgb; BASE_ENTRIES],
    interpolated: [Rgb; INTERPOLATED_ENTRIES],
}

impl Palette {
    pub fn new() -> Self {
        Self {
            index: 0,
            base: [Rgb::BLACK; BASE_ENTRIES],
            interpolated: [Rgb::BLACK; INTERPOLATED_ENTRIES],
        }
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    /// Select the base entry the channel ports address. Only 0..=31 exist.
    pub fn set_index(&mut self, index: u8) {
        self.index = index & (BASE_ENTRIES as u8 - 1);
    }

    pub fn channel(&self, channel: Channel) -> u8 {
        self.base[self.index as usize].channel(channel)
    }

    /// Write one channel of the selected entry and refresh the two
    /// interpolated runs that touch it.
    pub fn set_channel(&mut self, channel: Channel, value: u8) {
        *self.base[self.index as usize].channel_mut(channel) = value;
        let index = self.index as usize;
        self.interpolate((index + BASE_ENTRIES - 1) % BASE_ENTRIES);
        self.interpolate(index);
    }

    /// Program a whole entry through the channel ports.
    pub fn set_entry(&mut self, index: u8, color: Rgb) {
        self.set_index(index);
        self.set_channel(Channel::Red, color.r);
        self.set_channel(Channel::Green, color.g);
        self.set_channel(Channel::Blue, color.b);
    }

    fn interpolate(&mut self, start: usize) {
        let from = self.base[start];
        let to = self.base[(start + 1) % BASE_ENTRIES];
        for step in 0..STEPS {
            self.interpolated[start * STEPS + step] = from.blend(to, step);
        }
    }

    pub fn base(&self) -> &[Rgb; BASE_ENTRIES] {
        &self.base
    }

    pub fn interpolated(&self) -> &[Rgb; INTERPOLATED_ENTRIES] {
        &self.interpolated
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}
