// Copyright (C) 2025 Dayton Fishell
// Anachron Video Peripheral Model
// This file is part of Anachron.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Screen timing presets.
//!
//! Horizontal values are in double pixel clocks and count from the start of
//! the back porch; vertical values are lines counted from the start of the
//! active area. The presets derive from the VGA 640x480@60, 640x400@70 and
//! 1024x768@60 timings at half the pixel clock.

use crate::error::VideoError;
use crate::regmap::{
    H_BACK_PORCH_END, H_FRONT_PORCH_END, H_SYNC_END, H_TOTAL, TIMING_MISC, V_ACTIVE_END_HIGH,
    V_BACK_PORCH_END_HIGH, V_SYNC_END_HIGH, V_TIMING_LOW, V_TOTAL_HIGH,
};
use crate::registers::{TimingMisc, VideoRegisters};

/// A complete set of timing register values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-spec", derive(serde::Serialize, serde::Deserialize))]
pub struct VideoTiming {
    pub h_total: u8,
    pub h_back_porch_end: u8,
    pub h_sync_end: u8,
    pub h_front_porch_end: u8,
    pub high_res: bool,
    pub v_total: u16,
    pub v_active_end: u16,
    pub v_back_porch_end: u16,
    pub v_sync_end: u16,
    /// Each line is shown `v_replication + 1` times.
    pub v_replication: u8,
}

impl VideoTiming {
    pub const MODE_640X480: VideoTiming = VideoTiming {
        h_total: 199,
        h_back_porch_end: 11,
        h_sync_end: 35,
        h_front_porch_end: 39,
        high_res: true,
        v_total: 524,
        v_active_end: 479,
        v_back_porch_end: 512,
        v_sync_end: 514,
        v_replication: 0,
    };

    pub const MODE_320X240: VideoTiming = VideoTiming {
        high_res: false,
        v_replication: 1,
        ..Self::MODE_640X480
    };

    pub const MODE_640X400: VideoTiming = VideoTiming {
        v_total: 448,
        v_active_end: 399,
        v_back_porch_end: 434,
        v_sync_end: 436,
        ..Self::MODE_640X480
    };

    pub const MODE_320X200: VideoTiming = VideoTiming {
        high_res: false,
        v_replication: 1,
        ..Self::MODE_640X400
    };

    pub const MODE_512X384: VideoTiming = VideoTiming {
        h_total: 167,
        h_back_porch_end: 19,
        h_sync_end: 36,
        h_front_porch_end: 39,
        high_res: true,
        v_total: 805,
        v_active_end: 767,
        v_back_porch_end: 796,
        v_sync_end: 802,
        v_replication: 1,
    };

    pub const MODE_256X192: VideoTiming = VideoTiming {
        high_res: false,
        v_replication: 3,
        ..Self::MODE_512X384
    };

    pub const PRESETS: [(&'static str, VideoTiming); 6] = [
        ("640x480", Self::MODE_640X480),
        ("320x240", Self::MODE_320X240),
        ("640x400", Self::MODE_640X400),
        ("320x200", Self::MODE_320X200),
        ("512x384", Self::MODE_512X384),
        ("256x192", Self::MODE_256X192),
    ];

    pub fn by_name(name: &str) -> Result<Self, VideoError> {
        Self::PRESETS
            .iter()
            .find(|(preset, _)| preset.eq_ignore_ascii_case(name))
            .map(|(_, timing)| *timing)
            .ok_or_else(|| VideoError::UnknownMode(name.to_string()))
    }

    fn clock_multiplier(&self) -> u32 {
        if self.high_res { 4 } else { 2 }
    }

    pub fn width(&self) -> u32 {
        (self.h_total as u32).saturating_sub(self.h_front_porch_end as u32) * self.clock_multiplier()
    }

    pub fn height(&self) -> u32 {
        (self.v_active_end as u32 + 1) / (self.v_replication as u32 + 1)
    }

    /// Write the timing into the pending registers. Takes effect at the next
    /// latch. The line-interrupt bits sharing the misc byte are kept.
    pub fn program(&self, regs: &VideoRegisters, enabled: bool) {
        regs.register_write(H_TOTAL, self.h_total);
        regs.register_write(H_BACK_PORCH_END, self.h_back_porch_end);
        regs.register_write(H_SYNC_END, self.h_sync_end);
        regs.register_write(H_FRONT_PORCH_END, self.h_front_porch_end);

        let vertical = [
            (V_TOTAL_HIGH, self.v_total),
            (V_ACTIVE_END_HIGH, self.v_active_end),
            (V_BACK_PORCH_END_HIGH, self.v_back_porch_end),
            (V_SYNC_END_HIGH, self.v_sync_end),
        ];
        let mut low_bits = 0u8;
        for (slot, (offset, value)) in vertical.into_iter().enumerate() {
            regs.register_write(offset, (value >> 2) as u8);
            low_bits |= ((value & 0x03) as u8) << (2 * slot);
        }
        regs.register_write(V_TIMING_LOW, low_bits);

        let line_int_low = TimingMisc::from_bits_truncate(regs.register_read(TIMING_MISC))
            & TimingMisc::LINE_INT_LOW;
        let mut misc = TimingMisc::from_bits_truncate((self.v_replication & 0x03) << 2) | line_int_low;
        misc.set(TimingMisc::HIGH_RES, self.high_res);
        misc.set(TimingMisc::ENABLED, enabled);
        regs.register_write(TIMING_MISC, misc.bits());
    }

    #[cfg(feature = "serde-spec")]
    pub fn from_yaml_str(text: &str) -> Result<Self, VideoError> {
        Ok(serde_yaml::from_str(text)?)
    }

    #[cfg(feature = "serde-spec")]
    pub fn from_json_str(text: &str) -> Result<Self, VideoError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl Default for VideoTiming {
    fn default() -> Self {
        Self::MODE_640X480
    }
}
